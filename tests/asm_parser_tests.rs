//! Integration tests for the assembly parser core.
//!
//! Each test assembles a snippet against a recording streamer and checks
//! the emitted event sequence and the collected diagnostics.

use bumpalo::Bump;

use selmc::asm::{AsmLexer, AsmParser, NullTargetParser, SourceMgr, TargetAsmParser, TokenKind};
use selmc::config::{Config, TargetRegistry};
use selmc::diag::Severity;
use selmc::mc::{
    McContext, McInst, McOperand, McValue, RecordingStreamer, StreamerEvent, SymbolAttr,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct ParseOutcome {
    ok: bool,
    events: Vec<StreamerEvent>,
    diags: Vec<(Severity, String)>,
    symbols: Vec<String>,
    sections: Vec<String>,
}

impl ParseOutcome {
    fn symbol(&self, name: &str) -> selmc::mc::SymbolId {
        let idx = self
            .symbols
            .iter()
            .position(|s| s == name)
            .unwrap_or_else(|| panic!("no symbol named {name}"));
        selmc::mc::SymbolId(idx as u32)
    }

    fn errors(&self) -> Vec<&str> {
        self.diags
            .iter()
            .filter(|(sev, _)| *sev == Severity::Error)
            .map(|(_, msg)| msg.as_str())
            .collect()
    }

    fn warnings(&self) -> Vec<&str> {
        self.diags
            .iter()
            .filter(|(sev, _)| *sev == Severity::Warning)
            .map(|(_, msg)| msg.as_str())
            .collect()
    }
}

fn assemble_files(files: &[(&str, &str)], main: &str) -> ParseOutcome {
    assemble_with(files, main, &mut NullTargetParser)
}

fn assemble_with(
    files: &[(&str, &str)],
    main: &str,
    target: &mut dyn TargetAsmParser,
) -> ParseOutcome {
    init_logging();
    let arena = Bump::new();
    let mut ctx = McContext::new(&arena);
    let mut sources = SourceMgr::new();
    let mut main_id = None;
    for (name, text) in files {
        let id = sources.add_buffer(*name, *text);
        if *name == main {
            main_id = Some(id);
        }
    }

    let mut streamer = RecordingStreamer::new();
    let registry = TargetRegistry::default();
    let mut parser = AsmParser::new(
        AsmLexer::new(sources, main_id.expect("main buffer registered")),
        &mut ctx,
        &mut streamer,
        target,
        &registry,
        Config::default(),
    );
    let ok = parser.run().is_ok();
    let diags = parser
        .diagnostics()
        .diagnostics()
        .iter()
        .map(|d| (d.severity, d.message.clone()))
        .collect();
    drop(parser);

    let symbols = (0..ctx.symbol_count())
        .map(|i| ctx.symbol_name(selmc::mc::SymbolId(i as u32)).to_string())
        .collect();
    let sections = (0..ctx.section_count())
        .map(|i| ctx.section_name(selmc::mc::SectionId(i as u32)).to_string())
        .collect();

    ParseOutcome {
        ok,
        events: streamer.events,
        diags,
        symbols,
        sections,
    }
}

fn assemble(text: &str) -> ParseOutcome {
    assemble_files(&[("input.s", text)], "input.s")
}

#[test]
fn label_assignment_and_value() {
    let out = assemble("foo:\nbar = foo + 4\n.byte bar\n");
    assert!(out.ok, "diags: {:?}", out.diags);

    let foo = out.symbol("foo");
    let bar = out.symbol("bar");
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::Label(foo),
            StreamerEvent::Assignment {
                sym: bar,
                value: McValue::symbolic(4, Some(foo), None),
                is_dot_set: false,
            },
            StreamerEvent::Value {
                value: McValue::symbolic(0, Some(bar), None),
                size: 1,
            },
        ]
    );
}

#[test]
fn include_emits_inner_before_outer() {
    let out = assemble_files(
        &[
            ("a.s", ".include \"b.s\"\n.byte 1\n"),
            ("b.s", ".byte 2\n"),
        ],
        "a.s",
    );
    assert!(out.ok, "diags: {:?}", out.diags);
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::Value {
                value: McValue::absolute(2),
                size: 1,
            },
            StreamerEvent::Value {
                value: McValue::absolute(1),
                size: 1,
            },
        ]
    );
}

#[test]
fn missing_include_is_an_error() {
    let out = assemble(".include \"missing.s\"\n");
    assert!(!out.ok);
    assert!(out.errors()[0].contains("could not find include file 'missing.s'"));
}

#[test]
fn alignment_max_bytes_clamps_with_warning() {
    let out = assemble(".p2align 3, 0x90, 16\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    assert!(out.warnings()[0].contains("has no effect"));
    assert_eq!(
        out.events,
        vec![StreamerEvent::ValueToAlignment {
            align: 8,
            fill: 0x90,
            value_size: 1,
            max_bytes: 0,
        }]
    );
}

#[test]
fn alignment_that_cannot_be_satisfied_is_dropped() {
    let out = assemble(".p2align 3, 0x90, 0\n");
    assert!(out.ok);
    assert!(out.warnings()[0].contains("can never be satisfied"));
    assert!(out.events.is_empty());
}

#[test]
fn align_accepts_omitted_fill() {
    let out = assemble(".balign 16,,8\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    assert_eq!(
        out.events,
        vec![StreamerEvent::ValueToAlignment {
            align: 16,
            fill: 0,
            value_size: 1,
            max_bytes: 8,
        }]
    );
}

#[test]
fn negative_alignment_is_an_error() {
    let out = assemble(".align -1\n");
    assert!(!out.ok);
    assert!(out.errors()[0].contains("negative"));
}

#[test]
fn label_redefinition_recovers() {
    let out = assemble("foo:\nfoo:\n.byte 1\n");
    assert!(!out.ok);
    assert_eq!(out.errors(), vec!["invalid symbol redefinition"]);

    // One label, then the .byte after recovery.
    let foo = out.symbol("foo");
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::Label(foo),
            StreamerEvent::Value {
                value: McValue::absolute(1),
                size: 1,
            },
        ]
    );
}

#[test]
fn label_after_variable_is_diagnosed() {
    let out = assemble("foo = 1\nfoo:\n");
    assert!(!out.ok);
    assert_eq!(out.errors(), vec!["symbol already used as assembler variable"]);
}

#[test]
fn assignment_conflicts_are_diagnosed() {
    let out = assemble("foo:\nfoo = 2\n");
    assert!(!out.ok);
    assert_eq!(
        out.errors(),
        vec!["invalid assignment to symbol emitted as a label"]
    );

    let out = assemble(".globl ext\next = 2\n");
    assert!(!out.ok);
    assert_eq!(out.errors(), vec!["invalid assignment to external symbol"]);

    let out = assemble("v = 1\nv = 2\n");
    assert!(!out.ok);
    assert_eq!(out.errors(), vec!["invalid reassignment of assembler variable"]);
}

#[test]
fn section_switch_aliases_and_dot_section() {
    let out = assemble(".text\n.data\n.section __FOO,__bar,regular\n.cstring\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    assert_eq!(
        out.sections,
        vec![
            "__TEXT,__text,regular,pure_instructions",
            "__DATA,__data",
            "__FOO,__bar,regular",
            "__TEXT,__cstring,cstring_literals",
        ]
    );
    assert_eq!(out.events.len(), 4);
    assert!(matches!(out.events[0], StreamerEvent::SwitchSection(_)));
}

#[test]
fn dot_set_assigns_and_flags_the_streamer() {
    let out = assemble(".set five, 5\n.byte five\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    let five = out.symbol("five");
    assert_eq!(
        out.events[0],
        StreamerEvent::Assignment {
            sym: five,
            value: McValue::absolute(5),
            is_dot_set: true,
        }
    );
}

#[test]
fn ascii_and_asciz_emit_bytes() {
    let out = assemble(".ascii \"ab\", \"c\"\n.asciz \"d\"\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::Bytes(b"ab".to_vec()),
            StreamerEvent::Bytes(b"c".to_vec()),
            StreamerEvent::Bytes(b"d".to_vec()),
            StreamerEvent::Bytes(vec![0]),
        ]
    );
}

#[test]
fn string_escapes_reach_the_streamer() {
    let out = assemble(".ascii \"a\\tb\\x41\"\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    assert_eq!(out.events, vec![StreamerEvent::Bytes(b"a\tbA".to_vec())]);
}

#[test]
fn value_directives_cover_all_sizes() {
    let out = assemble(".byte 1\n.short 2\n.long 3\n.quad 4\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    let sizes: Vec<u32> = out
        .events
        .iter()
        .map(|e| match e {
            StreamerEvent::Value { size, .. } => *size,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(sizes, vec![1, 2, 4, 8]);
}

#[test]
fn space_repeats_fill_bytes() {
    let out = assemble(".space 3, 7\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::Value {
                value: McValue::absolute(7),
                size: 1
            };
            3
        ]
    );

    let out = assemble(".space 0\n");
    assert!(!out.ok);
    assert!(out.errors()[0].contains("invalid number of bytes"));
}

#[test]
fn fill_validates_size() {
    let out = assemble(".fill 2, 4, 0xAA\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::Value {
                value: McValue::absolute(0xAA),
                size: 4
            };
            2
        ]
    );

    let out = assemble(".fill 1, 3, 0\n");
    assert!(!out.ok);
    assert!(out.errors()[0].contains("invalid '.fill' size"));
}

#[test]
fn org_takes_relocatable_offset_and_fill() {
    let out = assemble("base:\n.org base + 16, 0x90\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    let base = out.symbol("base");
    assert_eq!(
        out.events[1],
        StreamerEvent::ValueToOffset {
            offset: McValue::symbolic(16, Some(base), None),
            fill: 0x90,
        }
    );
}

#[test]
fn symbol_attributes_mark_undefined_symbols_external() {
    let out = assemble(".globl a, b\n.weak_reference c\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    let (a, b, c) = (out.symbol("a"), out.symbol("b"), out.symbol("c"));
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::SymbolAttribute(a, SymbolAttr::Global),
            StreamerEvent::SymbolAttribute(b, SymbolAttr::Global),
            StreamerEvent::SymbolAttribute(c, SymbolAttr::WeakReference),
        ]
    );
}

#[test]
fn comm_and_lcomm() {
    let out = assemble(".comm buf, 64, 3\n.lcomm tmp, 16\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    let (buf, tmp) = (out.symbol("buf"), out.symbol("tmp"));
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::CommonSymbol {
                sym: buf,
                size: 64,
                pow2_align: 3,
                is_local: false,
            },
            StreamerEvent::CommonSymbol {
                sym: tmp,
                size: 16,
                pow2_align: 0,
                is_local: true,
            },
        ]
    );

    let out = assemble(".comm buf, -1\n");
    assert!(!out.ok);
    assert!(out.errors()[0].contains("can't be less than zero"));
}

#[test]
fn zerofill_forms() {
    let out = assemble(".zerofill __DATA, __bss\n.zerofill __DATA, __bss, sym, 24, 4\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    let sym = out.symbol("sym");
    assert_eq!(out.sections, vec!["__DATA,__bss"]);
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::Zerofill {
                section: selmc::mc::SectionId(0),
                sym: None,
                size: 0,
                pow2_align: 0,
            },
            StreamerEvent::Zerofill {
                section: selmc::mc::SectionId(0),
                sym: Some(sym),
                size: 24,
                pow2_align: 4,
            },
        ]
    );
}

#[test]
fn desc_lsym_and_subsections() {
    let out = assemble(".desc d, 0x10\n.lsym l, d + 2\n.subsections_via_symbols\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    let (d, l) = (out.symbol("d"), out.symbol("l"));
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::SymbolDesc(d, 0x10),
            StreamerEvent::LocalSymbol(l, McValue::symbolic(2, Some(d), None)),
            StreamerEvent::AssemblerFlag(selmc::mc::AssemblerFlag::SubsectionsViaSymbols),
        ]
    );
}

#[test]
fn abort_reports_and_continues() {
    let out = assemble(".abort \"fatal\"\n.byte 1\n");
    assert!(!out.ok);
    assert!(out.errors()[0].contains(".abort 'fatal' detected"));
    // The parser keeps going after .abort.
    assert_eq!(
        out.events,
        vec![StreamerEvent::Value {
            value: McValue::absolute(1),
            size: 1
        }]
    );
}

#[test]
fn unknown_directives_warn_and_skip() {
    let out = assemble(".unknown_thing 1, 2\n.byte 3\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    assert_eq!(out.warnings(), vec!["ignoring directive for now"]);
    assert_eq!(
        out.events,
        vec![StreamerEvent::Value {
            value: McValue::absolute(3),
            size: 1
        }]
    );
}

#[test]
fn dump_and_load_are_ignored_with_warnings() {
    let out = assemble(".dump \"x\"\n.load \"y\"\n");
    assert!(out.ok);
    assert_eq!(
        out.warnings(),
        vec![
            "ignoring directive .dump for now",
            "ignoring directive .load for now",
        ]
    );
}

#[test]
fn expression_precedence_follows_the_tiers() {
    // * binds above +, << above |, comparisons sit with + and -.
    let out = assemble(".byte 2 + 3 * 4\n.byte 1 | 1 << 3\n.byte (2 + 2 == 4) + 1\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    let values: Vec<i64> = out
        .events
        .iter()
        .map(|e| match e {
            StreamerEvent::Value { value, .. } => value.constant,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(values, vec![14, 9, 2]);
}

#[test]
fn unresolved_absolute_expression_is_diagnosed() {
    let out = assemble(".space undefined_sym\n");
    assert!(!out.ok);
    assert_eq!(out.errors(), vec!["expected absolute expression"]);
}

#[test]
fn division_by_zero_is_not_folded() {
    let out = assemble(".space 4 / 0\n");
    assert!(!out.ok);
    assert_eq!(out.errors(), vec!["expected absolute expression"]);
}

#[test]
fn relocatable_rejects_two_symbols_per_side() {
    let out = assemble(".byte a + b\n");
    assert!(!out.ok);
    assert_eq!(out.errors(), vec!["expected relocatable expression"]);
}

#[test]
fn label_difference_folds_to_absolute() {
    let out = assemble("a:\nb:\n.byte b - b + 7\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    assert_eq!(
        out.events[2],
        StreamerEvent::Value {
            value: McValue::absolute(7),
            size: 1
        }
    );
}

#[test]
fn statements_split_on_semicolons() {
    let out = assemble(".byte 1; .byte 2\n");
    assert!(out.ok, "diags: {:?}", out.diags);
    assert_eq!(out.events.len(), 2);
}

#[test]
fn recovery_consumes_only_the_bad_statement() {
    let out = assemble(".byte @\n.byte 9\n");
    assert!(!out.ok);
    assert_eq!(out.errors().len(), 1);
    assert_eq!(
        out.events,
        vec![StreamerEvent::Value {
            value: McValue::absolute(9),
            size: 1
        }]
    );
}

#[test]
fn reemission_is_idempotent() {
    let text = ".data\nfoo:\n.byte foo + 1\n.p2align 2\n";
    let first = assemble(text);
    let second = assemble(text);
    assert!(first.ok);
    assert_eq!(first.events, second.events);
    assert_eq!(first.diags.len(), second.diags.len());
}

#[test]
fn token_stream_survives_reformatting() {
    // The same statement with canonical and crowded spacing lexes to the
    // same kinds and values, modulo whitespace.
    let collect = |text: &str| {
        let mut sources = SourceMgr::new();
        let main = sources.add_buffer("t.s", text);
        let mut lexer = AsmLexer::new(sources, main);
        let mut out = Vec::new();
        loop {
            let tok = lexer.lex();
            out.push((tok.kind, tok.int_value));
            if tok.kind == TokenKind::Eof {
                return out;
            }
        }
    };
    assert_eq!(
        collect(".byte 2 + 3 , 4\n"),
        collect(".byte 2+3,4\n")
    );
}

/// Minimal target parser: records the mnemonic and reads integer or
/// register operand tokens up to the statement end.
struct TestTarget;

impl TargetAsmParser for TestTarget {
    fn parse_instruction(
        &mut self,
        mnemonic: &str,
        lexer: &mut AsmLexer,
        _ctx: &mut McContext,
    ) -> Result<McInst, String> {
        if mnemonic == "bad" {
            return Err(format!("unrecognized instruction '{mnemonic}'"));
        }
        let mut operands = Vec::new();
        loop {
            match lexer.kind() {
                TokenKind::Integer => {
                    operands.push(McOperand::Immediate(lexer.tok().int_value));
                    lexer.lex();
                }
                TokenKind::Register => {
                    operands.push(McOperand::Register(lexer.tok().text.clone()));
                    lexer.lex();
                }
                TokenKind::Comma => {
                    lexer.lex();
                }
                _ => break,
            }
        }
        Ok(McInst::with_operands(mnemonic, operands))
    }
}

#[test]
fn instructions_flow_through_the_target_parser() {
    let out = assemble_with(
        &[("input.s", "movl %eax, 4\nbad\n.byte 1\n")],
        "input.s",
        &mut TestTarget,
    );
    assert!(!out.ok);
    assert_eq!(out.errors(), vec!["unrecognized instruction 'bad'"]);
    assert_eq!(
        out.events,
        vec![
            StreamerEvent::Instruction(McInst::with_operands(
                "movl",
                vec![
                    McOperand::Register("%eax".into()),
                    McOperand::Immediate(4),
                ],
            )),
            StreamerEvent::Value {
                value: McValue::absolute(1),
                size: 1
            },
        ]
    );
}
