// This module is the statement loop of the assembler. Each statement is classified
// from its leading tokens (label, assignment, directive, instruction), directives
// validate their operands and drive exactly one streamer call each, and expressions
// are parsed with precedence climbing into AsmExpr trees evaluated against the
// symbol table. Error recovery is per statement: a failed statement produces one
// located diagnostic, the rest of the line is discarded, and parsing resumes at the
// next statement; run() reports whether anything failed. Section-switch aliases come
// from the TargetRegistry; instruction mnemonics are delegated to the TargetAsmParser
// seam and the resulting McInst is forwarded to the streamer.

//! Statement and directive parser.

use thiserror::Error;

use crate::config::{Config, TargetRegistry};
use crate::diag::{DiagEngine, SourceLoc};
use crate::mc::{
    AssemblerFlag, McContext, McInst, McValue, SectionId, Streamer, SymbolAttr,
};

use super::expr::{bin_op_precedence, AsmExpr, UnaryOp};
use super::lexer::{AsmLexer, TokenKind};
use super::source::SourceMgr;

/// Target hook for instruction statements. The parser hands over the
/// mnemonic with the lexer positioned at the first operand token; the
/// implementation consumes the operands and leaves the statement end
/// unconsumed.
pub trait TargetAsmParser {
    fn parse_instruction(
        &mut self,
        mnemonic: &str,
        lexer: &mut AsmLexer,
        ctx: &mut McContext,
    ) -> Result<McInst, String>;
}

/// Target parser for pure-directive assembly: rejects every mnemonic.
pub struct NullTargetParser;

impl TargetAsmParser for NullTargetParser {
    fn parse_instruction(
        &mut self,
        mnemonic: &str,
        _lexer: &mut AsmLexer,
        _ctx: &mut McContext,
    ) -> Result<McInst, String> {
        Err(format!("unrecognized instruction '{mnemonic}'"))
    }
}

/// Run-level failure: at least one statement errored. The per-statement
/// details live in the diagnostic engine.
#[derive(Debug, Error)]
pub enum AsmError {
    #[error("assembly failed with {errors} error(s)")]
    Failed { errors: usize },
}

#[derive(Debug)]
struct ParseError {
    loc: SourceLoc,
    message: String,
}

type PResult<T = ()> = Result<T, ParseError>;

pub struct AsmParser<'arena, 'a> {
    lexer: AsmLexer,
    ctx: &'a mut McContext<'arena>,
    streamer: &'a mut dyn Streamer,
    target: &'a mut dyn TargetAsmParser,
    registry: &'a TargetRegistry,
    config: Config,
    diags: DiagEngine,
    current_section: Option<SectionId>,
}

impl<'arena, 'a> AsmParser<'arena, 'a> {
    pub fn new(
        mut lexer: AsmLexer,
        ctx: &'a mut McContext<'arena>,
        streamer: &'a mut dyn Streamer,
        target: &'a mut dyn TargetAsmParser,
        registry: &'a TargetRegistry,
        config: Config,
    ) -> Self {
        for path in &config.include_paths {
            lexer.sources_mut().add_include_path(path.clone());
        }
        Self {
            lexer,
            ctx,
            streamer,
            target,
            registry,
            config,
            diags: DiagEngine::new(),
            current_section: None,
        }
    }

    pub fn diagnostics(&self) -> &DiagEngine {
        &self.diags
    }

    pub fn sources(&self) -> &SourceMgr {
        self.lexer.sources()
    }

    /// Parse every statement. Per-statement errors are reported and
    /// recovered from; the result says whether any statement failed.
    pub fn run(&mut self) -> Result<(), AsmError> {
        self.lexer.lex();

        while self.lexer.is_not(TokenKind::Eof) {
            if let Err(err) = self.parse_statement() {
                self.diags.error(err.loc, err.message);
                self.eat_to_end_of_statement();
            }
        }

        let errors = self.diags.error_count();
        if errors > 0 || (self.config.fatal_warnings && self.diags.warning_count() > 0) {
            return Err(AsmError::Failed {
                errors: errors.max(1),
            });
        }
        Ok(())
    }

    fn error<T>(&self, loc: SourceLoc, message: impl Into<String>) -> PResult<T> {
        Err(ParseError {
            loc,
            message: message.into(),
        })
    }

    fn tok_error<T>(&self, message: impl Into<String>) -> PResult<T> {
        self.error(self.lexer.loc(), message)
    }

    /// Discard tokens through the next statement end.
    fn eat_to_end_of_statement(&mut self) {
        while self.lexer.is_not(TokenKind::EndOfStatement) && self.lexer.is_not(TokenKind::Eof) {
            self.lexer.lex();
        }
        if self.lexer.is(TokenKind::EndOfStatement) {
            self.lexer.lex();
        }
    }

    fn current_section(&mut self) -> SectionId {
        if let Some(section) = self.current_section {
            return section;
        }
        let name = self
            .registry
            .section_alias(".text")
            .unwrap_or("__TEXT,__text")
            .to_string();
        let section = self.ctx.get_or_create_section(&name);
        self.current_section = Some(section);
        section
    }

    /// Statement:
    ///   EndOfStatement
    ///   Identifier ':' Statement
    ///   Identifier '=' RelocExpr EndOfStatement
    ///   Directive ... EndOfStatement
    ///   Instruction ... EndOfStatement
    fn parse_statement(&mut self) -> PResult {
        match self.lexer.kind() {
            TokenKind::EndOfStatement => {
                self.lexer.lex();
                return Ok(());
            }
            TokenKind::Identifier => {}
            TokenKind::Error => {
                let tok = self.lexer.tok().clone();
                return self.error(tok.loc, tok.text);
            }
            _ => return self.tok_error("unexpected token at start of statement"),
        }

        let id_tok = self.lexer.tok().clone();
        let id_loc = id_tok.loc;
        let name = id_tok.text;

        match self.lexer.lex().kind {
            TokenKind::Colon => {
                // identifier ':' -> label
                self.lexer.lex();
                let sym = self.ctx.get_or_create_symbol(&name);
                if self.ctx.symbol(sym).is_defined() {
                    return self.error(id_loc, "invalid symbol redefinition");
                }
                if self.ctx.symbol(sym).is_assigned() {
                    return self.error(id_loc, "symbol already used as assembler variable");
                }
                let section = self.current_section();
                self.ctx.define_label(sym, section);
                self.streamer.emit_label(sym);
                self.parse_statement()
            }
            TokenKind::Equal => {
                // identifier '=' -> assignment
                self.lexer.lex();
                self.parse_assignment(&name, false)
            }
            _ => {
                if name.starts_with('.') {
                    self.parse_directive(&name, id_loc)
                } else {
                    self.parse_instruction_statement(&name, id_loc)
                }
            }
        }
    }

    fn parse_assignment(&mut self, name: &str, is_dot_set: bool) -> PResult {
        let equal_loc = self.lexer.loc();
        let value = self.parse_relocatable_expression()?;

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in assignment");
        }
        self.lexer.lex();

        let sym = self.ctx.get_or_create_symbol(name);
        let symbol = self.ctx.symbol(sym);
        if symbol.is_defined() {
            return self.error(equal_loc, "invalid assignment to symbol emitted as a label");
        }
        if symbol.is_external() {
            return self.error(equal_loc, "invalid assignment to external symbol");
        }
        if symbol.is_assigned() {
            return self.error(equal_loc, "invalid reassignment of assembler variable");
        }

        self.ctx.assign(sym, value);
        self.streamer.emit_assignment(sym, value, is_dot_set);
        Ok(())
    }

    fn parse_directive(&mut self, name: &str, loc: SourceLoc) -> PResult {
        if let Some(section) = self.registry.section_alias(name) {
            let section = section.to_string();
            return self.parse_section_switch(&section);
        }

        match name {
            ".section" => self.parse_directive_section(),
            ".set" => self.parse_directive_set(),
            ".ascii" => self.parse_directive_ascii(false),
            ".asciz" => self.parse_directive_ascii(true),
            ".byte" => self.parse_directive_value(1),
            ".short" => self.parse_directive_value(2),
            ".long" => self.parse_directive_value(4),
            ".quad" => self.parse_directive_value(8),
            ".align" => self.parse_directive_align(true, 1),
            ".align32" => self.parse_directive_align(true, 4),
            ".balign" => self.parse_directive_align(false, 1),
            ".balignw" => self.parse_directive_align(false, 2),
            ".balignl" => self.parse_directive_align(false, 4),
            ".p2align" => self.parse_directive_align(true, 1),
            ".p2alignw" => self.parse_directive_align(true, 2),
            ".p2alignl" => self.parse_directive_align(true, 4),
            ".org" => self.parse_directive_org(),
            ".fill" => self.parse_directive_fill(),
            ".space" => self.parse_directive_space(),
            ".globl" | ".global" => self.parse_directive_symbol_attribute(SymbolAttr::Global),
            ".hidden" => self.parse_directive_symbol_attribute(SymbolAttr::Hidden),
            ".indirect_symbol" => {
                self.parse_directive_symbol_attribute(SymbolAttr::IndirectSymbol)
            }
            ".internal" => self.parse_directive_symbol_attribute(SymbolAttr::Internal),
            ".lazy_reference" => self.parse_directive_symbol_attribute(SymbolAttr::LazyReference),
            ".no_dead_strip" => self.parse_directive_symbol_attribute(SymbolAttr::NoDeadStrip),
            ".private_extern" => self.parse_directive_symbol_attribute(SymbolAttr::PrivateExtern),
            ".protected" => self.parse_directive_symbol_attribute(SymbolAttr::Protected),
            ".reference" => self.parse_directive_symbol_attribute(SymbolAttr::Reference),
            ".weak" => self.parse_directive_symbol_attribute(SymbolAttr::Weak),
            ".weak_definition" => {
                self.parse_directive_symbol_attribute(SymbolAttr::WeakDefinition)
            }
            ".weak_reference" => self.parse_directive_symbol_attribute(SymbolAttr::WeakReference),
            ".comm" => self.parse_directive_comm(false),
            ".lcomm" => self.parse_directive_comm(true),
            ".zerofill" => self.parse_directive_zerofill(),
            ".desc" => self.parse_directive_symbol_desc(),
            ".lsym" => self.parse_directive_lsym(),
            ".subsections_via_symbols" => self.parse_directive_subsections_via_symbols(),
            ".abort" => self.parse_directive_abort(loc),
            ".include" => self.parse_directive_include(),
            ".dump" => self.parse_directive_dump_or_load(loc, true),
            ".load" => self.parse_directive_dump_or_load(loc, false),
            _ => {
                self.diags.warning(loc, "ignoring directive for now");
                self.eat_to_end_of_statement();
                Ok(())
            }
        }
    }

    fn parse_section_switch(&mut self, name: &str) -> PResult {
        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in section switching directive");
        }
        self.lexer.lex();

        let section = self.ctx.get_or_create_section(name);
        self.current_section = Some(section);
        self.streamer.switch_section(section);
        Ok(())
    }

    /// .section identifier (',' identifier)*
    fn parse_directive_section(&mut self) -> PResult {
        if self.lexer.is_not(TokenKind::Identifier) {
            return self.tok_error("expected identifier after '.section' directive");
        }
        let mut section = self.lexer.tok().text.clone();
        self.lexer.lex();

        while self.lexer.is(TokenKind::Comma) {
            self.lexer.lex();
            if self.lexer.is_not(TokenKind::Identifier) {
                return self.tok_error("expected identifier in '.section' directive");
            }
            section.push(',');
            section.push_str(&self.lexer.tok().text);
            self.lexer.lex();
        }

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in '.section' directive");
        }
        self.lexer.lex();

        let section = self.ctx.get_or_create_section(&section);
        self.current_section = Some(section);
        self.streamer.switch_section(section);
        Ok(())
    }

    /// .set identifier ',' expression
    fn parse_directive_set(&mut self) -> PResult {
        if self.lexer.is_not(TokenKind::Identifier) {
            return self.tok_error("expected identifier after '.set' directive");
        }
        let name = self.lexer.tok().text.clone();

        if self.lexer.lex().kind != TokenKind::Comma {
            return self.tok_error("unexpected token in '.set'");
        }
        self.lexer.lex();

        self.parse_assignment(&name, true)
    }

    /// (.ascii | .asciz) [ "string" (',' "string")* ]
    fn parse_directive_ascii(&mut self, zero_terminated: bool) -> PResult {
        if self.lexer.is_not(TokenKind::EndOfStatement) {
            loop {
                if self.lexer.is_not(TokenKind::String) {
                    return self.tok_error("expected string in '.ascii' or '.asciz' directive");
                }

                let bytes = self.lexer.tok().bytes.clone();
                self.streamer.emit_bytes(&bytes);
                if zero_terminated {
                    self.streamer.emit_bytes(&[0]);
                }
                self.lexer.lex();

                if self.lexer.is(TokenKind::EndOfStatement) {
                    break;
                }
                if self.lexer.is_not(TokenKind::Comma) {
                    return self.tok_error("unexpected token in '.ascii' or '.asciz' directive");
                }
                self.lexer.lex();
            }
        }

        self.lexer.lex();
        Ok(())
    }

    /// (.byte | .short | .long | .quad) [ expression (',' expression)* ]
    fn parse_directive_value(&mut self, size: u32) -> PResult {
        if self.lexer.is_not(TokenKind::EndOfStatement) {
            loop {
                let value = self.parse_relocatable_expression()?;
                self.streamer.emit_value(value, size);

                if self.lexer.is(TokenKind::EndOfStatement) {
                    break;
                }
                if self.lexer.is_not(TokenKind::Comma) {
                    return self.tok_error("unexpected token in directive");
                }
                self.lexer.lex();
            }
        }

        self.lexer.lex();
        Ok(())
    }

    /// .space expression [ ',' expression ]
    fn parse_directive_space(&mut self) -> PResult {
        let num_bytes = self.parse_absolute_expression()?;

        let mut fill = 0;
        if self.lexer.is_not(TokenKind::EndOfStatement) {
            if self.lexer.is_not(TokenKind::Comma) {
                return self.tok_error("unexpected token in '.space' directive");
            }
            self.lexer.lex();

            fill = self.parse_absolute_expression()?;

            if self.lexer.is_not(TokenKind::EndOfStatement) {
                return self.tok_error("unexpected token in '.space' directive");
            }
        }
        self.lexer.lex();

        if num_bytes <= 0 {
            return self.tok_error("invalid number of bytes in '.space' directive");
        }

        for _ in 0..num_bytes {
            self.streamer.emit_value(McValue::absolute(fill), 1);
        }
        Ok(())
    }

    /// .fill expression ',' expression ',' expression
    fn parse_directive_fill(&mut self) -> PResult {
        let count = self.parse_absolute_expression()?;

        if self.lexer.is_not(TokenKind::Comma) {
            return self.tok_error("unexpected token in '.fill' directive");
        }
        self.lexer.lex();

        let size = self.parse_absolute_expression()?;

        if self.lexer.is_not(TokenKind::Comma) {
            return self.tok_error("unexpected token in '.fill' directive");
        }
        self.lexer.lex();

        let value = self.parse_absolute_expression()?;

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in '.fill' directive");
        }
        self.lexer.lex();

        if size != 1 && size != 2 && size != 4 {
            return self.tok_error("invalid '.fill' size, expected 1, 2, or 4");
        }
        if count < 0 {
            return self.tok_error("invalid '.fill' repeat count, can't be less than zero");
        }

        for _ in 0..count {
            self.streamer.emit_value(McValue::absolute(value), size as u32);
        }
        Ok(())
    }

    /// .org expression [ ',' expression ]
    fn parse_directive_org(&mut self) -> PResult {
        let offset = self.parse_relocatable_expression()?;

        let mut fill = 0;
        if self.lexer.is_not(TokenKind::EndOfStatement) {
            if self.lexer.is_not(TokenKind::Comma) {
                return self.tok_error("unexpected token in '.org' directive");
            }
            self.lexer.lex();

            fill = self.parse_absolute_expression()?;

            if self.lexer.is_not(TokenKind::EndOfStatement) {
                return self.tok_error("unexpected token in '.org' directive");
            }
        }
        self.lexer.lex();

        self.streamer.emit_value_to_offset(offset, fill as u8);
        Ok(())
    }

    /// (.align | .balign | .p2align | ...) expr [ ',' expr [ ',' expr ]]
    fn parse_directive_align(&mut self, is_pow2: bool, value_size: u32) -> PResult {
        let align_loc = self.lexer.loc();
        let alignment = self.parse_absolute_expression()?;

        let mut has_fill = false;
        let mut fill = 0;
        let mut max_bytes_loc = None;
        let mut max_bytes = 0;
        if self.lexer.is_not(TokenKind::EndOfStatement) {
            if self.lexer.is_not(TokenKind::Comma) {
                return self.tok_error("unexpected token in directive");
            }
            self.lexer.lex();

            // The fill expression can be omitted while still giving a
            // maximum, e.g. `.align 3,,4`.
            if self.lexer.is_not(TokenKind::Comma) {
                has_fill = true;
                fill = self.parse_absolute_expression()?;
            }

            if self.lexer.is_not(TokenKind::EndOfStatement) {
                if self.lexer.is_not(TokenKind::Comma) {
                    return self.tok_error("unexpected token in directive");
                }
                self.lexer.lex();

                max_bytes_loc = Some(self.lexer.loc());
                max_bytes = self.parse_absolute_expression()?;

                if self.lexer.is_not(TokenKind::EndOfStatement) {
                    return self.tok_error("unexpected token in directive");
                }
            }
        }
        self.lexer.lex();

        if !has_fill {
            fill = 0;
        }

        if alignment < 0 {
            return self.error(align_loc, "alignment must not be negative");
        }
        let alignment = if is_pow2 {
            if alignment >= 64 {
                return self.error(align_loc, "alignment exponent too large");
            }
            1u64 << alignment
        } else {
            alignment as u64
        };

        if let Some(loc) = max_bytes_loc {
            if max_bytes < 1 {
                self.diags.warning(
                    loc,
                    "alignment directive can never be satisfied in this many bytes, ignoring",
                );
                return Ok(());
            }
            if max_bytes as u64 >= alignment {
                self.diags.warning(
                    loc,
                    "maximum bytes expression exceeds alignment and has no effect",
                );
                max_bytes = 0;
            }
        }

        self.streamer
            .emit_value_to_alignment(alignment, fill, value_size, max_bytes as u64);
        Ok(())
    }

    /// (.globl | .weak | ...) [ identifier (',' identifier)* ]
    fn parse_directive_symbol_attribute(&mut self, attr: SymbolAttr) -> PResult {
        if self.lexer.is_not(TokenKind::EndOfStatement) {
            loop {
                if self.lexer.is_not(TokenKind::Identifier) {
                    return self.tok_error("expected identifier in directive");
                }

                let sym = self.ctx.get_or_create_symbol(&self.lexer.tok().text.clone());
                self.lexer.lex();

                // First sight of an undefined symbol marks it external.
                self.ctx.mark_external(sym);
                self.streamer.emit_symbol_attribute(sym, attr);

                if self.lexer.is(TokenKind::EndOfStatement) {
                    break;
                }
                if self.lexer.is_not(TokenKind::Comma) {
                    return self.tok_error("unexpected token in directive");
                }
                self.lexer.lex();
            }
        }

        self.lexer.lex();
        Ok(())
    }

    /// (.comm | .lcomm) identifier ',' size [ ',' pow2-alignment ]
    fn parse_directive_comm(&mut self, is_local: bool) -> PResult {
        if self.lexer.is_not(TokenKind::Identifier) {
            return self.tok_error("expected identifier in directive");
        }
        let id_loc = self.lexer.loc();
        let sym = self.ctx.get_or_create_symbol(&self.lexer.tok().text.clone());
        self.lexer.lex();

        if self.lexer.is_not(TokenKind::Comma) {
            return self.tok_error("unexpected token in directive");
        }
        self.lexer.lex();

        let size_loc = self.lexer.loc();
        let size = self.parse_absolute_expression()?;

        let mut pow2_alignment = 0;
        let mut pow2_loc = None;
        if self.lexer.is(TokenKind::Comma) {
            self.lexer.lex();
            pow2_loc = Some(self.lexer.loc());
            pow2_alignment = self.parse_absolute_expression()?;
        }

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in '.comm' or '.lcomm' directive");
        }
        self.lexer.lex();

        if size < 0 {
            return self.error(
                size_loc,
                "invalid '.comm' or '.lcomm' directive size, can't be less than zero",
            );
        }
        if pow2_alignment < 0 {
            return self.error(
                pow2_loc.unwrap(),
                "invalid '.comm' or '.lcomm' directive alignment, can't be less than zero",
            );
        }
        let symbol = self.ctx.symbol(sym);
        if symbol.is_defined() || symbol.is_assigned() {
            return self.error(id_loc, "invalid symbol redefinition");
        }

        self.streamer
            .emit_common_symbol(sym, size as u64, pow2_alignment as u32, is_local);
        Ok(())
    }

    /// .zerofill segname ',' sectname [',' identifier ',' size [',' align]]
    fn parse_directive_zerofill(&mut self) -> PResult {
        if self.lexer.is_not(TokenKind::Identifier) {
            return self.tok_error("expected segment name after '.zerofill' directive");
        }
        let mut section = self.lexer.tok().text.clone();
        self.lexer.lex();

        if self.lexer.is_not(TokenKind::Comma) {
            return self.tok_error("unexpected token in directive");
        }
        section.push(',');
        self.lexer.lex();

        if self.lexer.is_not(TokenKind::Identifier) {
            return self.tok_error("expected section name after comma in '.zerofill' directive");
        }
        section.push_str(&self.lexer.tok().text);
        self.lexer.lex();

        // Section-only form: create the zerofill section with no symbol.
        if self.lexer.is(TokenKind::EndOfStatement) {
            self.lexer.lex();
            let section = self.ctx.get_or_create_section(&section);
            self.streamer.emit_zerofill(section, None, 0, 0);
            return Ok(());
        }

        if self.lexer.is_not(TokenKind::Comma) {
            return self.tok_error("unexpected token in directive");
        }
        self.lexer.lex();

        if self.lexer.is_not(TokenKind::Identifier) {
            return self.tok_error("expected identifier in directive");
        }
        let id_loc = self.lexer.loc();
        let sym = self.ctx.get_or_create_symbol(&self.lexer.tok().text.clone());
        self.lexer.lex();

        if self.lexer.is_not(TokenKind::Comma) {
            return self.tok_error("unexpected token in directive");
        }
        self.lexer.lex();

        let size_loc = self.lexer.loc();
        let size = self.parse_absolute_expression()?;

        let mut pow2_alignment = 0;
        let mut pow2_loc = None;
        if self.lexer.is(TokenKind::Comma) {
            self.lexer.lex();
            pow2_loc = Some(self.lexer.loc());
            pow2_alignment = self.parse_absolute_expression()?;
        }

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in '.zerofill' directive");
        }
        self.lexer.lex();

        if size < 0 {
            return self.error(
                size_loc,
                "invalid '.zerofill' directive size, can't be less than zero",
            );
        }
        if pow2_alignment < 0 {
            return self.error(
                pow2_loc.unwrap(),
                "invalid '.zerofill' directive alignment, can't be less than zero",
            );
        }
        let symbol = self.ctx.symbol(sym);
        if symbol.is_defined() || symbol.is_assigned() {
            return self.error(id_loc, "invalid symbol redefinition");
        }

        let section = self.ctx.get_or_create_section(&section);
        self.streamer
            .emit_zerofill(section, Some(sym), size as u64, pow2_alignment as u32);
        Ok(())
    }

    /// .desc identifier ',' expression
    fn parse_directive_symbol_desc(&mut self) -> PResult {
        if self.lexer.is_not(TokenKind::Identifier) {
            return self.tok_error("expected identifier in directive");
        }
        let sym = self.ctx.get_or_create_symbol(&self.lexer.tok().text.clone());
        self.lexer.lex();

        if self.lexer.is_not(TokenKind::Comma) {
            return self.tok_error("unexpected token in '.desc' directive");
        }
        self.lexer.lex();

        let desc_value = self.parse_absolute_expression()?;

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in '.desc' directive");
        }
        self.lexer.lex();

        self.streamer.emit_symbol_desc(sym, desc_value);
        Ok(())
    }

    /// .lsym identifier ',' expression
    fn parse_directive_lsym(&mut self) -> PResult {
        if self.lexer.is_not(TokenKind::Identifier) {
            return self.tok_error("expected identifier in directive");
        }
        let sym = self.ctx.get_or_create_symbol(&self.lexer.tok().text.clone());
        self.lexer.lex();

        if self.lexer.is_not(TokenKind::Comma) {
            return self.tok_error("unexpected token in '.lsym' directive");
        }
        self.lexer.lex();

        let value = self.parse_relocatable_expression()?;

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in '.lsym' directive");
        }
        self.lexer.lex();

        self.streamer.emit_local_symbol(sym, value);
        Ok(())
    }

    /// .subsections_via_symbols
    fn parse_directive_subsections_via_symbols(&mut self) -> PResult {
        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in '.subsections_via_symbols' directive");
        }
        self.lexer.lex();

        self.streamer
            .emit_assembler_flag(AssemblerFlag::SubsectionsViaSymbols);
        Ok(())
    }

    /// .abort [ "abort_string" ]
    fn parse_directive_abort(&mut self, loc: SourceLoc) -> PResult {
        let mut message = String::new();
        if self.lexer.is_not(TokenKind::EndOfStatement) {
            if self.lexer.is_not(TokenKind::String) {
                return self.tok_error("expected string in '.abort' directive");
            }
            message = self.lexer.tok().text.clone();
            self.lexer.lex();
        }

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in '.abort' directive");
        }
        self.lexer.lex();

        if message.is_empty() {
            self.diags.error(loc, ".abort detected. Assembly stopping.");
        } else {
            self.diags
                .error(loc, format!(".abort '{message}' detected. Assembly stopping."));
        }
        Ok(())
    }

    /// .include "filename"
    fn parse_directive_include(&mut self) -> PResult {
        if self.lexer.is_not(TokenKind::String) {
            return self.tok_error("expected string in '.include' directive");
        }
        let include_loc = self.lexer.loc();
        let filename = self.lexer.tok().text.clone();
        self.lexer.lex();

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in '.include' directive");
        }

        // Switch buffers before consuming the statement end so it is not
        // lost across the switch; the loop consumes it next.
        if !self.lexer.enter_include(&filename) {
            return self.error(
                include_loc,
                format!("could not find include file '{filename}'"),
            );
        }
        Ok(())
    }

    /// (.dump | .load) "filename"
    fn parse_directive_dump_or_load(&mut self, loc: SourceLoc, is_dump: bool) -> PResult {
        if self.lexer.is_not(TokenKind::String) {
            return self.tok_error("expected string in '.dump' or '.load' directive");
        }
        self.lexer.lex();

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in '.dump' or '.load' directive");
        }
        self.lexer.lex();

        if is_dump {
            self.diags.warning(loc, "ignoring directive .dump for now");
        } else {
            self.diags.warning(loc, "ignoring directive .load for now");
        }
        Ok(())
    }

    fn parse_instruction_statement(&mut self, mnemonic: &str, loc: SourceLoc) -> PResult {
        let inst = self
            .target
            .parse_instruction(mnemonic, &mut self.lexer, self.ctx)
            .map_err(|message| ParseError { loc, message })?;

        if self.lexer.is_not(TokenKind::EndOfStatement) {
            return self.tok_error("unexpected token in argument list");
        }
        self.lexer.lex();

        self.streamer.emit_instruction(inst);
        Ok(())
    }

    /// primaryexpr ::= '(' expr ')' | symbol | number | unary primaryexpr
    fn parse_primary_expr(&mut self) -> PResult<AsmExpr> {
        match self.lexer.kind() {
            TokenKind::Exclaim => {
                self.lexer.lex();
                let child = self.parse_primary_expr()?;
                Ok(AsmExpr::Unary(UnaryOp::LNot, Box::new(child)))
            }
            TokenKind::Minus => {
                self.lexer.lex();
                let child = self.parse_primary_expr()?;
                Ok(AsmExpr::Unary(UnaryOp::Minus, Box::new(child)))
            }
            TokenKind::Plus => {
                self.lexer.lex();
                let child = self.parse_primary_expr()?;
                Ok(AsmExpr::Unary(UnaryOp::Plus, Box::new(child)))
            }
            TokenKind::Tilde => {
                self.lexer.lex();
                let child = self.parse_primary_expr()?;
                Ok(AsmExpr::Unary(UnaryOp::Not, Box::new(child)))
            }
            TokenKind::Identifier => {
                let name = self.lexer.tok().text.clone();
                let sym = self.ctx.get_or_create_symbol(&name);
                // Use of a symbol with no definition marks it external.
                self.ctx.mark_external(sym);
                self.lexer.lex();
                Ok(AsmExpr::SymbolRef(sym))
            }
            TokenKind::Integer => {
                let value = self.lexer.tok().int_value;
                self.lexer.lex();
                Ok(AsmExpr::Constant(value))
            }
            TokenKind::LParen => {
                self.lexer.lex();
                self.parse_paren_expr()
            }
            _ => self.tok_error("unknown token in expression"),
        }
    }

    /// parenexpr ::= expr ')' with the '(' already consumed.
    fn parse_paren_expr(&mut self) -> PResult<AsmExpr> {
        let expr = self.parse_expression()?;
        if self.lexer.is_not(TokenKind::RParen) {
            return self.tok_error("expected ')' in parentheses expression");
        }
        self.lexer.lex();
        Ok(expr)
    }

    fn parse_expression(&mut self) -> PResult<AsmExpr> {
        let lhs = self.parse_primary_expr()?;
        self.parse_bin_op_rhs(1, lhs)
    }

    /// Precedence climbing over every operator binding at least as tight
    /// as `min_prec`. `lhs` is the already-parsed left side.
    fn parse_bin_op_rhs(&mut self, min_prec: u8, mut lhs: AsmExpr) -> PResult<AsmExpr> {
        loop {
            let Some((op, prec)) = bin_op_precedence(self.lexer.kind()) else {
                return Ok(lhs);
            };
            if prec < min_prec {
                return Ok(lhs);
            }
            self.lexer.lex();

            let mut rhs = self.parse_primary_expr()?;

            // If the next operator binds tighter, it takes the rhs first.
            if let Some((_, next_prec)) = bin_op_precedence(self.lexer.kind()) {
                if prec < next_prec {
                    rhs = self.parse_bin_op_rhs(prec + 1, rhs)?;
                }
            }

            lhs = AsmExpr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_absolute_expression(&mut self) -> PResult<i64> {
        let start = self.lexer.loc();
        let expr = self.parse_expression()?;
        match expr.evaluate_absolute(self.ctx) {
            Some(value) => Ok(value),
            None => self.error(start, "expected absolute expression"),
        }
    }

    fn parse_relocatable_expression(&mut self) -> PResult<McValue> {
        let start = self.lexer.loc();
        let expr = self.parse_expression()?;
        match expr.evaluate_relocatable(self.ctx) {
            Some(value) => Ok(value),
            None => self.error(start, "expected relocatable expression"),
        }
    }
}
