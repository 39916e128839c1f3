// This module is the one outward-facing seam of the assembly parser: every semantic
// event the parser understands becomes exactly one streamer call, in source order.
// Concrete implementations write an object file, print a listing, or accumulate the
// events for inspection; the parser neither knows nor cares. RecordingStreamer is the
// accumulating implementation used by the test suites, LogStreamer forwards events to
// the log facade for tracing a parse.

//! The streamer contract driven by the assembly parser.

use super::inst::McInst;
use super::section::SectionId;
use super::symbol::SymbolId;
use super::value::McValue;

/// Symbol attributes settable from directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolAttr {
    Global,
    Hidden,
    IndirectSymbol,
    Internal,
    LazyReference,
    NoDeadStrip,
    PrivateExtern,
    Protected,
    Reference,
    Weak,
    WeakDefinition,
    WeakReference,
}

/// Whole-unit assembler flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerFlag {
    SubsectionsViaSymbols,
}

/// Abstract sink for the parser's semantic events.
///
/// Emissions arrive strictly in source order; implementations may rely on
/// that. `emit_label` is only called for symbols that were undefined at
/// the point of the label.
pub trait Streamer {
    fn switch_section(&mut self, section: SectionId);
    fn emit_label(&mut self, sym: SymbolId);
    fn emit_assignment(&mut self, sym: SymbolId, value: McValue, is_dot_set: bool);
    fn emit_symbol_attribute(&mut self, sym: SymbolId, attr: SymbolAttr);
    fn emit_symbol_desc(&mut self, sym: SymbolId, desc: i64);
    fn emit_common_symbol(&mut self, sym: SymbolId, size: u64, pow2_align: u32, is_local: bool);
    fn emit_zerofill(
        &mut self,
        section: SectionId,
        sym: Option<SymbolId>,
        size: u64,
        pow2_align: u32,
    );
    fn emit_local_symbol(&mut self, sym: SymbolId, value: McValue);
    fn emit_bytes(&mut self, bytes: &[u8]);
    fn emit_value(&mut self, value: McValue, size: u32);
    fn emit_value_to_alignment(&mut self, align: u64, fill: i64, value_size: u32, max_bytes: u64);
    fn emit_value_to_offset(&mut self, offset: McValue, fill: u8);
    fn emit_instruction(&mut self, inst: McInst);
    fn emit_assembler_flag(&mut self, flag: AssemblerFlag);
}

/// One recorded streamer call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamerEvent {
    SwitchSection(SectionId),
    Label(SymbolId),
    Assignment {
        sym: SymbolId,
        value: McValue,
        is_dot_set: bool,
    },
    SymbolAttribute(SymbolId, SymbolAttr),
    SymbolDesc(SymbolId, i64),
    CommonSymbol {
        sym: SymbolId,
        size: u64,
        pow2_align: u32,
        is_local: bool,
    },
    Zerofill {
        section: SectionId,
        sym: Option<SymbolId>,
        size: u64,
        pow2_align: u32,
    },
    LocalSymbol(SymbolId, McValue),
    Bytes(Vec<u8>),
    Value {
        value: McValue,
        size: u32,
    },
    ValueToAlignment {
        align: u64,
        fill: i64,
        value_size: u32,
        max_bytes: u64,
    },
    ValueToOffset {
        offset: McValue,
        fill: u8,
    },
    Instruction(McInst),
    AssemblerFlag(AssemblerFlag),
}

/// Streamer that accumulates every call for later inspection.
#[derive(Debug, Default)]
pub struct RecordingStreamer {
    pub events: Vec<StreamerEvent>,
}

impl RecordingStreamer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Streamer for RecordingStreamer {
    fn switch_section(&mut self, section: SectionId) {
        self.events.push(StreamerEvent::SwitchSection(section));
    }

    fn emit_label(&mut self, sym: SymbolId) {
        self.events.push(StreamerEvent::Label(sym));
    }

    fn emit_assignment(&mut self, sym: SymbolId, value: McValue, is_dot_set: bool) {
        self.events.push(StreamerEvent::Assignment {
            sym,
            value,
            is_dot_set,
        });
    }

    fn emit_symbol_attribute(&mut self, sym: SymbolId, attr: SymbolAttr) {
        self.events.push(StreamerEvent::SymbolAttribute(sym, attr));
    }

    fn emit_symbol_desc(&mut self, sym: SymbolId, desc: i64) {
        self.events.push(StreamerEvent::SymbolDesc(sym, desc));
    }

    fn emit_common_symbol(&mut self, sym: SymbolId, size: u64, pow2_align: u32, is_local: bool) {
        self.events.push(StreamerEvent::CommonSymbol {
            sym,
            size,
            pow2_align,
            is_local,
        });
    }

    fn emit_zerofill(
        &mut self,
        section: SectionId,
        sym: Option<SymbolId>,
        size: u64,
        pow2_align: u32,
    ) {
        self.events.push(StreamerEvent::Zerofill {
            section,
            sym,
            size,
            pow2_align,
        });
    }

    fn emit_local_symbol(&mut self, sym: SymbolId, value: McValue) {
        self.events.push(StreamerEvent::LocalSymbol(sym, value));
    }

    fn emit_bytes(&mut self, bytes: &[u8]) {
        self.events.push(StreamerEvent::Bytes(bytes.to_vec()));
    }

    fn emit_value(&mut self, value: McValue, size: u32) {
        self.events.push(StreamerEvent::Value { value, size });
    }

    fn emit_value_to_alignment(&mut self, align: u64, fill: i64, value_size: u32, max_bytes: u64) {
        self.events.push(StreamerEvent::ValueToAlignment {
            align,
            fill,
            value_size,
            max_bytes,
        });
    }

    fn emit_value_to_offset(&mut self, offset: McValue, fill: u8) {
        self.events.push(StreamerEvent::ValueToOffset { offset, fill });
    }

    fn emit_instruction(&mut self, inst: McInst) {
        self.events.push(StreamerEvent::Instruction(inst));
    }

    fn emit_assembler_flag(&mut self, flag: AssemblerFlag) {
        self.events.push(StreamerEvent::AssemblerFlag(flag));
    }
}

/// Streamer that traces every event through `log::debug!`.
#[derive(Debug, Default)]
pub struct LogStreamer;

impl Streamer for LogStreamer {
    fn switch_section(&mut self, section: SectionId) {
        log::debug!("streamer: switch_section {section:?}");
    }

    fn emit_label(&mut self, sym: SymbolId) {
        log::debug!("streamer: label {sym:?}");
    }

    fn emit_assignment(&mut self, sym: SymbolId, value: McValue, is_dot_set: bool) {
        log::debug!("streamer: assignment {sym:?} = {value} (dot_set: {is_dot_set})");
    }

    fn emit_symbol_attribute(&mut self, sym: SymbolId, attr: SymbolAttr) {
        log::debug!("streamer: attribute {sym:?} {attr:?}");
    }

    fn emit_symbol_desc(&mut self, sym: SymbolId, desc: i64) {
        log::debug!("streamer: desc {sym:?} {desc}");
    }

    fn emit_common_symbol(&mut self, sym: SymbolId, size: u64, pow2_align: u32, is_local: bool) {
        log::debug!("streamer: common {sym:?} size {size} align 2^{pow2_align} local {is_local}");
    }

    fn emit_zerofill(
        &mut self,
        section: SectionId,
        sym: Option<SymbolId>,
        size: u64,
        pow2_align: u32,
    ) {
        log::debug!("streamer: zerofill {section:?} {sym:?} size {size} align 2^{pow2_align}");
    }

    fn emit_local_symbol(&mut self, sym: SymbolId, value: McValue) {
        log::debug!("streamer: lsym {sym:?} = {value}");
    }

    fn emit_bytes(&mut self, bytes: &[u8]) {
        log::debug!("streamer: {} byte(s)", bytes.len());
    }

    fn emit_value(&mut self, value: McValue, size: u32) {
        log::debug!("streamer: value {value} size {size}");
    }

    fn emit_value_to_alignment(&mut self, align: u64, fill: i64, value_size: u32, max_bytes: u64) {
        log::debug!(
            "streamer: align {align} fill {fill:#x} value_size {value_size} max {max_bytes}"
        );
    }

    fn emit_value_to_offset(&mut self, offset: McValue, fill: u8) {
        log::debug!("streamer: org {offset} fill {fill:#x}");
    }

    fn emit_instruction(&mut self, inst: McInst) {
        log::debug!("streamer: inst {}", inst.mnemonic);
    }

    fn emit_assembler_flag(&mut self, flag: AssemblerFlag) {
        log::debug!("streamer: flag {flag:?}");
    }
}
