//! Parsed machine instructions.

use super::value::McValue;

/// Operand of a parsed instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum McOperand {
    /// Register name as written, including any sigil.
    Register(String),
    Immediate(i64),
    /// Symbolic or folded expression operand.
    Value(McValue),
}

/// An instruction as produced by the target parser and handed to the
/// streamer. The core never interprets it.
#[derive(Debug, Clone, PartialEq)]
pub struct McInst {
    pub mnemonic: String,
    pub operands: Vec<McOperand>,
}

impl McInst {
    pub fn new(mnemonic: impl Into<String>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            operands: Vec::new(),
        }
    }

    pub fn with_operands(mnemonic: impl Into<String>, operands: Vec<McOperand>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            operands,
        }
    }
}
