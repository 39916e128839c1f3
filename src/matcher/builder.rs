//! Append-style builder for matcher bytecode.
//!
//! This is the in-process half of the emitter contract: the offline table
//! generator produces the same byte shape, and tests use this builder to
//! assemble small programs. Integer-carrying operations pick their size
//! class from the value; `scope` buffers its body to learn the failure
//! offset before writing the `Push`.

use crate::ir::{OpTag, ValueType};

use super::table::{MatcherTable, Opcode, TableError, OPFL_VARIADIC_SHIFT};

/// Smallest byte width (1, 2, 4 or 8) that holds `value` sign-extended.
pub fn classify_int(value: i64) -> usize {
    if value == (value as i8) as i64 {
        1
    } else if value == (value as i16) as i64 {
        2
    } else if value == (value as i32) as i64 {
        4
    } else {
        8
    }
}

#[derive(Debug, Default)]
pub struct TableBuilder {
    bytes: Vec<u8>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.bytes.push(opcode as u8);
        self
    }

    fn int(&mut self, value: i64, width: usize) {
        for i in 0..width {
            self.bytes.push((value >> (8 * i)) as u8);
        }
    }

    /// Pick the size-class variant for `value` and emit the opcode plus
    /// its little-endian immediate.
    fn sized_int_op(&mut self, variants: [Opcode; 4], value: i64) -> &mut Self {
        let width = classify_int(value);
        let opcode = variants[width.trailing_zeros() as usize];
        self.op(opcode);
        self.int(value, width);
        self
    }

    /// Open a choice point. The body becomes the scope's success path; on
    /// failure the interpreter resumes right after it. Bodies are limited
    /// to 255 bytes, like the offline emitter.
    pub fn scope(
        &mut self,
        body: impl FnOnce(&mut TableBuilder),
    ) -> Result<&mut Self, TableError> {
        let mut inner = TableBuilder::new();
        body(&mut inner);
        if inner.bytes.len() > 255 {
            return Err(TableError::ScopeTooLarge {
                size: inner.bytes.len(),
            });
        }
        self.op(Opcode::Push);
        self.bytes.push(inner.bytes.len() as u8);
        self.bytes.extend_from_slice(&inner.bytes);
        Ok(self)
    }

    pub fn record_node(&mut self) -> &mut Self {
        self.op(Opcode::RecordNode)
    }

    pub fn record_memref(&mut self) -> &mut Self {
        self.op(Opcode::RecordMemRef)
    }

    pub fn capture_flag_input(&mut self) -> &mut Self {
        self.op(Opcode::CaptureFlagInput)
    }

    pub fn move_child(&mut self, idx: u8) -> &mut Self {
        self.op(Opcode::MoveChild);
        self.bytes.push(idx);
        self
    }

    pub fn move_parent(&mut self) -> &mut Self {
        self.op(Opcode::MoveParent)
    }

    pub fn check_same(&mut self, slot: u8) -> &mut Self {
        self.op(Opcode::CheckSame);
        self.bytes.push(slot);
        self
    }

    pub fn check_pattern_predicate(&mut self, pred: u8) -> &mut Self {
        self.op(Opcode::CheckPatternPredicate);
        self.bytes.push(pred);
        self
    }

    pub fn check_predicate(&mut self, pred: u8) -> &mut Self {
        self.op(Opcode::CheckPredicate);
        self.bytes.push(pred);
        self
    }

    /// Check the cursor's opcode tag. Only tags that fit the one-byte
    /// operand can be checked.
    pub fn check_opcode(&mut self, tag: OpTag) -> &mut Self {
        debug_assert!(tag.0 <= 0xFF, "checkable opcode tags must fit one byte");
        self.op(Opcode::CheckOpcode);
        self.bytes.push(tag.0 as u8);
        self
    }

    pub fn check_type(&mut self, vt: ValueType) -> &mut Self {
        self.op(Opcode::CheckType);
        self.bytes.push(vt.0);
        self
    }

    pub fn check_integer(&mut self, value: i64) -> &mut Self {
        use Opcode::*;
        self.sized_int_op([CheckInteger1, CheckInteger2, CheckInteger4, CheckInteger8], value)
    }

    pub fn check_cond_code(&mut self, cc: u8) -> &mut Self {
        self.op(Opcode::CheckCondCode);
        self.bytes.push(cc);
        self
    }

    pub fn check_value_type(&mut self, vt: ValueType) -> &mut Self {
        self.op(Opcode::CheckValueType);
        self.bytes.push(vt.0);
        self
    }

    pub fn check_complex_pattern(&mut self, pattern: u8) -> &mut Self {
        self.op(Opcode::CheckComplexPat);
        self.bytes.push(pattern);
        self
    }

    pub fn check_and_imm(&mut self, value: i64) -> &mut Self {
        use Opcode::*;
        self.sized_int_op([CheckAndImm1, CheckAndImm2, CheckAndImm4, CheckAndImm8], value)
    }

    pub fn check_or_imm(&mut self, value: i64) -> &mut Self {
        use Opcode::*;
        self.sized_int_op([CheckOrImm1, CheckOrImm2, CheckOrImm4, CheckOrImm8], value)
    }

    pub fn check_foldable_chain_node(&mut self) -> &mut Self {
        self.op(Opcode::CheckFoldableChainNode)
    }

    pub fn check_chain_compatible(&mut self, prev_slot: u8) -> &mut Self {
        self.op(Opcode::CheckChainCompatible);
        self.bytes.push(prev_slot);
        self
    }

    pub fn emit_integer(&mut self, vt: ValueType, value: i64) -> &mut Self {
        use Opcode::*;
        let width = classify_int(value);
        let opcode =
            [EmitInteger1, EmitInteger2, EmitInteger4, EmitInteger8][width.trailing_zeros() as usize];
        self.op(opcode);
        self.bytes.push(vt.0);
        self.int(value, width);
        self
    }

    pub fn emit_register(&mut self, vt: ValueType, reg: u8) -> &mut Self {
        self.op(Opcode::EmitRegister);
        self.bytes.push(vt.0);
        self.bytes.push(reg);
        self
    }

    pub fn emit_convert_to_target(&mut self, slot: u8) -> &mut Self {
        self.op(Opcode::EmitConvertToTarget);
        self.bytes.push(slot);
        self
    }

    pub fn emit_merge_input_chains(&mut self, slots: &[u8]) -> &mut Self {
        self.op(Opcode::EmitMergeInputChains);
        self.bytes.push(slots.len() as u8);
        self.bytes.extend_from_slice(slots);
        self
    }

    pub fn emit_copy_to_reg(&mut self, src_slot: u8, reg: u8) -> &mut Self {
        self.op(Opcode::EmitCopyToReg);
        self.bytes.push(src_slot);
        self.bytes.push(reg);
        self
    }

    pub fn emit_node_xform(&mut self, xform: u8, slot: u8) -> &mut Self {
        self.op(Opcode::EmitNodeXForm);
        self.bytes.push(xform);
        self.bytes.push(slot);
        self
    }

    pub fn emit_node(
        &mut self,
        opcode: u16,
        flags: u8,
        vts: &[ValueType],
        op_slots: &[u8],
    ) -> &mut Self {
        self.op(Opcode::EmitNode);
        self.bytes.push((opcode & 0xFF) as u8);
        self.bytes.push((opcode >> 8) as u8);
        self.bytes.push(flags);
        self.bytes.push(vts.len() as u8);
        for vt in vts {
            self.bytes.push(vt.0);
        }
        self.bytes.push(op_slots.len() as u8);
        self.bytes.extend_from_slice(op_slots);
        self
    }

    /// Variadic flags helper: `CHAIN`-style bits or'ed with the encoded
    /// fixed arity.
    pub fn variadic_flags(base: u8, fixed_arity: u8) -> u8 {
        base | ((fixed_arity + 1) << OPFL_VARIADIC_SHIFT)
    }

    /// Pattern markers carry no bytes; the offline emitter prints them as
    /// comments. Logged for parity when tracing table construction.
    pub fn pattern_marker(&mut self, comment: &str) -> &mut Self {
        log::debug!("pattern: {comment}");
        self
    }

    /// Terminate the top-level list and validate the finished program.
    pub fn finish(mut self) -> Result<MatcherTable, TableError> {
        self.bytes.push(0);
        MatcherTable::new(self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_int_matches_sign_extension() {
        assert_eq!(classify_int(0), 1);
        assert_eq!(classify_int(127), 1);
        assert_eq!(classify_int(-128), 1);
        assert_eq!(classify_int(128), 2);
        assert_eq!(classify_int(-32768), 2);
        assert_eq!(classify_int(32768), 4);
        assert_eq!(classify_int(i64::from(i32::MIN)), 4);
        assert_eq!(classify_int(i64::from(i32::MAX) + 1), 8);
        assert_eq!(classify_int(i64::MIN), 8);
    }

    #[test]
    fn check_integer_picks_size_class() {
        let mut b = TableBuilder::new();
        b.check_integer(5);
        b.check_integer(300);
        let table = b.finish().unwrap();
        assert_eq!(
            table.bytes(),
            &[
                Opcode::CheckInteger1 as u8,
                5,
                Opcode::CheckInteger2 as u8,
                0x2C,
                0x01,
                0,
            ]
        );
    }

    #[test]
    fn scope_encodes_body_size() {
        let mut b = TableBuilder::new();
        b.scope(|b| {
            b.record_node();
        })
        .unwrap();
        b.move_parent();
        let table = b.finish().unwrap();
        assert_eq!(
            table.bytes(),
            &[
                Opcode::Push as u8,
                1,
                Opcode::RecordNode as u8,
                Opcode::MoveParent as u8,
                0,
            ]
        );
    }

    #[test]
    fn oversized_scope_is_rejected() {
        let mut b = TableBuilder::new();
        let err = b
            .scope(|b| {
                for _ in 0..256 {
                    b.record_node();
                }
            })
            .unwrap_err();
        assert!(matches!(err, TableError::ScopeTooLarge { size: 256 }));
    }

    #[test]
    fn emit_node_serializes_two_byte_opcode() {
        let mut b = TableBuilder::new();
        b.emit_node(0x1234, 0, &[ValueType(3)], &[0, 1]);
        let table = b.finish().unwrap();
        assert_eq!(
            table.bytes(),
            &[Opcode::EmitNode as u8, 0x34, 0x12, 0, 1, 3, 2, 0, 1, 0]
        );
    }

    #[test]
    fn variadic_flags_round_trip() {
        use super::super::table::{variadic_fixed_arity, OPFL_CHAIN};
        let flags = TableBuilder::variadic_flags(OPFL_CHAIN, 2);
        assert_eq!(flags & OPFL_CHAIN, OPFL_CHAIN);
        assert_eq!(variadic_fixed_arity(flags), Some(2));
        assert_eq!(variadic_fixed_arity(OPFL_CHAIN), None);
    }
}
