// This module executes a validated matcher table against one IR root node. The
// interpreter keeps a position cursor into the DAG, a recorded-values vector that
// later operations address by slot index, and a scope stack of choice points; a
// failed check pops the innermost scope, restores the cursor, the recorded length,
// and the child path, and resumes at the scope's failure offset. Emit operations
// materialize nodes into the arena; EmitNode builds the replacement machine node,
// redirects the root's users to it, and ends the match. Pattern failure is the
// normal control flow here, not an error; only exhausting every scope without a
// successful emit reports NoPatternMatched to the caller.

//! Bytecode interpreter for instruction selection.

use thiserror::Error;

use crate::ir::{Node, NodeArena, NodeId, NodePayload, OpTag, ValueType};

use super::table::{
    variadic_fixed_arity, MatcherTable, Opcode, OPFL_CHAIN, OPFL_FLAG, OPFL_MEMREFS,
};

/// Host-supplied hooks the table addresses by small integer. The index
/// spaces are whatever the table producer and the host agreed on; the
/// interpreter treats them as opaque.
pub trait MatcherHost {
    /// Predicate over global state (subtarget features and the like).
    fn check_pattern_predicate(&self, pred: u8) -> bool;

    /// Predicate over a single node.
    fn check_node_predicate(&self, arena: &NodeArena, node: NodeId, pred: u8) -> bool;

    /// Table-external matcher that may recognize an arbitrary subgraph and
    /// push its outputs into `out`.
    fn check_complex_pattern(
        &self,
        arena: &mut NodeArena,
        root: NodeId,
        node: NodeId,
        pattern: u8,
        out: &mut Vec<NodeId>,
    ) -> bool;

    /// Transform a recorded value into a new one (e.g. adjust an immediate).
    fn run_node_xform(&self, arena: &mut NodeArena, value: NodeId, xform: u8) -> NodeId;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("no pattern matched root node {root}")]
    NoPatternMatched { root: NodeId },
}

/// One choice point. Restoring a frame must bring every piece of match
/// state back to its value at the `Push`.
struct Scope {
    failure_pc: usize,
    cursor: NodeId,
    recorded_len: usize,
    children_len: usize,
    memrefs_len: usize,
    chain_inputs_len: usize,
    flag_input: Option<NodeId>,
}

/// Instruction selector driving one matcher table.
pub struct Matcher<'t> {
    table: &'t MatcherTable,
}

impl<'t> Matcher<'t> {
    pub fn new(table: &'t MatcherTable) -> Self {
        Self { table }
    }

    /// Run the table against `root`. On success the replacement node has
    /// taken over the root's uses and its id is returned.
    pub fn select(
        &self,
        arena: &mut NodeArena,
        root: NodeId,
        host: &mut dyn MatcherHost,
    ) -> Result<NodeId, MatchError> {
        let table = self.table;
        let mut pc: usize = 0;
        let mut cursor = root;
        let mut children: Vec<NodeId> = Vec::new();
        let mut recorded: Vec<NodeId> = Vec::new();
        let mut memrefs: Vec<u32> = Vec::new();
        let mut chain_inputs: Vec<NodeId> = Vec::new();
        let mut flag_input: Option<NodeId> = None;
        let mut scopes: Vec<Scope> = Vec::new();

        macro_rules! fail {
            () => {
                match scopes.pop() {
                    Some(scope) => {
                        log::debug!(
                            "matcher: fail at pc {pc}, unwinding to {}",
                            scope.failure_pc
                        );
                        pc = scope.failure_pc;
                        cursor = scope.cursor;
                        children.truncate(scope.children_len);
                        recorded.truncate(scope.recorded_len);
                        memrefs.truncate(scope.memrefs_len);
                        chain_inputs.truncate(scope.chain_inputs_len);
                        flag_input = scope.flag_input;
                        continue;
                    }
                    None => return Err(MatchError::NoPatternMatched { root }),
                }
            };
        }

        loop {
            if table.u8_at(pc) == 0 {
                // Fell off the end of the pattern list without an emit.
                fail!();
            }
            let opcode = Opcode::from_u8(table.u8_at(pc)).expect("validated table");
            pc += 1;
            log::trace!("matcher: pc {} {:?} cursor {}", pc - 1, opcode, cursor);

            match opcode {
                Opcode::Push => {
                    let offset = table.u8_at(pc) as usize;
                    pc += 1;
                    scopes.push(Scope {
                        failure_pc: pc + offset,
                        cursor,
                        recorded_len: recorded.len(),
                        children_len: children.len(),
                        memrefs_len: memrefs.len(),
                        chain_inputs_len: chain_inputs.len(),
                        flag_input,
                    });
                }
                Opcode::RecordNode => recorded.push(cursor),
                Opcode::RecordMemRef => {
                    memrefs.extend_from_slice(&arena.node(cursor).memrefs);
                }
                Opcode::CaptureFlagInput => {
                    flag_input = arena.node(cursor).flag_input;
                }
                Opcode::MoveChild => {
                    let idx = table.u8_at(pc) as usize;
                    pc += 1;
                    match arena.operand(cursor, idx) {
                        Some(child) => {
                            children.push(cursor);
                            cursor = child;
                        }
                        None => fail!(),
                    }
                }
                Opcode::MoveParent => {
                    cursor = children
                        .pop()
                        .expect("MoveParent without a matching MoveChild");
                }
                Opcode::CheckSame => {
                    let slot = table.u8_at(pc) as usize;
                    pc += 1;
                    if recorded.get(slot) != Some(&cursor) {
                        fail!();
                    }
                }
                Opcode::CheckPatternPredicate => {
                    let pred = table.u8_at(pc);
                    pc += 1;
                    if !host.check_pattern_predicate(pred) {
                        fail!();
                    }
                }
                Opcode::CheckPredicate => {
                    let pred = table.u8_at(pc);
                    pc += 1;
                    if !host.check_node_predicate(arena, cursor, pred) {
                        fail!();
                    }
                }
                Opcode::CheckOpcode => {
                    let tag = OpTag(table.u8_at(pc) as u16);
                    pc += 1;
                    if arena.node(cursor).opcode != tag {
                        fail!();
                    }
                }
                Opcode::CheckType => {
                    let vt = ValueType(table.u8_at(pc));
                    pc += 1;
                    if arena.node(cursor).value_type() != Some(vt) {
                        fail!();
                    }
                }
                Opcode::CheckInteger1
                | Opcode::CheckInteger2
                | Opcode::CheckInteger4
                | Opcode::CheckInteger8 => {
                    let width = opcode.immediate_width().unwrap();
                    let imm = table.int_at(pc, width);
                    pc += width;
                    let node = arena.node(cursor);
                    if node.opcode != OpTag::CONSTANT || node.constant_value() != Some(imm) {
                        fail!();
                    }
                }
                Opcode::CheckCondCode => {
                    let cc = table.u8_at(pc);
                    pc += 1;
                    if arena.node(cursor).payload != NodePayload::CondCode(cc) {
                        fail!();
                    }
                }
                Opcode::CheckValueType => {
                    let vt = table.u8_at(pc);
                    pc += 1;
                    if arena.node(cursor).payload != NodePayload::ValueTypeRef(vt) {
                        fail!();
                    }
                }
                Opcode::CheckComplexPat => {
                    let pattern = table.u8_at(pc);
                    pc += 1;
                    if !host.check_complex_pattern(arena, root, cursor, pattern, &mut recorded)
                    {
                        fail!();
                    }
                }
                Opcode::CheckAndImm1
                | Opcode::CheckAndImm2
                | Opcode::CheckAndImm4
                | Opcode::CheckAndImm8 => {
                    let width = opcode.immediate_width().unwrap();
                    let imm = table.int_at(pc, width);
                    pc += width;
                    if !binop_rhs_constant_is(arena, cursor, OpTag::AND, imm) {
                        fail!();
                    }
                }
                Opcode::CheckOrImm1
                | Opcode::CheckOrImm2
                | Opcode::CheckOrImm4
                | Opcode::CheckOrImm8 => {
                    let width = opcode.immediate_width().unwrap();
                    let imm = table.int_at(pc, width);
                    pc += width;
                    if !binop_rhs_constant_is(arena, cursor, OpTag::OR, imm) {
                        fail!();
                    }
                }
                Opcode::CheckFoldableChainNode => {
                    // Foldable: a single chain user, and every value user
                    // already inside the matched region (the recorded set
                    // plus the cursor's ancestor path).
                    let single_chain = arena.chain_users(cursor).len() == 1;
                    let inside = |id: NodeId| {
                        id == root || recorded.contains(&id) || children.contains(&id)
                    };
                    if !single_chain
                        || !arena.value_users(cursor).iter().copied().all(inside)
                    {
                        fail!();
                    }
                }
                Opcode::CheckChainCompatible => {
                    let slot = table.u8_at(pc) as usize;
                    pc += 1;
                    let prev = recorded[slot];
                    if let Some(chain) = arena.node(cursor).chain_input {
                        if arena.chain_reaches(chain, prev) {
                            fail!();
                        }
                    }
                }
                Opcode::EmitInteger1
                | Opcode::EmitInteger2
                | Opcode::EmitInteger4
                | Opcode::EmitInteger8 => {
                    let vt = ValueType(table.u8_at(pc));
                    let width = opcode.immediate_width().unwrap();
                    let imm = table.int_at(pc + 1, width);
                    pc += 1 + width;
                    let id = arena.add(
                        Node::new(OpTag::TARGET_CONSTANT)
                            .with_types(&[vt])
                            .with_payload(NodePayload::Constant(imm)),
                    );
                    recorded.push(id);
                }
                Opcode::EmitRegister => {
                    let vt = ValueType(table.u8_at(pc));
                    let reg = table.u8_at(pc + 1);
                    pc += 2;
                    let id = arena.add(
                        Node::new(OpTag::REGISTER)
                            .with_types(&[vt])
                            .with_payload(NodePayload::Register(reg)),
                    );
                    recorded.push(id);
                }
                Opcode::EmitConvertToTarget => {
                    let slot = table.u8_at(pc) as usize;
                    pc += 1;
                    let src = recorded[slot];
                    let (vt, value) = {
                        let node = arena.node(src);
                        (
                            node.value_type().unwrap_or(ValueType(0)),
                            node.constant_value()
                                .expect("EmitConvertToTarget on a non-constant slot"),
                        )
                    };
                    let id = arena.add(
                        Node::new(OpTag::TARGET_CONSTANT)
                            .with_types(&[vt])
                            .with_payload(NodePayload::Constant(value)),
                    );
                    recorded.push(id);
                }
                Opcode::EmitMergeInputChains => {
                    let n = table.u8_at(pc) as usize;
                    for i in 0..n {
                        let slot = table.u8_at(pc + 1 + i) as usize;
                        if let Some(chain) = arena.node(recorded[slot]).chain_input {
                            if !chain_inputs.contains(&chain) {
                                chain_inputs.push(chain);
                            }
                        }
                    }
                    pc += 1 + n;
                }
                Opcode::EmitCopyToReg => {
                    let slot = table.u8_at(pc) as usize;
                    let reg = table.u8_at(pc + 1);
                    pc += 2;
                    let mut copy = Node::new(OpTag::COPY_TO_REG)
                        .with_operands(&[recorded[slot]])
                        .with_payload(NodePayload::Register(reg));
                    copy.chain_input = chain_inputs.last().copied();
                    let id = arena.add(copy);
                    // The copy feeds the flag chain of the node emitted next.
                    flag_input = Some(id);
                }
                Opcode::EmitNodeXForm => {
                    let xform = table.u8_at(pc);
                    let slot = table.u8_at(pc + 1) as usize;
                    pc += 2;
                    let value = recorded[slot];
                    let id = host.run_node_xform(arena, value, xform);
                    recorded.push(id);
                }
                Opcode::EmitNode => {
                    let machine_opcode = table.u16_at(pc);
                    let flags = table.u8_at(pc + 2);
                    let num_vts = table.u8_at(pc + 3) as usize;
                    let mut vts = Vec::with_capacity(num_vts);
                    for i in 0..num_vts {
                        vts.push(ValueType(table.u8_at(pc + 4 + i)));
                    }
                    let num_ops = table.u8_at(pc + 4 + num_vts) as usize;
                    let mut operands = Vec::with_capacity(num_ops);
                    for i in 0..num_ops {
                        let slot = table.u8_at(pc + 5 + num_vts + i) as usize;
                        operands.push(recorded[slot]);
                    }

                    if let Some(fixed) = variadic_fixed_arity(flags) {
                        let root_ops = arena.node(root).operands.clone();
                        operands.extend(root_ops.into_iter().skip(fixed));
                    }

                    let chain = if flags & OPFL_CHAIN != 0 {
                        merge_chains(arena, &chain_inputs)
                    } else {
                        None
                    };

                    let mut node = Node::new(OpTag(machine_opcode))
                        .with_types(&vts)
                        .with_operands(&operands);
                    node.chain_input = chain;
                    if flags & OPFL_FLAG != 0 {
                        node.flag_input = flag_input;
                    }
                    if flags & OPFL_MEMREFS != 0 {
                        node.memrefs = memrefs.clone();
                    }

                    let new = arena.add(node);
                    arena.replace_all_uses(root, new);
                    log::debug!(
                        "matcher: root {root} rewritten to {new} (opcode {machine_opcode:#x})"
                    );
                    return Ok(new);
                }
            }
        }
    }
}

fn binop_rhs_constant_is(arena: &NodeArena, cursor: NodeId, op: OpTag, imm: i64) -> bool {
    let node = arena.node(cursor);
    if node.opcode != op || node.operands.len() != 2 {
        return false;
    }
    let rhs = arena.node(node.operands[1]);
    rhs.opcode == OpTag::CONSTANT && rhs.constant_value() == Some(imm)
}

fn merge_chains(arena: &mut NodeArena, chains: &[NodeId]) -> Option<NodeId> {
    match chains {
        [] => None,
        [single] => Some(*single),
        many => Some(arena.add(Node::new(OpTag::TOKEN_FACTOR).with_operands(many))),
    }
}
