// This module stores the IR DAG the instruction-selection matcher runs against. Nodes
// live in a flat Vec-backed arena and reference each other by u32 index, so a shared
// DAG needs no reference counting and a "node reference" is Copy. Value edges are the
// ordered operand list; chain edges (side-effect ordering) and the flag edge (CPU-flag
// producer/consumer) are tracked separately because the matcher treats them differently
// from value operands. The arena also maintains reverse user lists per node, so
// use-count checks and replace_all_uses run without scanning the whole graph.

//! Index-addressed IR node arena.
//!
//! The matcher views a node as an opcode tag, an operand list, value types,
//! and optional chain/flag inputs. Nodes are created append-only; rewrites
//! happen by redirecting users, never by mutating matched structure.

use std::fmt;

/// Stable index of a node inside a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Opcode tag of a node.
///
/// Tags below [`OpTag::FIRST_TARGET_TAG`] are reserved for node kinds the
/// matcher itself understands structurally (constants it materializes,
/// chain merges, and the `AND`/`OR` shapes the immediate checks look
/// through). Everything else belongs to the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpTag(pub u16);

impl OpTag {
    /// Merge point for multiple chain inputs.
    pub const TOKEN_FACTOR: OpTag = OpTag(1);
    /// Source-level integer constant.
    pub const CONSTANT: OpTag = OpTag(2);
    /// Constant already in target form (an instruction immediate).
    pub const TARGET_CONSTANT: OpTag = OpTag(3);
    /// Reference to a physical or virtual register.
    pub const REGISTER: OpTag = OpTag(4);
    /// Copy of a value into a physical register.
    pub const COPY_TO_REG: OpTag = OpTag(5);
    /// Bitwise and, recognized by the and-immediate checks.
    pub const AND: OpTag = OpTag(6);
    /// Bitwise or, recognized by the or-immediate checks.
    pub const OR: OpTag = OpTag(7);
    /// First tag value free for embedder-defined opcodes.
    pub const FIRST_TARGET_TAG: OpTag = OpTag(32);
}

/// Value type of a node result. The numbering is the embedder's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueType(pub u8);

/// Extra per-node data beyond operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePayload {
    None,
    /// Integer constant carried by `CONSTANT`/`TARGET_CONSTANT` nodes.
    Constant(i64),
    /// Condition-code operand node.
    CondCode(u8),
    /// Value-type operand node (a type used as an operand).
    ValueTypeRef(u8),
    /// Register operand node.
    Register(u8),
}

/// One IR node. Operands are value edges; chain and flag edges are separate.
#[derive(Debug, Clone)]
pub struct Node {
    pub opcode: OpTag,
    pub value_types: Vec<ValueType>,
    pub operands: Vec<NodeId>,
    pub chain_input: Option<NodeId>,
    pub flag_input: Option<NodeId>,
    pub payload: NodePayload,
    /// Memory-reference metadata ids attached by the embedder.
    pub memrefs: Vec<u32>,
}

impl Node {
    pub fn new(opcode: OpTag) -> Self {
        Self {
            opcode,
            value_types: Vec::new(),
            operands: Vec::new(),
            chain_input: None,
            flag_input: None,
            payload: NodePayload::None,
            memrefs: Vec::new(),
        }
    }

    pub fn with_types(mut self, value_types: &[ValueType]) -> Self {
        self.value_types = value_types.to_vec();
        self
    }

    pub fn with_operands(mut self, operands: &[NodeId]) -> Self {
        self.operands = operands.to_vec();
        self
    }

    pub fn with_chain(mut self, chain: NodeId) -> Self {
        self.chain_input = Some(chain);
        self
    }

    pub fn with_flag(mut self, flag: NodeId) -> Self {
        self.flag_input = Some(flag);
        self
    }

    pub fn with_payload(mut self, payload: NodePayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_memrefs(mut self, memrefs: &[u32]) -> Self {
        self.memrefs = memrefs.to_vec();
        self
    }

    /// First result type, if the node has one.
    pub fn value_type(&self) -> Option<ValueType> {
        self.value_types.first().copied()
    }

    /// Integer payload of a constant node.
    pub fn constant_value(&self) -> Option<i64> {
        match self.payload {
            NodePayload::Constant(v) => Some(v),
            _ => None,
        }
    }
}

/// Append-only arena of nodes with reverse user tracking.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    value_users: Vec<Vec<NodeId>>,
    chain_users: Vec<Vec<NodeId>>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node, registering it as a user of its operands and chain input.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for &op in &node.operands {
            self.value_users[op.index()].push(id);
        }
        if let Some(chain) = node.chain_input {
            self.chain_users[chain.index()].push(id);
        }
        self.nodes.push(node);
        self.value_users.push(Vec::new());
        self.chain_users.push(Vec::new());
        id
    }

    /// Convenience: materialize an integer constant node.
    pub fn constant(&mut self, value: i64, vt: ValueType) -> NodeId {
        self.add(
            Node::new(OpTag::CONSTANT)
                .with_types(&[vt])
                .with_payload(NodePayload::Constant(value)),
        )
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn operand(&self, id: NodeId, idx: usize) -> Option<NodeId> {
        self.nodes[id.index()].operands.get(idx).copied()
    }

    pub fn value_users(&self, id: NodeId) -> &[NodeId] {
        &self.value_users[id.index()]
    }

    pub fn chain_users(&self, id: NodeId) -> &[NodeId] {
        &self.chain_users[id.index()]
    }

    /// Whether following chain inputs from `from` ever reaches `target`.
    pub fn chain_reaches(&self, from: NodeId, target: NodeId) -> bool {
        let mut cur = Some(from);
        while let Some(id) = cur {
            if id == target {
                return true;
            }
            cur = self.nodes[id.index()].chain_input;
        }
        false
    }

    /// Redirect every use of `old` (value and chain edges) to `new`.
    ///
    /// User lists carry one entry per referencing operand slot, and that
    /// multiplicity transfers to `new`: a user holding `old` in two slots
    /// ends up listed twice under `new`.
    ///
    /// `new` itself is left untouched even if it referenced `old`.
    pub fn replace_all_uses(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        let users = std::mem::take(&mut self.value_users[old.index()]);
        for &user in &users {
            if user == new {
                continue;
            }
            // The first entry for a user rewrites all of its slots; later
            // entries for the same user find nothing left to rewrite and
            // only keep the per-slot count.
            for op in &mut self.nodes[user.index()].operands {
                if *op == old {
                    *op = new;
                }
            }
            self.value_users[new.index()].push(user);
        }
        // Users that were skipped keep their old edge; put them back.
        self.value_users[old.index()] = users
            .iter()
            .copied()
            .filter(|&u| u == new)
            .collect();

        let chain_users = std::mem::take(&mut self.chain_users[old.index()]);
        for &user in &chain_users {
            if user == new {
                continue;
            }
            if self.nodes[user.index()].chain_input == Some(old) {
                self.nodes[user.index()].chain_input = Some(new);
            }
            self.chain_users[new.index()].push(user);
        }
        self.chain_users[old.index()] = chain_users
            .iter()
            .copied()
            .filter(|&u| u == new)
            .collect();
    }
}
