//! selmc - machine-code back-end cores.
//!
//! This crate provides the two reusable engines of a compiler back-end:
//!
//! - The **instruction-selection matcher**: a byte-coded tree-pattern
//!   matcher that rewrites IR DAG subgraphs into target machine nodes.
//!   Tables are compact bytecode produced offline; the interpreter runs
//!   one against every root node during code generation.
//! - The **assembly parser core**: a single-pass streaming lexer and
//!   parser that evaluates relocatable symbolic expressions and drives an
//!   abstract assembler streamer via callbacks.
//!
//! # Matcher usage
//!
//! ```
//! use selmc::ir::{Node, NodeArena, OpTag, ValueType};
//! use selmc::matcher::{Matcher, MatcherHost, TableBuilder};
//! # use selmc::ir::NodeId;
//!
//! struct NoCallbacks;
//! impl MatcherHost for NoCallbacks {
//!     fn check_pattern_predicate(&self, _: u8) -> bool { false }
//!     fn check_node_predicate(&self, _: &NodeArena, _: NodeId, _: u8) -> bool { false }
//!     fn check_complex_pattern(
//!         &self, _: &mut NodeArena, _: NodeId, _: NodeId, _: u8, _: &mut Vec<NodeId>,
//!     ) -> bool { false }
//!     fn run_node_xform(&self, _: &mut NodeArena, value: NodeId, _: u8) -> NodeId { value }
//! }
//!
//! const I32: ValueType = ValueType(0);
//! const ADD: OpTag = OpTag(32);
//!
//! let mut arena = NodeArena::new();
//! let x = arena.add(Node::new(OpTag(33)).with_types(&[I32]));
//! let five = arena.constant(5, I32);
//! let root = arena.add(Node::new(ADD).with_types(&[I32]).with_operands(&[x, five]));
//!
//! let mut builder = TableBuilder::new();
//! builder
//!     .check_opcode(ADD)
//!     .move_child(0)
//!     .record_node()
//!     .move_parent()
//!     .move_child(1)
//!     .check_integer(5)
//!     .move_parent()
//!     .emit_node(0x100, 0, &[I32], &[0]);
//! let table = builder.finish().unwrap();
//!
//! let emitted = Matcher::new(&table)
//!     .select(&mut arena, root, &mut NoCallbacks)
//!     .unwrap();
//! assert_eq!(arena.node(emitted).operands, vec![x]);
//! ```
//!
//! # Parser usage
//!
//! ```
//! use bumpalo::Bump;
//! use selmc::asm::{AsmLexer, AsmParser, NullTargetParser, SourceMgr};
//! use selmc::config::{Config, TargetRegistry};
//! use selmc::mc::{McContext, RecordingStreamer};
//!
//! let arena = Bump::new();
//! let mut ctx = McContext::new(&arena);
//! let mut sources = SourceMgr::new();
//! let main = sources.add_buffer("input.s", ".data\n.byte 1, 2\n");
//!
//! let mut streamer = RecordingStreamer::new();
//! let mut target = NullTargetParser;
//! let registry = TargetRegistry::default();
//! let mut parser = AsmParser::new(
//!     AsmLexer::new(sources, main),
//!     &mut ctx,
//!     &mut streamer,
//!     &mut target,
//!     &registry,
//!     Config::default(),
//! );
//! parser.run().unwrap();
//! assert_eq!(streamer.events.len(), 3);
//! ```

pub mod asm;
pub mod config;
pub mod diag;
pub mod ir;
pub mod matcher;
pub mod mc;

pub use asm::{AsmError, AsmLexer, AsmParser, NullTargetParser, SourceMgr, TargetAsmParser};
pub use config::{Config, TargetRegistry};
pub use diag::{BufferId, DiagEngine, Diagnostic, Severity, SourceLoc};
pub use ir::{Node, NodeArena, NodeId, NodePayload, OpTag, ValueType};
pub use matcher::{MatchError, Matcher, MatcherHost, MatcherTable, TableBuilder, TableError};
pub use mc::{
    McContext, McInst, McOperand, McValue, RecordingStreamer, SectionId, Streamer, StreamerEvent,
    SymbolAttr, SymbolId,
};
