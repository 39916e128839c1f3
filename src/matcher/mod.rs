//! The instruction-selection matcher engine.
//!
//! A matcher table is a compact bytecode program produced offline; the
//! interpreter in [`interp`] runs it against an IR root node and rewrites
//! the matched subgraph into a machine node. [`table`] defines the byte
//! format and validates tables at the boundary, [`builder`] assembles
//! tables in-process (tests, and the contract the offline generator
//! follows).

pub mod builder;
pub mod interp;
pub mod table;

pub use builder::{classify_int, TableBuilder};
pub use interp::{MatchError, Matcher, MatcherHost};
pub use table::{
    variadic_fixed_arity, MatcherTable, Opcode, TableError, OPFL_CHAIN, OPFL_FLAG, OPFL_MEMREFS,
};
