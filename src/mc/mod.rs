//! Machine-code layer shared by the assembler front-end and streamers:
//! symbols, sections, relocatable values, instructions, and the streamer
//! contract.

pub mod context;
pub mod inst;
pub mod section;
pub mod streamer;
pub mod symbol;
pub mod value;

pub use context::McContext;
pub use inst::{McInst, McOperand};
pub use section::{Section, SectionId};
pub use streamer::{AssemblerFlag, LogStreamer, RecordingStreamer, Streamer, StreamerEvent, SymbolAttr};
pub use symbol::{Symbol, SymbolId, SymbolState};
pub use value::McValue;
