//! Wiring lowering for flow graphs
//!
//! Turns a graph into a flat, deterministic list of channel wiring
//! statements for code generators and simulators, with a dependency order
//! over the wired nodes.

mod channel;
mod compiler;
mod error;
mod lowering;
mod schedule;

pub use channel::{channel_base, channel_name, slot_channel, INPUT_CHANNEL, OUTPUT_CHANNEL};
pub use compiler::{Compilation, CompilerConfig, FlowCompiler};
pub use error::{CompileError, LoweringError};
pub use lowering::{lower, Buffering, Lowerer, LoweringMode, WiringPlan, WiringStatement};
