//! SSA IR для внешнего генератора QBE.

pub mod ir;
pub mod runtime;

pub use ir::{IrFunction, IrModule, IrProgram};
