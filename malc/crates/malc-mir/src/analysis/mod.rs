//! Control flow analysis for MIR.

mod cfg;

pub use cfg::{dominance_frontiers, ControlFlowGraph, Dominators};
