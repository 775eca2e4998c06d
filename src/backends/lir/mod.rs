//! The low-level form the elaborator produces and the runtime executes.

pub mod lir_display;
pub mod lir_nodes;
