//! Reference interpreter for elaborated modules.
//! Used by the `run` command and by tests that check what elaboration emits.

pub mod interpreter;
pub mod values;

#[cfg(test)]
mod tests;
