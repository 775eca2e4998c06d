pub mod hir_builder;
pub mod hir_datatypes;
pub mod hir_display;
pub mod hir_nodes;
pub mod hir_validation;

#[cfg(test)]
mod tests;
