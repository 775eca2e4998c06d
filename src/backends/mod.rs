pub mod elaboration;
pub mod lir;
