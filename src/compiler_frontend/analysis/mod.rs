pub mod capabilities;
pub mod move_checker;
