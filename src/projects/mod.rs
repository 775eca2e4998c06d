//! # Everything between the command line and the compiler pipeline
//! Config files, program files and the CLI that ties them to the build system.

// The basic CLI for checking, elaborating and running program files
pub mod cli;

pub mod program_file;
pub mod settings;

#[cfg(test)]
#[path = "tests/test_programs.rs"]
pub(crate) mod test_programs;
