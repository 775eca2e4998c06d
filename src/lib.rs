pub mod backends;
pub mod compiler_frontend;
pub mod projects;
pub mod runtime;

pub mod build_system {
    pub mod core_build;
}

// Re-exports for embedders driving the pipeline without the CLI
pub use build_system::core_build::{CompiledProgram, compile_program, compile_programs};
pub use compiler_frontend::{CompilerFrontend, Flag};
pub use projects::program_file::{ProgramFile, load_program_file};
pub use projects::settings::Config;
