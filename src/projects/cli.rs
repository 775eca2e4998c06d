//! Command-line entrypoints for derefmove.
//!
//! This module parses CLI commands and dispatches them into the check, elaborate and run
//! workflows over program files.

use crate::build_system::core_build::{
    CompiledProgram, collect_messages, compile_program, compile_programs, load_program,
};
use crate::compiler_frontend::Flag;
use crate::compiler_frontend::compiler_errors::CompilerMessages;
use crate::compiler_frontend::compiler_warnings::print_formatted_warning;
use crate::compiler_frontend::display_messages::print_compiler_messages;
use crate::projects::program_file::render_elaborated;
use crate::projects::settings::OutputFormat;
use crate::runtime::interpreter::{Interpreter, InterpreterHooks};
use crate::runtime::values::{Outcome, RunResult};
use saying::say;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    // Runs analysis over each file, nothing is printed for clean units
    Check(Vec<PathBuf>),

    // Prints the elaborated form of a single file
    Elaborate { path: PathBuf, json: bool },

    // Elaborates a file and runs it on the reference interpreter
    Run { path: PathBuf, entry: Option<String> },

    Help,
}

#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    config: Option<PathBuf>,
    flags: Vec<Flag>,
}

pub fn start_cli() -> ExitCode {
    let compiler_args: Vec<String> = env::args().collect();
    run_cli(compiler_args.get(1..).unwrap_or_default())
}

fn run_cli(args: &[String]) -> ExitCode {
    if args.is_empty() {
        print_help(true);
        return ExitCode::SUCCESS;
    }

    let (command, options) = match get_command(args).and_then(|command| {
        let options = get_options(args)?;
        Ok((command, options))
    }) {
        Ok(parsed) => parsed,
        Err(e) => {
            say!(Red e);
            print_help(true);
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Help => {
            print_help(false);
            ExitCode::SUCCESS
        }

        Command::Check(paths) => check_files(&paths, &options),

        Command::Elaborate { path, json } => match elaborate_file(&path, json, &options) {
            Ok(output) => {
                say!(output);
                ExitCode::SUCCESS
            }
            Err(messages) => {
                print_compiler_messages(messages);
                ExitCode::FAILURE
            }
        },

        Command::Run { path, entry } => match run_file(&path, entry.as_deref(), &options) {
            Ok(result) => report_run(&result),
            Err(messages) => {
                print_compiler_messages(messages);
                ExitCode::FAILURE
            }
        },
    }
}

fn check_files(paths: &[PathBuf], options: &CliOptions) -> ExitCode {
    let results = compile_programs(paths, options.config.as_deref(), &options.flags);

    for (path, result) in paths.iter().zip(&results) {
        let display = path.to_string_lossy();
        match result {
            Ok(_) => {
                say!(Green "✓ ", display);
            }
            Err(_) => {
                say!(Red "✗ ", display);
            }
        }
    }

    let show_warnings = !options.flags.contains(&Flag::DisableWarnings);
    let messages = collect_messages(results, show_warnings);
    let failed = messages.has_errors();
    print_compiler_messages(messages);

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn compile_file(path: &Path, options: &CliOptions) -> Result<CompiledProgram, CompilerMessages> {
    let loaded = load_program(path, options.config.as_deref())?;
    let compiled = compile_program(&loaded.program, &loaded.config, &options.flags)?;

    if compiled.config.output.show_warnings {
        for warning in compiled.warnings.iter().cloned() {
            print_formatted_warning(warning);
        }
    }

    Ok(compiled)
}

fn elaborate_file(path: &Path, json: bool, options: &CliOptions) -> Result<String, CompilerMessages> {
    let compiled = compile_file(path, options)?;

    let format = if json {
        OutputFormat::Json
    } else {
        compiled.config.output.format
    };

    render_elaborated(&compiled.elaborated, format).map_err(CompilerMessages::from_error)
}

fn run_file(
    path: &Path,
    entry: Option<&str>,
    options: &CliOptions,
) -> Result<RunResult, CompilerMessages> {
    let compiled = compile_file(path, options)?;
    let entry = entry.unwrap_or(compiled.config.runtime.entry.as_str());

    let hooks = InterpreterHooks {
        max_steps: compiled.config.runtime.max_steps,
        ..InterpreterHooks::default()
    };

    Interpreter::new(&compiled.elaborated, hooks)
        .run(entry, Vec::new())
        .map_err(CompilerMessages::from_error)
}

fn report_run(result: &RunResult) -> ExitCode {
    for value in result.observed() {
        say!(Blue "observe ", format!("{}", value));
    }

    match &result.outcome {
        Outcome::Returned(value) => {
            match value {
                Some(value) => {
                    say!(Green "Returned ", format!("{}", value));
                }
                None => {
                    say!(Green "Returned");
                }
            }
            say!(Bright Black format!("{} steps", result.steps));
            ExitCode::SUCCESS
        }
        Outcome::Panicked { message } => {
            let message = message.as_deref().unwrap_or("explicit panic");
            say!(Red "Panicked: ", message);
            ExitCode::FAILURE
        }
        Outcome::Aborted { site } => {
            say!(Red Bold "Aborted: ", format!("panic escaped {}", site));
            ExitCode::FAILURE
        }
    }
}

fn get_command(args: &[String]) -> Result<Command, String> {
    let command = args.first().map(String::as_str);
    let positional = positional_args(args.get(1..).unwrap_or_default())?;

    match command {
        Some("help") => Ok(Command::Help),

        Some("check") => {
            if positional.is_empty() {
                return Err(String::from("check needs at least one program file"));
            }
            Ok(Command::Check(positional.into_iter().map(PathBuf::from).collect()))
        }

        Some("elaborate") => Ok(Command::Elaborate {
            path: single_path("elaborate", &positional)?,
            json: args.iter().any(|arg| arg == "--json"),
        }),

        Some("run") => Ok(Command::Run {
            path: single_path("run", &positional)?,
            entry: flag_value(args, "--entry")?,
        }),

        Some(other) => Err(format!("Invalid command: '{}'", other)),

        None => Err(String::from("No command given")),
    }
}

fn single_path(command: &str, positional: &[String]) -> Result<PathBuf, String> {
    match positional {
        [path] => Ok(PathBuf::from(path)),
        [] => Err(format!("{} needs a program file", command)),
        _ => Err(format!("{} accepts exactly one program file", command)),
    }
}

/// Arguments that are not flags or flag values.
fn positional_args(args: &[String]) -> Result<Vec<String>, String> {
    let mut positional = Vec::new();
    let mut index = 0usize;

    while let Some(arg) = args.get(index) {
        match arg.as_str() {
            "--config" | "--entry" => index += 2,
            "--json" | "--hide-warnings" | "--show-hir" => index += 1,
            _ if arg.starts_with("--") => {
                return Err(format!(
                    "Unknown flag: '{arg}'. Supported flags are --config, --entry, --json, --hide-warnings, --show-hir."
                ));
            }
            _ => {
                positional.push(arg.to_owned());
                index += 1;
            }
        }
    }

    Ok(positional)
}

fn flag_value(args: &[String], flag: &str) -> Result<Option<String>, String> {
    let Some(position) = args.iter().position(|arg| arg == flag) else {
        return Ok(None);
    };

    match args.get(position + 1) {
        Some(value) if !value.starts_with("--") => Ok(Some(value.to_owned())),
        _ => Err(format!("Missing value for {}", flag)),
    }
}

fn get_options(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions {
        config: flag_value(args, "--config")?.map(PathBuf::from),
        flags: Vec::new(),
    };

    for arg in args {
        match arg.as_str() {
            "--hide-warnings" => options.flags.push(Flag::DisableWarnings),
            "--show-hir" => options.flags.push(Flag::ShowHir),
            _ => {}
        }
    }

    Ok(options)
}

fn print_help(commands_only: bool) {
    if !commands_only {
        say!(Bright Black "------------------------------------");
        say!(Green Bold "derefmove: place-aware move analysis and elaboration for storage owners");
        say!("Usage: ", Bold "<command>", " <args>");
    }
    say!(Green Bold "\nCommands:");
    say!("  check <files..>           - Checks each program file");
    say!("  elaborate <file>          - Prints the elaborated program");
    say!("  run <file>                - Elaborates and runs a program on the interpreter");
    say!("  help                      - Shows this message");

    say!(Green Bold "\nFlags:");
    say!("  --config <path>           (default: derefmove.toml next to the program)");
    say!("  --entry <function>        (run only, default: main)");
    say!("  --json                    (elaborate only)");
    say!("  --hide-warnings");
    say!("  --show-hir");
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
