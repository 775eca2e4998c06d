use crate::compiler_frontend::compiler_errors::{
    CompilerError, CompilerMessages, ErrorMetaDataKey, ErrorType,
};
use crate::compiler_frontend::compiler_warnings::print_formatted_warning;
use saying::say;
use std::env;
use std::path::{Path, PathBuf};

fn normalize_display_path(path: &Path) -> PathBuf {
    let path_string = path.to_string_lossy();
    if let Some(stripped) = path_string.strip_prefix(r"\\?\") {
        return PathBuf::from(stripped);
    }

    path.to_path_buf()
}

fn relative_display_path(scope: &Path) -> String {
    let normalized_scope = normalize_display_path(scope);

    match env::current_dir() {
        Ok(dir) => {
            let normalized_dir = normalize_display_path(&dir);
            normalized_scope
                .strip_prefix(&normalized_dir)
                .unwrap_or(&normalized_scope)
                .to_string_lossy()
                .to_string()
        }
        Err(err) => {
            say!(Red "Could not resolve the current directory for error output: ", err);
            normalized_scope.to_string_lossy().to_string()
        }
    }
}

pub fn print_compiler_messages(messages: CompilerMessages) {
    for err in messages.errors {
        print_formatted_error(err);
    }

    for warning in messages.warnings {
        print_formatted_warning(warning);
    }
}

pub fn print_formatted_error(e: CompilerError) {
    let relative_dir = relative_display_path(&e.location.scope);
    let line_number = e.location.start_pos.line_number;

    match e.error_type {
        ErrorType::DuplicateCapability
        | ErrorType::MissingDerefMut
        | ErrorType::UnsoundCapability => {
            if !relative_dir.is_empty() {
                say!("\n(ಠ_ಠ) ", Dark Magenta relative_dir, " ( ._. ) ");
            }

            say!(Red "Place Capability");
            say!(Dark Magenta "Line ", Bright {line_number});
        }

        ErrorType::UseOfMovedValue | ErrorType::MoveOutOfReference => {
            if !relative_dir.is_empty() {
                say!("\n(╯°Д°)╯  🔥🔥 ", Dark Magenta relative_dir, " 🔥🔥  ╰(°□°╰) ");
            }

            say!(Red "Move Checker");
            say!(Dark Magenta "Line ", Bright {line_number});
        }

        ErrorType::MalformedProgram => {
            if !relative_dir.is_empty() {
                say!("\nヽ(˶°o°)ﾉ  🔥🔥🔥 ", Dark Magenta relative_dir, " 🔥🔥🔥  ╰(°□°╰) ");
            }

            say!(Red "Malformed Program");
            say!(Dark Magenta "Line ", Bright {line_number});
        }

        ErrorType::File => {
            say!(Yellow "🏚 Can't find/read file or directory: ", relative_dir);
            say!(e.msg);
            return;
        }

        ErrorType::Config => {
            if !relative_dir.is_empty() {
                say!("\n (-_-)  🔥🔥🔥🔥 ", Dark Magenta relative_dir, " 🔥🔥🔥🔥  <(^~^)/ ");
            }
            say!(Yellow "CONFIG FILE ISSUE- ");
            say!(Dark Yellow "Malformed config file, something doesn't make sense inside the derefmove config");
        }

        ErrorType::Runtime => {
            say!(Red "Runtime");
            say!(Dark Yellow "elaborated code did something the interpreter can't allow");
        }

        ErrorType::Compiler => {
            if !relative_dir.is_empty() {
                say!("\nヽ༼☉ ‿ ⚆༽ﾉ  🔥🔥🔥🔥 ", Dark Magenta relative_dir, " 🔥🔥🔥🔥  ╰(° _ o╰) ");
            }
            say!(Yellow "COMPILER BUG - ");
            say!(Dark Yellow "ownership facts disagreed with elaboration (not your fault)");
        }
    }

    say!(Red e.msg);

    if let Some(suggestion) = e.metadata_value(ErrorMetaDataKey::PrimarySuggestion) {
        say!(Bright Black "  help: ", suggestion);
    }
}
