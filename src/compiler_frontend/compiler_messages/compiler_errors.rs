use crate::compiler_frontend::compiler_warnings::CompilerWarning;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

// The final set of errors and warnings emitted from one compilation unit
#[derive(Debug, Default)]
pub struct CompilerMessages {
    pub errors: Vec<CompilerError>,
    pub warnings: Vec<CompilerWarning>,
}

impl CompilerMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_error(error: CompilerError) -> Self {
        CompilerMessages {
            errors: vec![error],
            warnings: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<CompilerError>) -> Self {
        CompilerMessages {
            errors,
            warnings: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharPosition {
    pub line_number: i32,
    pub char_column: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLocation {
    // File the error came from. Empty for programs built in memory.
    pub scope: PathBuf,
    pub start_pos: CharPosition,
    pub end_pos: CharPosition,
}

impl ErrorLocation {
    pub fn new(scope: PathBuf, start_pos: CharPosition, end_pos: CharPosition) -> Self {
        ErrorLocation {
            scope,
            start_pos,
            end_pos,
        }
    }

    pub fn in_file(path: &Path) -> Self {
        ErrorLocation {
            scope: path.to_path_buf(),
            ..ErrorLocation::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ErrorMetaDataKey {
    VariableName,
    TypeName,
    CompilationStage,

    // Optional suggestions
    PrimarySuggestion,
    AlternativeSuggestion,

    // Capability information
    ExistingTarget,
    RequestedTarget,
    ExpectedSignature,
    FoundSignature,

    // Move information
    MovedPlace,
    LifetimeHint,
}

#[derive(Debug, Clone)]
pub struct CompilerError {
    pub msg: String,
    pub location: ErrorLocation,
    pub error_type: ErrorType,

    // Structured details so callers (and tests) don't have to parse the message
    pub metadata: HashMap<ErrorMetaDataKey, String>,
}

impl CompilerError {
    pub fn new(msg: impl Into<String>, location: ErrorLocation, error_type: ErrorType) -> Self {
        CompilerError {
            msg: msg.into(),
            location,
            error_type,
            metadata: HashMap::new(),
        }
    }

    pub fn with_file_path(mut self, file_path: PathBuf) -> Self {
        self.location.scope = file_path;
        self
    }

    pub fn new_metadata_entry(&mut self, key: ErrorMetaDataKey, value: impl Into<String>) {
        self.metadata.insert(key, value.into());
    }

    pub fn metadata_value(&self, key: ErrorMetaDataKey) -> Option<&str> {
        self.metadata.get(&key).map(String::as_str)
    }

    /// Create a compiler error (internal bug, not user's fault)
    pub fn compiler_error(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorLocation::default(), ErrorType::Compiler)
    }

    pub fn file_error(path: &Path, msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorLocation::in_file(path), ErrorType::File)
    }

    /// True for the errors that describe a problem in the user's program
    /// rather than in the compiler or its environment.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self.error_type,
            ErrorType::DuplicateCapability
                | ErrorType::MissingDerefMut
                | ErrorType::UnsoundCapability
                | ErrorType::UseOfMovedValue
                | ErrorType::MoveOutOfReference
                | ErrorType::MalformedProgram
        )
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (line {})",
            error_type_to_str(&self.error_type),
            self.msg,
            self.location.start_pos.line_number
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    // Capability registry
    DuplicateCapability,
    MissingDerefMut,
    UnsoundCapability,

    // Move analysis
    UseOfMovedValue,
    MoveOutOfReference,

    // Program input that doesn't describe a well formed module
    MalformedProgram,

    Config,
    File,

    // The reference interpreter found elaborated code doing something unsound
    Runtime,

    // Internal invariant violations. Always a bug in derefmove.
    Compiler,
}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::DuplicateCapability => "Duplicate Capability",
        ErrorType::MissingDerefMut => "Missing DerefMut",
        ErrorType::UnsoundCapability => "Unsound Capability",
        ErrorType::UseOfMovedValue => "Use Of Moved Value",
        ErrorType::MoveOutOfReference => "Move Out Of Reference",
        ErrorType::MalformedProgram => "Malformed Program",
        ErrorType::Config => "Malformed Config",
        ErrorType::File => "File Error",
        ErrorType::Runtime => "Runtime Error",
        ErrorType::Compiler => "Compiler Bug",
    }
}

/// Builds the metadata map used by the error macros.
#[macro_export]
macro_rules! error_metadata {
    ($( $key:ident => $value:expr ),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = std::collections::HashMap::new();
        $(
            map.insert(
                $crate::compiler_frontend::compiler_errors::ErrorMetaDataKey::$key,
                $value.to_string(),
            );
        )*
        map
    }};
}

/// Creates a CompilerError of the given type (non-returning version).
///
/// Usage:
/// `let error = create_error!(ErrorType::UseOfMovedValue, "message", location, {
///     VariableName => "x",
///     CompilationStage => "Move Analysis",
/// });`
#[macro_export]
macro_rules! create_error {
    ($error_type:ident, $msg:expr, $location:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        $crate::compiler_frontend::compiler_errors::CompilerError {
            msg: $msg.into(),
            location: $location,
            error_type: $crate::compiler_frontend::compiler_errors::ErrorType::$error_type,
            metadata: $crate::error_metadata!($( $key => $value ),*),
        }
    };
    ($error_type:ident, $msg:expr, $location:expr) => {
        $crate::compiler_frontend::compiler_errors::CompilerError {
            msg: $msg.into(),
            location: $location,
            error_type: $crate::compiler_frontend::compiler_errors::ErrorType::$error_type,
            metadata: std::collections::HashMap::new(),
        }
    };
}

/// Returns a new CompilerError for capability registration and contract violations.
///
/// Usage:
/// `return_capability_error!(DuplicateCapability, "message", location, { TypeName => name })`;
#[macro_export]
macro_rules! return_capability_error {
    ($error_type:ident, $msg:expr, $location:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::create_error!($error_type, $msg, $location, {
            CompilationStage => "Capability Registration",
            $( $key => $value ),*
        }))
    };
    ($error_type:ident, $msg:expr, $location:expr) => {
        return Err($crate::create_error!($error_type, $msg, $location, {
            CompilationStage => "Capability Registration",
        }))
    };
}

/// Creates a use-of-moved-value error (non-returning version).
///
/// Move errors are collected rather than returned so every violation in a unit
/// gets reported in one run.
///
/// Usage: `let error = create_use_of_moved_value_error!(place_name, location, hint);`
#[macro_export]
macro_rules! create_use_of_moved_value_error {
    ($place:expr, $location:expr, $hint:expr) => {{
        let place_name: String = $place;
        $crate::create_error!(
            UseOfMovedValue,
            format!("use of moved value: `{}`", place_name),
            $location,
            {
                MovedPlace => place_name,
                CompilationStage => "Move Analysis",
                LifetimeHint => $hint,
                PrimarySuggestion => "Write a new value into the place before using it again",
            }
        )
    }};
}

/// Returns a new CompilerError for malformed program input.
#[macro_export]
macro_rules! return_malformed_program_error {
    ($msg:expr, $location:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::create_error!(MalformedProgram, $msg, $location, {
            CompilationStage => "HIR Validation",
            $( $key => $value ),*
        }))
    };
    ($msg:expr, $location:expr) => {
        return Err($crate::create_error!(MalformedProgram, $msg, $location, {
            CompilationStage => "HIR Validation",
        }))
    };
}

/// Returns a new CompilerError for a malformed config file.
#[macro_export]
macro_rules! return_config_error {
    ($msg:expr, $location:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::create_error!(Config, $msg, $location, { $( $key => $value ),* }))
    };
    ($msg:expr, $location:expr) => {
        return Err($crate::create_error!(Config, $msg, $location))
    };
}

/// Returns a new CompilerError for file system problems.
///
/// Usage: `return_file_error!(path, "message")`;
#[macro_export]
macro_rules! return_file_error {
    ($path:expr, $msg:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {{
        let mut error =
            $crate::compiler_frontend::compiler_errors::CompilerError::file_error($path, $msg);
        error.metadata = $crate::error_metadata!($( $key => $value ),*);
        return Err(error);
    }};
    ($path:expr, $msg:expr) => {{
        return Err(
            $crate::compiler_frontend::compiler_errors::CompilerError::file_error($path, $msg),
        );
    }};
}

/// Returns a new CompilerError from the reference interpreter.
/// Converts into any error type the interpreter's internals stop with.
///
/// Usage: `return_runtime_error!("message", { VariableName => name })`;
#[macro_export]
macro_rules! return_runtime_error {
    ($msg:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::create_error!(
            Runtime,
            $msg,
            $crate::compiler_frontend::compiler_errors::ErrorLocation::default(),
            { CompilationStage => "Runtime", $( $key => $value ),* }
        )
        .into())
    };
    ($msg:expr) => {
        return Err($crate::create_error!(
            Runtime,
            $msg,
            $crate::compiler_frontend::compiler_errors::ErrorLocation::default(),
            { CompilationStage => "Runtime" }
        )
        .into())
    };
}

/// Returns a new CompilerError for internal compiler bugs.
///
/// Compiler errors indicate bugs in derefmove itself, never in the user's program.
/// The elaborator uses these for ownership facts that disagree with what it sees.
#[macro_export]
macro_rules! return_compiler_error {
    ($fmt:expr, $($arg:expr),+ ; { $( $key:ident => $value:expr ),* $(,)? }) => {{
        return Err($crate::create_error!(
            Compiler,
            format!($fmt, $($arg),+),
            $crate::compiler_frontend::compiler_errors::ErrorLocation::default(),
            { $( $key => $value ),* }
        ));
    }};
    ($fmt:expr, $($arg:expr),+ $(,)?) => {{
        return Err($crate::create_error!(
            Compiler,
            format!($fmt, $($arg),+),
            $crate::compiler_frontend::compiler_errors::ErrorLocation::default()
        ));
    }};
    ($msg:expr ; { $( $key:ident => $value:expr ),* $(,)? }) => {{
        return Err($crate::create_error!(
            Compiler,
            $msg,
            $crate::compiler_frontend::compiler_errors::ErrorLocation::default(),
            { $( $key => $value ),* }
        ));
    }};
    ($msg:expr) => {{
        return Err($crate::create_error!(
            Compiler,
            $msg,
            $crate::compiler_frontend::compiler_errors::ErrorLocation::default()
        ));
    }};
}
