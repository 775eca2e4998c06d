use crate::compiler_frontend::compiler_errors::ErrorLocation;
use saying::say;

#[derive(Clone, Debug)]
pub struct CompilerWarning {
    pub msg: String,
    pub location: ErrorLocation,
    pub warning_kind: WarningKind,
}

impl CompilerWarning {
    pub fn new(msg: &str, location: ErrorLocation, warning_kind: WarningKind) -> CompilerWarning {
        CompilerWarning {
            msg: msg.to_owned(),
            location,
            warning_kind,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarningKind {
    // A capability was registered for a type the unit never dereferences
    UnusedCapability,

    // A drop point needed a runtime drop flag
    ConditionalDrop,
}

pub fn print_formatted_warning(w: CompilerWarning) {
    say!(Yellow "WARNING: ");
    match w.warning_kind {
        WarningKind::UnusedCapability => {
            say!("Unused place capability '", w.msg, "'");
        }
        WarningKind::ConditionalDrop => {
            say!("Drop flag needed for '", w.msg, "' (initialized on some paths only)");
        }
    }
}
