//! ============================================================
//!                   Panic / Abort Boundary
//! ============================================================
//! Decides what happens when user code called from a program point the
//! elaborator synthesized (a storage accessor, a content drop, `new_uninit`)
//! panics. Ownership facts were committed before those calls existed, so
//! unwinding out of them could leave a place half initialized. The default
//! policy terminates the process.
//!
//! Explicit calls to `Deref::deref` / `DerefMut::deref_mut` written by the
//! user never consult the policy and always propagate, even on types that
//! also have a place capability.

use serde::Serialize;
use std::fmt;

/// The kinds of compiler-synthesized call sites that invoke user code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesizedSite {
    StorageAccessor,
    ContentDrop,
    NewUninit,
}

impl fmt::Display for SynthesizedSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesizedSite::StorageAccessor => write!(f, "a storage accessor"),
            SynthesizedSite::ContentDrop => write!(f, "a content drop"),
            SynthesizedSite::NewUninit => write!(f, "new_uninit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnwindAction {
    /// Terminate the process without running any further code.
    Abort,

    /// Unwind as a recoverable failure.
    Propagate,
}

pub trait PanicPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_panic(&self, site: SynthesizedSite) -> UnwindAction;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AbortPolicy;

impl PanicPolicy for AbortPolicy {
    fn name(&self) -> &'static str {
        "abort"
    }

    fn on_panic(&self, _site: SynthesizedSite) -> UnwindAction {
        UnwindAction::Abort
    }
}

/// Resolves the policy a config file names.
pub fn policy_by_name(name: &str) -> Option<Box<dyn PanicPolicy>> {
    match name {
        "abort" => Some(Box::new(AbortPolicy)),
        _ => None,
    }
}

pub const KNOWN_POLICIES: &[&str] = &["abort"];

/// Runs `f` as a compiler-synthesized call: if `f` unwinds, the process aborts.
///
/// This is the helper generated code calls around accessor calls and content
/// drops. A panic inside `f` never reaches the caller.
pub fn run_synthesized<R>(f: impl FnOnce() -> R) -> R {
    let bomb = AbortOnUnwind;
    let result = f();
    std::mem::forget(bomb);
    result
}

struct AbortOnUnwind;

impl Drop for AbortOnUnwind {
    fn drop(&mut self) {
        if std::thread::panicking() {
            std::process::abort();
        }
    }
}
