// Extra timer logging
#[macro_export]
#[cfg(feature = "detailed_timers")]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        saying::say!($msg, Green #$time.elapsed());
    };
}

#[macro_export]
#[cfg(not(feature = "detailed_timers"))]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        // Nothing
        let _ = &$time;
    };
}

// CAPABILITY REGISTRY LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_capabilities")]
macro_rules! capability_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_capabilities"))]
macro_rules! capability_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// MOVE ANALYSIS LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_moves")]
macro_rules! move_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_moves"))]
macro_rules! move_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// ELABORATION LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_elaboration")]
macro_rules! elaboration_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_elaboration"))]
macro_rules! elaboration_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// REFERENCE INTERPRETER LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_runtime")]
macro_rules! runtime_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_runtime"))]
macro_rules! runtime_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}
