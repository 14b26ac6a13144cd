//! Diagnostic macros used throughout the crate.

/// Check a caller contract or internal invariant.
///
/// On failure the predefined diagnostic is emitted with the formatted details
/// and the current operation panics. Checks run in debug builds and in
/// release builds with the `validation` feature; otherwise they compile away
/// and the caller is trusted.
///
/// # Example
///
/// ```rust,ignore
/// fd_contract!(count <= capacity, FD101, "requested {} of {} slots", count, capacity);
/// ```
#[macro_export]
macro_rules! fd_contract {
    ($cond:expr, $code:ident, $($arg:tt)+) => {{
        if cfg!(any(debug_assertions, feature = "validation")) && !($cond) {
            $crate::diagnostics::emit::violation(
                &$crate::diagnostics::$code,
                format_args!($($arg)+),
            );
        }
    }};
}

/// Emit a predefined diagnostic by code, optionally with runtime context.
///
/// # Example
///
/// ```rust,ignore
/// fd_emit!(FD301);
/// fd_emit!(FD301, "lane {} holds {} heaps", lane, count);
/// ```
#[macro_export]
macro_rules! fd_emit {
    ($code:ident) => {{
        $crate::diagnostics::emit::emit(&$crate::diagnostics::$code);
    }};
    ($code:ident, $($arg:tt)+) => {{
        $crate::diagnostics::emit::emit_with_context(
            &$crate::diagnostics::$code,
            &format!($($arg)+),
        );
    }};
}

/// Lifecycle tracing (heap created, segment reclaimed, ...).
///
/// Forwards to `log::trace!` with the `log` feature, compiles to nothing
/// otherwise.
#[macro_export]
#[cfg(feature = "log")]
macro_rules! fd_trace {
    ($($arg:tt)+) => {
        $crate::__log::trace!(target: "descalloc", $($arg)+)
    };
}

/// Lifecycle tracing (heap created, segment reclaimed, ...).
///
/// Forwards to `log::trace!` with the `log` feature, compiles to nothing
/// otherwise.
#[macro_export]
#[cfg(not(feature = "log"))]
macro_rules! fd_trace {
    ($($arg:tt)+) => {{
        if false {
            let _ = format_args!($($arg)+);
        }
    }};
}
