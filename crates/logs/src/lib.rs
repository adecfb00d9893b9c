//! Logging macros that call the tracing crate underneath.
//!
//! Every macro checks a `log_*` feature with `cfg!`, and `cfg!` inside an
//! exported macro is evaluated against the crate that expands it. A crate
//! using these macros therefore declares its own `log_info`, `log_warnings`,
//! `log_errors` and `log_debug` features and decides per build what survives.
//!
//! See similar: <https://doc.rust-lang.org/src/std/macros.rs.html#138-145>.

/// Target used by [`diagnostic!`] so subscribers can filter argument diagnostics.
pub const DIAGNOSTICS_TARGET: &str = "ewe::diagnostics";

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => {
        if cfg!(feature = "log_info") {
            ::tracing::info!($($t)*);
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => {
        if cfg!(feature = "log_warnings") {
            ::tracing::warn!($($t)*);
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => {
        if cfg!(feature = "log_debug") {
            ::tracing::debug!($($t)*);
        }
    };
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => {
        if cfg!(feature = "log_errors") {
            ::tracing::error!($($t)*);
        }
    };
}

/// Reports a caller mistake (bad argument, misuse) at error level.
///
/// Compiled in only for debug builds of a crate with `log_errors` enabled,
/// the same way C code guards such messages behind `#ifndef NDEBUG`.
#[macro_export]
macro_rules! diagnostic {
    ($($t:tt)*) => {
        if cfg!(all(debug_assertions, feature = "log_errors")) {
            ::tracing::error!(target: $crate::DIAGNOSTICS_TARGET, $($t)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    /// WHY: Each macro forwards to tracing only when its feature is on
    /// WHAT: Default features keep info, warn and error but drop debug
    #[test]
    #[traced_test]
    fn test_levels_follow_features() {
        info!("[sync] runtime initialized");
        debug!("[sync] mutex created");
        warn!("[sync] rollback failed: {}", 22);
        error!("[sync] lost {} permits", 1);

        assert_eq!(logs_contain("runtime initialized"), cfg!(feature = "log_info"));
        assert_eq!(logs_contain("mutex created"), cfg!(feature = "log_debug"));
        assert_eq!(logs_contain("rollback failed: 22"), cfg!(feature = "log_warnings"));
        assert_eq!(logs_contain("lost 1 permits"), cfg!(feature = "log_errors"));
    }

    #[test]
    #[traced_test]
    fn test_diagnostic_follows_build_profile() {
        diagnostic!("bad argument `{}`", "count");
        assert_eq!(
            logs_contain("bad argument `count`"),
            cfg!(all(debug_assertions, feature = "log_errors"))
        );
    }
}
