//! Process-level setup and teardown.
//!
//! [`SyncRuntime`] is the explicit context object that replaces a global
//! "initialized" flag: it caches the [`Timer`] and installs logging. Only the
//! owner can init or shut it down (`&mut self`), so the single-writer rule
//! for lifecycle calls is checked by the compiler.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{ConfigError, LoggingConfig, SyncConfig};
use crate::errors::{SyncError, SyncResult};
use crate::timer::Timer;

#[derive(Debug, Default)]
pub struct SyncRuntime {
    config: SyncConfig,
    timer: Option<Timer>,
}

impl SyncRuntime {
    /// Creates an uninitialized runtime.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            timer: None,
        }
    }

    /// Prepares process-wide services. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Fails when the timer frequency cannot be read or the logging filter
    /// does not parse.
    pub fn init(&mut self) -> SyncResult<()> {
        if self.is_initialized() {
            ewe_logs::debug!("[sync] init called on an initialized runtime");
            return Ok(());
        }

        if self.config.logging.install_subscriber {
            install_subscriber(&self.config.logging)?;
        }

        let timer = Timer::new()?;
        self.timer = Some(timer);
        ewe_logs::info!("[sync] runtime initialized");
        Ok(())
    }

    /// Releases process-wide services. Safe to call repeatedly, and `init`
    /// may run again afterwards.
    ///
    /// A global `tracing` subscriber cannot be uninstalled; it stays in place.
    pub fn shutdown(&mut self) {
        if self.timer.take().is_some() {
            ewe_logs::info!("[sync] runtime shut down");
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.timer.is_some()
    }

    /// The timer cached by `init`.
    ///
    /// # Errors
    ///
    /// [`SyncError::NotInitialized`] before `init` or after `shutdown`.
    pub fn timer(&self) -> SyncResult<Timer> {
        self.timer.ok_or(SyncError::NotInitialized)
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

impl Drop for SyncRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn install_subscriber(logging: &LoggingConfig) -> SyncResult<()> {
    let filter = EnvFilter::try_new(&logging.filter)
        .map_err(|_| ConfigError::InvalidFilter(logging.filter.clone()))?;

    let installed = if logging.json {
        let subscriber = FmtSubscriber::builder()
            .json()
            .with_env_filter(filter)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber)
    };

    if installed.is_err() {
        ewe_logs::debug!("[sync] global subscriber already set, keeping it");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// WHY: Services must not be handed out before init
    /// WHAT: timer() reports NotInitialized until init runs
    #[test]
    fn test_timer_requires_init() {
        let mut runtime = SyncRuntime::new(SyncConfig::default());
        assert!(!runtime.is_initialized());
        assert!(matches!(runtime.timer(), Err(SyncError::NotInitialized)));

        runtime.init().expect("init");
        assert!(runtime.is_initialized());
        assert!(runtime.timer().is_ok());
    }

    /// WHY: init and shutdown are idempotent and re-runnable
    /// WHAT: init twice, shutdown twice, init again
    #[test]
    fn test_lifecycle_is_idempotent() {
        let mut runtime = SyncRuntime::default();
        runtime.init().expect("first init");
        let divisor = runtime.timer().expect("timer").divisor();
        runtime.init().expect("second init");
        assert_eq!(runtime.timer().expect("timer").divisor(), divisor);

        runtime.shutdown();
        runtime.shutdown();
        assert!(!runtime.is_initialized());

        runtime.init().expect("re-init");
        assert!(runtime.is_initialized());
    }

    #[test]
    fn test_bad_filter_fails_init() {
        let mut config = SyncConfig::default();
        config.logging.install_subscriber = true;
        config.logging.filter = String::from("foundation_sync=notalevel");
        let mut runtime = SyncRuntime::new(config);

        let err = runtime.init().expect_err("filter must not parse");
        assert!(matches!(err, SyncError::Config(ConfigError::InvalidFilter(_))));
        assert!(!runtime.is_initialized());
    }
}
