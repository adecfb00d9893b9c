//! Reusable N-party rendezvous.

use core::fmt;

use crate::errors::{SyncError, SyncResult};
use crate::sys;

/// Largest party count accepted by both backends.
pub const MAX_PARTIES: u32 = i32::MAX.unsigned_abs();

/// Returned by [`Barrier::wait`].
///
/// Exactly one arrival per round is the leader: the one the platform marks
/// as the release arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult(bool);

impl BarrierWaitResult {
    #[inline]
    #[must_use]
    pub const fn is_leader(&self) -> bool {
        self.0
    }
}

pub struct Barrier {
    inner: sys::Barrier,
    parties: u32,
}

impl Barrier {
    /// Creates a barrier that releases every `parties` arrivals.
    ///
    /// # Errors
    ///
    /// `parties` of zero or above [`MAX_PARTIES`] is an invalid argument;
    /// otherwise the native failure.
    pub fn new(parties: u32) -> SyncResult<Self> {
        if parties == 0 {
            return Err(SyncError::invalid_argument(
                "Barrier::new",
                "count",
                "party count must be positive",
            ));
        }
        if parties > MAX_PARTIES {
            return Err(SyncError::invalid_argument(
                "Barrier::new",
                "count",
                "party count exceeds the platform maximum",
            ));
        }
        let inner = sys::Barrier::new(parties)?;
        ewe_logs::debug!("[sync] barrier created for {} parties", parties);
        Ok(Self { inner, parties })
    }

    /// Blocks until `parties` threads have arrived, then releases them all and
    /// resets for the next round.
    ///
    /// # Errors
    ///
    /// Returns the native failure.
    pub fn wait(&self) -> SyncResult<BarrierWaitResult> {
        self.inner.wait().map(BarrierWaitResult)
    }

    #[must_use]
    pub const fn parties(&self) -> u32 {
        self.parties
    }

    /// # Errors
    ///
    /// Returns the native failure.
    pub fn destroy(self) -> SyncResult<()> {
        self.inner.destroy()?;
        ewe_logs::debug!("[sync] barrier destroyed");
        Ok(())
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Barrier")
            .field("parties", &self.parties)
            .finish_non_exhaustive()
    }
}
