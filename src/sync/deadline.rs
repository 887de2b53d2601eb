//! Operation deadlines.

use std::time::Duration;

use tokio::time::Instant;

use super::report::ChangeSet;
use crate::error::Error;

//------------ Deadline ------------------------------------------------------

/// The point in time after which an operation should give up.
///
/// Deadlines are checked between the steps of an operation only. A store
/// call that has been started is always awaited, so the engine knows
/// whether it took effect.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Deadline(None)
    }

    pub fn at(instant: Instant) -> Self {
        Deadline(Some(instant))
    }

    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Deadline(Some(Instant::now() + timeout))
    }

    /// Creates a deadline from an optional timeout.
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map(Self::after).unwrap_or_default()
    }

    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    pub fn is_expired(&self) -> bool {
        match self.0 {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Returns the time left, if the deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fails with [`Error::Cancelled`] if the deadline has expired.
    pub(crate) fn check(&self, changes: &ChangeSet) -> Result<(), Error> {
        if self.is_expired() {
            Err(Error::Cancelled {
                changes: changes.clone(),
            })
        } else {
            Ok(())
        }
    }
}

//============ Testing =======================================================
