//! Counting semaphore with timeout-bounded acquire.
//!
//! Permits are slots in a bounded channel: acquiring pushes a unit into the channel,
//! releasing pulls one out. The channel is the only mutable state and is never handed
//! to callers.

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};
use log::debug;
use std::time::Duration;

use crate::error::SemaphoreError;

/// Bounded pool of permits. Share it across threads behind an `Arc`.
#[derive(Debug)]
pub struct Semaphore {
    slots_tx: Sender<()>,
    slots_rx: Receiver<()>,
    capacity: usize,
    timeout: Duration,
}

impl Semaphore {
    /// Create a semaphore with `capacity` permits. A zero capacity is treated as one.
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        let (slots_tx, slots_rx) = bounded(capacity);
        Self {
            slots_tx,
            slots_rx,
            capacity,
            timeout,
        }
    }

    /// Take a permit, waiting at most the configured timeout.
    ///
    /// Every `Ok` must be paired with exactly one [`release`](Self::release).
    /// Prefer [`acquire_permit`](Self::acquire_permit) where a scope can own the permit.
    pub fn acquire(&self) -> Result<(), SemaphoreError> {
        match self.slots_tx.send_timeout((), self.timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(())) | Err(SendTimeoutError::Disconnected(())) => {
                Err(SemaphoreError::NoPermitsAvailable {
                    timeout: self.timeout,
                })
            }
        }
    }

    /// Return a permit. Fails immediately with [`SemaphoreError::IllegalRelease`] when
    /// no permit is outstanding.
    pub fn release(&self) -> Result<(), SemaphoreError> {
        self.slots_rx
            .try_recv()
            .map_err(|_| SemaphoreError::IllegalRelease)
    }

    /// Take a permit that is released when the returned guard is dropped.
    pub fn acquire_permit(&self) -> Result<Permit<'_>, SemaphoreError> {
        self.acquire()?;
        Ok(Permit {
            semaphore: self,
            released: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held.
    pub fn outstanding(&self) -> usize {
        self.slots_rx.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// One acquired permit. Released exactly once: by [`Permit::release`] or on drop.
#[derive(Debug)]
#[must_use = "dropping a permit releases it immediately"]
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
    released: bool,
}

impl Permit<'_> {
    /// Release now and report protocol errors instead of swallowing them on drop.
    pub fn release(mut self) -> Result<(), SemaphoreError> {
        self.released = true;
        self.semaphore.release()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.semaphore.release()
        {
            // Only reachable when someone mixed raw release() calls with guards.
            debug!("permit release on drop failed: {}", e);
        }
    }
}
