/*!
 * Exclusive access to the shared accelerator.
 *
 * The device runs one model call at a time for the whole process. The gate
 * is a single-permit semaphore (tokio semaphores are FIFO), plus counters
 * that make the "at most one call in flight" property observable.
 */

use log::error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::AcceleratorUnavailable;

/// Single-permit gate in front of the device
#[derive(Debug)]
pub struct AcceleratorGate {
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    unavailable: Mutex<Option<String>>,
}

/// Held for the duration of one model call; released on drop
#[derive(Debug)]
pub struct AcceleratorPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for AcceleratorPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for AcceleratorGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceleratorGate {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            unavailable: Mutex::new(None),
        }
    }

    /// Wait for the device
    pub async fn acquire(&self) -> Result<AcceleratorPermit, AcceleratorUnavailable> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| self.unavailable_error())?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        Ok(AcceleratorPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Take the device offline; every current and future waiter fails
    pub fn mark_unavailable(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!("Accelerator marked unavailable: {}", reason);
        self.unavailable.lock().get_or_insert(reason);
        self.semaphore.close();
    }

    pub fn is_available(&self) -> bool {
        !self.semaphore.is_closed()
    }

    /// Calls currently holding the device
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous holders ever observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn unavailable_error(&self) -> AcceleratorUnavailable {
        AcceleratorUnavailable {
            reason: self
                .unavailable
                .lock()
                .clone()
                .unwrap_or_else(|| "accelerator gate closed".to_string()),
        }
    }
}
