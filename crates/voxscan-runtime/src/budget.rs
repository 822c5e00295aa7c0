use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::RenderError;

/// Byte budget shared by every in-flight export task.
///
/// `reserve` blocks while the reservation would push consumption past the
/// ceiling; dropping a `Reservation` gives its bytes back and wakes waiters.
#[derive(Debug)]
pub struct MemoryBudget {
    ceiling: u64,
    consumed: Mutex<u64>,
    freed: Condvar,
    // Mirrors of the locked state for lock-free sampling.
    consumed_now: AtomicU64,
    peak: AtomicU64,
    waiting: AtomicUsize,
    total_waits: AtomicUsize,
}

impl MemoryBudget {
    pub fn new(ceiling: u64) -> Arc<Self> {
        Arc::new(Self {
            ceiling,
            consumed: Mutex::new(0),
            freed: Condvar::new(),
            consumed_now: AtomicU64::new(0),
            peak: AtomicU64::new(0),
            waiting: AtomicUsize::new(0),
            total_waits: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed_now.load(Ordering::Acquire)
    }

    /// Highest consumption observed since creation.
    #[inline]
    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Acquire)
    }

    /// Submitters currently blocked in `reserve`.
    #[inline]
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Acquire)
    }

    /// Reservations that had to wait at least once.
    #[inline]
    pub fn total_waits(&self) -> usize {
        self.total_waits.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.consumed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves `cost` bytes, blocking until they fit under the ceiling.
    ///
    /// A cost larger than the whole ceiling can never be admitted and fails at
    /// once; with a `timeout`, a reservation that has not fit by the deadline fails.
    pub fn reserve(
        self: &Arc<Self>,
        cost: u64,
        timeout: Option<Duration>,
    ) -> Result<Reservation, RenderError> {
        if cost > self.ceiling {
            return Err(RenderError::BudgetExceeded {
                cost,
                reason: format!("larger than the {} byte ceiling", self.ceiling),
            });
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut consumed = self.lock();
        if consumed.saturating_add(cost) > self.ceiling {
            self.waiting.fetch_add(1, Ordering::AcqRel);
            self.total_waits.fetch_add(1, Ordering::AcqRel);
            log::debug!(
                target: "export",
                "admission of {cost} bytes waits ({} of {} in use)",
                *consumed,
                self.ceiling
            );
            while consumed.saturating_add(cost) > self.ceiling {
                consumed = match deadline {
                    None => self.freed.wait(consumed).unwrap_or_else(PoisonError::into_inner),
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            self.waiting.fetch_sub(1, Ordering::AcqRel);
                            return Err(RenderError::BudgetExceeded {
                                cost,
                                reason: format!(
                                    "not admitted within {} ms",
                                    timeout.unwrap_or_default().as_millis()
                                ),
                            });
                        }
                        self.freed
                            .wait_timeout(consumed, deadline - now)
                            .unwrap_or_else(PoisonError::into_inner)
                            .0
                    }
                };
            }
            self.waiting.fetch_sub(1, Ordering::AcqRel);
        }
        *consumed += cost;
        self.consumed_now.store(*consumed, Ordering::Release);
        self.peak.fetch_max(*consumed, Ordering::AcqRel);
        Ok(Reservation {
            budget: Arc::clone(self),
            cost,
        })
    }

    fn release(&self, cost: u64) {
        let mut consumed = self.lock();
        *consumed = consumed.saturating_sub(cost);
        self.consumed_now.store(*consumed, Ordering::Release);
        drop(consumed);
        self.freed.notify_all();
    }
}

/// Bytes held against a `MemoryBudget`; released on drop.
#[derive(Debug)]
pub struct Reservation {
    budget: Arc<MemoryBudget>,
    cost: u64,
}

impl Reservation {
    pub fn cost(&self) -> u64 {
        self.cost
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.budget.release(self.cost);
    }
}
