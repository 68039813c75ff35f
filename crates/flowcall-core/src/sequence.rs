//! Request ordering and in-flight tracking for the conversation store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Position of a suggestion request in issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Monotonic ticket source. Lives inside the store's locked state so that
/// issuing, checking and applying happen under the same lock.
#[derive(Debug, Default)]
pub struct TicketCounter {
    issued: u64,
}

impl TicketCounter {
    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    /// The most recently issued ticket, without issuing a new one.
    pub fn mark(&self) -> Ticket {
        Ticket(self.issued)
    }

    pub fn is_latest(&self, ticket: Ticket) -> bool {
        ticket.0 == self.issued
    }

    /// True if any ticket was issued after `mark`.
    pub fn issued_since(&self, mark: Ticket) -> bool {
        self.issued > mark.0
    }
}

/// Count of outstanding operations of one kind, exposed as a flag.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    count: Arc<AtomicUsize>,
}

impl InFlight {
    pub fn enter(&self) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn is_active(&self) -> bool {
        self.count.load(Ordering::SeqCst) > 0
    }
}

/// Decrements the owning [`InFlight`] when dropped, including on early
/// return and future cancellation.
#[derive(Debug)]
pub struct InFlightGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}
