//! Sequence stamping for lookups whose responses may arrive out of order.

use std::fmt;

/// The stamp carried by one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic counter for one logical lookup.
///
/// Only the most recently issued ticket is current; a response carrying any
/// other ticket is stale and must be dropped.
#[derive(Debug, Default)]
pub struct RequestCounter {
    latest: u64,
}

impl RequestCounter {
    pub fn issue(&mut self) -> Ticket {
        self.latest += 1;
        Ticket(self.latest)
    }

    /// Makes every outstanding ticket stale without issuing a new request.
    pub fn invalidate(&mut self) {
        self.latest += 1;
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest
    }
}
