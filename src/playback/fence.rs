//! Monotonic request fence for discarding superseded loads.

use std::fmt;

/// Sequence number captured by a load when it is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues tickets and answers whether a ticket is still the latest.
///
/// Only the most recently issued ticket is current. The counter never goes
/// backwards; a new session starts with a new fence.
#[derive(Debug, Default)]
pub struct RequestFence {
    latest: u64,
}

impl RequestFence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new ticket, superseding every earlier one.
    pub fn issue(&mut self) -> Ticket {
        self.latest += 1;
        Ticket(self.latest)
    }

    /// Whether no ticket has been issued since `ticket`.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest
    }

    /// The most recently issued ticket, if any.
    pub fn latest(&self) -> Option<Ticket> {
        (self.latest > 0).then_some(Ticket(self.latest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_are_monotonic() {
        let mut fence = RequestFence::new();
        assert_eq!(fence.latest(), None);
        let a = fence.issue();
        let b = fence.issue();
        assert!(b > a);
        assert_eq!(fence.latest(), Some(b));
    }

    #[test]
    fn test_only_latest_is_current() {
        let mut fence = RequestFence::new();
        let t1 = fence.issue();
        assert!(fence.is_current(t1));

        let t2 = fence.issue();
        assert!(!fence.is_current(t1));
        assert!(fence.is_current(t2));
    }
}
