//! Request-sequence fencing: a newer request supersedes older in-flight ones,
//! whose results are dropped on arrival.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issued by [`RequestFence::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct RequestFence {
  latest: AtomicU64,
}

impl RequestFence {
  pub fn new() -> Self { Self::default() }

  /// Start a request, superseding every earlier ticket.
  pub fn begin(&self) -> Ticket { Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1) }

  pub fn is_current(&self, ticket: Ticket) -> bool {
    self.latest.load(Ordering::SeqCst) == ticket.0
  }
}
