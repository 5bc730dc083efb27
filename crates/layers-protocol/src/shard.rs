//! Subdomain selection.

use std::sync::atomic::{AtomicUsize, Ordering};

use layers_common::time::leading_int;
use tracing::debug;

/// Process-wide rotating cursor over a subdomain list.
///
/// Concurrent callers each get a distinct position; the sequence itself is
/// not significant beyond spreading requests over hosts.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next index into a list of `len` entries. `None` for empty lists.
    pub fn next(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.cursor.fetch_add(1, Ordering::Relaxed) % len)
    }

    /// Rewind the cursor to the first entry.
    pub fn reset(&self) {
        self.cursor.store(0, Ordering::Relaxed);
    }
}

/// Narrow a subdomain list for HTTP/2 capable clients.
///
/// Over HTTP/2 a single connection multiplexes requests, so the first
/// subdomain whose numeric value exceeds 99 is used alone. Without HTTP/2,
/// or when no such subdomain exists, the list is returned unchanged. The
/// result is never empty for a non-empty input.
pub fn domain_shard(subdomains: &[String], http2: bool) -> Vec<String> {
    if http2 {
        if let Some(s) = subdomains
            .iter()
            .find(|s| leading_int(s).map_or(false, |n| n > 99))
        {
            debug!(subdomain = %s, "HTTP/2 available, using a single shard");
            return vec![s.clone()];
        }
    }
    subdomains.to_vec()
}
