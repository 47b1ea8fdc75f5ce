//! Pre-built [`tracing::Span`] constructors for node operations.
//!
//! Consistent span names and fields make it easy to filter and correlate
//! dispatch, discovery and commit activity in logs.

use tracing::{debug_span, info_span, Span};

/// Span covering the dispatch of one inbound frame.
pub fn dispatch_span(sender: &str, len: usize) -> Span {
    debug_span!("dispatch", sender = %sender, len)
}

/// Span covering the commit pipeline for one block.
pub fn commit_span(block_hash: &str, number: u64) -> Span {
    info_span!("commit", hash = %block_hash, number)
}

/// Span covering one discovery step (ping, pong, join, pong broadcast).
pub fn discovery_span(step: &'static str) -> Span {
    info_span!("discovery", step)
}
