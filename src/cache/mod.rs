//! In-memory query cache for remote marketplace data.
//!
//! - Entries are keyed by a [`QueryKey`] and carry their own freshness and
//!   eviction windows ([`QueryOptions`])
//! - Fresh entries are served without touching the network
//! - Failed fetches are retried, then surfaced as a `FetchError`; stale data is
//!   never substituted
//! - Concurrent lookups of one key share a single fetch

mod client;
mod error;
mod key;
mod options;

pub use client::QueryClient;
pub use key::{QueryKey, ResourceKey, LISTINGS_PREFIX};
pub use options::QueryOptions;
