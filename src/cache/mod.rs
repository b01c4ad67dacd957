//! PatientDesk query cache
//!
//! Client-side cache for reads against the patient records API:
//!
//! - **Entries**: one [`CacheEntry`] per [`QueryKey`], fresh for a configurable
//!   window and bounded per resource by an LRU.
//! - **Coalescing**: concurrent reads of one key share a single request.
//! - **Invalidation**: writes mark matching entries stale through a
//!   [`KeyFilter`]; watched keys are refetched in the background.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! default_ttl_ms = 60000
//! summary_ttl_ms = 300000
//! max_entries = 256
//! retry_attempts = 1
//! ```

mod config;
mod entry;
mod keys;
mod loader;
pub(crate) mod lock;
mod registry;
mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, QueryStatus};
pub use keys::{KeyFilter, ParamValue, QueryKey, Resource};
pub use loader::{LoadResult, Loader, loader, with_retry};
pub use registry::SubscriberRegistry;
pub use store::{QueryCache, Subscription};
