//! Result cache domain
//!
//! - [`CacheKey`]: SHA-256 over tool, operation, canonical parameters and tenant
//! - [`CacheEntry`]: a cached value with its insertion time and TTL
//! - [`TtlStrategy`] / [`TtlRegistry`]: how long a fresh result may be reused
//!
//! The two tiers themselves live in infrastructure; everything here is pure.

pub mod entry;
pub mod key;
pub mod ttl;

pub use entry::{CacheEntry, CacheStats};
pub use key::CacheKey;
pub use ttl::{TtlContext, TtlFn, TtlRegistry, TtlStrategy, content_aware_ttl};
