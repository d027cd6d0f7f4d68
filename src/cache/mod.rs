//! Pressroom response cache.
//!
//! Rendered output is cached under the set of tags that characterizes it and
//! can be removed either exactly (all tags must match) or partially (any tag
//! matches). Full pages and the response parts they embed are cached as a
//! hierarchy with independent lifetimes.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `pressroom.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! entry_limit = 500
//! default_expiration_secs = 300
//! default_revalidation_secs = 60
//! ```

mod config;
mod handle;
mod index;
mod lock;
mod store;
mod tag;
mod writer;

pub use config::CacheConfig;
pub use handle::CacheHandle;
pub use store::{CachedBody, ResponseCache, StartOutcome};
pub use tag::{CacheTag, CacheTagSet, TagValue, names as tag_names};
pub use writer::{PartOutcome, ResponseWriter};
