//! Date-keyed disk cache for fetch results
//!
//! Snapshots live under `<cache_root>/<YYYY>/<Month>/` as
//! `accounts_<date>.json` and `analytics_<start>_<end>.json`. Writes go
//! through a temporary file and a rename, so readers never observe a
//! partially written snapshot. There is no cross-process locking; one run
//! per reference date is assumed.

pub mod cached;
pub mod disk;

pub use cached::CachedSource;
pub use disk::{accounts_key, analytics_key, CacheError, DiskCache};
