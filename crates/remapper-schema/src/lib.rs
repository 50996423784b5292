//! Types shared by every Remapper crate: the mapping table that drives path
//! rewriting, the mappings-string wire format, and the on-disk cache
//! metadata sidecar format.
//!
//! Nothing here is platform-specific; this crate compiles on any target so
//! that both the injected interposer and the front-end CLI depend on a
//! single definition of "what a mapping is".

mod cache_meta;
mod mapping;

pub use cache_meta::{CacheMeta, CacheMetaError};
pub use mapping::{Mapping, MappingError, MappingTable, MAX_COMPONENT_LEN, MAX_GLOB_LEN, MAX_MAPPINGS};
