//! Platform-independent core of Remapper: the pattern matcher (A), the
//! hardened-binary cache (D), the shebang pre-resolver (E), the injection
//! loader (F), and shared context/utilities (H).
//!
//! `remapper-interpose` links this crate and supplies only the thin
//! `unsafe extern "C"` symbol table that the dynamic linker actually calls;
//! everything that decides *what to do* lives here in safe Rust.

pub mod cache;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod shebang;
pub mod util;

pub use cache::{CacheContext, HardenedState, InProcessCache};
pub use error::{CacheError, LoaderError};
pub use loader::{init, Runtime};
pub use matcher::{rewrite_into, REWRITE_BUF_LEN};
pub use shebang::{resolve_shebang, ShebangSubstitution, DEFAULT_PROTECTED_PREFIXES};
