/* 📖 # Why have sharekit_base as a core library?
sharekit_base owns the error type and the Platform Abstraction Layer. Every
platform facility the resolver touches (content broker, media index, storage
roots) is reached through it, which keeps the engine free of platform code
and prevents circular dependencies between crates.
*/

pub mod error;
pub mod pal;
mod pal_tests;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, ResultExt, ShareError, ShareResult};
pub use pal::{
    CONTENT_SCHEME, ContentUri, FilePath, MediaCollection, MediaEntry, MockPal, Pal, PalHandle,
    RealPal,
};
