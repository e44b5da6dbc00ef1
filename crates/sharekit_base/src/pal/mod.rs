/* 📖 # What is the Platform Abstraction Layer?

The PAL is the single seam between the resolver and the platform. The content
broker, the media index, the private cache and public download roots, and the
platform version flag are all reached through the `Pal` trait, so the resolver
never touches `std::fs` or a platform binding directly.
*/

mod content_uri;
mod file_path;
pub mod mock;
pub mod real_pal;
mod traits;

pub use content_uri::{CONTENT_SCHEME, ContentUri, is_content_handle};
pub use file_path::FilePath;
pub use mock::MockPal;
pub use real_pal::RealPal;
pub use traits::{
    ContentStream, DEFAULT_SDK_LEVEL, MEDIA_AUTHORITY, MediaCollection, MediaEntry, Pal, PalHandle, ReadSeek,
};
