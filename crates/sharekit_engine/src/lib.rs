pub mod cancel;
pub mod config;
pub mod location;
pub mod mime;
pub mod resolver;
pub mod share;
pub mod storage;
pub mod worker;

pub use cancel::CancellationToken;
pub use config::{DEFAULT_DEMO_IDENTIFIER, ResolverConfig, load_config, parse_config};
pub use location::Location;
pub use mime::guess_mime_type;
pub use resolver::{FileResolver, ResolvedFile};
pub use share::{ShareIntent, ShareLauncher, ShareScreen, ShareState};
pub use storage::{LegacyDownloadsStorage, PublicStorage, ScopedMediaStorage, select_public_storage};
pub use worker::{ResolveTask, ResolverWorker};
