/* 📖 # Why are the two public storage strategies objects?

Newer platforms only let applications publish files through media inserts,
older ones expect a plain file below the public downloads folder. The
platform level does not change while the process runs, so the strategy is
picked once when the resolver is built instead of re-checking the level on
every copy. Tests can also hand the resolver either strategy directly.
*/

use std::fmt::Debug;

use tracing::{debug, instrument};

use sharekit_base::{
    ErrorKind, FilePath, MediaCollection, MediaEntry, PalHandle, ResultExt, ShareError,
    ShareResult,
};

use crate::config::ResolverConfig;
use crate::location::Location;
use crate::mime::guess_mime_type;

/// Chooses where a public copy of a file goes.
pub trait PublicStorage: Debug + Send + Sync + 'static {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Creates a fresh public destination for a file with the given name.
    ///
    /// Each call yields a distinct destination, even for the same name and
    /// even when called from several threads at once. The destination exists
    /// when this returns; a caller that fails to fill it must remove it.
    fn create_destination(&self, pal: &PalHandle, display_name: &str) -> ShareResult<Location>;
}

/// Publishes through a media insert under `Download/<app folder>`.
#[derive(Debug, Clone)]
pub struct ScopedMediaStorage {
    relative_path: String,
}

impl ScopedMediaStorage {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            relative_path: config.public_relative_path(),
        }
    }
}

impl PublicStorage for ScopedMediaStorage {
    fn name(&self) -> &'static str {
        "scoped-media"
    }

    #[instrument(skip(self, pal))]
    fn create_destination(&self, pal: &PalHandle, display_name: &str) -> ShareResult<Location> {
        let entry = MediaEntry::new(MediaCollection::Files)
            .display_name(display_name)
            .mime_type(guess_mime_type(display_name))
            .relative_path(self.relative_path.as_str());
        let uri = pal
            .insert_media_entry(&entry)
            .with_context(|| format!("Publishing {} to {}", display_name, self.relative_path))?;
        debug!(uri = %uri, "created media destination");
        Ok(Location::Content(uri))
    }
}

/// Writes a plain file below `<public downloads>/<app folder>`.
#[derive(Debug, Clone)]
pub struct LegacyDownloadsStorage {
    app_folder: String,
}

impl LegacyDownloadsStorage {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            app_folder: config.app_folder.clone(),
        }
    }
}

impl PublicStorage for LegacyDownloadsStorage {
    fn name(&self) -> &'static str {
        "legacy-downloads"
    }

    #[instrument(skip(self, pal))]
    fn create_destination(&self, pal: &PalHandle, display_name: &str) -> ShareResult<Location> {
        let folder = pal.public_downloads_dir().join(&self.app_folder);
        pal.create_directory_all(&folder).map_err(|e| {
            Box::new(
                ShareError::new(ErrorKind::DestinationWriteFailed {
                    destination: folder.to_string(),
                    source: None,
                })
                .caused_by(e),
            )
        })?;
        let path = reserve_unique_file(pal, &folder, display_name).map_err(|e| {
            Box::new(
                ShareError::new(ErrorKind::DestinationWriteFailed {
                    destination: folder.join(display_name).to_string(),
                    source: None,
                })
                .caused_by(e),
            )
        })?;
        debug!(path = %path, "created download destination");
        Ok(Location::Path(path))
    }
}

/// Creates `folder/name`, or `folder/stem (n).ext` for the smallest `n` that
/// is still free, and returns the path it created.
///
/// Names are claimed with `Pal::create_new_file`, so a concurrent caller that
/// took a name first makes this one move on to the next suffix.
pub fn reserve_unique_file(
    pal: &PalHandle,
    folder: &FilePath,
    name: &str,
) -> ShareResult<FilePath> {
    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    let mut candidate = name.to_string();
    let mut counter = 1;
    loop {
        let path = folder.join(&candidate);
        match pal.create_new_file(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.is_already_exists() => {
                candidate = format!("{} ({}){}", stem, counter, extension);
                counter += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Picks the strategy matching the platform level.
pub fn select_public_storage(pal: &PalHandle, config: &ResolverConfig) -> Box<dyn PublicStorage> {
    let level = pal.sdk_level();
    let storage: Box<dyn PublicStorage> = if level >= config.scoped_storage_min_sdk {
        Box::new(ScopedMediaStorage::new(config))
    } else {
        Box::new(LegacyDownloadsStorage::new(config))
    };
    debug!(sdk_level = level, strategy = storage.name(), "selected public storage");
    storage
}
