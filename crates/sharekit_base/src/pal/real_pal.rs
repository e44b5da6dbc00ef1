use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{ShareError, ShareResult, error::ErrorKind};

use super::traits::{
    ContentStream, DEFAULT_SDK_LEVEL, MEDIA_AUTHORITY, MediaCollection, MediaEntry, Pal, ReadSeek,
};
use super::{ContentUri, FilePath};

const CACHE_DIR: &str = "data/cache";
const STORAGE_ROOT: &str = "storage";
const DOWNLOADS_DIR: &str = "storage/Download";
const INDEX_FILE: &str = ".media/index.json";
const BLOB_DIR: &str = ".media/blobs";
const FIRST_ROW_ID: u64 = 1;

/* 📖 # How does RealPal emulate the media index on disk?

Everything lives below the base directory:

- `data/cache` is the private cache
- `storage/Download` is the public downloads area
- `.media/index.json` holds the media rows, keyed by the numeric id that ends
  every handle (`content://media/external/file/<id>`)

A row always points at a file on disk. Rows inserted with a relative path get
a fresh file below `storage/<relative path>`; clashing names receive a
` (n)` suffix the way the platform does. Rows registered with a data path point
at that existing file. Rows with neither get an anonymous blob in `.media/blobs`.

New files are always created with `create_new`, so a name that a concurrent
plain-file copy claimed in the meantime is skipped instead of shared.
*/

/// PAL implementation emulating the platform on the real filesystem.
///
/// All paths resolve below the base directory. The media index is persisted
/// as JSON, so handles issued by one RealPal stay valid for the next one
/// rooted at the same directory.
#[derive(Debug)]
pub struct RealPal {
    base_dir: PathBuf,
    sdk_level: u32,
    index_lock: Mutex<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MediaIndex {
    next_id: u64,
    rows: BTreeMap<u64, MediaRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MediaRow {
    collection: String,
    display_name: Option<String>,
    mime_type: Option<String>,
    relative_path: Option<String>,
    data: String,
    /// Whether `data` was created for this row and is removed with it.
    #[serde(default)]
    owns_data: bool,
}

impl RealPal {
    /// Create a new RealPal rooted at the given base directory.
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            sdk_level: DEFAULT_SDK_LEVEL,
            index_lock: Mutex::new(()),
        }
    }

    pub fn with_sdk_level(mut self, level: u32) -> Self {
        self.sdk_level = level;
        self
    }

    pub fn base_dir(&self) -> &std::path::Path {
        &self.base_dir
    }

    fn resolve_path(&self, path: &FilePath) -> PathBuf {
        path.to_path(&self.base_dir)
    }

    fn file_error(path: PathBuf, source: std::io::Error) -> Box<ShareError> {
        Box::new(ShareError::new(ErrorKind::FileError { path, source }))
    }

    fn load_index(&self) -> ShareResult<MediaIndex> {
        let path = self.resolve_path(&FilePath::from(INDEX_FILE));
        if !path.exists() {
            return Ok(MediaIndex {
                next_id: FIRST_ROW_ID,
                rows: BTreeMap::new(),
            });
        }
        let raw = fs::read(&path).map_err(|e| Self::file_error(path.clone(), e))?;
        serde_json::from_slice(&raw).map_err(|e| {
            crate::err!("Media index at {} is corrupt: {}", path.display(), e)
        })
    }

    fn store_index(&self, index: &MediaIndex) -> ShareResult<()> {
        let path = self.resolve_path(&FilePath::from(INDEX_FILE));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Self::file_error(parent.to_path_buf(), e))?;
        }
        let raw = serde_json::to_vec_pretty(index)
            .map_err(|e| crate::err!("Failed to serialize media index: {}", e))?;
        fs::write(&path, raw).map_err(|e| Self::file_error(path, e))
    }

    /// Looks up the row behind a media handle; foreign authorities have no row.
    fn find_row(&self, uri: &ContentUri) -> ShareResult<Option<MediaRow>> {
        if uri.authority() != MEDIA_AUTHORITY {
            return Ok(None);
        }
        let Some(id) = uri.row_id() else {
            return Ok(None);
        };
        let _guard = self.index_lock.lock();
        Ok(self.load_index()?.rows.get(&id).cloned())
    }

    /// Creates `dir/name`, or `dir/stem (n).ext` for the smallest `n` that is
    /// neither on disk nor claimed by a row.
    fn create_unique_file(
        &self,
        dir: &FilePath,
        name: &str,
        index: &MediaIndex,
    ) -> ShareResult<FilePath> {
        let (stem, extension) = match name.rfind('.') {
            Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
            _ => (name, ""),
        };
        let resolved_dir = self.resolve_path(dir);
        fs::create_dir_all(&resolved_dir).map_err(|e| Self::file_error(resolved_dir, e))?;
        let mut candidate = name.to_string();
        let mut counter = 1;
        loop {
            let path = dir.join(&candidate);
            let claimed = index.rows.values().any(|row| row.data == path.to_string());
            if !claimed {
                match self.create_new_file(&path) {
                    Ok(_) => return Ok(path),
                    Err(e) if e.is_already_exists() => {}
                    Err(e) => return Err(e),
                }
            }
            candidate = format!("{} ({}){}", stem, counter, extension);
            counter += 1;
        }
    }

    /// Returns the row's file and whether the row owns it.
    fn allocate_data_file(
        &self,
        id: u64,
        entry: &MediaEntry,
        index: &MediaIndex,
    ) -> ShareResult<(FilePath, bool)> {
        match (&entry.data_path, &entry.relative_path) {
            (Some(path), _) => Ok((path.clone(), false)),
            (None, Some(relative_path)) => {
                let dir = FilePath::from(STORAGE_ROOT).join(relative_path);
                let name = entry
                    .display_name
                    .clone()
                    .unwrap_or_else(|| id.to_string());
                Ok((self.create_unique_file(&dir, &name, index)?, true))
            }
            (None, None) => {
                let data = FilePath::from(BLOB_DIR).join(&id.to_string());
                let resolved = self.resolve_path(&data);
                if let Some(parent) = resolved.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| Self::file_error(parent.to_path_buf(), e))?;
                }
                fs::File::create(&resolved).map_err(|e| Self::file_error(resolved.clone(), e))?;
                Ok((data, true))
            }
        }
    }
}

impl Pal for RealPal {
    fn sdk_level(&self) -> u32 {
        self.sdk_level
    }

    fn cache_dir(&self) -> FilePath {
        FilePath::from(CACHE_DIR)
    }

    fn public_downloads_dir(&self) -> FilePath {
        FilePath::from(DOWNLOADS_DIR)
    }

    #[instrument(skip(self), fields(path = %path))]
    fn file_exists(&self, path: &FilePath) -> ShareResult<bool> {
        let resolved = self.resolve_path(path);
        let exists = resolved.is_file();
        debug!(exists, resolved = %resolved.display(), "checked file existence");
        Ok(exists)
    }

    #[instrument(skip(self), fields(path = %path))]
    fn read_file(&self, path: &FilePath) -> ShareResult<Box<dyn ReadSeek + Send + 'static>> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "opening file for reading");
        let file = fs::File::open(&resolved).map_err(|e| {
            debug!(error = %e, "failed to open file");
            Self::file_error(resolved, e)
        })?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self), fields(path = %path))]
    fn create_file(&self, path: &FilePath) -> ShareResult<Box<dyn Write + Send>> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "creating file");
        let file = fs::File::create(&resolved).map_err(|e| {
            debug!(error = %e, "failed to create file");
            Self::file_error(resolved, e)
        })?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self), fields(path = %path))]
    fn create_new_file(&self, path: &FilePath) -> ShareResult<Box<dyn Write + Send>> {
        let resolved = self.resolve_path(path);
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&resolved)
            .map_err(|e| {
                debug!(error = %e, "failed to create new file");
                Self::file_error(resolved, e)
            })?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self), fields(path = %path))]
    fn remove_file(&self, path: &FilePath) -> ShareResult<()> {
        let resolved = self.resolve_path(path);
        fs::remove_file(&resolved).map_err(|e| Self::file_error(resolved, e))
    }

    #[instrument(skip(self), fields(path = %path))]
    fn create_directory_all(&self, path: &FilePath) -> ShareResult<()> {
        let resolved = self.resolve_path(path);
        fs::create_dir_all(&resolved).map_err(|e| {
            debug!(error = %e, "failed to create directory");
            Self::file_error(resolved, e)
        })
    }

    #[instrument(skip(self), fields(uri = %uri))]
    fn query_display_name(&self, uri: &ContentUri) -> ShareResult<Option<String>> {
        let name = self.find_row(uri)?.and_then(|row| {
            row.display_name.or_else(|| {
                FilePath::from(row.data.as_str())
                    .file_name()
                    .map(str::to_string)
            })
        });
        debug!(name = ?name, "queried display name");
        Ok(name)
    }

    #[instrument(skip(self), fields(uri = %uri))]
    fn open_content(&self, uri: &ContentUri) -> ShareResult<ContentStream> {
        let unreadable = |source: std::io::Error| {
            Box::new(ShareError::new(ErrorKind::SourceUnreadable {
                handle: uri.to_string(),
                source: Some(source),
            }))
        };
        let row = self.find_row(uri)?.ok_or_else(|| {
            unreadable(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no media row for handle",
            ))
        })?;
        let resolved = self.resolve_path(&FilePath::from(row.data.as_str()));
        let file = fs::File::open(&resolved).map_err(unreadable)?;
        let size = file.metadata().map(|meta| meta.len()).ok();
        debug!(resolved = %resolved.display(), size = ?size, "opened content");
        Ok(ContentStream::new(Box::new(file), size))
    }

    #[instrument(skip(self), fields(uri = %uri))]
    fn open_content_output(&self, uri: &ContentUri) -> ShareResult<Box<dyn Write + Send>> {
        let write_failed = |source: std::io::Error| {
            Box::new(ShareError::new(ErrorKind::DestinationWriteFailed {
                destination: uri.to_string(),
                source: Some(source),
            }))
        };
        let row = self.find_row(uri)?.ok_or_else(|| {
            write_failed(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no media row for handle",
            ))
        })?;
        let resolved = self.resolve_path(&FilePath::from(row.data.as_str()));
        let file = fs::File::create(&resolved).map_err(write_failed)?;
        debug!(resolved = %resolved.display(), "opened content for writing");
        Ok(Box::new(file))
    }

    #[instrument(skip(self, entry), fields(collection = entry.collection.name()))]
    fn insert_media_entry(&self, entry: &MediaEntry) -> ShareResult<ContentUri> {
        let _guard = self.index_lock.lock();
        let collection_uri = entry.collection.content_uri();
        let insert_failed = |error: Box<ShareError>| {
            Box::new(
                ShareError::new(ErrorKind::DestinationWriteFailed {
                    destination: collection_uri.to_string(),
                    source: None,
                })
                .caused_by(error),
            )
        };

        let mut index = self.load_index().map_err(&insert_failed)?;
        let id = index.next_id.max(FIRST_ROW_ID);
        let (data, owns_data) = self
            .allocate_data_file(id, entry, &index)
            .map_err(&insert_failed)?;
        index.rows.insert(
            id,
            MediaRow {
                collection: entry.collection.name().to_string(),
                display_name: entry.display_name.clone(),
                mime_type: entry.mime_type.clone(),
                relative_path: entry.relative_path.clone(),
                data: data.to_string(),
                owns_data,
            },
        );
        index.next_id = id + 1;
        self.store_index(&index).map_err(&insert_failed)?;

        let uri = collection_uri.with_appended_id(id);
        debug!(uri = %uri, data = %data, "inserted media row");
        Ok(uri)
    }

    #[instrument(skip(self), fields(uri = %uri))]
    fn delete_content(&self, uri: &ContentUri) -> ShareResult<()> {
        let _guard = self.index_lock.lock();
        let row = match uri.row_id() {
            Some(id) if uri.authority() == MEDIA_AUTHORITY => {
                let mut index = self.load_index()?;
                let row = index.rows.remove(&id);
                if row.is_some() {
                    self.store_index(&index)?;
                }
                row
            }
            _ => None,
        };
        let Some(row) = row else {
            crate::bail!("No media row for {}", uri);
        };
        if row.owns_data {
            let resolved = self.resolve_path(&FilePath::from(row.data.as_str()));
            match fs::remove_file(&resolved) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Self::file_error(resolved, e)),
            }
        }
        debug!(data = %row.data, removed_data = row.owns_data, "deleted media row");
        Ok(())
    }
}

impl RealPal {
    /// Collection a handle's row was inserted into, if the row exists.
    pub fn row_collection(&self, uri: &ContentUri) -> ShareResult<Option<MediaCollection>> {
        Ok(self
            .find_row(uri)?
            .and_then(|row| MediaCollection::from_name(&row.collection)))
    }

    /// File backing a handle's row, if the row exists.
    pub fn row_data_path(&self, uri: &ContentUri) -> ShareResult<Option<FilePath>> {
        Ok(self
            .find_row(uri)?
            .map(|row| FilePath::from(row.data.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn setup_test_dir() -> (TempDir, RealPal) {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let pal = RealPal::new(temp_dir.path().to_path_buf());
        (temp_dir, pal)
    }

    fn read_content(pal: &RealPal, uri: &ContentUri) -> Vec<u8> {
        let mut bytes = Vec::new();
        pal.open_content(uri)
            .unwrap()
            .read_to_end(&mut bytes)
            .unwrap();
        bytes
    }

    #[test]
    fn test_file_exists() {
        let (temp_dir, pal) = setup_test_dir();
        fs::write(temp_dir.path().join("a.txt"), "content").unwrap();

        assert!(pal.file_exists(&FilePath::from("a.txt")).unwrap());
        assert!(!pal.file_exists(&FilePath::from("b.txt")).unwrap());
    }

    #[test]
    fn test_create_and_read_file() {
        let (temp_dir, pal) = setup_test_dir();
        pal.create_directory_all(&pal.cache_dir()).unwrap();
        let path = pal.cache_dir().join("new.txt");
        {
            let mut writer = pal.create_file(&path).unwrap();
            writer.write_all(b"test content").unwrap();
        }

        let on_disk = fs::read_to_string(temp_dir.path().join("data/cache/new.txt")).unwrap();
        assert_eq!(on_disk, "test content");
        assert_eq!(pal.read_file_to_string(&path).unwrap(), "test content");
    }

    #[test]
    fn test_insert_with_relative_path_creates_public_file() {
        let (temp_dir, pal) = setup_test_dir();
        let entry = MediaEntry::new(MediaCollection::Files)
            .display_name("a.png")
            .mime_type(Some("image/png".to_string()))
            .relative_path("Download/Demo");

        let uri = pal.insert_media_entry(&entry).unwrap();
        assert_eq!(uri.to_string(), "content://media/external/file/1");
        assert!(temp_dir.path().join("storage/Download/Demo/a.png").is_file());

        {
            let mut writer = pal.open_content_output(&uri).unwrap();
            writer.write_all(b"pixels").unwrap();
        }
        assert_eq!(read_content(&pal, &uri), b"pixels");
        assert_eq!(
            pal.query_display_name(&uri).unwrap().as_deref(),
            Some("a.png")
        );
    }

    #[test]
    fn test_clashing_names_get_suffix() {
        let (_temp_dir, pal) = setup_test_dir();
        let entry = MediaEntry::new(MediaCollection::Files)
            .display_name("a.png")
            .relative_path("Download/Demo");

        let first = pal.insert_media_entry(&entry).unwrap();
        let second = pal.insert_media_entry(&entry).unwrap();

        assert_ne!(first, second);
        assert_eq!(
            pal.row_data_path(&second).unwrap(),
            Some(FilePath::from("storage/Download/Demo/a (1).png"))
        );
    }

    #[test]
    fn test_insert_with_data_path_registers_existing_file() {
        let (temp_dir, pal) = setup_test_dir();
        fs::create_dir_all(temp_dir.path().join("storage/Download/Demo")).unwrap();
        fs::write(temp_dir.path().join("storage/Download/Demo/b.jpg"), b"jpeg").unwrap();

        let uri = pal
            .insert_media_entry(
                &MediaEntry::new(MediaCollection::Images)
                    .data_path(FilePath::from("storage/Download/Demo/b.jpg")),
            )
            .unwrap();

        assert_eq!(uri.to_string(), "content://media/external/images/media/1");
        assert_eq!(read_content(&pal, &uri), b"jpeg");
        assert_eq!(
            pal.row_collection(&uri).unwrap(),
            Some(MediaCollection::Images)
        );
        assert_eq!(
            pal.query_display_name(&uri).unwrap().as_deref(),
            Some("b.jpg")
        );
    }

    #[test]
    fn test_insert_skips_file_created_by_plain_copy() {
        let (temp_dir, pal) = setup_test_dir();
        fs::create_dir_all(temp_dir.path().join("storage/Download/Demo")).unwrap();
        fs::write(temp_dir.path().join("storage/Download/Demo/a.png"), b"legacy").unwrap();

        let uri = pal
            .insert_media_entry(
                &MediaEntry::new(MediaCollection::Files)
                    .display_name("a.png")
                    .relative_path("Download/Demo"),
            )
            .unwrap();

        assert_eq!(
            pal.row_data_path(&uri).unwrap(),
            Some(FilePath::from("storage/Download/Demo/a (1).png"))
        );
        let untouched = fs::read(temp_dir.path().join("storage/Download/Demo/a.png")).unwrap();
        assert_eq!(untouched, b"legacy");
    }

    #[test]
    fn test_create_new_file_refuses_existing_path() {
        let (temp_dir, pal) = setup_test_dir();
        fs::write(temp_dir.path().join("a.txt"), "content").unwrap();

        let err = pal.create_new_file(&FilePath::from("a.txt")).err().unwrap();
        assert!(err.is_already_exists());
        assert!(pal.create_new_file(&FilePath::from("b.txt")).is_ok());
    }

    #[test]
    fn test_remove_file() {
        let (temp_dir, pal) = setup_test_dir();
        fs::write(temp_dir.path().join("a.txt"), "content").unwrap();

        pal.remove_file(&FilePath::from("a.txt")).unwrap();
        assert!(!temp_dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_delete_content_removes_owned_file() {
        let (temp_dir, pal) = setup_test_dir();
        let uri = pal
            .insert_media_entry(
                &MediaEntry::new(MediaCollection::Files)
                    .display_name("a.png")
                    .relative_path("Download/Demo"),
            )
            .unwrap();
        assert!(temp_dir.path().join("storage/Download/Demo/a.png").is_file());

        pal.delete_content(&uri).unwrap();

        assert!(!temp_dir.path().join("storage/Download/Demo/a.png").exists());
        assert_eq!(pal.query_display_name(&uri).unwrap(), None);
        assert!(pal.delete_content(&uri).is_err());
    }

    #[test]
    fn test_delete_content_keeps_registered_file() {
        let (temp_dir, pal) = setup_test_dir();
        fs::write(temp_dir.path().join("b.jpg"), b"jpeg").unwrap();
        let uri = pal
            .insert_media_entry(
                &MediaEntry::new(MediaCollection::Images).data_path(FilePath::from("b.jpg")),
            )
            .unwrap();

        pal.delete_content(&uri).unwrap();

        assert!(temp_dir.path().join("b.jpg").is_file());
        assert_eq!(pal.row_data_path(&uri).unwrap(), None);
    }

    #[test]
    fn test_index_survives_new_instance() {
        let (temp_dir, pal) = setup_test_dir();
        let uri = pal
            .insert_media_entry(&MediaEntry::new(MediaCollection::Files).display_name("x.txt"))
            .unwrap();

        let reopened = RealPal::new(temp_dir.path().to_path_buf());
        assert_eq!(
            reopened.query_display_name(&uri).unwrap().as_deref(),
            Some("x.txt")
        );
    }

    #[test]
    fn test_unknown_handle() {
        let (_temp_dir, pal) = setup_test_dir();
        let uri = ContentUri::parse("content://media/external/file/42").unwrap();
        assert_eq!(pal.query_display_name(&uri).unwrap(), None);
        let err = pal.open_content(&uri).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SourceUnreadable { .. }));
    }

    #[test]
    fn test_foreign_authority_has_no_row() {
        let (_temp_dir, pal) = setup_test_dir();
        let uri = ContentUri::parse("content://com.example.docs/1").unwrap();
        assert_eq!(pal.query_display_name(&uri).unwrap(), None);
    }

    #[test]
    fn test_sdk_level() {
        let (_temp_dir, pal) = setup_test_dir();
        assert_eq!(pal.sdk_level(), DEFAULT_SDK_LEVEL);
        assert_eq!(pal.with_sdk_level(28).sdk_level(), 28);
    }
}
