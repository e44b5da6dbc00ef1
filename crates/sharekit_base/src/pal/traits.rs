use std::io::{Read, Seek, Write};
use std::sync::Arc;

use crate::ShareResult;

use super::content_uri::ContentUri;
use super::file_path::FilePath;

/// Authority of the platform media index.
pub const MEDIA_AUTHORITY: &str = "media";

/// Platform level a PAL reports unless configured otherwise.
pub const DEFAULT_SDK_LEVEL: u32 = 33;

/// Trait combining Read + Seek for file operations.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Media index collections that rows can be inserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCollection {
    /// Generic files, including downloads
    Files,
    /// Images
    Images,
}

impl MediaCollection {
    /// Base handle of the collection; inserted rows append their id to it.
    pub fn content_uri(self) -> ContentUri {
        let path = match self {
            MediaCollection::Files => "/external/file",
            MediaCollection::Images => "/external/images/media",
        };
        ContentUri::from_parts(MEDIA_AUTHORITY, path)
    }

    pub fn name(self) -> &'static str {
        match self {
            MediaCollection::Files => "files",
            MediaCollection::Images => "images",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "files" => Some(MediaCollection::Files),
            "images" => Some(MediaCollection::Images),
            _ => None,
        }
    }
}

/// Values of a new media index row.
///
/// A row either owns fresh storage below `relative_path` (the platform picks
/// the file and the caller writes through the returned handle) or registers an
/// existing file via `data_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub collection: MediaCollection,
    pub display_name: Option<String>,
    pub mime_type: Option<String>,
    pub relative_path: Option<String>,
    pub data_path: Option<FilePath>,
}

impl MediaEntry {
    pub fn new(collection: MediaCollection) -> Self {
        Self {
            collection,
            display_name: None,
            mime_type: None,
            relative_path: None,
            data_path: None,
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }

    pub fn relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = Some(relative_path.into());
        self
    }

    pub fn data_path(mut self, path: FilePath) -> Self {
        self.data_path = Some(path);
        self
    }
}

/// Readable content behind a handle, with the size the broker reported for it.
pub struct ContentStream {
    reader: Box<dyn Read + Send>,
    size_hint: Option<u64>,
}

impl ContentStream {
    pub fn new(reader: Box<dyn Read + Send>, size_hint: Option<u64>) -> Self {
        Self { reader, size_hint }
    }

    pub fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }
}

impl Read for ContentStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl std::fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStream")
            .field("size_hint", &self.size_hint)
            .finish_non_exhaustive()
    }
}

/* 📖 # Why is Pal a trait instead of a struct?

The resolver needs a content broker, a media index, storage roots and the
platform version. None of these exist on a desktop, and all of them are
awkward to control in tests. Behind a trait, MockPal serves deterministic
in-memory answers to unit tests while RealPal emulates the platform on disk.
*/

/// Platform Abstraction Layer (PAL) providing the file and content-broker
/// facilities the resolver orchestrates.
///
/// Two implementations are provided:
/// - `RealPal`: on-disk emulation rooted at a base directory
/// - `MockPal`: in-memory implementation for testing
pub trait Pal: std::fmt::Debug + Send + Sync + 'static {
    /// Platform API level, used to choose the public storage strategy.
    fn sdk_level(&self) -> u32;

    /// Root of the application's private cache.
    fn cache_dir(&self) -> FilePath;

    /// Root of the public downloads area.
    fn public_downloads_dir(&self) -> FilePath;

    /// Check if a file exists at the given path.
    fn file_exists(&self, path: &FilePath) -> ShareResult<bool>;

    /// Open a file for reading.
    fn read_file(&self, path: &FilePath) -> ShareResult<Box<dyn ReadSeek + Send + 'static>>;

    /// Read entire file contents.
    fn read_file_to_end(&self, path: &FilePath) -> ShareResult<Vec<u8>> {
        let mut reader = self.read_file(path)?;
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).map_err(|e| {
            Box::new(crate::ShareError::new(crate::ErrorKind::FileError {
                path: path.as_path().to_path_buf(),
                source: e,
            }))
        })?;
        Ok(contents)
    }

    /// Read entire file contents as a UTF-8 string.
    fn read_file_to_string(&self, path: &FilePath) -> ShareResult<String> {
        let contents = self.read_file_to_end(path)?;
        String::from_utf8(contents).map_err(|_e| crate::err!("File is not valid UTF-8: {}", path))
    }

    /// Create a new file, overwriting if it exists.
    fn create_file(&self, path: &FilePath) -> ShareResult<Box<dyn Write + Send>>;

    /// Create a file that does not exist yet.
    ///
    /// The existence check and the creation are one step: when the path is
    /// taken this fails with a `FileError` of kind `AlreadyExists`, so two
    /// callers can never both claim the same file.
    fn create_new_file(&self, path: &FilePath) -> ShareResult<Box<dyn Write + Send>>;

    /// Remove a file.
    fn remove_file(&self, path: &FilePath) -> ShareResult<()>;

    /// Create a directory and all parent directories.
    fn create_directory_all(&self, path: &FilePath) -> ShareResult<()>;

    /// Look up the display name the media index holds for a handle.
    ///
    /// Returns `Ok(None)` when the broker knows no name for it.
    fn query_display_name(&self, uri: &ContentUri) -> ShareResult<Option<String>>;

    /// Open the content behind a handle for reading.
    fn open_content(&self, uri: &ContentUri) -> ShareResult<ContentStream>;

    /// Open the content behind a handle for writing, replacing what was there.
    fn open_content_output(&self, uri: &ContentUri) -> ShareResult<Box<dyn Write + Send>>;

    /// Insert a new media index row and return its handle.
    fn insert_media_entry(&self, entry: &MediaEntry) -> ShareResult<ContentUri>;

    /// Remove a media index row.
    ///
    /// A file the row was given at insert time goes with it; a file
    /// registered through `data_path` is left alone.
    fn delete_content(&self, uri: &ContentUri) -> ShareResult<()>;
}

/// Handle to a PAL implementation, enabling shared ownership across threads.
///
/// # Examples
///
/// ```
/// use sharekit_base::{MockPal, PalHandle};
///
/// let pal = PalHandle::new(MockPal::new());
/// let worker_pal = pal.clone();
/// assert_eq!(pal.sdk_level(), worker_pal.sdk_level());
/// ```
#[derive(Debug, Clone)]
pub struct PalHandle(Arc<dyn Pal>);

impl PalHandle {
    pub fn new(pal: impl Pal + 'static) -> Self {
        Self(Arc::new(pal))
    }
}

impl std::ops::Deref for PalHandle {
    type Target = dyn Pal;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}
