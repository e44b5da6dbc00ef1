use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::error::ErrorKind;
use crate::{ShareError, ShareResult};

use super::traits::{ContentStream, DEFAULT_SDK_LEVEL, MediaEntry, Pal, ReadSeek};
use super::{ContentUri, FilePath};

/// Private cache root reported by MockPal.
pub const MOCK_CACHE_DIR: &str = "data/cache";
/// Public downloads root reported by MockPal.
pub const MOCK_DOWNLOADS_DIR: &str = "storage/Download";

const FIRST_ROW_ID: u64 = 1000;

/* 📖 # Why does MockPal keep files and content rows apart?

On the platform, a plain file and a content handle are different worlds: the
first is opened through the filesystem, the second through the broker. MockPal
keeps a file table and a content table so tests observe exactly which world an
operation touched. Rows registered with a data path read and write through the
file table, mirroring how the media index points at files on disk.
*/

/// In-memory PAL implementation for testing.
///
/// Besides serving the `Pal` operations, MockPal exposes helpers to seed
/// content, inspect inserted media rows and inject broker failures.
///
/// # Examples
///
/// ```
/// use sharekit_base::{ContentUri, MockPal, Pal};
///
/// let mock = MockPal::new();
/// let uri = ContentUri::parse("content://media/external/images/media/1").unwrap();
/// mock.add_content(uri.clone(), Some("cat.png"), b"png".to_vec());
/// assert_eq!(mock.query_display_name(&uri).unwrap().as_deref(), Some("cat.png"));
/// ```
#[derive(Debug, Clone)]
pub struct MockPal {
    state: Arc<Mutex<MockState>>,
    sdk_level: Arc<AtomicU32>,
}

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<FilePath, Vec<u8>>,
    directories: HashSet<FilePath>,
    content: BTreeMap<ContentUri, MockContent>,
    inserted: Vec<(ContentUri, MediaEntry)>,
    unreadable: HashSet<ContentUri>,
    fail_inserts: bool,
    fail_content_writes: bool,
    fail_file_writes: bool,
    next_row_id: u64,
}

#[derive(Debug, Clone, Default)]
struct MockContent {
    display_name: Option<String>,
    bytes: Vec<u8>,
    data_path: Option<FilePath>,
}

impl MockPal {
    /// Create a new empty MockPal.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_row_id: FIRST_ROW_ID,
                ..MockState::default()
            })),
            sdk_level: Arc::new(AtomicU32::new(DEFAULT_SDK_LEVEL)),
        }
    }

    pub fn with_sdk_level(self, level: u32) -> Self {
        self.set_sdk_level(level);
        self
    }

    pub fn set_sdk_level(&self, level: u32) {
        self.sdk_level.store(level, Ordering::SeqCst);
    }

    /// Add a file to the mock storage.
    pub fn add_file(&self, path: FilePath, content: Vec<u8>) {
        self.state.lock().files.insert(path, content);
    }

    pub fn file_content(&self, path: &FilePath) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.state.lock().files.len()
    }

    pub fn has_directory(&self, path: &FilePath) -> bool {
        self.state.lock().directories.contains(path)
    }

    /// Register content behind a handle, optionally with an indexed display name.
    pub fn add_content(&self, uri: ContentUri, display_name: Option<&str>, bytes: Vec<u8>) {
        self.state.lock().content.insert(
            uri,
            MockContent {
                display_name: display_name.map(str::to_string),
                bytes,
                data_path: None,
            },
        );
    }

    /// Bytes currently readable through a handle.
    pub fn content_bytes(&self, uri: &ContentUri) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let row = state.content.get(uri)?;
        match &row.data_path {
            Some(path) => state.files.get(path).cloned(),
            None => Some(row.bytes.clone()),
        }
    }

    /// Media rows inserted through `insert_media_entry`, in insertion order.
    pub fn media_entries(&self) -> Vec<(ContentUri, MediaEntry)> {
        self.state.lock().inserted.clone()
    }

    /// Make every open of the handle fail as if the broker denied access.
    pub fn make_unreadable(&self, uri: ContentUri) {
        self.state.lock().unreadable.insert(uri);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.state.lock().fail_inserts = fail;
    }

    pub fn fail_content_writes(&self, fail: bool) {
        self.state.lock().fail_content_writes = fail;
    }

    /// Make every write to a plain file fail as if the disk were full.
    pub fn fail_file_writes(&self, fail: bool) {
        self.state.lock().fail_file_writes = fail;
    }

    fn file_error(path: &FilePath, kind: std::io::ErrorKind, message: String) -> Box<ShareError> {
        Box::new(ShareError::new(ErrorKind::FileError {
            path: path.as_path().to_path_buf(),
            source: std::io::Error::new(kind, message),
        }))
    }

    fn source_unreadable(uri: &ContentUri, kind: std::io::ErrorKind, message: &str) -> Box<ShareError> {
        Box::new(ShareError::new(ErrorKind::SourceUnreadable {
            handle: uri.to_string(),
            source: Some(std::io::Error::new(kind, message.to_string())),
        }))
    }
}

impl Default for MockPal {
    fn default() -> Self {
        Self::new()
    }
}

impl Pal for MockPal {
    fn sdk_level(&self) -> u32 {
        self.sdk_level.load(Ordering::SeqCst)
    }

    fn cache_dir(&self) -> FilePath {
        FilePath::from(MOCK_CACHE_DIR)
    }

    fn public_downloads_dir(&self) -> FilePath {
        FilePath::from(MOCK_DOWNLOADS_DIR)
    }

    fn file_exists(&self, path: &FilePath) -> ShareResult<bool> {
        Ok(self.state.lock().files.contains_key(path))
    }

    fn read_file(&self, path: &FilePath) -> ShareResult<Box<dyn ReadSeek + Send + 'static>> {
        let state = self.state.lock();
        let content = state
            .files
            .get(path)
            .ok_or_else(|| {
                Self::file_error(
                    path,
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                )
            })?
            .clone();
        Ok(Box::new(Cursor::new(content)))
    }

    fn create_file(&self, path: &FilePath) -> ShareResult<Box<dyn Write + Send>> {
        Ok(Box::new(MockWriter {
            target: WriteTarget::File(path.clone()),
            state: Arc::clone(&self.state),
            buffer: Vec::new(),
        }))
    }

    fn create_new_file(&self, path: &FilePath) -> ShareResult<Box<dyn Write + Send>> {
        let mut state = self.state.lock();
        if state.files.contains_key(path) {
            return Err(Self::file_error(
                path,
                std::io::ErrorKind::AlreadyExists,
                format!("File exists: {}", path),
            ));
        }
        state.files.insert(path.clone(), Vec::new());
        Ok(Box::new(MockWriter {
            target: WriteTarget::File(path.clone()),
            state: Arc::clone(&self.state),
            buffer: Vec::new(),
        }))
    }

    fn remove_file(&self, path: &FilePath) -> ShareResult<()> {
        match self.state.lock().files.remove(path) {
            Some(_) => Ok(()),
            None => Err(Self::file_error(
                path,
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path),
            )),
        }
    }

    fn create_directory_all(&self, path: &FilePath) -> ShareResult<()> {
        self.state.lock().directories.insert(path.clone());
        Ok(())
    }

    fn query_display_name(&self, uri: &ContentUri) -> ShareResult<Option<String>> {
        let state = self.state.lock();
        Ok(state.content.get(uri).and_then(|row| {
            row.display_name.clone().or_else(|| {
                row.data_path
                    .as_ref()
                    .and_then(|path| path.file_name().map(str::to_string))
            })
        }))
    }

    fn open_content(&self, uri: &ContentUri) -> ShareResult<ContentStream> {
        let state = self.state.lock();
        if state.unreadable.contains(uri) {
            return Err(Self::source_unreadable(
                uri,
                std::io::ErrorKind::PermissionDenied,
                "access denied by broker",
            ));
        }
        let row = state.content.get(uri).ok_or_else(|| {
            Self::source_unreadable(uri, std::io::ErrorKind::NotFound, "no such content")
        })?;
        let bytes = match &row.data_path {
            Some(path) => state.files.get(path).cloned().ok_or_else(|| {
                Self::source_unreadable(uri, std::io::ErrorKind::NotFound, "backing file missing")
            })?,
            None => row.bytes.clone(),
        };
        let size = bytes.len() as u64;
        Ok(ContentStream::new(Box::new(Cursor::new(bytes)), Some(size)))
    }

    fn open_content_output(&self, uri: &ContentUri) -> ShareResult<Box<dyn Write + Send>> {
        let state = self.state.lock();
        let destination_error = |message: &str| {
            Box::new(ShareError::new(ErrorKind::DestinationWriteFailed {
                destination: uri.to_string(),
                source: Some(std::io::Error::other(message.to_string())),
            }))
        };
        if state.fail_content_writes {
            return Err(destination_error("broker refused output stream"));
        }
        let row = state
            .content
            .get(uri)
            .ok_or_else(|| destination_error("no such content"))?;
        let target = match &row.data_path {
            Some(path) => WriteTarget::File(path.clone()),
            None => WriteTarget::Content(uri.clone()),
        };
        Ok(Box::new(MockWriter {
            target,
            state: Arc::clone(&self.state),
            buffer: Vec::new(),
        }))
    }

    fn insert_media_entry(&self, entry: &MediaEntry) -> ShareResult<ContentUri> {
        let mut state = self.state.lock();
        let collection_uri = entry.collection.content_uri();
        if state.fail_inserts {
            return Err(Box::new(ShareError::new(
                ErrorKind::DestinationWriteFailed {
                    destination: collection_uri.to_string(),
                    source: None,
                },
            )));
        }
        let uri = collection_uri.with_appended_id(state.next_row_id);
        state.next_row_id += 1;
        state.content.insert(
            uri.clone(),
            MockContent {
                display_name: entry.display_name.clone(),
                bytes: Vec::new(),
                data_path: entry.data_path.clone(),
            },
        );
        state.inserted.push((uri.clone(), entry.clone()));
        Ok(uri)
    }

    fn delete_content(&self, uri: &ContentUri) -> ShareResult<()> {
        let mut state = self.state.lock();
        if state.content.remove(uri).is_none() {
            return Err(crate::err!("No content row for {}", uri));
        }
        state.inserted.retain(|(inserted, _)| inserted != uri);
        Ok(())
    }
}

#[derive(Debug)]
enum WriteTarget {
    File(FilePath),
    Content(ContentUri),
}

/// Buffers writes and publishes them to the mock state on flush and drop.
struct MockWriter {
    target: WriteTarget,
    state: Arc<Mutex<MockState>>,
    buffer: Vec<u8>,
}

impl MockWriter {
    fn publish(&self) {
        let mut state = self.state.lock();
        match &self.target {
            WriteTarget::File(path) => {
                state.files.insert(path.clone(), self.buffer.clone());
            }
            WriteTarget::Content(uri) => {
                if let Some(row) = state.content.get_mut(uri) {
                    row.bytes = self.buffer.clone();
                }
            }
        }
    }
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if matches!(self.target, WriteTarget::File(_)) && self.state.lock().fail_file_writes {
            return Err(std::io::Error::other("no space left on device"));
        }
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for MockWriter {
    fn drop(&mut self) {
        self.publish();
    }
}
