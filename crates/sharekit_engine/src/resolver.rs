/* 📖 # What does the resolver do?

It turns any identifier into a handle another application can open:

1. A content handle is already shareable and is returned as-is.
2. A plain path names a private file. It is streamed, chunk by chunk, into a
   destination picked by the public storage strategy.
3. If that destination is itself a handle, it is returned. A plain public
   path is registered with the media index first, and the new row's handle
   is returned.

The reverse direction (content handle into the private cache) is available as
`copy_content_to_cache`. Every failure surfaces as a typed `ShareError`; no
operation hands back a placeholder handle or path.
*/

use std::io::{Read, Write};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use sharekit_base::{
    ContentUri, ErrorKind, FilePath, MediaCollection, MediaEntry, PalHandle, ResultExt,
    ShareError, ShareResult,
};

use crate::cancel::CancellationToken;
use crate::config::ResolverConfig;
use crate::location::Location;
use crate::mime::guess_mime_type;
use crate::storage::{PublicStorage, select_public_storage};

/// A file read into memory while copying it into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub display_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Resolves identifiers into shareable handles through the PAL.
///
/// The resolver is synchronous; UI code reaches it through
/// [`ResolverWorker`](crate::worker::ResolverWorker), which runs every call on
/// a background thread.
#[derive(Debug, Clone)]
pub struct FileResolver {
    pal: PalHandle,
    config: Arc<ResolverConfig>,
    storage: Arc<dyn PublicStorage>,
}

/// Why a chunked copy stopped early.
enum CopyFailure {
    Read(std::io::Error),
    Write(std::io::Error),
    Cancelled,
}

impl FileResolver {
    /// Create a resolver, choosing the public storage strategy from the platform level.
    pub fn new(pal: PalHandle, config: ResolverConfig) -> ShareResult<Self> {
        config.validate()?;
        let storage: Arc<dyn PublicStorage> = Arc::from(select_public_storage(&pal, &config));
        Ok(Self {
            pal,
            config: Arc::new(config),
            storage,
        })
    }

    /// Create a resolver with an explicit public storage strategy.
    pub fn with_storage(
        pal: PalHandle,
        config: ResolverConfig,
        storage: Arc<dyn PublicStorage>,
    ) -> ShareResult<Self> {
        config.validate()?;
        Ok(Self {
            pal,
            config: Arc::new(config),
            storage,
        })
    }

    pub fn pal(&self) -> &PalHandle {
        &self.pal
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn storage_name(&self) -> &'static str {
        self.storage.name()
    }

    /// Resolve an identifier into a handle suitable for sharing.
    ///
    /// Content handles are returned unchanged. Paths are copied to public
    /// storage; copy failures are reported as `ResolutionFailed` with the
    /// underlying error as cause.
    #[instrument(skip(self, cancel))]
    pub fn resolve_shareable_uri(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> ShareResult<ContentUri> {
        let file = match Location::parse(identifier)? {
            Location::Content(uri) => {
                debug!("identifier is already a content handle");
                return Ok(uri);
            }
            Location::Path(file) => file,
        };
        let resolution_failed = |cause: Box<ShareError>| {
            Box::new(
                ShareError::new(ErrorKind::ResolutionFailed {
                    identifier: identifier.to_string(),
                })
                .caused_by(cause),
            )
        };

        let destination = self
            .copy_private_file_to_public_location(&file, cancel)
            .map_err(&resolution_failed)?;
        let uri = match destination {
            Location::Content(uri) => uri,
            Location::Path(path) => {
                let entry = MediaEntry::new(MediaCollection::Images)
                    .mime_type(guess_mime_type(&path.to_string()))
                    .data_path(path.clone());
                match self.pal.insert_media_entry(&entry) {
                    Ok(uri) => uri,
                    Err(e) => {
                        self.discard_destination(&Location::Path(path));
                        return Err(resolution_failed(e));
                    }
                }
            }
        };
        info!(uri = %uri, "resolved shareable handle");
        Ok(uri)
    }

    /// Best-effort MIME type for a file name or path.
    pub fn guess_mime_type(&self, name_or_path: &str) -> Option<String> {
        guess_mime_type(name_or_path)
    }

    /// Copy the content behind a handle string into the private cache.
    ///
    /// Only content handles are accepted; plain paths fail with
    /// `UnsupportedIdentifierShape` since they need no copying.
    pub fn copy_to_cache(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> ShareResult<FilePath> {
        match Location::parse(identifier)? {
            Location::Content(uri) => self.copy_content_to_cache(&uri, cancel),
            Location::Path(_) => Err(Box::new(ShareError::new(
                ErrorKind::UnsupportedIdentifierShape {
                    identifier: identifier.to_string(),
                },
            ))),
        }
    }

    /// Copy the content behind a handle into `<cache dir>/<display name>`.
    #[instrument(skip(self, cancel), fields(uri = %uri))]
    pub fn copy_content_to_cache(
        &self,
        uri: &ContentUri,
        cancel: &CancellationToken,
    ) -> ShareResult<FilePath> {
        let resolved = self.read_content(uri, cancel)?;

        let cache_dir = self.pal.cache_dir();
        self.pal.create_directory_all(&cache_dir)?;
        let target = cache_dir.join(&resolved.display_name);
        {
            let mut writer = self.pal.create_file(&target)?;
            let write_error = |source: std::io::Error| {
                Box::new(ShareError::new(ErrorKind::FileError {
                    path: target.clone().into_path_buf(),
                    source,
                }))
            };
            writer.write_all(&resolved.bytes).map_err(write_error)?;
            writer.flush().map_err(write_error)?;
        }
        debug!(
            target = %target,
            bytes = resolved.bytes.len(),
            mime_type = ?resolved.mime_type,
            "copied content into cache"
        );
        Ok(target)
    }

    /// Read the content behind a handle into memory along with its name and type.
    pub fn read_content(
        &self,
        uri: &ContentUri,
        cancel: &CancellationToken,
    ) -> ShareResult<ResolvedFile> {
        let mut stream = self.pal.open_content(uri)?;
        let capacity = stream
            .size_hint()
            .and_then(|size| usize::try_from(size).ok())
            .filter(|size| *size > 0)
            .unwrap_or(self.config.chunk_size);
        let mut bytes = Vec::with_capacity(capacity);
        copy_chunked(&mut stream, &mut bytes, self.config.chunk_size, cancel).map_err(
            |failure| match failure {
                CopyFailure::Read(source) | CopyFailure::Write(source) => {
                    Box::new(ShareError::new(ErrorKind::SourceUnreadable {
                        handle: uri.to_string(),
                        source: Some(source),
                    }))
                }
                CopyFailure::Cancelled => Box::new(ShareError::new(ErrorKind::Cancelled)),
            },
        )?;
        drop(stream);

        let display_name = self.resolve_display_name(uri)?;
        let mime_type = guess_mime_type(&display_name);
        Ok(ResolvedFile {
            display_name,
            bytes,
            mime_type,
        })
    }

    /// Display name of a handle: the indexed name, else the last path segment.
    ///
    /// Names are reduced to their final component so they can be used as a
    /// file name. Fails with `NameUnresolvable` when nothing usable remains.
    #[instrument(skip(self), fields(uri = %uri))]
    pub fn resolve_display_name(&self, uri: &ContentUri) -> ShareResult<String> {
        let indexed = self
            .pal
            .query_display_name(uri)
            .with_context(|| format!("Querying display name of {}", uri))?;
        let name = indexed
            .as_deref()
            .and_then(sanitize_file_name)
            .or_else(|| uri.last_segment().and_then(sanitize_file_name))
            .ok_or_else(|| {
                Box::new(ShareError::new(ErrorKind::NameUnresolvable {
                    handle: uri.to_string(),
                }))
            })?;
        debug!(name = %name, from_index = indexed.is_some(), "resolved display name");
        Ok(name)
    }

    /// Stream a private file into a fresh public destination.
    ///
    /// Returns the destination, a handle or a path depending on the storage
    /// strategy. Repeated calls create repeated copies.
    #[instrument(skip(self, cancel), fields(file = %file, storage = self.storage.name()))]
    pub fn copy_private_file_to_public_location(
        &self,
        file: &FilePath,
        cancel: &CancellationToken,
    ) -> ShareResult<Location> {
        cancel.check()?;
        let display_name = file
            .file_name()
            .and_then(sanitize_file_name)
            .ok_or_else(|| {
                Box::new(ShareError::new(ErrorKind::NameUnresolvable {
                    handle: file.to_string(),
                }))
            })?;
        let mut input = self.pal.read_file(file).map_err(|e| {
            Box::new(
                ShareError::new(ErrorKind::SourceUnreadable {
                    handle: file.to_string(),
                    source: None,
                })
                .caused_by(e),
            )
        })?;

        let destination = self.storage.create_destination(&self.pal, &display_name)?;
        match self.fill_destination(file, &mut input, &destination, cancel) {
            Ok(copied) => {
                debug!(destination = %destination, bytes = copied, "copied file to public location");
                Ok(destination)
            }
            Err(e) => {
                self.discard_destination(&destination);
                Err(e)
            }
        }
    }

    /// Stream `input` into a destination created by the storage strategy.
    ///
    /// The output is closed before this returns, on success and on failure.
    fn fill_destination(
        &self,
        file: &FilePath,
        input: &mut dyn Read,
        destination: &Location,
        cancel: &CancellationToken,
    ) -> ShareResult<u64> {
        let write_failed = |source: std::io::Error| {
            Box::new(ShareError::new(ErrorKind::DestinationWriteFailed {
                destination: destination.to_string(),
                source: Some(source),
            }))
        };
        let mut output = match destination {
            Location::Content(uri) => self.pal.open_content_output(uri)?,
            Location::Path(path) => self.pal.create_file(path).map_err(|e| {
                Box::new(
                    ShareError::new(ErrorKind::DestinationWriteFailed {
                        destination: path.to_string(),
                        source: None,
                    })
                    .caused_by(e),
                )
            })?,
        };

        let copied = copy_chunked(input, &mut output, self.config.chunk_size, cancel).map_err(
            |failure| match failure {
                CopyFailure::Read(source) => Box::new(ShareError::new(
                    ErrorKind::SourceUnreadable {
                        handle: file.to_string(),
                        source: Some(source),
                    },
                )),
                CopyFailure::Write(source) => write_failed(source),
                CopyFailure::Cancelled => Box::new(ShareError::new(ErrorKind::Cancelled)),
            },
        )?;
        output.flush().map_err(write_failed)?;
        Ok(copied)
    }

    /// Remove a destination that could not be filled, so no handle or file
    /// with partial content stays behind.
    fn discard_destination(&self, destination: &Location) {
        let removed = match destination {
            Location::Content(uri) => self.pal.delete_content(uri),
            Location::Path(path) => self.pal.remove_file(path),
        };
        match removed {
            Ok(()) => debug!(destination = %destination, "discarded unfinished destination"),
            Err(e) => warn!(destination = %destination, error = %e, "failed to discard destination"),
        }
    }
}

/// Final path component of a name, unless nothing usable is left.
fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}

/// Move bytes from `reader` to `writer` in `chunk_size` steps, checking for
/// cancellation before each step. Returns the number of bytes moved.
fn copy_chunked(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    chunk_size: usize,
    cancel: &CancellationToken,
) -> Result<u64, CopyFailure> {
    let mut buffer = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(CopyFailure::Cancelled);
        }
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(total),
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyFailure::Read(e)),
        };
        writer
            .write_all(&buffer[..read])
            .map_err(CopyFailure::Write)?;
        total += read as u64;
    }
}
