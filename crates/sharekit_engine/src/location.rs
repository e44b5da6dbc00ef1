use std::fmt;

use sharekit_base::pal::is_content_handle;
use sharekit_base::{ContentUri, ErrorKind, FilePath, ShareError, ShareResult};

/* 📖 # Why a Location enum instead of passing strings around?

A destination is either a broker-issued content handle or a plain path, and
the two are opened through entirely different PAL calls. Parsing once into an
enum turns the prefix test into a match, so a consumer cannot forget a case or
open a handle as if it were a file.
*/

/// Where a file lives: behind a content handle or at a plain path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Content(ContentUri),
    Path(FilePath),
}

impl Location {
    /// Classifies an identifier by its shape.
    ///
    /// `content://` prefixes become handles; other strings without a URL
    /// scheme (or with `file://`) become paths. Empty strings, strings naming
    /// no file, and other schemes fail with `UnsupportedIdentifierShape`.
    pub fn parse(identifier: &str) -> ShareResult<Self> {
        if is_content_handle(identifier) {
            return ContentUri::parse(identifier).map(Location::Content);
        }
        let unsupported = || {
            Box::new(ShareError::new(ErrorKind::UnsupportedIdentifierShape {
                identifier: identifier.to_string(),
            }))
        };
        let trimmed = identifier.trim();
        let has_foreign_scheme =
            !trimmed.starts_with("file://") && trimmed.contains("://");
        if trimmed.is_empty() || has_foreign_scheme {
            return Err(unsupported());
        }
        let path = FilePath::from(trimmed);
        if path.is_empty() {
            return Err(unsupported());
        }
        Ok(Location::Path(path))
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Location::Content(_))
    }

    pub fn as_content(&self) -> Option<&ContentUri> {
        match self {
            Location::Content(uri) => Some(uri),
            Location::Path(_) => None,
        }
    }

    pub fn as_path(&self) -> Option<&FilePath> {
        match self {
            Location::Content(_) => None,
            Location::Path(path) => Some(path),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Content(uri) => write!(f, "{}", uri),
            Location::Path(path) => write!(f, "{}", path),
        }
    }
}

impl From<ContentUri> for Location {
    fn from(uri: ContentUri) -> Self {
        Location::Content(uri)
    }
}

impl From<FilePath> for Location {
    fn from(path: FilePath) -> Self {
        Location::Path(path)
    }
}
