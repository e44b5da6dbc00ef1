use std::fmt;

use crate::error::{ErrorKind, ShareError, ShareResult};

/// Prefix identifying a content handle issued by the platform's storage broker.
pub const CONTENT_SCHEME: &str = "content://";

/// Returns true if the identifier carries the content-handle prefix.
pub fn is_content_handle(identifier: &str) -> bool {
    identifier.starts_with(CONTENT_SCHEME)
}

/// Opaque handle to a file managed by a content broker, e.g.
/// `content://media/external/images/media/29582`.
///
/// The handle is split into its authority (`media`) and raw path
/// (`/external/images/media/29582`); nothing else about it is interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentUri {
    authority: String,
    path: String,
}

impl ContentUri {
    /// Parses a `content://authority/path` string.
    ///
    /// Fails with `UnsupportedIdentifierShape` when the prefix is missing or
    /// the authority is empty.
    pub fn parse(identifier: &str) -> ShareResult<Self> {
        let rest = identifier.strip_prefix(CONTENT_SCHEME).ok_or_else(|| {
            Box::new(ShareError::new(ErrorKind::UnsupportedIdentifierShape {
                identifier: identifier.to_string(),
            }))
        })?;
        let (authority, path) = match rest.find('/') {
            Some(index) => rest.split_at(index),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(Box::new(ShareError::new(
                ErrorKind::UnsupportedIdentifierShape {
                    identifier: identifier.to_string(),
                },
            )));
        }
        Ok(Self {
            authority: authority.to_string(),
            path: path.to_string(),
        })
    }

    pub(crate) fn from_parts(authority: &str, path: &str) -> Self {
        Self {
            authority: authority.to_string(),
            path: path.to_string(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The path component, including its leading `/`.
    pub fn raw_path(&self) -> &str {
        &self.path
    }

    /// Substring after the last `/` of the raw path, if non-empty.
    pub fn last_segment(&self) -> Option<&str> {
        let segment = match self.path.rfind('/') {
            Some(index) => &self.path[index + 1..],
            None => self.path.as_str(),
        };
        (!segment.is_empty()).then_some(segment)
    }

    /// Numeric row id carried by the last path segment, as issued by media inserts.
    pub fn row_id(&self) -> Option<u64> {
        self.last_segment()?.parse().ok()
    }

    /// Returns a new handle with `/<id>` appended to the path.
    pub fn with_appended_id(&self, id: u64) -> Self {
        Self {
            authority: self.authority.clone(),
            path: format!("{}/{}", self.path.trim_end_matches('/'), id),
        }
    }
}

impl fmt::Display for ContentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", CONTENT_SCHEME, self.authority, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_handle() {
        let uri = ContentUri::parse("content://media/external/images/media/29582").unwrap();
        assert_eq!(uri.authority(), "media");
        assert_eq!(uri.raw_path(), "/external/images/media/29582");
        assert_eq!(uri.last_segment(), Some("29582"));
        assert_eq!(uri.row_id(), Some(29582));
    }

    #[test]
    fn test_display_round_trips_input() {
        let raw = "content://com.example.provider/docs/report.pdf";
        assert_eq!(ContentUri::parse(raw).unwrap().to_string(), raw);
    }

    #[test]
    fn test_authority_only() {
        let uri = ContentUri::parse("content://media").unwrap();
        assert_eq!(uri.raw_path(), "");
        assert_eq!(uri.last_segment(), None);
    }

    #[test]
    fn test_trailing_separator_has_no_last_segment() {
        let uri = ContentUri::parse("content://media/").unwrap();
        assert_eq!(uri.last_segment(), None);
        assert_eq!(uri.row_id(), None);
    }

    #[test]
    fn test_rejects_missing_prefix() {
        let err = ContentUri::parse("/data/cache/a.png").unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::UnsupportedIdentifierShape { .. }
        ));
    }

    #[test]
    fn test_rejects_empty_authority() {
        assert!(ContentUri::parse("content:///external/file/1").is_err());
    }

    #[test]
    fn test_with_appended_id() {
        let collection = ContentUri::parse("content://media/external/file").unwrap();
        assert_eq!(
            collection.with_appended_id(7).to_string(),
            "content://media/external/file/7"
        );
    }

    #[test]
    fn test_is_content_handle() {
        assert!(is_content_handle("content://media/external/file/1"));
        assert!(!is_content_handle("data/cache/a.png"));
    }
}
