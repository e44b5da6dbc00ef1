use relative_path::{RelativePath, RelativePathBuf};
use std::path::{Path, PathBuf};

/* 📖 # Why are platform paths relative?

Every PAL is rooted somewhere: RealPal at a base directory on disk, MockPal at
an in-memory root. A FilePath names a location below that root, so
"/data/cache/a.png" and "data/cache/a.png" refer to the same file. Leading
separators and a `file://` scheme are stripped on construction, which keeps
every PAL path comparable and hashable regardless of how the caller spelled it.
*/

const FILE_SCHEME: &str = "file://";

/// Type-safe wrapper for file paths below the PAL root.
///
/// # Examples
///
/// ```
/// use sharekit_base::FilePath;
///
/// let cached = FilePath::from("/data/cache/photo.png");
/// assert_eq!(cached.to_string(), "data/cache/photo.png");
/// assert_eq!(cached.file_name(), Some("photo.png"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilePath(RelativePathBuf);

impl FilePath {
    fn normalized(raw: &str) -> Self {
        let raw = raw.strip_prefix(FILE_SCHEME).unwrap_or(raw);
        Self(RelativePathBuf::from(raw.trim_start_matches('/')).normalize())
    }

    pub fn as_relative(&self) -> &RelativePath {
        &self.0
    }

    /// Converts to a regular Path, without any base directory.
    pub fn as_path(&self) -> &Path {
        Path::new(self.0.as_str())
    }

    pub fn into_path_buf(self) -> PathBuf {
        PathBuf::from(self.0.as_str())
    }

    /// Resolves this path below the given root directory.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.to_path(root)
    }

    /// Appends a single name (or relative sub-path) to this path.
    pub fn join(&self, name: &str) -> FilePath {
        Self(self.0.join(name.trim_start_matches('/')).normalize())
    }

    /// Final component of the path, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    pub fn parent(&self) -> Option<FilePath> {
        self.0.parent().map(|parent| Self(parent.to_relative_path_buf()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_str().is_empty()
    }
}

impl From<&str> for FilePath {
    fn from(s: &str) -> Self {
        Self::normalized(s)
    }
}

impl From<String> for FilePath {
    fn from(s: String) -> Self {
        Self::normalized(&s)
    }
}

impl From<&RelativePath> for FilePath {
    fn from(p: &RelativePath) -> Self {
        Self::normalized(p.as_str())
    }
}

impl From<&Path> for FilePath {
    fn from(p: &Path) -> Self {
        Self::normalized(&p.to_string_lossy().replace('\\', "/"))
    }
}

impl std::fmt::Display for FilePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<RelativePath> for FilePath {
    fn as_ref(&self) -> &RelativePath {
        &self.0
    }
}

impl AsRef<Path> for FilePath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}
