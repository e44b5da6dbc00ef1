/* 📖 # How is the extension of an identifier found?

Identifiers may be bare names (`a.png`), filesystem paths
(`data/cache/a.png`) or URL-like strings (`.../a.png?size=2#top`). The query
and fragment are cut off first, then only the last path segment is considered,
so a dot in a directory name (`v1.2/readme`) never counts as an extension.
The lookup itself is the static `mime_guess` table.
*/

/// Extension of the last path segment, with any query or fragment removed.
pub fn file_extension(name_or_path: &str) -> Option<&str> {
    let end = name_or_path.find(['?', '#']).unwrap_or(name_or_path.len());
    let without_suffix = &name_or_path[..end];
    let segment = without_suffix
        .rsplit('/')
        .next()
        .unwrap_or(without_suffix);
    let (_, extension) = segment.rsplit_once('.')?;
    (!extension.is_empty()).then_some(extension)
}

/// Best-effort MIME type for a file name, path or URL, from its extension.
///
/// Returns `None` when there is no extension or the extension is unknown.
///
/// # Examples
///
/// ```
/// use sharekit_engine::guess_mime_type;
///
/// assert_eq!(guess_mime_type("a.png").as_deref(), Some("image/png"));
/// assert_eq!(guess_mime_type("a"), None);
/// ```
pub fn guess_mime_type(name_or_path: &str) -> Option<String> {
    let extension = file_extension(name_or_path)?;
    mime_guess::from_ext(&extension.to_ascii_lowercase())
        .first()
        .map(|mime| mime.essence_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png() {
        assert_eq!(guess_mime_type("a.png").as_deref(), Some("image/png"));
    }

    #[test]
    fn test_no_extension() {
        assert_eq!(guess_mime_type("a"), None);
        assert_eq!(guess_mime_type("a."), None);
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(guess_mime_type("archive.notarealextension"), None);
    }

    #[test]
    fn test_uppercase_extension() {
        assert_eq!(guess_mime_type("PHOTO.JPG").as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_full_path() {
        assert_eq!(
            guess_mime_type("storage/Download/Demo/report.pdf").as_deref(),
            Some("application/pdf")
        );
    }

    #[test]
    fn test_query_and_fragment_are_ignored() {
        assert_eq!(
            guess_mime_type("https://host/a.txt?x=1.png#frag").as_deref(),
            Some("text/plain")
        );
    }

    #[test]
    fn test_dot_in_directory_is_not_an_extension() {
        assert_eq!(file_extension("v1.2/readme"), None);
        assert_eq!(file_extension("v1.2/readme.md"), Some("md"));
    }
}
