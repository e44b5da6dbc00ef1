use serde::Deserialize;
use tracing::{debug, instrument};

use sharekit_base::{ErrorKind, FilePath, PalHandle, ResultExt, ShareError, ShareResult};

/// Handle the share button resolves when no identifier is given.
pub const DEFAULT_DEMO_IDENTIFIER: &str = "content://media/external/images/media/29582";

/// Configuration for resolving and sharing files.
///
/// Every field has a default, so an empty `sharekit.toml` is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Folder below the public downloads area that receives copies.
    pub app_folder: String,
    /// Bytes moved per read/write step while copying.
    pub chunk_size: usize,
    /// First platform level that publishes through media inserts instead of plain paths.
    pub scoped_storage_min_sdk: u32,
    /// MIME type announced by the share action.
    pub share_mime_type: String,
    /// Identifier the share button resolves.
    pub demo_identifier: String,
    /// Number of background resolver threads.
    pub worker_threads: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            app_folder: "Demo".to_string(),
            chunk_size: 4 * 1024,
            scoped_storage_min_sdk: 29,
            share_mime_type: "image/png".to_string(),
            demo_identifier: DEFAULT_DEMO_IDENTIFIER.to_string(),
            worker_threads: 2,
        }
    }
}

impl ResolverConfig {
    /// Rejects values the resolver cannot work with.
    pub fn validate(&self) -> ShareResult<()> {
        if self.chunk_size == 0 {
            sharekit_base::bail!("chunk_size must be greater than zero");
        }
        if self.worker_threads == 0 {
            sharekit_base::bail!("worker_threads must be greater than zero");
        }
        if self.app_folder.is_empty() || self.app_folder.contains(['/', '\\']) {
            sharekit_base::bail!(
                "app_folder must be a single non-empty folder name, got '{}'",
                self.app_folder
            );
        }
        Ok(())
    }

    /// Public sub-directory recorded on media inserts, e.g. `Download/Demo`.
    pub fn public_relative_path(&self) -> String {
        format!("Download/{}", self.app_folder)
    }
}

/// Parse and validate a configuration from TOML text.
pub fn parse_config(text: &str) -> ShareResult<ResolverConfig> {
    let config: ResolverConfig =
        toml::from_str(text).map_err(|e| sharekit_base::err!("Invalid configuration: {}", e))?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration file through the PAL.
///
/// A missing file yields the defaults; an unreadable or invalid one is an error.
#[instrument(skip(pal), fields(path = %path))]
pub fn load_config(pal: &PalHandle, path: &FilePath) -> ShareResult<ResolverConfig> {
    if !pal.file_exists(path)? {
        debug!("no configuration file, using defaults");
        return Ok(ResolverConfig::default());
    }
    let text = pal.read_file_to_string(path).map_err(|e| {
        Box::new(
            ShareError::new(ErrorKind::Message {
                message: format!("Failed to read configuration {}", path),
            })
            .caused_by(e),
        )
    })?;
    parse_config(&text).with_context(|| format!("Loading {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;
    use sharekit_base::MockPal;

    #[test]
    fn test_defaults() {
        expect![[r#"
            ResolverConfig {
                app_folder: "Demo",
                chunk_size: 4096,
                scoped_storage_min_sdk: 29,
                share_mime_type: "image/png",
                demo_identifier: "content://media/external/images/media/29582",
                worker_threads: 2,
            }
        "#]]
        .assert_debug_eq(&ResolverConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = parse_config("app_folder = \"Exports\"\nchunk_size = 512\n").unwrap();
        assert_eq!(config.app_folder, "Exports");
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.scoped_storage_min_sdk, 29);
        assert_eq!(config.public_relative_path(), "Download/Exports");
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = parse_config("chunk_size = 0").unwrap_err();
        assert_eq!(err.to_string(), "chunk_size must be greater than zero");
    }

    #[test]
    fn test_nested_app_folder_rejected() {
        assert!(parse_config("app_folder = \"a/b\"").is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse_config("chunk = 1").unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let pal = PalHandle::new(MockPal::new());
        let config = load_config(&pal, &FilePath::from("sharekit.toml")).unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn test_load_from_pal() {
        let mock = MockPal::new();
        mock.add_file(
            FilePath::from("sharekit.toml"),
            b"worker_threads = 4\nshare_mime_type = \"image/jpeg\"\n".to_vec(),
        );
        let pal = PalHandle::new(mock);

        let config = load_config(&pal, &FilePath::from("sharekit.toml")).unwrap();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.share_mime_type, "image/jpeg");
    }

    #[test]
    fn test_load_invalid_file_has_context() {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("sharekit.toml"), b"chunk_size = 0".to_vec());
        let pal = PalHandle::new(mock);

        let err = load_config(&pal, &FilePath::from("sharekit.toml")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Loading sharekit.toml: chunk_size must be greater than zero"
        );
    }
}
