/* 📖 # How does the share screen stay responsive?

The screen never resolves anything itself. A click queues resolution of the
configured identifier on the `ResolverWorker` and disables the button; the
host's event loop then calls `poll` until the task settles. A successful
resolution is handed to the `ShareLauncher` as a `ShareIntent`. Any failure,
including a launcher failure, leaves the button disabled with a status
message until `reset` is called, so a broken share is never retried by
accident and no intent ever carries a placeholder handle.
*/

use std::time::Duration;

use tracing::{info, warn};

use sharekit_base::{ContentUri, ShareResult};

use crate::config::ResolverConfig;
use crate::worker::{ResolveTask, ResolverWorker};

/// What the launcher receives: a handle plus the declared type of its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareIntent {
    pub mime_type: String,
    pub stream: ContentUri,
}

/// Hands a resolved share to whatever presents the share sheet.
pub trait ShareLauncher {
    fn launch(&mut self, intent: &ShareIntent) -> ShareResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareState {
    Ready,
    Resolving,
    Shared(ShareIntent),
    Failed(String),
}

/// Model of a screen with a single share button.
#[derive(Debug)]
pub struct ShareScreen<L: ShareLauncher> {
    worker: ResolverWorker,
    launcher: L,
    identifier: String,
    mime_type: String,
    state: ShareState,
    pending: Option<ResolveTask<ContentUri>>,
}

impl<L: ShareLauncher> ShareScreen<L> {
    pub fn new(worker: ResolverWorker, config: &ResolverConfig, launcher: L) -> Self {
        Self {
            worker,
            launcher,
            identifier: config.demo_identifier.clone(),
            mime_type: config.share_mime_type.clone(),
            state: ShareState::Ready,
            pending: None,
        }
    }

    /// Share a different identifier on the next click.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn state(&self) -> &ShareState {
        &self.state
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn button_enabled(&self) -> bool {
        matches!(self.state, ShareState::Ready | ShareState::Shared(_))
    }

    pub fn status(&self) -> Option<String> {
        match &self.state {
            ShareState::Ready => None,
            ShareState::Resolving => Some("Preparing file".to_string()),
            ShareState::Shared(intent) => Some(format!("Shared {}", intent.stream)),
            ShareState::Failed(message) => Some(message.clone()),
        }
    }

    /// Press the share button. Returns `false` if the button is disabled.
    pub fn click(&mut self) -> bool {
        if !self.button_enabled() {
            return false;
        }
        info!(identifier = %self.identifier, "share requested");
        self.pending = Some(self.worker.submit_resolve(self.identifier.clone()));
        self.state = ShareState::Resolving;
        true
    }

    /// Collect a finished resolution without blocking.
    pub fn poll(&mut self) -> &ShareState {
        let result = self.pending.as_ref().and_then(ResolveTask::try_result);
        if let Some(result) = result {
            self.finish(result);
        }
        &self.state
    }

    /// Block until the pending resolution settles, or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> &ShareState {
        let result = self
            .pending
            .as_ref()
            .and_then(|task| task.wait_timeout(timeout));
        if let Some(result) = result {
            self.finish(result);
        }
        &self.state
    }

    /// Abandon a pending resolution; the screen returns to `Ready`.
    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.cancel();
            self.state = ShareState::Ready;
        }
    }

    /// Re-enable the button after a failure.
    pub fn reset(&mut self) {
        if matches!(self.state, ShareState::Failed(_)) {
            self.state = ShareState::Ready;
        }
    }

    fn finish(&mut self, result: ShareResult<ContentUri>) {
        self.pending = None;
        self.state = match result {
            Ok(stream) => {
                let intent = ShareIntent {
                    mime_type: self.mime_type.clone(),
                    stream,
                };
                match self.launcher.launch(&intent) {
                    Ok(()) => {
                        info!(stream = %intent.stream, "share launched");
                        ShareState::Shared(intent)
                    }
                    Err(e) => {
                        warn!(error = %e, "share launch failed");
                        ShareState::Failed(format!("Unable to share: {}", e))
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "share resolution failed");
                ShareState::Failed(format!("Unable to share: {}", e))
            }
        };
    }
}

impl<L: ShareLauncher> Drop for ShareScreen<L> {
    fn drop(&mut self) {
        if let Some(task) = &self.pending {
            task.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FileResolver;
    use sharekit_base::{FilePath, MockPal, PalHandle, bail};

    const WAIT: Duration = Duration::from_secs(10);

    #[derive(Debug, Default)]
    struct RecordingLauncher {
        launched: Vec<ShareIntent>,
        fail: bool,
    }

    impl ShareLauncher for RecordingLauncher {
        fn launch(&mut self, intent: &ShareIntent) -> ShareResult<()> {
            if self.fail {
                bail!("no share target available");
            }
            self.launched.push(intent.clone());
            Ok(())
        }
    }

    fn screen(mock: &MockPal, launcher: RecordingLauncher) -> ShareScreen<RecordingLauncher> {
        let config = ResolverConfig {
            worker_threads: 1,
            ..ResolverConfig::default()
        };
        let resolver = FileResolver::new(PalHandle::new(mock.clone()), config.clone()).unwrap();
        let worker = ResolverWorker::start(resolver).unwrap();
        ShareScreen::new(worker, &config, launcher)
    }

    #[test]
    fn test_demo_handle_is_shared_as_png() {
        let mut screen = screen(&MockPal::new(), RecordingLauncher::default());
        assert!(screen.button_enabled());
        assert_eq!(screen.status(), None);

        assert!(screen.click());
        screen.wait(WAIT);

        let expected = ShareIntent {
            mime_type: "image/png".to_string(),
            stream: ContentUri::parse("content://media/external/images/media/29582").unwrap(),
        };
        assert_eq!(screen.state(), &ShareState::Shared(expected.clone()));
        assert_eq!(screen.launcher().launched, vec![expected]);
        assert!(screen.button_enabled());
    }

    #[test]
    fn test_private_file_is_published_before_sharing() {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("data/cache/chart.png"), b"png".to_vec());
        let mut screen =
            screen(&mock, RecordingLauncher::default()).with_identifier("data/cache/chart.png");

        screen.click();
        screen.wait(WAIT);

        let intent = &screen.launcher().launched[0];
        assert_eq!(mock.content_bytes(&intent.stream), Some(b"png".to_vec()));
    }

    #[test]
    fn test_failure_disables_button() {
        let mut screen = screen(&MockPal::new(), RecordingLauncher::default())
            .with_identifier("data/cache/missing.png");

        screen.click();
        screen.wait(WAIT);

        assert!(matches!(screen.state(), ShareState::Failed(_)));
        assert!(!screen.button_enabled());
        assert!(!screen.click());
        assert!(screen.launcher().launched.is_empty());
        let status = screen.status().unwrap();
        assert!(
            status.starts_with("Unable to share: Failed to resolve a shareable handle"),
            "{status}"
        );

        screen.reset();
        assert!(screen.button_enabled());
        assert_eq!(screen.state(), &ShareState::Ready);
    }

    #[test]
    fn test_launcher_failure_is_reported() {
        let launcher = RecordingLauncher {
            fail: true,
            ..RecordingLauncher::default()
        };
        let mut screen = screen(&MockPal::new(), launcher);

        screen.click();
        screen.wait(WAIT);

        assert_eq!(
            screen.status().as_deref(),
            Some("Unable to share: no share target available")
        );
        assert!(!screen.button_enabled());
    }

    #[test]
    fn test_button_disabled_while_resolving() {
        let mut screen = screen(&MockPal::new(), RecordingLauncher::default());
        assert!(screen.click());
        assert_eq!(screen.state(), &ShareState::Resolving);
        assert!(!screen.button_enabled());
        assert!(!screen.click());
        assert_eq!(screen.status().as_deref(), Some("Preparing file"));

        screen.wait(WAIT);
        assert!(matches!(screen.state(), ShareState::Shared(_)));
    }

    #[test]
    fn test_cancel_returns_to_ready() {
        let mut screen = screen(&MockPal::new(), RecordingLauncher::default());
        screen.click();
        screen.cancel();

        assert_eq!(screen.state(), &ShareState::Ready);
        assert_eq!(screen.poll(), &ShareState::Ready);
        assert!(screen.launcher().launched.is_empty());
    }
}
