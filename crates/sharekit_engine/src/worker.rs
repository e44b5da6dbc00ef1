/* 📖 # Why does resolution only run on worker threads?

Copying a file into public storage is blocking I/O of unbounded length. Run
on a UI or event-loop thread it would freeze rendering. The worker owns the
resolver and a small pool of threads fed by a crossbeam channel; callers
submit a job and receive a `ResolveTask` immediately. The task is polled
(`try_result`) from a UI loop or waited on (`wait`) from plain code, and can be
cancelled at any time. A cancelled job stops at its next chunk boundary, or
is skipped entirely if it has not started yet.
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, info_span, warn};

use sharekit_base::{ContentUri, ErrorKind, FilePath, ShareError, ShareResult};

use crate::cancel::CancellationToken;
use crate::location::Location;
use crate::resolver::FileResolver;

type Job = Box<dyn FnOnce(&FileResolver) + Send + 'static>;

/// Pending result of a job submitted to a [`ResolverWorker`].
#[derive(Debug)]
pub struct ResolveTask<T> {
    id: u64,
    receiver: Receiver<ShareResult<T>>,
    cancel: CancellationToken,
}

impl<T> ResolveTask<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Ask the job to stop. The task then completes with `Cancelled`, unless
    /// the job had already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Non-blocking check for the result; `None` while the job is still running.
    pub fn try_result(&self) -> Option<ShareResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_stopped(self.id))),
        }
    }

    /// Wait up to `timeout` for the result.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ShareResult<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(worker_stopped(self.id))),
        }
    }

    /// Block until the job completes.
    pub fn wait(self) -> ShareResult<T> {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(worker_stopped(self.id)))
    }
}

fn worker_stopped(task: u64) -> Box<ShareError> {
    Box::new(ShareError::message(format!(
        "Resolver worker stopped before task {} completed",
        task
    )))
}

/// Pool of background threads running [`FileResolver`] operations.
///
/// Dropping the worker lets queued jobs finish, then joins the threads.
#[derive(Debug)]
pub struct ResolverWorker {
    jobs: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
    next_task: AtomicU64,
}

impl ResolverWorker {
    /// Start `config().worker_threads` threads serving the given resolver.
    pub fn start(resolver: FileResolver) -> ShareResult<Self> {
        let thread_count = resolver.config().worker_threads.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut threads = Vec::with_capacity(thread_count);
        for index in 0..thread_count {
            let receiver = receiver.clone();
            let resolver = resolver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("sharekit-resolver-{}", index))
                .spawn(move || {
                    for job in receiver.iter() {
                        job(&resolver);
                    }
                })
                .map_err(|e| {
                    Box::new(ShareError::new(ErrorKind::Message {
                        message: format!("Failed to spawn resolver thread {}: {}", index, e),
                    }))
                })?;
            threads.push(handle);
        }
        debug!(threads = thread_count, "resolver worker started");
        Ok(Self {
            jobs: Some(sender),
            threads,
            next_task: AtomicU64::new(1),
        })
    }

    /// Queue an arbitrary resolver operation.
    ///
    /// The operation receives the task's cancellation token; if cancellation
    /// is requested before a thread picks the job up, it never runs.
    pub fn submit<T, F>(&self, operation: &'static str, job: F) -> ResolveTask<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileResolver, &CancellationToken) -> ShareResult<T> + Send + 'static,
    {
        let id = self.next_task.fetch_add(1, Ordering::SeqCst);
        let (result_sender, receiver) = crossbeam_channel::bounded(1);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let job: Job = Box::new(move |resolver| {
            let span = info_span!("resolver_job", task = id, operation);
            let _guard = span.enter();
            let result = match token.check() {
                Ok(()) => job(resolver, &token),
                Err(cancelled) => Err(cancelled),
            };
            if let Err(e) = &result {
                debug!(error = %e, "job failed");
            }
            // The task may have been dropped; nobody is waiting then.
            let _ = result_sender.send(result);
        });

        match &self.jobs {
            Some(jobs) => {
                if jobs.send(job).is_err() {
                    warn!(task = id, "resolver queue closed, dropping job");
                }
            }
            None => warn!(task = id, "resolver worker shut down, dropping job"),
        }
        ResolveTask {
            id,
            receiver,
            cancel,
        }
    }

    /// Resolve an identifier into a shareable handle in the background.
    pub fn submit_resolve(&self, identifier: impl Into<String>) -> ResolveTask<ContentUri> {
        let identifier = identifier.into();
        self.submit("resolve_shareable_uri", move |resolver, cancel| {
            resolver.resolve_shareable_uri(&identifier, cancel)
        })
    }

    /// Copy the content behind a handle into the private cache in the background.
    pub fn submit_copy_to_cache(&self, uri: ContentUri) -> ResolveTask<FilePath> {
        self.submit("copy_content_to_cache", move |resolver, cancel| {
            resolver.copy_content_to_cache(&uri, cancel)
        })
    }

    /// Copy a private file to public storage in the background.
    pub fn submit_copy_to_public(&self, file: FilePath) -> ResolveTask<Location> {
        self.submit("copy_private_file_to_public_location", move |resolver, cancel| {
            resolver.copy_private_file_to_public_location(&file, cancel)
        })
    }
}

impl Drop for ResolverWorker {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("resolver thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use sharekit_base::{MockPal, PalHandle};

    const PHOTO: &str = "content://media/external/images/media/29582";

    fn worker_for(mock: &MockPal, threads: usize) -> ResolverWorker {
        let config = ResolverConfig {
            worker_threads: threads,
            ..ResolverConfig::default()
        };
        let resolver = FileResolver::new(PalHandle::new(mock.clone()), config).unwrap();
        ResolverWorker::start(resolver).unwrap()
    }

    #[test]
    fn test_resolve_in_background() {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("data/cache/a.png"), b"png".to_vec());
        let worker = worker_for(&mock, 2);

        let handle = worker.submit_resolve("data/cache/a.png").wait().unwrap();

        assert_eq!(mock.content_bytes(&handle), Some(b"png".to_vec()));
    }

    #[test]
    fn test_content_handle_passes_through_worker() {
        let worker = worker_for(&MockPal::new(), 1);
        let task = worker.submit_resolve(PHOTO);
        let result = task.wait_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(result.unwrap().to_string(), PHOTO);
    }

    #[test]
    fn test_copy_to_cache_in_background() {
        let mock = MockPal::new();
        let uri = ContentUri::parse(PHOTO).unwrap();
        mock.add_content(uri.clone(), Some("holiday.png"), b"data".to_vec());
        let worker = worker_for(&mock, 1);

        let cached = worker.submit_copy_to_cache(uri).wait().unwrap();
        assert_eq!(mock.file_content(&cached), Some(b"data".to_vec()));
    }

    #[test]
    fn test_copy_to_public_in_background() {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("data/cache/a.txt"), b"text".to_vec());
        let worker = worker_for(&mock, 1);

        let location = worker
            .submit_copy_to_public(FilePath::from("data/cache/a.txt"))
            .wait()
            .unwrap();
        assert_eq!(
            mock.content_bytes(location.as_content().unwrap()),
            Some(b"text".to_vec())
        );
    }

    #[test]
    fn test_errors_are_delivered() {
        let worker = worker_for(&MockPal::new(), 1);
        let err = worker.submit_resolve("data/cache/missing.png").wait().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ResolutionFailed { .. }));
    }

    #[test]
    fn test_cancel_before_start_skips_job() {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("data/cache/a.png"), b"png".to_vec());
        let worker = worker_for(&mock, 1);

        // Occupy the single thread until the second task has been cancelled.
        let (release, blocked) = crossbeam_channel::bounded::<()>(1);
        let blocker = worker.submit("block", move |_, _| {
            blocked
                .recv()
                .map_err(|_| sharekit_base::err!("release channel closed"))
        });
        let task = worker.submit_resolve("data/cache/a.png");
        task.cancel();
        assert!(task.is_cancel_requested());
        release.send(()).unwrap();

        blocker.wait().unwrap();
        let err = task.wait().unwrap_err();
        assert!(err.is_cancelled());
        assert!(mock.media_entries().is_empty());
    }

    #[test]
    fn test_try_result_is_none_while_running() {
        let worker = worker_for(&MockPal::new(), 1);
        let (release, blocked) = crossbeam_channel::bounded::<()>(1);
        let task = worker.submit("block", move |_, _| {
            blocked
                .recv()
                .map_err(|_| sharekit_base::err!("release channel closed"))
        });

        assert!(task.try_result().is_none());
        release.send(()).unwrap();
        task.wait().unwrap();
    }

    #[test]
    fn test_task_ids_increase() {
        let worker = worker_for(&MockPal::new(), 1);
        let first = worker.submit_resolve(PHOTO);
        let second = worker.submit_resolve(PHOTO);
        assert!(second.id() > first.id());
    }

    #[test]
    fn test_drop_finishes_queued_jobs() {
        let mock = MockPal::new();
        mock.add_file(FilePath::from("data/cache/a.png"), b"png".to_vec());
        let worker = worker_for(&mock, 1);
        let task = worker.submit_resolve("data/cache/a.png");

        drop(worker);

        assert!(task.try_result().unwrap().is_ok());
    }
}
