use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sharekit_base::{ErrorKind, ShareError, ShareResult};

/// Shared flag that asks a running copy to stop at the next chunk boundary.
///
/// Clones observe the same flag, so the caller keeps one clone and hands the
/// other to the job doing the work.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fails with `Cancelled` once cancellation was requested.
    pub fn check(&self) -> ShareResult<()> {
        if self.is_cancelled() {
            return Err(Box::new(ShareError::new(ErrorKind::Cancelled)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancellationToken::new();
        let job_token = token.clone();
        assert!(job_token.check().is_ok());

        token.cancel();

        assert!(job_token.is_cancelled());
        let err = job_token.check().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Cancelled));
    }
}
