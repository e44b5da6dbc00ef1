use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use tracing_error::{SpanTrace, SpanTraceStatus};

/* 📖 # Why a custom error type and not use anyhow/eyre/thiserror etc?

- Better control over error handling
- Callers branch on the failure category (e.g. the share button reports a
  `NameUnresolvable` differently than a `Cancelled` copy)
- More transparency into error handling logic
 */

/// Error variants that can occur while resolving and copying shareable files.
/// Each variant represents a specific error category with its associated context.
#[derive(Debug)]
pub enum ErrorKind {
    /// A content handle or source file could not be opened or read
    SourceUnreadable {
        handle: String,
        source: Option<std::io::Error>,
    },

    /// Neither the media index nor the handle path yields a display name
    NameUnresolvable { handle: String },

    /// Writing to, or registering, a public destination failed
    DestinationWriteFailed {
        destination: String,
        source: Option<std::io::Error>,
    },

    /// The identifier is neither a content handle nor a filesystem path
    UnsupportedIdentifierShape { identifier: String },

    /// No shareable handle could be produced for the identifier
    ResolutionFailed { identifier: String },

    /// The operation was cancelled before it completed
    Cancelled,

    /// File system operation failed
    FileError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Catch-all for other errors with a message
    Message { message: String },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::SourceUnreadable { handle, source } => {
                write!(f, "Source unreadable: {}", handle)?;
                if let Some(source) = source {
                    write!(f, ": {}", source)?;
                }
                Ok(())
            }
            ErrorKind::NameUnresolvable { handle } => {
                write!(f, "Unable to resolve a display name for {}", handle)
            }
            ErrorKind::DestinationWriteFailed {
                destination,
                source,
            } => {
                write!(f, "Failed to write destination {}", destination)?;
                if let Some(source) = source {
                    write!(f, ": {}", source)?;
                }
                Ok(())
            }
            ErrorKind::UnsupportedIdentifierShape { identifier } => {
                write!(f, "Unsupported identifier shape: '{}'", identifier)
            }
            ErrorKind::ResolutionFailed { identifier } => {
                write!(f, "Failed to resolve a shareable handle for {}", identifier)
            }
            ErrorKind::Cancelled => write!(f, "Operation cancelled"),
            ErrorKind::FileError { path, source } => {
                write!(f, "File error at {}: {}", path.display(), source)
            }
            ErrorKind::Message { message } => write!(f, "{}", message),
        }
    }
}

/* 📖 # Why separate ErrorKind and ShareError?
This two-layer design provides a clear separation of concerns:
- ErrorKind: structural variants with specific contexts (handles, paths, io errors)
- ShareError: wraps ErrorKind with runtime context, an optional cause and a span trace

Callers pattern match on ErrorKind, while propagation attaches context without
nesting formatted strings.
*/

/// Error type wrapping ErrorKind with context, an optional cause and the span
/// trace active when the error was created.
pub struct ShareError {
    kind: ErrorKind,
    context: Vec<String>,
    cause: Option<Box<ShareError>>,
    span_trace: SpanTrace,
}

impl ShareError {
    /// Creates a new error from an ErrorKind, capturing the current span trace.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: vec![],
            cause: None,
            span_trace: SpanTrace::capture(),
        }
    }

    /// Creates a `Message` error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message {
            message: message.into(),
        })
    }

    /// Attaches context to an error.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attaches context using lazy evaluation.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.context.push(f());
        self
    }

    /// Records the error that caused this one.
    pub fn caused_by(mut self, cause: impl Into<Box<ShareError>>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Returns a reference to the underlying ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the attached context entries, oldest first.
    pub fn get_context(&self) -> &[String] {
        &self.context
    }

    /// Returns the error that caused this one, if any.
    pub fn cause(&self) -> Option<&ShareError> {
        self.cause.as_deref()
    }

    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// Returns true if this error, or any error in its cause chain, is `Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
            || self.cause().is_some_and(ShareError::is_cancelled)
    }

    /// True if a file could not be created because something already exists at its path.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            &self.kind,
            ErrorKind::FileError { source, .. } if source.kind() == std::io::ErrorKind::AlreadyExists
        )
    }

    /// Returns the innermost error in the chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: &str) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        let child_count = self.context.len() + usize::from(self.cause.is_some());
        for (index, ctx) in self.context.iter().enumerate() {
            let branch = if index + 1 == child_count {
                "└─"
            } else {
                "├─"
            };
            writeln!(f, "{}{} {}", indent, branch, ctx)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, "{}└─ cause: ", indent)?;
            cause.fmt_tree(f, &format!("{}   ", indent))?;
        }
        Ok(())
    }
}

impl From<ErrorKind> for ShareError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl StdError for ShareError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::FileError { source, .. } => Some(source),
            ErrorKind::SourceUnreadable {
                source: Some(source),
                ..
            }
            | ErrorKind::DestinationWriteFailed {
                source: Some(source),
                ..
            } => Some(source),
            _ => self
                .cause
                .as_deref()
                .map(|cause| cause as &(dyn StdError + 'static)),
        }
    }
}

impl fmt::Display for ShareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ctx in &self.context {
            write!(f, "{}: ", ctx)?;
        }
        write!(f, "{}", self.kind)
    }
}

impl fmt::Debug for ShareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, "")?;
        if self.span_trace.status() == SpanTraceStatus::CAPTURED {
            writeln!(f, "Trace: {}", self.span_trace)?;
        }
        Ok(())
    }
}

/* 📖 # Why use Box<ShareError> in the result type?

Boxing the error reduces the size of the result type, making it more efficient to return in the common case.
*/

/// Standard result type for sharekit operations.
pub type ShareResult<T> = std::result::Result<T, Box<ShareError>>;

/// Extension trait for attaching context to Results.
pub trait ResultExt<T> {
    /// Attaches context to an error, consuming and re-wrapping it.
    fn context(self, context: impl Into<String>) -> ShareResult<T>;

    /// Attaches context using lazy evaluation.
    /// Context is only evaluated if the result is an error.
    fn with_context<F>(self, f: F) -> ShareResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for ShareResult<T> {
    fn context(self, context: impl Into<String>) -> ShareResult<T> {
        self.map_err(|err| Box::new(err.context(context)))
    }

    fn with_context<F>(self, f: F) -> ShareResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| Box::new(err.with_context(f)))
    }
}

/// Builds a boxed `Message` error from format arguments.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        Box::new($crate::ShareError::message(format!($($arg)*)))
    };
}

/// Returns early with a boxed `Message` error built from format arguments.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::err!($($arg)*))
    };
}
