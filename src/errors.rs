//! Error handling for the git-drover crate.
use std::{error::Error as StdError, fmt};

/// Error type for the git-drover crate.
#[derive(Debug)]
pub struct DroverError {
    /// Inner error.
    inner: Box<Inner>,
}

impl DroverError {
    /// Create a new error.
    pub(crate) fn new(kind: DroverErrorKind) -> Self {
        Self {
            inner: Box::new(Inner {
                kind,
                source: None,
                transient: false,
            }),
        }
    }

    /// Create a new error with a text message and a source.
    pub(crate) fn new_with_source<E>(kind: DroverErrorKind, text: &str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(Inner {
                kind,
                source: Some(Box::new(std::io::Error::other(format!(
                    "{text}: {source}"
                )))),
                transient: false,
            }),
        }
    }

    /// Attach a text message as the error source.
    pub(crate) fn with_text(mut self, text: &str) -> Self {
        self.inner.source = Some(Box::new(std::io::Error::other(text)));
        self
    }

    /// Mark the error as transient (worth retrying).
    pub(crate) fn transient(mut self) -> Self {
        self.inner.transient = true;
        self
    }

    /// Whether a retry has a chance of succeeding.
    pub(crate) fn is_transient(&self) -> bool {
        self.inner.transient
    }
}

/// Type alias for a boxed error.
pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Inner error type for the git-drover crate.
#[derive(Debug)]
struct Inner {
    /// Error kind.
    kind: DroverErrorKind,

    /// Whether the failure is worth retrying.
    transient: bool,

    /// Source error.
    source: Option<BoxError>,
}

/// Error kinds for the git-drover crate.
#[derive(Debug)]
pub(crate) enum DroverErrorKind {
    /// Error from an HTTP call to a hosting provider.
    Http,

    /// Error from an external git process.
    Process,

    /// Error related to the reqwest crate.
    Reqwest,

    /// Error related to serde.
    Serde,

    /// Error related to configuration (flags, environment, paths).
    Config,

    /// Error related to the repository list.
    RepoList,

    /// I/O error.
    Io,
}

impl fmt::Display for DroverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.source {
            Some(source) => write!(f, "{:?}: {}", self.inner.kind, source),
            None => write!(f, "{:?}", self.inner.kind),
        }
    }
}

impl StdError for DroverError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

impl From<reqwest::Error> for DroverError {
    fn from(e: reqwest::Error) -> Self {
        // connection drops and client-side timeouts are worth retrying
        let transient = e.is_connect() || e.is_timeout();
        Self {
            inner: Box::new(Inner {
                kind: DroverErrorKind::Reqwest,
                source: Some(Box::new(e)),
                transient,
            }),
        }
    }
}

impl From<serde_json::Error> for DroverError {
    fn from(e: serde_json::Error) -> Self {
        Self {
            inner: Box::new(Inner {
                kind: DroverErrorKind::Serde,
                source: Some(Box::new(e)),
                transient: false,
            }),
        }
    }
}

impl From<std::io::Error> for DroverError {
    fn from(e: std::io::Error) -> Self {
        Self {
            inner: Box::new(Inner {
                kind: DroverErrorKind::Io,
                source: Some(Box::new(e)),
                transient: false,
            }),
        }
    }
}

impl From<&str> for DroverError {
    fn from(e: &str) -> Self {
        DroverError::new(DroverErrorKind::Config).with_text(e)
    }
}

impl From<String> for DroverError {
    fn from(e: String) -> Self {
        DroverError::new(DroverErrorKind::Config).with_text(&e)
    }
}
