use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for the shower engine.
///
/// Configuration problems surface as `InvalidParam` before any simulation state is
/// touched. Kernel failures are fatal to the running batch. Observer failures are
/// only ever seen by the dispatcher, which decides whether they matter.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter (beam, forcing window, material index, ...).
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The transport kernel could not complete a sampling or geometry call.
    #[error("transport kernel failure: {0}")]
    Kernel(String),

    /// An observer failed while handling an event.
    #[error("observer failure: {0}")]
    Observer(String),

    /// A batch description could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Propagated I/O errors (e.g., reading a batch description from disk).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand used by kernel implementations to report a sampling failure.
    pub fn kernel<S: Into<String>>(msg: S) -> Self {
        Error::Kernel(msg.into())
    }

    /// Shorthand used by observers to report a handler failure.
    pub fn observer<S: Into<String>>(msg: S) -> Self {
        Error::Observer(msg.into())
    }
}
