use std::collections::TryReserveError;
use std::io;
use std::panic::Location;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the index builder, the codec and the search path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    #[error("I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("I/O failure on {} ({location}): {source}", path.display())]
    File {
        path: PathBuf,
        location: &'static Location<'static>,
        #[source]
        source: io::Error,
    },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("invalid sequence: {0}")]
    InvalidSequence(String),

    #[error("symbol {symbol:?} is not in the alphabet")]
    SymbolOutOfAlphabet { symbol: char },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),
}

impl Error {
    /// Wraps an I/O error with the file it happened on and the caller's location.
    #[track_caller]
    pub fn file<P: AsRef<Path>>(path: P, source: io::Error) -> Self {
        Error::File { path: path.as_ref().to_path_buf(), location: Location::caller(), source }
    }

    pub(crate) fn alloc(what: &str, err: TryReserveError) -> Self {
        Error::AllocationFailure(format!("{what}: {err}"))
    }
}
