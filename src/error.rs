use std::io;

/// Fatal conditions that abort a peer immediately (spec.md §7: "I/O failure
/// on the socket or file: fatal; terminate with a non-zero exit status").
///
/// Recoverable protocol conditions (stale ACKs, duplicates, lost segments,
/// protocol violations) are never represented here — they are absorbed by
/// the state machine and drive a RESET/CLOSE transition instead of an
/// `Err`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("socket I/O error: {0}")]
    Socket(#[from] io::Error),

    #[error("failed to read input file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write output file {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed datagram: {0} bytes, need at least 4")]
    MalformedDatagram(usize),

    #[error("file {0} is larger than the {1}-byte design ceiling for this sequence space")]
    FileTooLarge(usize, usize),
}

pub type Result<T> = std::result::Result<T, Error>;
