//! # Error
//!
//! Module dedicated to the library errors. It contains an [`Error`]
//! enum based on [`thiserror::Error`] and a type alias [`Result`].

use std::{io, path::PathBuf, result};

use thiserror::Error;

/// The global `Result` alias of the library.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("task {0} already exists")]
    DuplicateKey(String),
    #[error("no task found with id {0}")]
    NotFound(String),

    #[error("malformed task record: {0}")]
    MalformedRecord(String),
    #[error("timestamp {1:?} of field {0} has no timezone offset")]
    NaiveTimestamp(&'static str, String),

    #[error("cannot parse task store {0}")]
    CorruptStore(PathBuf, #[source] serde_json::Error),
    #[error("cannot load task #{1} of store {0}")]
    CorruptStoreEntry(PathBuf, usize, #[source] Box<Error>),
    #[error("cannot read task store {0}")]
    ReadStore(PathBuf, #[source] io::Error),
    #[error("cannot write task store {0}")]
    WriteStore(PathBuf, #[source] io::Error),
    #[error("cannot serialize task store")]
    SerializeStore(#[source] serde_json::Error),

    #[error("cannot write markdown file {0}")]
    WriteMarkdown(PathBuf, #[source] io::Error),
    #[error("cannot prepare export directory {0}")]
    CreateExportDir(PathBuf, #[source] io::Error),
    #[error("cannot list export directory {0}")]
    ReadExportDir(PathBuf, #[source] io::Error),
    #[error("cannot remove stale markdown file {0}")]
    RemoveStaleMarkdown(PathBuf, #[source] io::Error),

    #[error("mail API call failed with status {0}: {1}")]
    Gateway(u16, String),
    #[error("cannot reach mail API")]
    GatewayTransport(#[source] reqwest::Error),
    #[error("cannot decode mail API response")]
    GatewayDecode(#[source] reqwest::Error),
    #[error("invalid mail API url {0}")]
    InvalidApiUrl(String),
    #[error("unable to obtain access token: {0}")]
    Authentication(String),

    #[error("cannot access token cache {0}")]
    TokenCache(PathBuf, #[source] io::Error),
    #[error("invalid token cache {0}")]
    DecodeTokenCache(PathBuf, #[source] serde_json::Error),
    #[error("cannot find configuration directory")]
    ConfigDirNotFound,
    #[error("cannot access keyring entry {0}")]
    Keyring(String, #[source] keyring::Error),
}

impl Error {
    /// Tells whether the error comes from the remote mail service
    /// (including authentication against it).
    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            Self::Gateway(..)
                | Self::GatewayTransport(_)
                | Self::GatewayDecode(_)
                | Self::Authentication(_)
        )
    }
}
