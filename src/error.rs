use std::{io, path::PathBuf};

use thiserror::Error;

/// Main error type for albumsync.
///
/// Covers every failure that can cross a component boundary: the source
/// store, configuration, blob decoding, media probing, the notification
/// transport, and task joins inside a sync pass. Item-level variants
/// (`Decode`, `Media`, `Timestamp`) are normally absorbed by the ingest
/// workers and only surface when a caller uses those components directly.
#[derive(Debug, Error)]
pub enum Error {
   /// I/O error occurred during file or process operations.
   #[error("io error: {0}")]
   Io(#[from] io::Error),

   /// The source store file is missing or unreadable. Nothing can be mirrored
   /// without it, so the scheduler stops when it sees this.
   #[error("source store unavailable at {path}: {source}", path = path.display())]
   SourceUnavailable {
      path:   PathBuf,
      #[source]
      source: io::Error,
   },

   /// A query against the source store failed.
   #[error("sqlite error: {0}")]
   Sqlite(#[from] rusqlite::Error),

   /// Configuration-related error occurred.
   #[error("config error: {0}")]
   Config(#[from] ConfigError),

   /// A metadata blob could not be decoded into a record.
   #[error("decode error: {0}")]
   Decode(#[from] DecodeError),

   /// Probing a media file or extracting a video frame failed.
   #[error("media error: {0}")]
   Media(#[from] MediaError),

   /// A source-native timestamp could not be converted.
   #[error("timestamp error: {0}")]
   Timestamp(#[from] TimestampError),

   /// HTTP request or response error occurred.
   #[error("http error: {0}")]
   Http(#[from] HttpError),

   /// JSON serialization or deserialization error occurred.
   #[error("json error: {0}")]
   Json(#[from] serde_json::Error),

   /// A spawned ingestion or query task panicked or was cancelled.
   #[error("task join error: {0}")]
   Join(#[from] tokio::task::JoinError),

   /// Requested album is not present in the catalog.
   #[error("album not found: {0}")]
   AlbumNotFound(String),

   /// A recipient token was empty or contained whitespace.
   #[error("invalid recipient token {0:?}")]
   InvalidToken(String),
}

impl Error {
   pub const fn is_fatal(&self) -> bool {
      matches!(self, Self::SourceUnavailable { .. } | Self::Config(_))
   }

   pub const fn exit_code(&self) -> i32 {
      if self.is_fatal() { 2 } else { 1 }
   }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
   /// Failed to retrieve user directories (e.g. home directory).
   #[error("failed to get user directories")]
   GetUserDirectories,

   /// A required setting was not provided by any layer.
   #[error("missing required setting '{0}'")]
   Missing(&'static str),

   /// A configured path does not exist.
   #[error("{key} does not exist: {path}", path = path.display())]
   NotFound { key: &'static str, path: PathBuf },

   /// A numeric setting is out of range.
   #[error("invalid value for '{key}': {reason}")]
   Invalid { key: &'static str, reason: String },

   /// The layered configuration could not be extracted.
   #[error("failed to extract configuration: {0}")]
   Extract(#[from] Box<figment::Error>),
}

/// Errors that can occur while turning a metadata blob into a typed record.
#[derive(Debug, Error)]
pub enum DecodeError {
   /// The blob is not a readable property list.
   #[error("malformed blob: {0}")]
   Malformed(String),

   /// The archive structure does not lead to a root object.
   #[error("archive has no root object")]
   MissingRoot,

   /// A reference inside the archive points outside the object table.
   #[error("dangling archive reference {0}")]
   DanglingReference(u64),

   /// The archive nests deeper than the decoder is willing to follow.
   #[error("archive nesting exceeds {0} levels")]
   TooDeep(usize),

   /// The root object is not a keyed record.
   #[error("root object is not a record")]
   NotARecord,

   /// A field required to build a typed entity is missing or empty.
   #[error("missing field '{0}'")]
   MissingField(&'static str),
}

/// Errors from local media probing and frame extraction.
#[derive(Debug, Error)]
pub enum MediaError {
   /// Reading the image header failed.
   #[error("failed to read image header of {path}: {reason}", path = path.display())]
   ImageHeader { path: PathBuf, reason: String },

   /// The external tool could not be started.
   #[error("failed to run {tool}: {source}")]
   Spawn {
      tool:   String,
      #[source]
      source: io::Error,
   },

   /// The external tool exited unsuccessfully.
   #[error("{tool} exited with {status}")]
   ToolFailed { tool: String, status: String },

   /// The external tool produced output that could not be understood.
   #[error("unexpected output from {tool}: {output}")]
   UnexpectedOutput { tool: String, output: String },
}

/// Errors converting a source-native timestamp.
#[derive(Debug, Error)]
pub enum TimestampError {
   /// The value is NaN or infinite.
   #[error("timestamp is not finite: {0}")]
   NotFinite(f64),

   /// The value cannot be represented as a calendar date.
   #[error("timestamp out of range: {0}")]
   OutOfRange(f64),
}

/// Errors that can occur during HTTP operations.
#[derive(Debug, Error)]
pub enum HttpError {
   /// HTTP request failed (network error, timeout, etc.).
   #[error("request failed: {0}")]
   Request(#[from] reqwest::Error),

   /// Received a non-success HTTP status code.
   #[error("invalid status code {status}: {body}")]
   StatusCode { status: u16, body: String },
}

impl From<figment::Error> for ConfigError {
   fn from(e: figment::Error) -> Self {
      Self::Extract(Box::new(e))
   }
}

/// Standard result type using [`enum@Error`] as the default error type
pub type Result<T, E = Error> = std::result::Result<T, E>;
