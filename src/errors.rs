//! Error types for the fairround engine
//!
//! One root error with a nested enum per concern. Play validation failures are
//! kept separate so the API layer can map them to client errors.

use thiserror::Error;

/// Root error type for all engine operations
#[derive(Debug, Error)]
pub enum FairroundError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Storage system errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Rejected bet submissions
    #[error("Play rejected: {0}")]
    Play(#[from] PlayError),

    /// Round lookup and transition errors
    #[error("Round error: {0}")]
    Round(#[from] RoundError),

    /// Malformed verification input
    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    #[error("Unknown game: {0}")]
    UnknownGame(String),
}

/// Configuration and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

/// Storage system errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    DatabaseOpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Reasons a play is refused. None of these mutate state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlayError {
    #[error("Bet {amount} outside bounds [{min}, {max}]")]
    BetOutOfBounds { amount: u64, min: u64, max: u64 },

    #[error("Invalid choice '{choice}' for game {game_id}")]
    InvalidChoice { game_id: String, choice: String },

    #[error("Missing user id")]
    MissingUser,

    #[error("Round {bucket_start} of game {game_id} has not opened yet")]
    BucketNotOpen { game_id: String, bucket_start: u64 },

    #[error("Round {bucket_start} of game {game_id} closed at {closes_at}")]
    BucketClosed {
        game_id: String,
        bucket_start: u64,
        closes_at: u64,
    },
}

/// Round lookup and transition errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoundError {
    #[error("Round {bucket_start} of game {game_id} not found")]
    NotFound { game_id: String, bucket_start: u64 },

    #[error("Round {bucket_start} of game {game_id} is still open until {closes_at}")]
    StillOpen {
        game_id: String,
        bucket_start: u64,
        closes_at: u64,
    },

    #[error("Bucket start {bucket_start} is not aligned to the {duration_secs}s round duration")]
    Misaligned { bucket_start: u64, duration_secs: u64 },

    /// The configured secret no longer reproduces the published seed hash.
    #[error("Seed for round {bucket_start} of game {game_id} does not match its commitment")]
    CommitmentMismatch { game_id: String, bucket_start: u64 },
}

/// Malformed verification input
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Invalid hex in {field}: {reason}")]
    InvalidHex { field: String, reason: String },

    #[error("{field} must be 32 bytes, got {len}")]
    InvalidLength { field: String, len: usize },
}

// External error conversions
impl From<rocksdb::Error> for FairroundError {
    fn from(e: rocksdb::Error) -> Self {
        FairroundError::Storage(StorageError::WriteFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for FairroundError {
    fn from(e: serde_json::Error) -> Self {
        FairroundError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

impl From<std::io::Error> for FairroundError {
    fn from(e: std::io::Error) -> Self {
        FairroundError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

impl From<toml::de::Error> for FairroundError {
    fn from(e: toml::de::Error) -> Self {
        FairroundError::Configuration(ConfigurationError::LoadFailed(format!(
            "Failed to parse TOML: {}",
            e
        )))
    }
}

impl FairroundError {
    /// True for errors caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FairroundError::Play(_)
                | FairroundError::UnknownGame(_)
                | FairroundError::Verification(_)
                | FairroundError::Round(RoundError::NotFound { .. })
                | FairroundError::Round(RoundError::StillOpen { .. })
                | FairroundError::Round(RoundError::Misaligned { .. })
        )
    }
}

// Convenience type alias for Results
pub type FairroundResult<T> = Result<T, FairroundError>;
