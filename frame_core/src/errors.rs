//! # Error Types
//!
//! Structured error types for frame_core. Every failure names the stage
//! concept it belongs to (geometry, analysis, configuration) and carries the
//! offending identifiers so a reviewer can locate the problem in the model.
//!
//! ## Example
//!
//! ```rust
//! use frame_core::errors::{DesignError, DesignResult};
//!
//! fn validate_tolerance(tol_ft: f64) -> DesignResult<()> {
//!     if tol_ft <= 0.0 {
//!         return Err(DesignError::configuration(
//!             "level_tolerance_ft",
//!             "Tolerance must be positive",
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for frame_core operations
pub type DesignResult<T> = Result<T, DesignError>;

/// Kind of geometry problem detected by the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryErrorKind {
    /// A region bounded by beams does not close, or a beam encloses nothing
    UnenclosedRegion,
    /// Beams cross without a joint, or a face is not a simple polygon
    Degenerate,
    /// A floor beam spans two different elevations
    InconsistentElevation,
}

impl GeometryErrorKind {
    /// Short description used in error messages
    pub fn description(&self) -> &'static str {
        match self {
            GeometryErrorKind::UnenclosedRegion => "unenclosed region",
            GeometryErrorKind::Degenerate => "degenerate region",
            GeometryErrorKind::InconsistentElevation => "inconsistent level elevation",
        }
    }
}

impl std::fmt::Display for GeometryErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Structured error type for pipeline operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum DesignError {
    /// Geometry cannot be interpreted; never auto-repaired
    #[error("Geometry error ({kind}): {reason} [frames: {frames:?}, joints: {joints:?}]")]
    Geometry {
        kind: GeometryErrorKind,
        reason: String,
        frames: Vec<String>,
        joints: Vec<String>,
    },

    /// The structural solver could not return results
    #[error("Analysis failed: {reason}")]
    Analysis { reason: String },

    /// Configuration is missing or invalid
    #[error("Configuration error for '{field}': {reason}")]
    Configuration { field: String, reason: String },

    /// An input value is invalid (out of range, wrong shape, etc.)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A referenced joint, frame, group or section does not exist
    #[error("Unknown {entity}: {id}")]
    UnknownEntity { entity: String, id: String },

    /// A pipeline stage was requested before its prerequisites were committed
    #[error("Stage '{stage}' cannot run: {reason}")]
    InvalidStage { stage: String, reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// File is locked by another user/process
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Checkpoint schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },
}

impl DesignError {
    /// Create a Geometry error
    pub fn geometry(
        kind: GeometryErrorKind,
        reason: impl Into<String>,
        frames: Vec<String>,
        joints: Vec<String>,
    ) -> Self {
        DesignError::Geometry {
            kind,
            reason: reason.into(),
            frames,
            joints,
        }
    }

    /// Create an Analysis error
    pub fn analysis(reason: impl Into<String>) -> Self {
        DesignError::Analysis {
            reason: reason.into(),
        }
    }

    /// Create a Configuration error
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DesignError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        DesignError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnknownEntity error
    pub fn unknown(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DesignError::UnknownEntity {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an InvalidStage error
    pub fn invalid_stage(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        DesignError::InvalidStage {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        DesignError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileLocked error
    pub fn file_locked(path: impl Into<String>, locked_by: impl Into<String>, locked_at: impl Into<String>) -> Self {
        DesignError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Whether retrying the same call can succeed. Analysis failures never do.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DesignError::FileLocked { .. })
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            DesignError::Geometry { .. } => "GEOMETRY_ERROR",
            DesignError::Analysis { .. } => "ANALYSIS_ERROR",
            DesignError::Configuration { .. } => "CONFIGURATION_ERROR",
            DesignError::InvalidInput { .. } => "INVALID_INPUT",
            DesignError::UnknownEntity { .. } => "UNKNOWN_ENTITY",
            DesignError::InvalidStage { .. } => "INVALID_STAGE",
            DesignError::FileError { .. } => "FILE_ERROR",
            DesignError::FileLocked { .. } => "FILE_LOCKED",
            DesignError::SerializationError { .. } => "SERIALIZATION_ERROR",
            DesignError::VersionMismatch { .. } => "VERSION_MISMATCH",
        }
    }
}

impl From<serde_json::Error> for DesignError {
    fn from(e: serde_json::Error) -> Self {
        DesignError::SerializationError { reason: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = DesignError::geometry(
            GeometryErrorKind::UnenclosedRegion,
            "beam encloses no region",
            vec!["B7".to_string()],
            vec![],
        );
        let json = serde_json::to_string(&error).unwrap();
        let roundtrip: DesignError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(DesignError::analysis("singular").error_code(), "ANALYSIS_ERROR");
        assert_eq!(
            DesignError::configuration("design_code", "unknown").error_code(),
            "CONFIGURATION_ERROR"
        );
    }

    #[test]
    fn test_analysis_not_recoverable() {
        assert!(!DesignError::analysis("unstable").is_recoverable());
        assert!(DesignError::file_locked("a.fcp", "me", "now").is_recoverable());
    }

    #[test]
    fn test_geometry_message_names_kind() {
        let error = DesignError::geometry(
            GeometryErrorKind::InconsistentElevation,
            "beam ends at 12.0 ft and 13.0 ft",
            vec!["B1".to_string()],
            vec!["J1".to_string(), "J2".to_string()],
        );
        assert!(error.to_string().contains("inconsistent level elevation"));
        assert!(error.to_string().contains("B1"));
    }
}
