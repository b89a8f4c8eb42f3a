//! Custom error types for schema mapping operations.
//!
//! Every failure raised by a store primitive, expression parser or
//! configuration loader is one of the domain enums below, wrapped by
//! [`SchemaMapError`]. Nothing is retried or rolled back: callers see the
//! first error and the operation stops there.

use std::path::PathBuf;

use arrow_schema::ArrowError;
use thiserror::Error;

/// Main error type for schema mapping operations.
///
/// Display formatting is delegated to the wrapped variant.
#[derive(Debug, Error)]
pub enum SchemaMapError {
    /// Feature store errors (missing collections or fields, name collisions, type mismatches)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Field expression errors
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// I/O errors (file read/write, path issues, permissions)
    #[error(transparent)]
    Io(#[from] IoError),

    /// Format parsing and validation errors
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Arrow errors raised while assembling record batches
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Errors raised by the feature store primitives.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named collection does not exist in the workspace
    #[error("Feature collection '{name}' not found in {workspace}")]
    CollectionNotFound {
        /// The requested collection
        name: String,
        /// Workspace description
        workspace: String,
    },

    /// The output collection name is already taken
    #[error("Feature collection '{name}' already exists in {workspace}")]
    CollectionExists {
        /// The colliding collection
        name: String,
        /// Workspace description
        workspace: String,
    },

    /// Collection name cannot be used
    #[error("Invalid feature collection name '{name}': {reason}")]
    InvalidName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// A field was not found on a collection
    #[error("Field '{field}' not found on '{collection}'")]
    FieldNotFound {
        /// The collection
        collection: String,
        /// The missing field
        field: String,
    },

    /// A field name is already in use on a collection
    #[error("Field '{field}' already exists on '{collection}'")]
    FieldExists {
        /// The collection
        collection: String,
        /// The duplicate field
        field: String,
    },

    /// The geometry field cannot take part in attribute operations
    #[error("Field '{field}' on '{collection}' is the geometry field and cannot be {operation}")]
    GeometryField {
        /// The collection
        collection: String,
        /// The geometry field name
        field: String,
        /// What was attempted (e.g., "renamed", "calculated")
        operation: String,
    },

    /// A null value would land in a non-nullable field
    #[error("Field '{field}' on '{collection}' is not nullable")]
    NotNullable {
        /// The collection
        collection: String,
        /// The field
        field: String,
    },

    /// A value could not be converted to the field type
    #[error("Field '{field}' has incompatible type: expected {expected}, found {found}")]
    TypeMismatch {
        /// The field name
        field: String,
        /// Expected type
        expected: String,
        /// Value or type found
        found: String,
    },
}

/// Field expression errors.
#[derive(Debug, Error)]
pub enum ExpressionError {
    /// The expression text could not be parsed
    #[error("Invalid field expression '{expression}': {reason}")]
    Invalid {
        /// The raw expression text
        expression: String,
        /// Why it could not be parsed
        reason: String,
    },
}

/// I/O related errors.
#[derive(Debug, Error)]
pub enum IoError {
    /// Failed to read from a file
    #[error("Failed to read {format} file '{path}': {source}")]
    Read {
        /// The format being read (e.g., "`GeoJSON`", "JSON")
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to write to a file
    #[error("Failed to write {format} file '{path}': {source}")]
    Write {
        /// The format being written
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Path is invalid
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path
        path: PathBuf,
        /// Why the path is invalid
        reason: String,
    },

    /// File was not found
    #[error("File not found: '{path}'")]
    FileNotFound {
        /// The missing file path
        path: PathBuf,
    },
}

/// Format parsing and validation errors.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Failed to parse a format
    #[error("Failed to parse {format}: {message}")]
    Parse {
        /// The format being parsed
        format: String,
        /// Description of the parse error
        message: String,
    },

    /// Invalid geometry
    #[error("Invalid geometry in {format}: {message}{}", feature.map(|idx| format!(" (feature {idx})")).unwrap_or_default())]
    InvalidGeometry {
        /// The format
        format: String,
        /// Description of the geometry problem
        message: String,
        /// Optional zero-based feature index where the error occurred
        feature: Option<usize>,
    },

    /// Failed to serialize a collection
    #[error("Failed to serialize {format}: {message}")]
    Serialize {
        /// The format being produced
        format: String,
        /// Description of the failure
        message: String,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },
}

/// Type alias for Results using `SchemaMapError`.
pub type Result<T> = std::result::Result<T, SchemaMapError>;

impl SchemaMapError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Store(e) => e.user_message(),
            Self::Io(e) => e.user_message(),
            Self::Expression(e) => format!("Expression error: {e}"),
            Self::Format(e) => e.to_string(),
            Self::Config(e) => format!("Configuration error: {e}"),
            Self::Arrow(e) => format!("Error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Store(e) => e.recovery_suggestion(),
            Self::Io(e) => e.recovery_suggestion(),
            Self::Expression(_) => Some(
                "Quote literals as 'text' and reference fields as !FieldName!.".to_string(),
            ),
            _ => None,
        }
    }

    /// Check if this error is potentially recoverable.
    ///
    /// Recoverable errors go away once the caller changes its arguments,
    /// without touching the workspace.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Expression(_)
                | Self::Store(StoreError::CollectionExists { .. } | StoreError::InvalidName { .. })
        )
    }
}

impl StoreError {
    fn user_message(&self) -> String {
        match self {
            Self::CollectionNotFound { name, .. } => {
                format!("Feature collection '{name}' does not exist.")
            },
            Self::CollectionExists { name, .. } => {
                format!("Output feature collection '{name}' already exists.")
            },
            _ => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::CollectionNotFound { .. } => {
                Some("Run 'schemamap list' to see the collections in the workspace.".to_string())
            },
            Self::CollectionExists { .. } => {
                Some("Choose a different output name or remove the existing collection.".to_string())
            },
            Self::FieldNotFound { .. } => Some(
                "Run 'schemamap fields' to inspect the collection and check the field mapping."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

impl IoError {
    fn user_message(&self) -> String {
        match self {
            Self::Read { format, path, .. } => {
                format!("Failed to read {} file: {}", format, path.display())
            },
            Self::Write { format, path, .. } => {
                format!("Failed to write {} file: {}", format, path.display())
            },
            Self::FileNotFound { path } => {
                format!("File not found: {}", path.display())
            },
            Self::InvalidPath { .. } => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::FileNotFound { .. } => {
                Some("Check that the workspace path is correct and exists.".to_string())
            },
            Self::InvalidPath { .. } => {
                Some("The workspace must be a directory of .geojson files.".to_string())
            },
            _ => None,
        }
    }
}

/// Extension trait for adding I/O context to errors.
pub trait IoErrorExt<T> {
    /// Add read context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Read`] if the underlying operation fails.
    fn with_read_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;

    /// Add write context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Write`] if the underlying operation fails.
    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> IoErrorExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_read_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            SchemaMapError::Io(IoError::Read {
                format: format.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }

    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            SchemaMapError::Io(IoError::Write {
                format: format.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }
}
