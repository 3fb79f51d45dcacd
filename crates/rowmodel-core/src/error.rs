//! Error types for RowModel operations.

use std::fmt;

/// Result alias for RowModel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type for all RowModel operations.
#[derive(Debug)]
pub enum Error {
    /// Validation rejected the working change-set of a save
    Validation(ValidationError),
    /// A statement executor failed during insert/update/delete
    Storage(StorageError),
    /// Custom error with message
    Custom(String),
}

/// Failure reported by a statement executor.
///
/// The record leaves its in-memory state untouched when one of these
/// surfaces; retry policy belongs to the caller.
#[derive(Debug)]
pub struct StorageError {
    pub kind: StorageErrorKind,
    /// The statement that failed, when the executor can report it.
    pub statement: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// INSERT failed
    Insert,
    /// UPDATE failed
    Update,
    /// DELETE failed
    Delete,
    /// Connection-level failure
    Connection,
}

impl StorageError {
    /// Create a new storage error with no statement context.
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            statement: None,
            message: message.into(),
        }
    }

    /// Attach the failing statement.
    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }
}

/// Validation error raised when a rule set rejects a named-value set.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The individual field failures, in rule-evaluation order.
    pub errors: Vec<FieldValidationError>,
}

/// A single validation failure for a field.
#[derive(Debug, Clone)]
pub struct FieldValidationError {
    /// The field name that failed validation
    pub field: String,
    /// The kind of rule that failed
    pub rule: RuleKind,
    /// Human-readable error message
    pub message: String,
}

/// The kind of validation rule that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Required value is missing/null
    Required,
    /// Value is below minimum
    Min,
    /// Value is above maximum
    Max,
    /// String is shorter than minimum length
    MinLength,
    /// String is longer than maximum length
    MaxLength,
    /// Value doesn't match regex pattern
    Pattern,
    /// Custom rule failed
    Custom,
}

impl RuleKind {
    /// Stable identifier for the rule, used in failure details.
    pub const fn as_str(self) -> &'static str {
        match self {
            RuleKind::Required => "required",
            RuleKind::Min => "min",
            RuleKind::Max => "max",
            RuleKind::MinLength => "min_length",
            RuleKind::MaxLength => "max_length",
            RuleKind::Pattern => "pattern",
            RuleKind::Custom => "custom",
        }
    }
}

impl ValidationError {
    /// Create a new empty validation error container.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Check if there are any validation errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add a field validation error.
    pub fn add(&mut self, field: impl Into<String>, rule: RuleKind, message: impl Into<String>) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            rule,
            message: message.into(),
        });
    }

    /// The names of the fields that failed, in order, without duplicates.
    pub fn fields(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for e in &self.errors {
            if !out.contains(&e.field.as_str()) {
                out.push(&e.field);
            }
        }
        out
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed for {} field(s):", self.fields().len())?;
        for e in &self.errors {
            write!(f, " {}[{}] {};", e.field, e.rule.as_str(), e.message)?;
        }
        Ok(())
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            StorageErrorKind::Insert => "insert",
            StorageErrorKind::Update => "update",
            StorageErrorKind::Delete => "delete",
            StorageErrorKind::Connection => "connection",
        };
        match &self.statement {
            Some(stmt) => write!(f, "{kind} failed: {} ({stmt})", self.message),
            None => write!(f, "{kind} failed: {}", self.message),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "{e}"),
            Error::Storage(e) => write!(f, "{e}"),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e)
    }
}
