//! Error types for schema declaration, request building, serialization and execution.

use crate::schema::AttributeType;

use aws_sdk_dynamodb::{error, types};
use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error returned by an [`Executor`](crate::executor::Executor).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid schema declaration.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Invalid use of a request builder.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// A value does not fit its declared attribute type.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// An item violates an attribute constraint.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The executor failed; the original error is kept as the source.
    #[error("request execution failed: {0}")]
    Execution(#[source] BoxError),

    /// A returned item could not be converted into the caller's record type.
    #[error("failed to deserialize item: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// The wire request could not be assembled.
    #[error(transparent)]
    Build(#[from] error::BuildError),
}

impl Error {
    pub(crate) fn execution<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Execution(Box::new(error))
    }
}

/// Errors raised while declaring a schema.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    /// No attribute is flagged as hash key.
    #[error("schema has no hash key")]
    MissingHashKey,

    /// More than one attribute is flagged as hash key.
    #[error("schema declares two hash keys: {first} and {second}")]
    DuplicateHashKey {
        /// First declaration.
        first: String,
        /// Second declaration.
        second: String,
    },

    /// More than one attribute is flagged as range key.
    #[error("schema declares two range keys: {first} and {second}")]
    DuplicateRangeKey {
        /// First declaration.
        first: String,
        /// Second declaration.
        second: String,
    },

    /// An attribute name is declared more than once.
    #[error("attribute {0} is declared twice")]
    DuplicateAttribute(String),

    /// One attribute is flagged as both hash and range key.
    #[error("attribute {0} cannot be both hash key and range key")]
    ConflictingKey(String),

    /// An attribute type name is not recognised.
    #[error("invalid attribute type: {0}")]
    InvalidType(String),

    /// An index name is declared more than once.
    #[error("index {0} is declared twice")]
    DuplicateIndex(String),

    /// A global index key is not a declared attribute.
    #[error("index {index} references undeclared attribute {attribute}")]
    UnknownIndexAttribute {
        /// Index name.
        index: String,
        /// Attribute name.
        attribute: String,
    },
}

/// Errors raised synchronously by the query, scan and item builders.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    /// The attribute is not declared in the schema.
    #[error("attribute {0} is not declared in the schema")]
    UnknownAttribute(String),

    /// The index is not declared in the schema.
    #[error("index {0} is not declared in the schema")]
    UnknownIndex(String),

    /// Wrong number of operands for the comparison operator.
    #[error("{} takes {expected} operand(s), got {actual}", .operator.as_str())]
    Arity {
        /// Comparison operator.
        operator: types::ComparisonOperator,
        /// Expected value.
        expected: &'static str,
        /// Operands given.
        actual: usize,
    },

    /// A key condition targets an attribute that is never a range key.
    #[error("attribute {0} is not a range key of the table or any index")]
    NotRangeKey(String),

    /// The comparison operator is not allowed in key conditions.
    #[error("{} cannot be used in a key condition on {attribute}", .operator.as_str())]
    UnsupportedKeyOperator {
        /// Attribute name.
        attribute: String,
        /// Comparison operator.
        operator: types::ComparisonOperator,
    },

    /// A second range key condition was given.
    #[error("only one range key condition is allowed, {0} was already given")]
    TooManyKeyConditions(String),

    /// The range key condition does not target the queried range key.
    #[error("key condition on {attribute} does not match range key {expected:?}")]
    RangeKeyMismatch {
        /// Attribute name.
        attribute: String,
        /// Expected value.
        expected: Option<String>,
    },

    /// A second filter was given for the same attribute.
    #[error("attribute {0} already has a filter")]
    DuplicateFilter(String),

    /// The page limit is zero or negative.
    #[error("limit must be positive, got {0}")]
    InvalidLimit(i64),

    /// The scan segment is out of range.
    #[error("segment {segment} is out of range for {total_segments} total segments")]
    InvalidSegment {
        /// Requested segment.
        segment: i32,
        /// Total segments.
        total_segments: i32,
    },

    /// An item lacks a value for a key attribute.
    #[error("item has no value for key attribute {0}")]
    MissingKey(String),
}

/// Errors raised while converting native values to wire values.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// The value shape does not fit the declared type.
    #[error("attribute {attribute} of type {expected} cannot hold {found}")]
    TypeMismatch {
        /// Attribute name.
        attribute: String,
        /// Expected value.
        expected: AttributeType,
        /// Shape of the given value.
        found: &'static str,
    },

    /// A set attribute was given no elements.
    #[error("attribute {0} cannot be an empty set")]
    EmptySet(String),

    /// A date attribute could not be parsed.
    #[error("attribute {attribute} has an unparsable date {value}")]
    InvalidDate {
        /// Attribute name.
        attribute: String,
        /// Unparsable input.
        value: String,
    },

    /// An item was not a JSON object.
    #[error("expected an object, found {0}")]
    NotAnObject(&'static str),

    /// Conversion into a native value failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Conversion of an untyped attribute failed.
    #[error(transparent)]
    Dynamo(#[from] serde_dynamo::Error),
}

/// Errors raised when an item breaks an attribute constraint.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A required attribute is absent or null.
    #[error("attribute {0} is required")]
    Required(String),

    /// A value is below its declared minimum.
    #[error("attribute {attribute} is below the minimum of {min}")]
    BelowMin {
        /// Attribute name.
        attribute: String,
        /// Declared minimum.
        min: f64,
    },

    /// A value is above its declared maximum.
    #[error("attribute {attribute} is above the maximum of {max}")]
    AboveMax {
        /// Attribute name.
        attribute: String,
        /// Declared maximum.
        max: f64,
    },
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(SerializationError::Json(error))
    }
}
