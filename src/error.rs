use crate::container::ContainerError;
use thiserror::Error;

/// An error raised while exchanging data with a container.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExchangeError {
    /// The location is not an absolute path.
    #[error("invalid location '{0}': must begin with '/'")]
    PathInvalid(String),
    /// Nothing exists at the location.
    #[error("location '{0}' does not exist")]
    LocationNotFound(String),
    /// The object at the location has the wrong kind for the operation.
    #[error("'{path}' is a {found}, expected {expected}")]
    WrongObjectKind {
        /// Location of the object.
        path: String,
        /// What the operation needs.
        expected: &'static str,
        /// What was found.
        found: String,
    },
    /// The container datatype cannot be classified.
    #[error("invalid datatype")]
    InvalidDatatype,
    /// The container datatype class has no runtime counterpart.
    #[error("unsupported datatype class '{0}'")]
    UnsupportedDatatype(String),
    /// The runtime value kind has no container counterpart.
    #[error("unsupported runtime type '{0}'")]
    UnsupportedType(String),
    /// The dataset or attribute has a null dataspace.
    #[error("empty dataspace")]
    EmptyDataspace,
    /// The value and the target differ in shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// The value and the target differ in element type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// The hyperslab reaches past the current extent.
    #[error("hyperslab exceeds the dataset extent in dimension {dim}")]
    HyperslabOutOfBounds {
        /// Offending dimension, runtime order, 0-based.
        dim: usize,
    },
    /// The hyperslab reaches past the maximum extent.
    #[error("hyperslab exceeds the maximum dataset extent in dimension {dim}")]
    HyperslabExceedsMaximum {
        /// Offending dimension, runtime order, 0-based.
        dim: usize,
    },
    /// Hyperslabs cannot be selected in scalar dataspaces.
    #[error("cannot select a hyperslab in a scalar dataspace")]
    ScalarHyperslabUnsupported,
    /// Hyperslabs cannot be selected in null dataspaces.
    #[error("cannot select a hyperslab in a null dataspace")]
    NullHyperslabUnsupported,
    /// The hyperslab arguments are malformed.
    #[error("invalid hyperslab: {0}")]
    InvalidHyperslab(String),
    /// Transient variable-length string storage could not be released.
    #[error("failed to reclaim variable-length string storage")]
    StringReclaimFailed(#[source] ContainerError),
    /// A path segment that must be a group is some other kind of object.
    #[error("'{0}' exists and is not a group")]
    NotAGroup(String),
    /// The location to create already exists.
    #[error("location '{0}' already exists")]
    AlreadyExists(String),
    /// The chunk shape does not fit the dataset.
    #[error("invalid chunk shape: {0}")]
    InvalidChunk(String),
    /// No attribute with this name is attached to the object.
    #[error("attribute '{name}' not found at '{path}'")]
    AttributeNotFound {
        /// Location of the object.
        path: String,
        /// Attribute name.
        name: String,
    },
    /// The exchange was not populated from a source this transfer needs.
    #[error("exchange is not bound to a {0}")]
    NotBound(&'static str),
    /// Error raised by the container.
    #[error(transparent)]
    Container(#[from] ContainerError),
}
