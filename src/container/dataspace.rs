//! Container dataspaces.
//!
//! [`Dataspace`] is the on-disk descriptor of `rustyhdf5-format`; its
//! dimensions are in native order. [`DataspaceExt`] builds and inspects it.

pub use rustyhdf5_format::dataspace::{Dataspace, DataspaceType};

/// Maximum-dimension value meaning "no upper bound".
pub const UNLIMITED: u64 = u64::MAX;

/// Largest rank a dataspace message can describe.
pub const MAX_RANK: usize = 32;

/// Constructors and queries on [`Dataspace`].
pub trait DataspaceExt: Sized {
    /// A single-element dataspace.
    fn scalar() -> Self;

    /// A dataspace holding no elements at all.
    fn null() -> Self;

    /// A fixed-size simple dataspace.
    fn simple(dims: &[u64]) -> Self;

    /// A simple dataspace with explicit maximum dimensions.
    ///
    /// Returns `None` when the ranks differ or a current size exceeds its
    /// maximum.
    fn simple_with_max(dims: &[u64], max_dims: &[u64]) -> Option<Self>;

    /// Number of dimensions (0 for scalar and null).
    fn ndims(&self) -> usize;

    /// Maximum dimensions, defaulting to the current ones.
    fn max_dims(&self) -> &[u64];

    /// Whether any dimension can grow past its current size.
    fn is_extensible(&self) -> bool;

    /// Number of elements, `None` on overflow.
    fn element_count(&self) -> Option<u64>;
}

fn space(space_type: DataspaceType, dims: &[u64], max_dims: Option<&[u64]>) -> Dataspace {
    Dataspace {
        space_type,
        rank: dims.len().min(MAX_RANK) as u8,
        dimensions: dims.to_vec(),
        max_dimensions: max_dims.map(<[u64]>::to_vec),
    }
}

impl DataspaceExt for Dataspace {
    fn scalar() -> Self {
        space(DataspaceType::Scalar, &[], None)
    }

    fn null() -> Self {
        space(DataspaceType::Null, &[], None)
    }

    fn simple(dims: &[u64]) -> Self {
        space(DataspaceType::Simple, dims, None)
    }

    fn simple_with_max(dims: &[u64], max_dims: &[u64]) -> Option<Self> {
        if dims.len() != max_dims.len() || dims.iter().zip(max_dims).any(|(d, m)| d > m) {
            return None;
        }
        Some(space(DataspaceType::Simple, dims, Some(max_dims)))
    }

    fn ndims(&self) -> usize {
        self.dimensions.len()
    }

    fn max_dims(&self) -> &[u64] {
        self.max_dimensions.as_deref().unwrap_or(&self.dimensions)
    }

    fn is_extensible(&self) -> bool {
        self.dimensions.iter().zip(self.max_dims()).any(|(d, m)| d != m || *m == UNLIMITED)
    }

    fn element_count(&self) -> Option<u64> {
        match self.space_type {
            DataspaceType::Scalar => Some(1),
            DataspaceType::Null => Some(0),
            DataspaceType::Simple => {
                self.dimensions.iter().try_fold(1u64, |n, &d| n.checked_mul(d))
            }
        }
    }
}
