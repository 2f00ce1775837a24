//! Conversion between runtime dimension vectors and container dimensions.
//!
//! The runtime lists dimensions column-major, the container row-major, so
//! one is the reverse of the other and flat element buffers can be passed
//! through unchanged. Every index reversal in this crate goes through this
//! module.
//!
//! Two cases are special:
//!
//! - a runtime shape holding exactly one element is stored as a scalar
//!   dataspace, and a scalar dataspace reads back as `1 x 1`;
//! - a rank-1 container dataspace `[n]` reads back as the row vector `1 x n`.

use crate::{
    container::{Dataspace, DataspaceExt, DataspaceType, UNLIMITED},
    value::DimVector,
    ExchangeError,
};
use num_traits::ToPrimitive as _;

/// Whether a dataspace holds one element, an array or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentKind {
    /// Exactly one element, no dimensions.
    Scalar,
    /// An array of any rank.
    Simple,
    /// No elements and no usable dimensions.
    Null,
}

/// Maximum size of one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxSize {
    /// Bounded by this many elements.
    Bounded(u64),
    /// No upper bound.
    Unlimited,
}

impl MaxSize {
    fn from_native(max: u64) -> Self {
        if max == UNLIMITED {
            Self::Unlimited
        } else {
            Self::Bounded(max)
        }
    }

    /// Whether `end` elements fit.
    pub fn admits(self, end: u64) -> bool {
        match self {
            Self::Bounded(max) => end <= max,
            Self::Unlimited => true,
        }
    }
}

/// Current and maximum extent of a dataset, attribute or runtime value.
///
/// Dimensions are kept in container order; the accessors report them in
/// runtime order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeDescriptor {
    kind: ExtentKind,
    dims: Vec<u64>,
    max_dims: Vec<MaxSize>,
}

impl ShapeDescriptor {
    /// Describes a container dataspace.
    pub fn from_dataspace(space: &Dataspace) -> Self {
        let kind = match &space.space_type {
            DataspaceType::Scalar => ExtentKind::Scalar,
            DataspaceType::Simple => ExtentKind::Simple,
            DataspaceType::Null => ExtentKind::Null,
        };
        if kind != ExtentKind::Simple {
            return Self { kind, dims: Vec::new(), max_dims: Vec::new() };
        }
        Self {
            kind,
            dims: space.dimensions.clone(),
            max_dims: space.max_dims().iter().copied().map(MaxSize::from_native).collect(),
        }
    }

    /// Describes the fixed-size dataspace a runtime shape is stored as.
    pub fn from_runtime(dims: &DimVector) -> Self {
        Self::from_dataspace(&to_native_dims(dims))
    }

    /// Extent kind.
    pub fn kind(&self) -> ExtentKind {
        self.kind
    }

    /// Number of container dimensions (0 unless simple).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Current size per dimension, runtime order.
    pub fn size(&self) -> Vec<u64> {
        reversed(&self.dims)
    }

    /// Maximum size per dimension, runtime order.
    pub fn max_size(&self) -> Vec<MaxSize> {
        reversed(&self.max_dims)
    }

    /// The runtime shape a full read produces.
    pub fn runtime_dims(&self) -> DimVector {
        match self.kind {
            ExtentKind::Simple => to_runtime_shape(&self.dims),
            ExtentKind::Scalar | ExtentKind::Null => DimVector::scalar(),
        }
    }

    /// Container dimensions.
    pub(crate) fn native_dims(&self) -> &[u64] {
        &self.dims
    }

    /// Container maximum dimensions.
    pub(crate) fn native_max_dims(&self) -> &[MaxSize] {
        &self.max_dims
    }
}

/// Container dataspace for a runtime shape.
///
/// One-element shapes become scalar dataspaces; all others keep their rank
/// with the dimensions reversed.
pub fn to_native_dims(dims: &DimVector) -> Dataspace {
    if dims.is_scalar() {
        return Dataspace::scalar();
    }
    let native: Vec<u64> = dims.iter().rev().map(|&d| d as u64).collect();
    Dataspace::simple(&native)
}

/// Runtime shape of container dimensions.
///
/// A rank-1 `[n]` becomes `1 x n`; no dimensions at all become `1 x 1`.
pub fn to_runtime_shape(dims: &[u64]) -> DimVector {
    let as_usize = |d: u64| d.to_usize().unwrap_or(usize::MAX);
    match dims {
        [] => DimVector::scalar(),
        [n] => DimVector::new(&[1, as_usize(*n)]),
        _ => DimVector::new(&dims.iter().rev().map(|&d| as_usize(d)).collect::<Vec<_>>()),
    }
}

/// Runtime-order per-dimension arguments in container order.
///
/// Each argument must have one entry per container dimension.
pub fn to_native_order(rank: usize, what: &str, values: &[u64]) -> Result<Vec<u64>, ExchangeError> {
    if values.len() != rank {
        return Err(ExchangeError::InvalidHyperslab(format!(
            "{what} has {} entries, dataset has {rank} dimensions",
            values.len()
        )));
    }
    Ok(to_native_extent(values))
}

/// Runtime-order per-dimension values in container order.
pub fn to_native_extent(values: &[u64]) -> Vec<u64> {
    reversed(values)
}

/// Container-order per-dimension values in runtime order.
pub fn to_runtime_order(values: &[u64]) -> Vec<u64> {
    reversed(values)
}

/// Runtime-order index of container dimension `dim` in a rank-`rank` shape.
pub fn runtime_axis(rank: usize, dim: usize) -> usize {
    rank - 1 - dim
}

fn reversed<T: Clone>(values: &[T]) -> Vec<T> {
    values.iter().rev().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_element_is_scalar() {
        assert_eq!(to_native_dims(&DimVector::scalar()), Dataspace::scalar());
        assert_eq!(to_native_dims(&DimVector::new(&[1, 1, 1])), Dataspace::scalar());
        assert_eq!(*to_runtime_shape(&[]), [1, 1]);
    }

    #[test]
    fn rank_one_reads_as_row() {
        assert_eq!(*to_runtime_shape(&[5]), [1, 5]);
        assert_eq!(to_native_dims(&DimVector::new(&[1, 5])).dimensions, [5, 1]);
    }

    #[test]
    fn higher_ranks_reverse() {
        let dv = DimVector::new(&[2, 3, 4]);
        let space = to_native_dims(&dv);
        assert_eq!(space.dimensions, [4, 3, 2]);
        assert_eq!(to_runtime_shape(&space.dimensions), dv);
        assert_eq!(*to_runtime_shape(&[1, 3, 2]), [2, 3]);
    }

    #[test]
    fn descriptor_reports_runtime_order() {
        let space = Dataspace::simple_with_max(&[4, 2], &[UNLIMITED, 6]).unwrap();
        let shape = ShapeDescriptor::from_dataspace(&space);
        assert_eq!(shape.kind(), ExtentKind::Simple);
        assert_eq!(shape.size(), [2, 4]);
        assert_eq!(shape.max_size(), [MaxSize::Bounded(6), MaxSize::Unlimited]);
        assert_eq!(*shape.runtime_dims(), [2, 4]);
        let null = ShapeDescriptor::from_dataspace(&Dataspace::null());
        assert_eq!(null.kind(), ExtentKind::Null);
        assert_eq!(null.rank(), 0);
    }

    #[test]
    fn native_order_arguments() {
        assert_eq!(to_native_order(3, "start", &[1, 2, 3]).unwrap(), [3, 2, 1]);
        assert!(matches!(
            to_native_order(2, "count", &[1]),
            Err(ExchangeError::InvalidHyperslab(_))
        ));
        assert_eq!(runtime_axis(3, 0), 2);
        assert_eq!(to_runtime_order(&[8, 4]), [4, 8]);
        assert_eq!(to_native_extent(&[2, 5, 7]), [7, 5, 2]);
    }
}
