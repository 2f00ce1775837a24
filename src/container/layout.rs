//! Dataset storage layouts.
//!
//! [`DataLayout`] is the on-disk layout message of `rustyhdf5-format`. The
//! layout only describes how a stored file places raw data; element data is
//! always handed out in row-major order regardless of it.

pub use rustyhdf5_format::data_layout::DataLayout;

use super::ContainerError;

/// Constructors and queries on [`DataLayout`].
pub trait LayoutExt: Sized {
    /// A contiguous layout whose data has not been placed in a file yet.
    fn contiguous() -> Self;

    /// A chunked layout with the given chunk sizes, native order.
    ///
    /// Fails when a chunk size does not fit the 32-bit chunk message field.
    fn chunked(chunk_dims: &[u64]) -> Result<Self, ContainerError>;

    /// Chunk dimensions, if chunked.
    fn chunk_dims(&self) -> Option<Vec<u64>>;

    /// Whether the dataset is chunked.
    fn is_chunked(&self) -> bool {
        self.chunk_dims().is_some()
    }
}

impl LayoutExt for DataLayout {
    fn contiguous() -> Self {
        Self::Contiguous { address: None, size: 0 }
    }

    fn chunked(chunk_dims: &[u64]) -> Result<Self, ContainerError> {
        let chunk_dimensions = chunk_dims
            .iter()
            .map(|&d| u32::try_from(d))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ContainerError::InvalidLayout("chunk size exceeds 32 bits".to_string()))?;
        Ok(Self::Chunked {
            chunk_dimensions,
            btree_address: None,
            version: 4,
            chunk_index_type: None,
            single_chunk_filtered_size: None,
            single_chunk_filter_mask: None,
        })
    }

    fn chunk_dims(&self) -> Option<Vec<u64>> {
        match self {
            Self::Chunked { chunk_dimensions, .. } => {
                Some(chunk_dimensions.iter().map(|&d| u64::from(d)).collect())
            }
            Self::Compact { .. } | Self::Contiguous { .. } | Self::Virtual { .. } => None,
        }
    }
}
