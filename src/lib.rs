#![doc = include_str!("../README.md")]
//! ## Datasets
//!
//! - Creating: [`create_dataset`] with a [`DatasetSpec`]
//! - Reading: [`read_dataset`], optionally restricted to a [`Hyperslab`]
//! - Writing: [`write_dataset`], optionally to a [`Hyperslab`]; the dataset
//!   grows when the hyperslab reaches past its current extent but stays
//!   within its maximum extent
//!
//! ## Attributes
//!
//! - One at a time: [`read_attribute`] and [`write_attribute`]
//! - All at once: [`read_attributes`] and [`write_attributes`] with an
//!   [`AttributeMap`]
//!
//! ## Introspection
//!
//! - [`describe_location`] returns a [`MetadataDescriptor`] tree of groups,
//!   datasets, named datatypes, links and attributes
//!
//! ## Lower-level building blocks
//!
//! - [`DataExchange`] performs one typed transfer in either direction
//! - [`classify`] and [`ElementTypeTag::to_native`] map element types
//! - [`to_native_dims`] and [`to_runtime_shape`] map shapes
//! - [`location`] checks paths
//! - [`container`] is the working copy everything operates on, loaded from
//!   and saved to container images
//!
//! ## Limitations
//!
//! - Only integers up to 64 bits, 32 and 64-bit floats and strings are
//!   exchanged. Compound, enumerated, opaque, bitfield, array, reference and
//!   time types are recognized and reported as unsupported.
//! - Strings are written as variable-length UTF-8. Fixed-width string
//!   datasets can be read but not written.
//! - Attributes are always transferred whole.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs)]

pub mod container;
pub mod location;

mod attrs;
mod element;
mod error;
mod exchange;
mod info;
mod shape;
mod types;
mod value;

pub use crate::{
    attrs::AttributeMap,
    element::NativeElement,
    error::ExchangeError,
    exchange::{DataExchange, Hyperslab},
    info::{AttributeInfo, DatasetInfo, GroupInfo, LinkInfo, MetadataDescriptor, NamedTypeInfo},
    shape::{to_native_dims, to_runtime_shape, ExtentKind, MaxSize, ShapeDescriptor},
    types::{classify, Classification, ElementTypeTag, Sign, TypeInfo, TypeSize},
    value::{DimVector, Value},
};

use crate::container::{
    AttributeSet, DataLayout, Dataset, Dataspace, DataspaceExt, File, LayoutExt, ObjectKind, UNLIMITED,
};
use log::debug;

/// Objects that carry attributes.
const ATTRIBUTE_TARGETS: [ObjectKind; 3] =
    [ObjectKind::Group, ObjectKind::Dataset, ObjectKind::NamedType];

/// Parameters of a new dataset.
///
/// Shapes are in runtime order. A `shape` entry equal to [`UNLIMITED`]
/// creates a dimension of current size 0 that can grow without bound.
///
/// ```
/// use h5exchange::{container::UNLIMITED, DatasetSpec, ElementTypeTag};
///
/// let spec = DatasetSpec::new([1, UNLIMITED], ElementTypeTag::Float64).with_chunk([1, 64]);
/// assert_eq!(spec.max_shape, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    /// Current size per dimension.
    pub shape: Vec<u64>,
    /// Maximum size per dimension; `shape` when `None`.
    pub max_shape: Option<Vec<u64>>,
    /// Element type.
    pub element_type: ElementTypeTag,
    /// Chunk size per dimension; required for datasets that can grow.
    pub chunk: Option<Vec<u64>>,
}

impl DatasetSpec {
    /// A fixed-size dataset of `shape`.
    pub fn new(shape: impl Into<Vec<u64>>, element_type: ElementTypeTag) -> Self {
        Self { shape: shape.into(), max_shape: None, element_type, chunk: None }
    }

    /// Allows the dataset to grow up to `max_shape`.
    pub fn with_max_shape(self, max_shape: impl Into<Vec<u64>>) -> Self {
        Self { max_shape: Some(max_shape.into()), ..self }
    }

    /// Stores the dataset in chunks of `chunk`.
    pub fn with_chunk(self, chunk: impl Into<Vec<u64>>) -> Self {
        Self { chunk: Some(chunk.into()), ..self }
    }

    /// Whether the dataset is created with a scalar dataspace.
    pub fn is_scalar(&self) -> bool {
        matches!(self.shape[..], [1] | [1, 1])
    }

    fn storage(&self) -> Result<(Dataspace, DataLayout), ExchangeError> {
        if self.shape.is_empty() {
            return Err(ExchangeError::ShapeMismatch("dataset shape is empty".to_string()));
        }
        if self.is_scalar() {
            if self.chunk.is_some() {
                return Err(ExchangeError::InvalidChunk("scalar datasets cannot be chunked".to_string()));
            }
            return Ok((Dataspace::scalar(), DataLayout::contiguous()));
        }
        let max_shape = self.max_shape.as_deref().unwrap_or(&self.shape);
        if max_shape.len() != self.shape.len() {
            return Err(ExchangeError::ShapeMismatch(format!(
                "maximum shape has {} dimensions, shape has {}",
                max_shape.len(),
                self.shape.len()
            )));
        }
        let current: Vec<u64> = self.shape.iter().map(|&d| if d == UNLIMITED { 0 } else { d }).collect();
        let dims = shape::to_native_extent(&current);
        let space = Dataspace::simple_with_max(&dims, &shape::to_native_extent(max_shape))
            .ok_or_else(|| ExchangeError::ShapeMismatch("shape exceeds maximum shape".to_string()))?;
        let layout = match &self.chunk {
            Some(chunk) if chunk.len() != dims.len() => {
                return Err(ExchangeError::InvalidChunk(format!(
                    "chunk has {} dimensions, dataset has {}",
                    chunk.len(),
                    dims.len()
                )));
            }
            Some(chunk) if chunk.contains(&0) => {
                return Err(ExchangeError::InvalidChunk("chunk sizes must be positive".to_string()));
            }
            Some(chunk) => DataLayout::chunked(&shape::to_native_extent(chunk))?,
            None if space.is_extensible() => {
                return Err(ExchangeError::InvalidChunk("datasets that can grow must be chunked".to_string()));
            }
            None => DataLayout::contiguous(),
        };
        Ok((space, layout))
    }
}

/// Creates an empty dataset at `path`, creating missing parent groups.
///
/// Fails with [`ExchangeError::AlreadyExists`] when `path` exists and with
/// [`ExchangeError::NotAGroup`] when a parent is not a group.
pub fn create_dataset(file: &mut File, path: &str, spec: &DatasetSpec) -> Result<(), ExchangeError> {
    location::can_create(file, path)?;
    let (space, layout) = spec.storage()?;
    debug!(
        "creating {} dataset '{path}' with dimensions {:?}, maximum {:?}",
        spec.element_type,
        space.dimensions,
        space.max_dims()
    );
    let ds = Dataset::new(spec.element_type.to_native(), space, layout)?;
    file.create_dataset(path, ds)?;
    Ok(())
}

/// Reads the dataset at `path`, or the part of it selected by `hyperslab`.
pub fn read_dataset(file: &File, path: &str, hyperslab: Option<&Hyperslab>) -> Result<Value, ExchangeError> {
    debug!("reading dataset '{path}'");
    let ds = resolve_dataset(file, path)?;
    let mut dx = DataExchange::from_dataset(ds)?;
    if let Some(hyperslab) = hyperslab {
        dx.select_hyperslab(ds, hyperslab)?;
    }
    dx.read(ds)
}

/// Writes `value` to the dataset at `path`, or to the part of it selected by
/// `hyperslab`.
///
/// A hyperslab reaching past the current extent grows the dataset up to its
/// maximum extent. The growth is kept even if the write itself then fails.
pub fn write_dataset(
    file: &mut File,
    path: &str,
    value: &Value,
    hyperslab: Option<&Hyperslab>,
) -> Result<(), ExchangeError> {
    debug!("writing {} {} to dataset '{path}'", value.dims(), value.class_name());
    resolve_dataset(file, path)?;
    let src = DataExchange::from_value(value)?;
    let ds = file
        .node_mut(path)?
        .as_dataset_mut()
        .ok_or_else(|| ExchangeError::LocationNotFound(path.to_string()))?;
    let mut dst = DataExchange::from_dataset(ds)?;
    src.check_element_types(&dst)?;
    if let Some(hyperslab) = hyperslab {
        dst.select_hyperslab_extending(ds, hyperslab)?;
    }
    src.write(&dst, ds)
}

/// Reads attribute `name` of the object at `path`.
pub fn read_attribute(file: &File, path: &str, name: &str) -> Result<Value, ExchangeError> {
    debug!("reading attribute '{name}' of '{path}'");
    let attr = resolve_attributes(file, path)?.get(name).ok_or_else(|| {
        ExchangeError::AttributeNotFound { path: path.to_string(), name: name.to_string() }
    })?;
    DataExchange::from_attribute(attr)?.read_attribute(attr)
}

/// Writes `value` as attribute `name` of the object at `path`, replacing any
/// attribute of that name.
pub fn write_attribute(file: &mut File, path: &str, name: &str, value: &Value) -> Result<(), ExchangeError> {
    debug!("writing {} {} to attribute '{name}' of '{path}'", value.dims(), value.class_name());
    resolve_attributes(file, path)?;
    let dx = DataExchange::from_value(value)?;
    dx.write_as_attribute(attributes_mut(file, path)?, name)
}

/// Reads every attribute of the object at `path`.
pub fn read_attributes(file: &File, path: &str) -> Result<AttributeMap, ExchangeError> {
    debug!("reading attributes of '{path}'");
    attrs::read_all(resolve_attributes(file, path)?)
}

/// Writes every entry of `map` as an attribute of the object at `path`.
///
/// Existing attributes not named in `map` are kept.
pub fn write_attributes(file: &mut File, path: &str, map: &AttributeMap) -> Result<(), ExchangeError> {
    debug!("writing {} attributes to '{path}'", map.len());
    resolve_attributes(file, path)?;
    attrs::write_all(attributes_mut(file, path)?, map)
}

/// Describes the group or dataset at `path`, the root group by default.
pub fn describe_location(file: &File, path: Option<&str>) -> Result<MetadataDescriptor, ExchangeError> {
    let path = path.unwrap_or("/");
    debug!("describing '{path}'");
    info::describe(file, path)
}

fn resolve_dataset<'f>(file: &'f File, path: &str) -> Result<&'f Dataset, ExchangeError> {
    let node = location::resolve(file, path)?;
    location::expect_kind(node, path, "dataset", &[ObjectKind::Dataset])?;
    node.as_dataset().ok_or_else(|| ExchangeError::LocationNotFound(path.to_string()))
}

fn resolve_attributes<'f>(file: &'f File, path: &str) -> Result<&'f AttributeSet, ExchangeError> {
    let node = location::resolve(file, path)?;
    location::expect_kind(node, path, "group, dataset or named datatype", &ATTRIBUTE_TARGETS)?;
    node.attributes().ok_or_else(|| ExchangeError::LocationNotFound(path.to_string()))
}

fn attributes_mut<'f>(file: &'f mut File, path: &str) -> Result<&'f mut AttributeSet, ExchangeError> {
    file.node_mut(path)?
        .attributes_mut()
        .ok_or_else(|| ExchangeError::LocationNotFound(path.to_string()))
}
