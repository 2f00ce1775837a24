//! Typed transfer between runtime values and container datasets or
//! attributes.
//!
//! A [`DataExchange`] describes one side of a transfer: the element type, the
//! container datatype and dataspace, and the runtime shape a transfer will
//! observe. It is populated from a runtime value, a dataset or an attribute.
//! Dataset and attribute handles are never stored; the operations that touch
//! them take them as arguments.
//!
//! A write builds one exchange from the value and one from the target
//! dataset, optionally narrows the dataset side to a hyperslab (growing the
//! dataset if allowed), checks the two for compatibility and then transfers.

use crate::{
    container::{
        vlen_reclaim, Attribute, AttributeSet, Dataset, Dataspace, DataspaceExt, Datatype, DatatypeExt,
        Selection, VlenBuffer,
    },
    element::{byte_order, NativeElement},
    shape::{self, ExtentKind, ShapeDescriptor},
    types::classify,
    value::{column_major, from_column_major, DimVector},
    ElementTypeTag, ExchangeError, Value,
};
use log::{debug, trace};

/// A hyperslab request in runtime order.
///
/// All indices are 1-based and there is one entry per dataset dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperslab {
    /// First selected element per dimension, 1-based.
    pub start: Vec<u64>,
    /// Number of selected elements per dimension.
    pub count: Vec<u64>,
    /// Step between selected elements; all ones when `None`.
    pub stride: Option<Vec<u64>>,
}

impl Hyperslab {
    /// A contiguous block of `count` elements starting at `start`.
    pub fn new(start: impl Into<Vec<u64>>, count: impl Into<Vec<u64>>) -> Self {
        Self { start: start.into(), count: count.into(), stride: None }
    }

    /// Uses `stride` between selected elements.
    pub fn with_stride(self, stride: impl Into<Vec<u64>>) -> Self {
        Self { stride: Some(stride.into()), ..self }
    }
}

/// What an exchange was populated from.
#[derive(Debug, Clone, Copy, Default)]
enum Source<'a> {
    #[default]
    Empty,
    Value(&'a Value),
    Dataset,
    Attribute,
}

/// Where a read takes its raw elements from.
enum ReadTarget<'t> {
    Dataset(&'t Dataset, &'t Selection),
    Attribute(&'t Attribute),
}

impl ReadTarget<'_> {
    fn datatype(&self) -> &Datatype {
        match self {
            Self::Dataset(ds, _) => ds.datatype(),
            Self::Attribute(attr) => attr.datatype(),
        }
    }

    fn read_fixed(&self, mem: &Dataspace) -> Result<Vec<u8>, ExchangeError> {
        Ok(match self {
            Self::Dataset(ds, sel) => ds.read_fixed(mem, sel)?,
            Self::Attribute(attr) => attr.read_fixed()?,
        })
    }

    fn read_vlen(&self, mem: &Dataspace) -> Result<VlenBuffer, ExchangeError> {
        Ok(match self {
            Self::Dataset(ds, sel) => ds.read_vlen(mem, sel)?,
            Self::Attribute(attr) => attr.read_vlen()?,
        })
    }
}

/// One side of a transfer between a runtime value and a container object.
#[derive(Debug, Clone)]
pub struct DataExchange<'a> {
    tag: Option<ElementTypeTag>,
    datatype: Option<Datatype>,
    shape: Option<ShapeDescriptor>,
    dims: DimVector,
    selection: Selection,
    source: Source<'a>,
}

impl Default for DataExchange<'_> {
    fn default() -> Self {
        Self {
            tag: None,
            datatype: None,
            shape: None,
            dims: DimVector::scalar(),
            selection: Selection::All,
            source: Source::Empty,
        }
    }
}

impl<'a> DataExchange<'a> {
    /// An empty exchange.
    pub fn new() -> Self {
        Self::default()
    }

    /// An exchange populated from a runtime value.
    pub fn from_value(value: &'a Value) -> Result<Self, ExchangeError> {
        let mut dx = Self::new();
        dx.assign_value(value)?;
        Ok(dx)
    }

    /// An exchange populated from a dataset.
    pub fn from_dataset(ds: &Dataset) -> Result<Self, ExchangeError> {
        let mut dx = Self::new();
        dx.assign_dataset(ds)?;
        Ok(dx)
    }

    /// An exchange populated from an attribute.
    pub fn from_attribute(attr: &Attribute) -> Result<Self, ExchangeError> {
        let mut dx = Self::new();
        dx.assign_attribute(attr)?;
        Ok(dx)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Populates the exchange from a runtime value.
    ///
    /// One-element values get a scalar dataspace. Fails with
    /// [`ExchangeError::UnsupportedType`] for kinds outside the supported
    /// element types.
    pub fn assign_value(&mut self, value: &'a Value) -> Result<(), ExchangeError> {
        self.reset();
        let tag = value.element_tag()?;
        self.dims = value.dims();
        self.shape = Some(ShapeDescriptor::from_runtime(&self.dims));
        self.datatype = Some(tag.to_native());
        self.tag = Some(tag);
        self.source = Source::Value(value);
        Ok(())
    }

    /// Populates the exchange from a dataset, selecting all of it.
    pub fn assign_dataset(&mut self, ds: &Dataset) -> Result<(), ExchangeError> {
        self.reset();
        self.assign_native(ds.datatype(), ds.space())?;
        self.source = Source::Dataset;
        Ok(())
    }

    /// Populates the exchange from an attribute.
    pub fn assign_attribute(&mut self, attr: &Attribute) -> Result<(), ExchangeError> {
        self.reset();
        self.assign_native(attr.datatype(), attr.space())?;
        self.source = Source::Attribute;
        Ok(())
    }

    fn assign_native(&mut self, datatype: &Datatype, space: &Dataspace) -> Result<(), ExchangeError> {
        let tag = classify(datatype).tag()?;
        let shape = ShapeDescriptor::from_dataspace(space);
        if shape.kind() == ExtentKind::Null {
            return Err(ExchangeError::EmptyDataspace);
        }
        self.dims = shape.runtime_dims();
        self.shape = Some(shape);
        self.datatype = Some(datatype.clone());
        self.tag = Some(tag);
        Ok(())
    }

    /// Element type, once populated.
    pub fn tag(&self) -> Option<ElementTypeTag> {
        self.tag
    }

    /// Container datatype, once populated.
    pub fn datatype(&self) -> Option<&Datatype> {
        self.datatype.as_ref()
    }

    /// Current and maximum extent, once populated.
    pub fn shape(&self) -> Option<&ShapeDescriptor> {
        self.shape.as_ref()
    }

    /// Runtime shape a transfer observes.
    pub fn dims(&self) -> &DimVector {
        &self.dims
    }

    fn populated(&self) -> Result<(ElementTypeTag, &Datatype, &ShapeDescriptor), ExchangeError> {
        match (self.tag, &self.datatype, &self.shape) {
            (Some(tag), Some(dt), Some(shape)) => Ok((tag, dt, shape)),
            _ => Err(ExchangeError::NotBound("value, dataset or attribute")),
        }
    }

    /// Checks that a transfer between `self` and `other` is well-formed.
    ///
    /// Element types, string width (fixed or variable), extent kinds and the
    /// runtime shape must all agree. The outcome does not depend on which
    /// side is `self`.
    pub fn is_compatible(&self, other: &DataExchange) -> Result<(), ExchangeError> {
        self.check_element_types(other)?;
        let (_, _, shape) = self.populated()?;
        let (_, _, other_shape) = other.populated()?;
        if shape.kind() != other_shape.kind() {
            return Err(ExchangeError::ShapeMismatch(
                "different dataspaces extent type".to_string(),
            ));
        }
        if shape.kind() == ExtentKind::Simple {
            if self.dims.len() != other.dims.len() {
                return Err(ExchangeError::ShapeMismatch(
                    "different dataspace dimensionality".to_string(),
                ));
            }
            if self.dims != other.dims {
                return Err(ExchangeError::ShapeMismatch(format!(
                    "different number of elements ({} vs {})",
                    self.dims, other.dims
                )));
            }
        }
        Ok(())
    }

    /// The element type half of [`is_compatible`](Self::is_compatible).
    pub(crate) fn check_element_types(&self, other: &DataExchange) -> Result<(), ExchangeError> {
        let (tag, dt, _) = self.populated()?;
        let (other_tag, other_dt, _) = other.populated()?;
        if tag != other_tag {
            return Err(ExchangeError::TypeMismatch("different datatypes".to_string()));
        }
        if tag.is_string() && dt.is_variable() != other_dt.is_variable() {
            return Err(ExchangeError::TypeMismatch(
                "string data can only be exchanged with variable-length string datasets".to_string(),
            ));
        }
        Ok(())
    }

    /// Narrows a dataset-bound exchange to a hyperslab of `ds`.
    ///
    /// Fails with [`ExchangeError::HyperslabOutOfBounds`] when the hyperslab
    /// reaches past the current extent; the dataset is never modified.
    pub fn select_hyperslab(&mut self, ds: &Dataset, hyperslab: &Hyperslab) -> Result<(), ExchangeError> {
        let plan = self.plan_hyperslab(hyperslab, false)?;
        debug_assert!(plan.extent.is_none());
        self.apply_hyperslab(ds, plan)
    }

    /// Narrows a dataset-bound exchange to a hyperslab of `ds`, growing the
    /// dataset when the hyperslab reaches past its current extent but stays
    /// within its maximum.
    ///
    /// Fails with [`ExchangeError::HyperslabExceedsMaximum`] before touching
    /// the dataset when any dimension would have to grow past its maximum.
    pub fn select_hyperslab_extending(
        &mut self,
        ds: &mut Dataset,
        hyperslab: &Hyperslab,
    ) -> Result<(), ExchangeError> {
        let plan = self.plan_hyperslab(hyperslab, true)?;
        if let Some(extent) = &plan.extent {
            debug!("extending dataset from {:?} to {:?}", ds.space().dimensions, extent);
            ds.set_extent(extent)?;
            self.shape = Some(ShapeDescriptor::from_dataspace(ds.space()));
        }
        self.apply_hyperslab(ds, plan)
    }

    fn plan_hyperslab(&self, hyperslab: &Hyperslab, try_extend: bool) -> Result<HyperslabPlan, ExchangeError> {
        if !matches!(self.source, Source::Dataset) {
            return Err(ExchangeError::NotBound("dataset"));
        }
        let (_, _, shape) = self.populated()?;
        match shape.kind() {
            ExtentKind::Scalar => return Err(ExchangeError::ScalarHyperslabUnsupported),
            ExtentKind::Null => return Err(ExchangeError::NullHyperslabUnsupported),
            ExtentKind::Simple => {}
        }
        let rank = shape.rank();
        let start = shape::to_native_order(rank, "start", &hyperslab.start)?;
        let count = shape::to_native_order(rank, "count", &hyperslab.count)?;
        let stride = match &hyperslab.stride {
            Some(stride) => shape::to_native_order(rank, "stride", stride)?,
            None => vec![1; rank],
        };
        for (what, values) in [("start", &start), ("count", &count), ("stride", &stride)] {
            if values.contains(&0) {
                return Err(ExchangeError::InvalidHyperslab(format!("{what} entries must be positive")));
            }
        }
        let start: Vec<u64> = start.iter().map(|s| s - 1).collect();

        let dims = shape.native_dims();
        let max_dims = shape.native_max_dims();
        let mut extent = dims.to_vec();
        let mut needs_extend = false;
        for d in 0..rank {
            let end = (count[d] - 1)
                .checked_mul(stride[d])
                .and_then(|n| n.checked_add(start[d] + 1))
                .ok_or_else(|| ExchangeError::InvalidHyperslab("selection end overflows".to_string()))?;
            if end <= dims[d] {
                continue;
            }
            let dim = shape::runtime_axis(rank, d);
            if !try_extend {
                return Err(ExchangeError::HyperslabOutOfBounds { dim });
            }
            if !max_dims[d].admits(end) {
                return Err(ExchangeError::HyperslabExceedsMaximum { dim });
            }
            extent[d] = end;
            needs_extend = true;
        }
        Ok(HyperslabPlan {
            selection: Selection::Hyperslab { start, count, stride },
            extent: needs_extend.then_some(extent),
        })
    }

    fn apply_hyperslab(&mut self, ds: &Dataset, plan: HyperslabPlan) -> Result<(), ExchangeError> {
        if let Selection::Hyperslab { count, .. } = &plan.selection {
            self.dims = shape::to_runtime_shape(count);
        }
        trace!(
            "selected {:?} of dataset extent {:?}",
            plan.selection,
            ds.space().dimensions
        );
        self.selection = plan.selection;
        Ok(())
    }

    /// Reads the selected elements of `ds` into a runtime value shaped
    /// [`dims`](Self::dims).
    pub fn read(&self, ds: &Dataset) -> Result<Value, ExchangeError> {
        if !matches!(self.source, Source::Dataset) {
            return Err(ExchangeError::NotBound("dataset"));
        }
        self.read_from(ReadTarget::Dataset(ds, &self.selection))
    }

    /// Reads the whole value of `attr`.
    pub fn read_attribute(&self, attr: &Attribute) -> Result<Value, ExchangeError> {
        if !matches!(self.source, Source::Attribute) {
            return Err(ExchangeError::NotBound("attribute"));
        }
        self.read_from(ReadTarget::Attribute(attr))
    }

    fn read_from(&self, target: ReadTarget) -> Result<Value, ExchangeError> {
        use ElementTypeTag::*;
        let (tag, _, _) = self.populated()?;
        let mem = shape::to_native_dims(&self.dims);
        trace!("reading {} {tag} elements as {}", self.dims.num_elements(), self.dims);
        match tag {
            Int8 => self.read_numeric::<i8>(&target, &mem),
            UInt8 => self.read_numeric::<u8>(&target, &mem),
            Int16 => self.read_numeric::<i16>(&target, &mem),
            UInt16 => self.read_numeric::<u16>(&target, &mem),
            Int32 => self.read_numeric::<i32>(&target, &mem),
            UInt32 => self.read_numeric::<u32>(&target, &mem),
            Int64 => self.read_numeric::<i64>(&target, &mem),
            UInt64 => self.read_numeric::<u64>(&target, &mem),
            Float32 => self.read_numeric::<f32>(&target, &mem),
            Float64 => self.read_numeric::<f64>(&target, &mem),
            VarString => self.read_strings(&target, &mem),
        }
    }

    fn read_numeric<T: NativeElement>(&self, target: &ReadTarget, mem: &Dataspace) -> Result<Value, ExchangeError> {
        let bytes = target.read_fixed(mem)?;
        let data = T::decode(&bytes, byte_order(target.datatype()))?;
        Ok(T::into_value(from_column_major(&self.dims, data)?))
    }

    fn read_strings(&self, target: &ReadTarget, mem: &Dataspace) -> Result<Value, ExchangeError> {
        let datatype = target.datatype();
        let strings = if datatype.is_variable() {
            let buf = target.read_vlen(mem)?;
            let strings: Vec<String> = buf.iter().map(|s| s.unwrap_or_default().to_string()).collect();
            vlen_reclaim(datatype, mem, buf).map_err(ExchangeError::StringReclaimFailed)?;
            strings
        } else {
            let bytes = target.read_fixed(mem)?;
            match datatype.element_size() {
                Some(width) if width > 0 => bytes
                    .chunks(width)
                    .map(|frame| String::from_utf8_lossy(frame).into_owned())
                    .collect(),
                _ => vec![String::new(); self.dims.num_elements()],
            }
        };
        Ok(Value::Strings(from_column_major(&self.dims, strings)?))
    }

    fn bound_value(&self) -> Result<&'a Value, ExchangeError> {
        match self.source {
            Source::Value(value) => Ok(value),
            _ => Err(ExchangeError::NotBound("runtime value")),
        }
    }

    /// Writes the bound value to the selection of `target` in `ds`.
    ///
    /// `target` must have been populated from `ds` and is checked with
    /// [`is_compatible`](Self::is_compatible) first.
    pub fn write(&self, target: &DataExchange, ds: &mut Dataset) -> Result<(), ExchangeError> {
        use ElementTypeTag::*;
        let value = self.bound_value()?;
        if !matches!(target.source, Source::Dataset) {
            return Err(ExchangeError::NotBound("dataset"));
        }
        self.is_compatible(target)?;
        let (tag, _, _) = self.populated()?;
        let mem = shape::to_native_dims(&self.dims);
        trace!("writing {} {tag} elements as {}", self.dims.num_elements(), self.dims);
        let sel = &target.selection;
        let dt = ds.datatype().clone();
        match tag {
            Int8 => write_numeric::<i8>(value, &dt, |b| ds.write_fixed(&mem, sel, b)),
            UInt8 => write_numeric::<u8>(value, &dt, |b| ds.write_fixed(&mem, sel, b)),
            Int16 => write_numeric::<i16>(value, &dt, |b| ds.write_fixed(&mem, sel, b)),
            UInt16 => write_numeric::<u16>(value, &dt, |b| ds.write_fixed(&mem, sel, b)),
            Int32 => write_numeric::<i32>(value, &dt, |b| ds.write_fixed(&mem, sel, b)),
            UInt32 => write_numeric::<u32>(value, &dt, |b| ds.write_fixed(&mem, sel, b)),
            Int64 => write_numeric::<i64>(value, &dt, |b| ds.write_fixed(&mem, sel, b)),
            UInt64 => write_numeric::<u64>(value, &dt, |b| ds.write_fixed(&mem, sel, b)),
            Float32 => write_numeric::<f32>(value, &dt, |b| ds.write_fixed(&mem, sel, b)),
            Float64 => write_numeric::<f64>(value, &dt, |b| ds.write_fixed(&mem, sel, b)),
            VarString => {
                let strs = strings_of(value)?;
                Ok(ds.write_vlen(&mem, sel, &strs)?)
            }
        }
    }

    /// Stores the bound value as attribute `name`, replacing any attribute
    /// of that name.
    pub fn write_as_attribute(&self, attrs: &mut AttributeSet, name: &str) -> Result<(), ExchangeError> {
        use ElementTypeTag::*;
        let value = self.bound_value()?;
        let (tag, datatype, shape) = self.populated()?;
        let space = match shape.kind() {
            ExtentKind::Scalar => Dataspace::scalar(),
            _ => Dataspace::simple(shape.native_dims()),
        };
        if attrs.remove(name) {
            debug!("replacing attribute '{name}'");
        }
        let attr = attrs.create(name, datatype.clone(), space)?;
        match tag {
            Int8 => write_numeric::<i8>(value, datatype, |b| attr.write_fixed(b)),
            UInt8 => write_numeric::<u8>(value, datatype, |b| attr.write_fixed(b)),
            Int16 => write_numeric::<i16>(value, datatype, |b| attr.write_fixed(b)),
            UInt16 => write_numeric::<u16>(value, datatype, |b| attr.write_fixed(b)),
            Int32 => write_numeric::<i32>(value, datatype, |b| attr.write_fixed(b)),
            UInt32 => write_numeric::<u32>(value, datatype, |b| attr.write_fixed(b)),
            Int64 => write_numeric::<i64>(value, datatype, |b| attr.write_fixed(b)),
            UInt64 => write_numeric::<u64>(value, datatype, |b| attr.write_fixed(b)),
            Float32 => write_numeric::<f32>(value, datatype, |b| attr.write_fixed(b)),
            Float64 => write_numeric::<f64>(value, datatype, |b| attr.write_fixed(b)),
            VarString => {
                let strs = strings_of(value)?;
                Ok(attr.write_vlen(&strs)?)
            }
        }
    }
}

struct HyperslabPlan {
    selection: Selection,
    extent: Option<Vec<u64>>,
}

fn write_numeric<T: NativeElement>(
    value: &Value,
    datatype: &Datatype,
    sink: impl FnOnce(&[u8]) -> Result<(), crate::container::ContainerError>,
) -> Result<(), ExchangeError> {
    let array = T::as_array(value)
        .ok_or_else(|| ExchangeError::TypeMismatch(format!("value is {}", value.class_name())))?;
    let bytes = T::encode(&column_major(array), byte_order(datatype))?;
    Ok(sink(&bytes)?)
}

fn strings_of(value: &Value) -> Result<Vec<&str>, ExchangeError> {
    value
        .column_major_strs()
        .ok_or_else(|| ExchangeError::TypeMismatch(format!("value is {}", value.class_name())))
}
