//! Runtime values.
//!
//! The runtime stores arrays column-major and always reports at least two
//! dimensions. A [`Value`] wraps an `ndarray` array of any dimensionality;
//! [`Value::dims`] reports it the way the runtime sees it.

use crate::{ElementTypeTag, ExchangeError};
use ndarray::prelude::*;
use std::{fmt, ops::Deref};

/// A runtime dimension vector, column-major.
///
/// Always holds at least two entries. Trailing singleton dimensions beyond
/// the second are dropped, so `[2, 3, 1]` and `[2, 3]` are the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimVector(Vec<usize>);

impl DimVector {
    /// Normalizes `dims`. A 0-d shape becomes `[1, 1]` and a 1-d shape `[n]`
    /// becomes the column `[n, 1]`.
    pub fn new(dims: &[usize]) -> Self {
        let mut v = dims.to_vec();
        while v.len() > 2 && v.last() == Some(&1) {
            v.pop();
        }
        v.resize(v.len().max(2), 1);
        Self(v)
    }

    /// The `1 x 1` shape of a single element.
    pub fn scalar() -> Self {
        Self(vec![1, 1])
    }

    /// Number of elements.
    pub fn num_elements(&self) -> usize {
        self.0.iter().product()
    }

    /// Whether the shape holds exactly one element.
    pub fn is_scalar(&self) -> bool {
        self.num_elements() == 1
    }
}

impl Deref for DimVector {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for DimVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        f.write_str(&parts.join("x"))
    }
}

/// A runtime value.
///
/// Two values are equal when they hold the same element type, the same
/// [`dims`](Value::dims) and the same elements in column-major order, so a
/// 0-d array equals its `1 x 1` form and `[n]` equals `[n, 1]`.
#[derive(Debug, Clone)]
pub enum Value {
    /// `int8` array.
    Int8(ArrayD<i8>),
    /// `uint8` array.
    UInt8(ArrayD<u8>),
    /// `int16` array.
    Int16(ArrayD<i16>),
    /// `uint16` array.
    UInt16(ArrayD<u16>),
    /// `int32` array.
    Int32(ArrayD<i32>),
    /// `uint32` array.
    UInt32(ArrayD<u32>),
    /// `int64` array.
    Int64(ArrayD<i64>),
    /// `uint64` array.
    UInt64(ArrayD<u64>),
    /// `single` array.
    Single(ArrayD<f32>),
    /// `double` array.
    Double(ArrayD<f64>),
    /// Homogeneous collection of strings.
    Strings(ArrayD<String>),
    /// `logical` array. Not exchangeable.
    Bool(ArrayD<bool>),
    /// Complex `double` array. Not exchangeable.
    #[cfg(feature = "num-complex")]
    Complex(ArrayD<num_complex::Complex64>),
    /// Mixed collection of values. Not exchangeable.
    Cell(Vec<Value>),
}

macro_rules! dispatch {
    ($value:expr, $arr:ident => $body:expr, $cell:pat => $cell_body:expr) => {
        match $value {
            Value::Int8($arr) => $body,
            Value::UInt8($arr) => $body,
            Value::Int16($arr) => $body,
            Value::UInt16($arr) => $body,
            Value::Int32($arr) => $body,
            Value::UInt32($arr) => $body,
            Value::Int64($arr) => $body,
            Value::UInt64($arr) => $body,
            Value::Single($arr) => $body,
            Value::Double($arr) => $body,
            Value::Strings($arr) => $body,
            Value::Bool($arr) => $body,
            #[cfg(feature = "num-complex")]
            Value::Complex($arr) => $body,
            $cell => $cell_body,
        }
    };
}

impl Value {
    /// A `1 x 1` string collection.
    pub fn string(s: &str) -> Self {
        Self::Strings(ArrayD::from_elem(IxDyn(&[1, 1]), s.to_string()))
    }

    /// A string collection of shape `dims` from column-major `strings`.
    pub fn strings<S: Into<String>>(
        dims: &[usize],
        strings: impl IntoIterator<Item = S>,
    ) -> Result<Self, ExchangeError> {
        let data = strings.into_iter().map(Into::into).collect();
        from_column_major(&DimVector::new(dims), data).map(Self::Strings)
    }

    /// Runtime dimension vector.
    pub fn dims(&self) -> DimVector {
        dispatch!(self, a => DimVector::new(a.shape()), Value::Cell(cells) => DimVector::new(&[1, cells.len()]))
    }

    /// Number of elements.
    pub fn num_elements(&self) -> usize {
        self.dims().num_elements()
    }

    /// Runtime class name, e.g. `"double"` or `"cell"`.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Int8(_) => "int8",
            Self::UInt8(_) => "uint8",
            Self::Int16(_) => "int16",
            Self::UInt16(_) => "uint16",
            Self::Int32(_) => "int32",
            Self::UInt32(_) => "uint32",
            Self::Int64(_) => "int64",
            Self::UInt64(_) => "uint64",
            Self::Single(_) => "single",
            Self::Double(_) => "double",
            Self::Strings(_) => "cellstr",
            Self::Bool(_) => "logical",
            #[cfg(feature = "num-complex")]
            Self::Complex(_) => "complex",
            Self::Cell(_) => "cell",
        }
    }

    /// Element type the value is exchanged as.
    pub fn element_tag(&self) -> Result<ElementTypeTag, ExchangeError> {
        use ElementTypeTag::*;
        Ok(match self {
            Self::Int8(_) => Int8,
            Self::UInt8(_) => UInt8,
            Self::Int16(_) => Int16,
            Self::UInt16(_) => UInt16,
            Self::Int32(_) => Int32,
            Self::UInt32(_) => UInt32,
            Self::Int64(_) => Int64,
            Self::UInt64(_) => UInt64,
            Self::Single(_) => Float32,
            Self::Double(_) => Float64,
            Self::Strings(_) => VarString,
            _ => return Err(ExchangeError::UnsupportedType(self.class_name().to_string())),
        })
    }

    /// Strings in column-major order, if this is a string collection.
    pub fn column_major_strs(&self) -> Option<Vec<&str>> {
        match self {
            Self::Strings(a) => Some(a.t().into_iter().map(String::as_str).collect()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        macro_rules! same {
            ($a:expr, $b:expr) => {
                DimVector::new($a.shape()) == DimVector::new($b.shape()) && $a.t().iter().eq($b.t().iter())
            };
        }
        match (self, other) {
            (Self::Int8(a), Self::Int8(b)) => same!(a, b),
            (Self::UInt8(a), Self::UInt8(b)) => same!(a, b),
            (Self::Int16(a), Self::Int16(b)) => same!(a, b),
            (Self::UInt16(a), Self::UInt16(b)) => same!(a, b),
            (Self::Int32(a), Self::Int32(b)) => same!(a, b),
            (Self::UInt32(a), Self::UInt32(b)) => same!(a, b),
            (Self::Int64(a), Self::Int64(b)) => same!(a, b),
            (Self::UInt64(a), Self::UInt64(b)) => same!(a, b),
            (Self::Single(a), Self::Single(b)) => same!(a, b),
            (Self::Double(a), Self::Double(b)) => same!(a, b),
            (Self::Strings(a), Self::Strings(b)) => same!(a, b),
            (Self::Bool(a), Self::Bool(b)) => same!(a, b),
            #[cfg(feature = "num-complex")]
            (Self::Complex(a), Self::Complex(b)) => same!(a, b),
            (Self::Cell(a), Self::Cell(b)) => a == b,
            _ => false,
        }
    }
}

/// Builds an array of shape `dims` from column-major `data`.
pub(crate) fn from_column_major<T>(dims: &DimVector, data: Vec<T>) -> Result<ArrayD<T>, ExchangeError> {
    ArrayD::from_shape_vec(IxDyn(dims).f(), data)
        .map_err(|e| ExchangeError::ShapeMismatch(format!("{e} for shape {dims}")))
}

/// Elements of `array` in column-major order.
pub(crate) fn column_major<T: Clone>(array: &ArrayD<T>) -> Vec<T> {
    array.t().iter().cloned().collect()
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl<D: Dimension> From<Array<String, D>> for Value {
    fn from(array: Array<String, D>) -> Self {
        Self::Strings(array.into_dyn())
    }
}

impl<D: Dimension> From<Array<bool, D>> for Value {
    fn from(array: Array<bool, D>) -> Self {
        Self::Bool(array.into_dyn())
    }
}

#[cfg(feature = "num-complex")]
impl<D: Dimension> From<Array<num_complex::Complex64, D>> for Value {
    fn from(array: Array<num_complex::Complex64, D>) -> Self {
        Self::Complex(array.into_dyn())
    }
}
