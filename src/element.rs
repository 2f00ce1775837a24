//! Typed element codecs between raw container bytes and runtime arrays.

use crate::{
    container::{native_byte_order, Datatype, DatatypeByteOrder},
    ElementTypeTag, ExchangeError, Value,
};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use ndarray::prelude::*;
use std::mem;

/// A numeric element type that can be exchanged with a container.
pub trait NativeElement: Sized + Clone {
    /// Element type tag of `Self`.
    const TAG: ElementTypeTag;

    /// Decodes raw bytes stored in `order` into elements.
    ///
    /// Fails when `bytes` is not a whole number of elements or `order` is not
    /// a plain byte order.
    fn decode(bytes: &[u8], order: DatatypeByteOrder) -> Result<Vec<Self>, ExchangeError>;

    /// Encodes elements into raw bytes in `order`.
    fn encode(data: &[Self], order: DatatypeByteOrder) -> Result<Vec<u8>, ExchangeError>;

    /// The array held by `value`, if it has this element type.
    fn as_array(value: &Value) -> Option<&ArrayD<Self>>;

    /// Wraps an array in a [`Value`].
    fn into_value(array: ArrayD<Self>) -> Value;
}

/// Byte order of a numeric datatype; native order for everything else.
pub(crate) fn byte_order(datatype: &Datatype) -> DatatypeByteOrder {
    match datatype {
        Datatype::FixedPoint { byte_order, .. } | Datatype::FloatingPoint { byte_order, .. } => {
            byte_order.clone()
        }
        _ => native_byte_order(),
    }
}

fn check_len<T>(bytes: &[u8]) -> Result<usize, ExchangeError> {
    let size = mem::size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(ExchangeError::TypeMismatch(format!(
            "{} bytes is not a whole number of {size}-byte elements",
            bytes.len()
        )));
    }
    Ok(bytes.len() / size)
}

fn vax() -> ExchangeError {
    ExchangeError::UnsupportedDatatype("VAX byte order".to_string())
}

macro_rules! impl_byte_element {
    ($elem:ty, $tag:ident, $variant:ident) => {
        impl NativeElement for $elem {
            const TAG: ElementTypeTag = ElementTypeTag::$tag;

            fn decode(bytes: &[u8], order: DatatypeByteOrder) -> Result<Vec<Self>, ExchangeError> {
                if order == DatatypeByteOrder::Vax {
                    return Err(vax());
                }
                Ok(bytes.iter().map(|&b| b as $elem).collect())
            }

            fn encode(data: &[Self], order: DatatypeByteOrder) -> Result<Vec<u8>, ExchangeError> {
                if order == DatatypeByteOrder::Vax {
                    return Err(vax());
                }
                Ok(data.iter().map(|&v| v as u8).collect())
            }

            fn as_array(value: &Value) -> Option<&ArrayD<Self>> {
                match value {
                    Value::$variant(a) => Some(a),
                    _ => None,
                }
            }

            fn into_value(array: ArrayD<Self>) -> Value {
                Value::$variant(array)
            }
        }
    };
}

macro_rules! impl_multibyte_element {
    ($elem:ty, $tag:ident, $variant:ident, $read_into:ident, $write_into:ident) => {
        impl NativeElement for $elem {
            const TAG: ElementTypeTag = ElementTypeTag::$tag;

            fn decode(bytes: &[u8], order: DatatypeByteOrder) -> Result<Vec<Self>, ExchangeError> {
                let mut out = vec![<$elem>::default(); check_len::<$elem>(bytes)?];
                match order {
                    DatatypeByteOrder::LittleEndian => LittleEndian::$read_into(bytes, &mut out),
                    DatatypeByteOrder::BigEndian => BigEndian::$read_into(bytes, &mut out),
                    DatatypeByteOrder::Vax => return Err(vax()),
                }
                Ok(out)
            }

            fn encode(data: &[Self], order: DatatypeByteOrder) -> Result<Vec<u8>, ExchangeError> {
                let mut out = vec![0; data.len() * mem::size_of::<$elem>()];
                match order {
                    DatatypeByteOrder::LittleEndian => LittleEndian::$write_into(data, &mut out),
                    DatatypeByteOrder::BigEndian => BigEndian::$write_into(data, &mut out),
                    DatatypeByteOrder::Vax => return Err(vax()),
                }
                Ok(out)
            }

            fn as_array(value: &Value) -> Option<&ArrayD<Self>> {
                match value {
                    Value::$variant(a) => Some(a),
                    _ => None,
                }
            }

            fn into_value(array: ArrayD<Self>) -> Value {
                Value::$variant(array)
            }
        }
    };
}

impl_byte_element!(i8, Int8, Int8);
impl_byte_element!(u8, UInt8, UInt8);
impl_multibyte_element!(i16, Int16, Int16, read_i16_into, write_i16_into);
impl_multibyte_element!(u16, UInt16, UInt16, read_u16_into, write_u16_into);
impl_multibyte_element!(i32, Int32, Int32, read_i32_into, write_i32_into);
impl_multibyte_element!(u32, UInt32, UInt32, read_u32_into, write_u32_into);
impl_multibyte_element!(i64, Int64, Int64, read_i64_into, write_i64_into);
impl_multibyte_element!(u64, UInt64, UInt64, read_u64_into, write_u64_into);
impl_multibyte_element!(f32, Float32, Single, read_f32_into, write_f32_into);
impl_multibyte_element!(f64, Float64, Double, read_f64_into, write_f64_into);

macro_rules! impl_from_array {
    ($($elem:ty),*) => {
        $(
            impl<D: Dimension> From<Array<$elem, D>> for Value {
                fn from(array: Array<$elem, D>) -> Self {
                    <$elem as NativeElement>::into_value(array.into_dyn())
                }
            }

            impl From<$elem> for Value {
                fn from(v: $elem) -> Self {
                    <$elem as NativeElement>::into_value(arr0(v).into_dyn())
                }
            }
        )*
    };
}

impl_from_array!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn decode_respects_byte_order() {
        let bytes = [0x00, 0x01, 0x00, 0x02];
        assert_eq!(u16::decode(&bytes, DatatypeByteOrder::BigEndian).unwrap(), [1, 2]);
        assert_eq!(u16::decode(&bytes, DatatypeByteOrder::LittleEndian).unwrap(), [256, 512]);
        assert_eq!(i8::decode(&[0xff], DatatypeByteOrder::BigEndian).unwrap(), [-1]);
    }

    #[test]
    fn encode_then_decode_floats() {
        let data = [1.5f64, -2.25];
        let bytes = f64::encode(&data, DatatypeByteOrder::BigEndian).unwrap();
        assert_eq!(bytes[..8], 1.5f64.to_be_bytes());
        assert_eq!(f64::decode(&bytes, DatatypeByteOrder::BigEndian).unwrap(), data);
    }

    #[test]
    fn ragged_and_vax_fail() {
        assert!(matches!(
            i32::decode(&[0; 6], DatatypeByteOrder::LittleEndian),
            Err(ExchangeError::TypeMismatch(_))
        ));
        assert!(f32::encode(&[1.0], DatatypeByteOrder::Vax).is_err());
        assert!(u8::decode(&[1], DatatypeByteOrder::Vax).is_err());
    }

    #[test]
    fn values_from_arrays() {
        let v = Value::from(array![[1u16, 2], [3, 4]]);
        assert_eq!(u16::as_array(&v).map(|a| a.len()), Some(4));
        assert!(i16::as_array(&v).is_none());
        assert_eq!(Value::from(2.5f32).element_tag().unwrap(), ElementTypeTag::Float32);
        assert_eq!(u16::TAG, ElementTypeTag::UInt16);
    }
}
