//! Container datatype descriptors.
//!
//! The descriptors are the on-disk ones of `rustyhdf5-format`, so a loaded
//! file keeps every field of its type messages and a saved file writes them
//! back unchanged. [`DatatypeExt`] adds the constructors and queries the
//! exchange engine works with.

pub use rustyhdf5_format::datatype::{
    CharacterSet, CompoundMember, Datatype, DatatypeByteOrder, EnumMember, ReferenceType,
    StringPadding,
};

/// Byte order of the machine running this code.
pub const fn native_byte_order() -> DatatypeByteOrder {
    if cfg!(target_endian = "big") {
        DatatypeByteOrder::BigEndian
    } else {
        DatatypeByteOrder::LittleEndian
    }
}

/// Constructors and queries on [`Datatype`].
pub trait DatatypeExt: Sized {
    /// Native-endian integer type of `size` bytes.
    fn integer(size: u32, signed: bool) -> Self;

    /// Native-endian IEEE floating point type of `size` bytes.
    ///
    /// Sizes 2 and 4 give binary16 and binary32; anything else is laid out
    /// as binary64.
    fn float(size: u32) -> Self;

    /// Fixed-length string of `size` bytes per element.
    fn fixed_string(size: u32, padding: StringPadding, charset: CharacterSet) -> Self;

    /// Variable-length, null-terminated string in the given character set.
    fn vlen_string(charset: CharacterSet) -> Self;

    /// Whether elements of this type are stored as variable-length strings.
    fn is_vlen_string(&self) -> bool;

    /// Whether elements of this type have variable size.
    fn is_variable(&self) -> bool;

    /// Size of one stored element in bytes, `None` for variable-length types.
    fn element_size(&self) -> Option<usize>;

    /// Short lowercase name of the type class.
    fn class_name(&self) -> &'static str;

    /// Whether the descriptor is internally consistent: non-zero sizes, bit
    /// fields inside the element, integer enumeration bases and non-empty
    /// array dimensions.
    fn is_well_formed(&self) -> bool;
}

/// Bit field `offset..offset + precision` fits in `size` bytes.
fn bits_fit(size: u32, offset: u16, precision: u16) -> bool {
    size > 0 && precision > 0 && u64::from(offset) + u64::from(precision) <= u64::from(size) * 8
}

impl DatatypeExt for Datatype {
    fn integer(size: u32, signed: bool) -> Self {
        Self::FixedPoint {
            size,
            byte_order: native_byte_order(),
            signed,
            bit_offset: 0,
            bit_precision: (size * 8) as u16,
        }
    }

    fn float(size: u32) -> Self {
        let (size, exponent_location, exponent_size, mantissa_size, exponent_bias) = match size {
            2 => (2, 10, 5, 10, 15),
            4 => (4, 23, 8, 23, 127),
            _ => (8, 52, 11, 52, 1023),
        };
        Self::FloatingPoint {
            size,
            byte_order: native_byte_order(),
            bit_offset: 0,
            bit_precision: (size * 8) as u16,
            exponent_location,
            exponent_size,
            mantissa_location: 0,
            mantissa_size,
            exponent_bias,
        }
    }

    fn fixed_string(size: u32, padding: StringPadding, charset: CharacterSet) -> Self {
        Self::String { size, padding, charset }
    }

    fn vlen_string(charset: CharacterSet) -> Self {
        Self::VariableLength {
            is_string: true,
            padding: Some(StringPadding::NullTerminate),
            charset: Some(charset),
            base_type: Box::new(Self::integer(1, false)),
        }
    }

    fn is_vlen_string(&self) -> bool {
        matches!(self, Self::VariableLength { is_string: true, .. })
    }

    fn is_variable(&self) -> bool {
        matches!(self, Self::VariableLength { .. })
    }

    fn element_size(&self) -> Option<usize> {
        let size = match self {
            Self::FixedPoint { size, .. }
            | Self::FloatingPoint { size, .. }
            | Self::Time { size, .. }
            | Self::String { size, .. }
            | Self::BitField { size, .. }
            | Self::Opaque { size, .. }
            | Self::Compound { size, .. }
            | Self::Reference { size, .. }
            | Self::Enumeration { size, .. } => *size as usize,
            Self::Array { base_type, dimensions } => dimensions
                .iter()
                .try_fold(base_type.element_size()?, |n, &d| n.checked_mul(d as usize))?,
            Self::VariableLength { .. } => return None,
        };
        Some(size)
    }

    fn class_name(&self) -> &'static str {
        match self {
            Self::FixedPoint { .. } => "int",
            Self::FloatingPoint { .. } => "float",
            Self::Time { .. } => "time",
            Self::String { .. } => "string",
            Self::VariableLength { is_string: true, .. } => "string",
            Self::BitField { .. } => "bitfield",
            Self::Opaque { .. } => "opaque",
            Self::Compound { .. } => "compound",
            Self::Reference { .. } => "reference",
            Self::Enumeration { .. } => "enum",
            Self::VariableLength { .. } => "vlen",
            Self::Array { .. } => "array",
        }
    }

    fn is_well_formed(&self) -> bool {
        match self {
            Self::FixedPoint { size, bit_offset, bit_precision, .. }
            | Self::FloatingPoint { size, bit_offset, bit_precision, .. }
            | Self::BitField { size, bit_offset, bit_precision, .. } => {
                bits_fit(*size, *bit_offset, *bit_precision)
            }
            Self::Time { size, bit_precision } => bits_fit(*size, 0, *bit_precision),
            Self::String { .. } => true,
            Self::Opaque { size, .. } | Self::Compound { size, .. } | Self::Reference { size, .. } => {
                *size > 0
            }
            Self::Enumeration { size, base_type, .. } => {
                matches!(**base_type, Self::FixedPoint { .. })
                    && base_type.is_well_formed()
                    && base_type.element_size() == Some(*size as usize)
            }
            Self::VariableLength { base_type, .. } => base_type.is_well_formed(),
            Self::Array { base_type, dimensions } => {
                !dimensions.is_empty() && !dimensions.contains(&0) && base_type.is_well_formed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_sizes() {
        assert_eq!(Datatype::integer(4, true).element_size(), Some(4));
        assert_eq!(Datatype::float(8).element_size(), Some(8));
        assert_eq!(Datatype::vlen_string(CharacterSet::Utf8).element_size(), None);
        let arr = Datatype::Array { base_type: Box::new(Datatype::float(4)), dimensions: vec![2, 3] };
        assert_eq!(arr.element_size(), Some(24));
    }

    #[test]
    fn float_layouts_match_ieee() {
        let fields = |dt: Datatype| match dt {
            Datatype::FloatingPoint { exponent_bias, mantissa_size, bit_precision, .. } => {
                (exponent_bias, mantissa_size, bit_precision)
            }
            _ => panic!("expected a float"),
        };
        assert_eq!(fields(Datatype::float(4)), (127, 23, 32));
        assert_eq!(fields(Datatype::float(8)), (1023, 52, 64));
    }

    #[test]
    fn class_names() {
        assert_eq!(Datatype::vlen_string(CharacterSet::Ascii).class_name(), "string");
        let seq = Datatype::VariableLength {
            is_string: false,
            padding: None,
            charset: None,
            base_type: Box::new(Datatype::integer(4, true)),
        };
        assert_eq!(seq.class_name(), "vlen");
    }

    #[test]
    fn malformed_descriptors() {
        assert!(Datatype::integer(2, false).is_well_formed());
        let wide = Datatype::FixedPoint {
            size: 4,
            byte_order: DatatypeByteOrder::LittleEndian,
            signed: true,
            bit_offset: 0,
            bit_precision: 40,
        };
        assert!(!wide.is_well_formed());
        let float_base = Datatype::Enumeration {
            size: 8,
            base_type: Box::new(Datatype::float(8)),
            members: Vec::new(),
        };
        assert!(!float_base.is_well_formed());
        let empty = Datatype::Array { base_type: Box::new(Datatype::float(4)), dimensions: vec![] };
        assert!(!empty.is_well_formed());
    }
}
