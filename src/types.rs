//! Mapping between runtime element types and container datatypes.
//!
//! The runtime side knows a closed set of element types, [`ElementTypeTag`].
//! [`ElementTypeTag::to_native`] picks the container datatype a tag is stored
//! as; [`classify`] goes the other way and reports container types that have
//! no tag as unsupported instead of guessing. [`TypeInfo`] carries the extra
//! detail introspection reports (sizes, sign, character set, padding), none
//! of which changes the tag.

use crate::{
    container::{CharacterSet, Datatype, DatatypeByteOrder, DatatypeExt, StringPadding},
    ExchangeError,
};
use std::{fmt, str::FromStr};

/// Element types the runtime can exchange with a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementTypeTag {
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit float ("single").
    Float32,
    /// 64-bit float ("double").
    Float64,
    /// Character string. Stored as variable-length UTF-8; fixed-width string
    /// datasets also classify as this tag.
    VarString,
}

impl ElementTypeTag {
    /// Every tag, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Int8,
        Self::UInt8,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::VarString,
    ];

    /// The container datatype values of this tag are written as.
    pub fn to_native(self) -> Datatype {
        match self {
            Self::Int8 => Datatype::integer(1, true),
            Self::UInt8 => Datatype::integer(1, false),
            Self::Int16 => Datatype::integer(2, true),
            Self::UInt16 => Datatype::integer(2, false),
            Self::Int32 => Datatype::integer(4, true),
            Self::UInt32 => Datatype::integer(4, false),
            Self::Int64 => Datatype::integer(8, true),
            Self::UInt64 => Datatype::integer(8, false),
            Self::Float32 => Datatype::float(4),
            Self::Float64 => Datatype::float(8),
            Self::VarString => Datatype::vlen_string(CharacterSet::Utf8),
        }
    }

    /// Whether elements of this tag are strings.
    pub fn is_string(self) -> bool {
        self == Self::VarString
    }
}

impl fmt::Display for ElementTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "single",
            Self::Float64 => "double",
            Self::VarString => "string",
        };
        f.write_str(s)
    }
}

impl FromStr for ElementTypeTag {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.to_string() == s)
            .ok_or_else(|| ExchangeError::UnsupportedType(s.to_string()))
    }
}

/// Result of classifying a container datatype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The datatype maps to a runtime element type.
    Supported(ElementTypeTag),
    /// The datatype is well-formed but has no runtime counterpart.
    Unsupported(&'static str),
    /// The datatype descriptor is malformed, e.g. a bit field wider than
    /// the element.
    Invalid,
}

impl Classification {
    /// The tag, or the matching error.
    pub fn tag(&self) -> Result<ElementTypeTag, ExchangeError> {
        match self {
            Self::Supported(tag) => Ok(*tag),
            Self::Unsupported(class) => Err(ExchangeError::UnsupportedDatatype(class.to_string())),
            Self::Invalid => Err(ExchangeError::InvalidDatatype),
        }
    }
}

/// Classifies a container datatype.
pub fn classify(datatype: &Datatype) -> Classification {
    use ElementTypeTag::*;
    if !datatype.is_well_formed() {
        return Classification::Invalid;
    }
    let class = datatype.class_name();
    let tag = match datatype {
        Datatype::FixedPoint { byte_order: DatatypeByteOrder::Vax, .. }
        | Datatype::FloatingPoint { byte_order: DatatypeByteOrder::Vax, .. } => None,
        Datatype::FixedPoint { size, signed, .. } => match (*size, *signed) {
            (1, true) => Some(Int8),
            (1, false) => Some(UInt8),
            (2, true) => Some(Int16),
            (2, false) => Some(UInt16),
            (4, true) => Some(Int32),
            (4, false) => Some(UInt32),
            (8, true) => Some(Int64),
            (8, false) => Some(UInt64),
            _ => None,
        },
        Datatype::FloatingPoint { size: 4, .. } => Some(Float32),
        Datatype::FloatingPoint { size: 8, .. } => Some(Float64),
        Datatype::String { .. } | Datatype::VariableLength { is_string: true, .. } => Some(VarString),
        _ => None,
    };
    match tag {
        Some(tag) => Classification::Supported(tag),
        None => Classification::Unsupported(class),
    }
}

/// Size of one element of a datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSize {
    /// Fixed size in bytes.
    Bytes(usize),
    /// Variable-length elements.
    Variable,
}

/// Signedness of an integer datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Two's complement.
    Signed,
    /// Unsigned.
    Unsigned,
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Signed => write!(f, "signed"),
            Self::Unsigned => write!(f, "unsigned"),
        }
    }
}

/// Reportable detail of a container datatype.
///
/// Malformed datatypes produce a `TypeInfo` with every field empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeInfo {
    /// Type class name, e.g. `"int"`, `"string"` or `"compound"`.
    pub class: Option<&'static str>,
    /// Runtime element type, when the datatype is representable.
    pub runtime_class: Option<ElementTypeTag>,
    /// Element size.
    pub size: Option<TypeSize>,
    /// Integer signedness.
    pub sign: Option<Sign>,
    /// String character set.
    pub charset: Option<CharacterSet>,
    /// String padding convention.
    pub padding: Option<StringPadding>,
}

impl TypeInfo {
    /// Describes `datatype`.
    pub fn of(datatype: &Datatype) -> Self {
        if !datatype.is_well_formed() {
            return Self::default();
        }
        let mut info = Self {
            class: Some(datatype.class_name()),
            runtime_class: match classify(datatype) {
                Classification::Supported(tag) => Some(tag),
                _ => None,
            },
            size: Some(match datatype.element_size() {
                Some(n) => TypeSize::Bytes(n),
                None => TypeSize::Variable,
            }),
            ..Self::default()
        };
        match datatype {
            Datatype::FixedPoint { signed, .. } => {
                info.sign = Some(if *signed { Sign::Signed } else { Sign::Unsigned });
            }
            Datatype::String { padding, charset, .. } => {
                info.charset = Some(charset.clone());
                info.padding = Some(padding.clone());
            }
            Datatype::VariableLength { padding, charset, .. } => {
                info.charset = charset.clone();
                info.padding = padding.clone();
            }
            _ => {}
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 4-byte integer claiming 40 bits of precision.
    fn overwide_int() -> Datatype {
        Datatype::FixedPoint {
            size: 4,
            byte_order: DatatypeByteOrder::LittleEndian,
            signed: true,
            bit_offset: 0,
            bit_precision: 40,
        }
    }

    #[test]
    fn tags_round_trip_through_native() {
        for tag in ElementTypeTag::ALL {
            assert_eq!(classify(&tag.to_native()), Classification::Supported(tag));
            assert_eq!(tag.to_string().parse::<ElementTypeTag>().unwrap(), tag);
        }
    }

    #[test]
    fn unsupported_classes_keep_their_name() {
        let compound = Datatype::Compound { size: 8, members: Vec::new() };
        assert_eq!(classify(&compound), Classification::Unsupported("compound"));
        assert_eq!(classify(&Datatype::float(2)), Classification::Unsupported("float"));
        let time = Datatype::Time { size: 8, bit_precision: 64 };
        assert_eq!(classify(&time), Classification::Unsupported("time"));
        let mut vax = Datatype::float(8);
        if let Datatype::FloatingPoint { byte_order, .. } = &mut vax {
            *byte_order = DatatypeByteOrder::Vax;
        }
        assert_eq!(classify(&vax), Classification::Unsupported("float"));
        assert_eq!(classify(&overwide_int()), Classification::Invalid);
        assert!(matches!(
            classify(&compound).tag(),
            Err(ExchangeError::UnsupportedDatatype(class)) if class == "compound"
        ));
    }

    #[test]
    fn fixed_strings_classify_as_strings() {
        let dt = Datatype::fixed_string(5, StringPadding::SpacePad, CharacterSet::Ascii);
        assert_eq!(classify(&dt), Classification::Supported(ElementTypeTag::VarString));
        let info = TypeInfo::of(&dt);
        assert_eq!(info.size, Some(TypeSize::Bytes(5)));
        assert_eq!(info.padding, Some(StringPadding::SpacePad));
        assert_eq!(info.charset, Some(CharacterSet::Ascii));
        assert_eq!(info.sign, None);
    }

    #[test]
    fn info_of_integer_and_malformed() {
        let info = TypeInfo::of(&Datatype::integer(2, false));
        assert_eq!(info.class, Some("int"));
        assert_eq!(info.runtime_class, Some(ElementTypeTag::UInt16));
        assert_eq!(info.sign, Some(Sign::Unsigned));
        assert_eq!(TypeInfo::of(&overwide_int()), TypeInfo::default());
        assert!("logical".parse::<ElementTypeTag>().is_err());
    }
}
