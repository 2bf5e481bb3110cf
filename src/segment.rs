use std::fmt;

use crate::err::{TemplateError, TemplateResult};

/// Octet width of a field.
///
/// Field values are fixed-width unsigned integers, so only the native integer sizes are
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FieldWidth {
    U8 = 1,
    U16 = 2,
    U32 = 4,
    U64 = 8,
}

impl FieldWidth {
    /// Width in octets.
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Largest value a field of this width can hold.
    pub const fn max_value(self) -> u64 {
        match self {
            FieldWidth::U8 => u8::MAX as u64,
            FieldWidth::U16 => u16::MAX as u64,
            FieldWidth::U32 => u32::MAX as u64,
            FieldWidth::U64 => u64::MAX,
        }
    }

    /// Returns `None` for widths that are not 1, 2, 4 or 8.
    pub const fn from_bytes(width: usize) -> Option<Self> {
        match width {
            1 => Some(FieldWidth::U8),
            2 => Some(FieldWidth::U16),
            4 => Some(FieldWidth::U32),
            8 => Some(FieldWidth::U64),
            _ => None,
        }
    }

    /// Name of the matching Rust integer type.
    pub const fn type_name(self) -> &'static str {
        match self {
            FieldWidth::U8 => "u8",
            FieldWidth::U16 => "u16",
            FieldWidth::U32 => "u32",
            FieldWidth::U64 => "u64",
        }
    }
}

impl fmt::Display for FieldWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A named, fixed-width placeholder in a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    width: FieldWidth,
}

impl Field {
    pub fn new(name: impl Into<String>, width: FieldWidth) -> Self {
        Field {
            name: name.into(),
            width,
        }
    }

    /// Like [`Field::new`], but takes the width as an octet count.
    pub fn with_byte_width(name: impl Into<String>, width: usize) -> TemplateResult<Self> {
        let name = name.into();
        match FieldWidth::from_bytes(width) {
            Some(width) => Ok(Field { name, width }),
            None => Err(TemplateError::UnsupportedWidth { name, width }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> FieldWidth {
        self.width
    }

    /// Width in octets.
    pub fn byte_len(&self) -> usize {
        self.width.bytes()
    }
}

/// One piece of a template's byte layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Bytes that must appear verbatim.
    Literal(Vec<u8>),
    /// A variable, fixed-width value.
    Field(Field),
}

impl Segment {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Segment::Literal(bytes.into())
    }

    pub fn field(name: impl Into<String>, width: FieldWidth) -> Self {
        Segment::Field(Field::new(name, width))
    }

    /// Number of octets this segment occupies.
    pub fn len(&self) -> usize {
        match self {
            Segment::Literal(bytes) => bytes.len(),
            Segment::Field(field) => field.byte_len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Segment::Field(field) => Some(field),
            Segment::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&[u8]> {
        match self {
            Segment::Literal(bytes) => Some(bytes),
            Segment::Field(_) => None,
        }
    }
}

impl From<Field> for Segment {
    fn from(field: Field) -> Self {
        Segment::Field(field)
    }
}
