//! Matching buffers against templates and writing templates into buffers.
//!
//! Both directions walk the template's canonical segments once, keeping a running offset:
//! - literal runs are compared (match) or copied verbatim (substitute),
//! - fields are decoded into / encoded from unsigned integers of the field's width.
//!
//! Every field uses the same byte order, [`TargetEndian`]. The walks themselves are generic over
//! [`ByteOrder`], so the order is chosen in exactly one place.

use std::fmt;

use ahash::RandomState;
use byteorder::{ByteOrder, LittleEndian};
use hashbrown::HashMap as FastMap;
use log::{debug, trace};

use crate::err::{MatchError, SubstituteError};
use crate::segment::Segment;
use crate::template::Template;
use crate::utils::bytes;
use crate::utils::format_hexdump;

/// Byte order of every field value. The supported targets (x86, x86-64) are little-endian.
pub type TargetEndian = LittleEndian;

/// Field values keyed by field name.
///
/// Iteration order is unspecified; look values up by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues(FastMap<String, u64, RandomState>);

impl FieldValues {
    pub fn new() -> Self {
        FieldValues(FastMap::with_hasher(RandomState::new()))
    }

    pub fn with_capacity(capacity: usize) -> Self {
        FieldValues(FastMap::with_capacity_and_hasher(
            capacity,
            RandomState::new(),
        ))
    }

    /// Sets `name` to `value`, returning the previous value if any.
    pub fn insert(&mut self, name: impl Into<String>, value: u64) -> Option<u64> {
        self.0.insert(name.into(), value)
    }

    /// Chained form of [`FieldValues::insert`].
    pub fn with(mut self, name: impl Into<String>, value: u64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for FieldValues {
    fn from_iter<T: IntoIterator<Item = (K, u64)>>(iter: T) -> Self {
        let mut values = FieldValues::new();
        for (name, value) in iter {
            values.insert(name, value);
        }
        values
    }
}

impl<K: Into<String>> Extend<(K, u64)> for FieldValues {
    fn extend<T: IntoIterator<Item = (K, u64)>>(&mut self, iter: T) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl fmt::Display for FieldValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

        f.write_str("{")?;
        for (i, (name, value)) in entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:#x}", name, value)?;
        }
        f.write_str("}")
    }
}

/// Checks the literal bytes of `template` against `buffer` and extracts every field value.
///
/// Only the first `template.byte_len()` bytes of `buffer` are inspected.
pub fn match_template(template: &Template, buffer: &[u8]) -> Result<FieldValues, MatchError> {
    match_with_order::<TargetEndian>(template, buffer)
}

/// Writes `template` into the start of `buffer`: literal bytes verbatim, fields from `values`.
///
/// `values` must name exactly the template's fields, each within its width. Everything is
/// validated before the first byte is written, so on error `buffer` is left unchanged. On success
/// `buffer[..template.byte_len()]` is fully overwritten and the rest is untouched.
pub fn substitute(
    template: &Template,
    buffer: &mut [u8],
    values: &FieldValues,
) -> Result<(), SubstituteError> {
    substitute_with_order::<TargetEndian>(template, buffer, values)
}

/// Allocates a buffer of exactly `template.byte_len()` bytes and substitutes into it.
pub fn instantiate(template: &Template, values: &FieldValues) -> Result<Vec<u8>, SubstituteError> {
    let mut buffer = vec![0u8; template.byte_len()];
    substitute(template, &mut buffer, values)?;
    Ok(buffer)
}

fn match_with_order<B: ByteOrder>(
    template: &Template,
    buffer: &[u8],
) -> Result<FieldValues, MatchError> {
    let need = template.byte_len();
    if buffer.len() < need {
        return Err(MatchError::BufferTooShort {
            need,
            have: buffer.len(),
        });
    }

    let mut values = FieldValues::with_capacity(template.field_count());
    for (offset, segment) in template.layout() {
        match segment {
            Segment::Literal(expected) => {
                let actual = &buffer[offset..offset + expected.len()];
                if let Some(index) = bytes::first_difference(expected, actual) {
                    let offset = offset + index;
                    debug!(
                        "literal mismatch at offset {}\nexpected:\n{}\nfound:\n{}",
                        offset,
                        format_hexdump(&template.image(), 0, Some(offset)),
                        format_hexdump(&buffer[..need], 0, Some(offset))
                    );
                    return Err(MatchError::LiteralMismatch { offset });
                }
            }
            Segment::Field(field) => {
                let value = bytes::read_uint::<B>(buffer, offset, field.byte_len()).ok_or(
                    MatchError::BufferTooShort {
                        need,
                        have: buffer.len(),
                    },
                )?;
                trace!("field `{}` at offset {} = {:#x}", field.name(), offset, value);
                values.insert(field.name(), value);
            }
        }
    }

    Ok(values)
}

fn substitute_with_order<B: ByteOrder>(
    template: &Template,
    buffer: &mut [u8],
    values: &FieldValues,
) -> Result<(), SubstituteError> {
    let need = template.byte_len();
    if buffer.len() < need {
        return Err(SubstituteError::BufferTooShort {
            need,
            have: buffer.len(),
        });
    }

    for field in template.fields() {
        let value = values
            .get(field.name())
            .ok_or_else(|| SubstituteError::MissingField {
                name: field.name().to_owned(),
            })?;
        if !bytes::fits_width(value, field.byte_len()) {
            return Err(SubstituteError::ValueOutOfRange {
                name: field.name().to_owned(),
                value,
                width: field.byte_len(),
            });
        }
    }
    if let Some((name, _)) = values.iter().find(|(name, _)| !template.has_field(name)) {
        return Err(SubstituteError::UnexpectedField {
            name: name.to_owned(),
        });
    }

    for (offset, segment) in template.layout() {
        match segment {
            Segment::Literal(run) => {
                buffer[offset..offset + run.len()].copy_from_slice(run);
            }
            Segment::Field(field) => {
                // Presence was validated above.
                let value = values.get(field.name()).unwrap_or_default();
                bytes::write_uint::<B>(buffer, offset, value, field.byte_len()).ok_or(
                    SubstituteError::BufferTooShort {
                        need,
                        have: buffer.len(),
                    },
                )?;
            }
        }
    }

    trace!("substituted {} bytes ({} fields)", need, template.field_count());
    Ok(())
}

impl Template {
    /// See [`match_template`].
    pub fn match_bytes(&self, buffer: &[u8]) -> Result<FieldValues, MatchError> {
        match_template(self, buffer)
    }

    /// Whether `buffer` starts with this template's literal bytes.
    pub fn matches(&self, buffer: &[u8]) -> bool {
        self.match_bytes(buffer).is_ok()
    }

    /// See [`substitute`].
    pub fn substitute(
        &self,
        buffer: &mut [u8],
        values: &FieldValues,
    ) -> Result<(), SubstituteError> {
        substitute(self, buffer, values)
    }

    /// See [`instantiate`].
    pub fn instantiate(&self, values: &FieldValues) -> Result<Vec<u8>, SubstituteError> {
        instantiate(self, values)
    }
}
