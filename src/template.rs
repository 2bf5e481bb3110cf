use ahash::RandomState;
use hashbrown::HashMap as FastMap;
use hashbrown::hash_map::Entry;
use log::trace;

use crate::err::{TemplateError, TemplateResult};
use crate::segment::{Field, FieldWidth, Segment};

/// Where a field lives inside the normalized segment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSlot {
    /// Index into `Template::segments`.
    segment: usize,
    /// Byte offset from the start of the template.
    offset: usize,
}

/// A fixed-length byte layout made of literal runs and named fields.
///
/// Templates are always kept in canonical form: empty literal runs are dropped and adjacent literal
/// runs are merged, so literals and fields alternate. Offsets and the total length are computed
/// once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    byte_len: usize,
    segments: Vec<Segment>,
    slots: FastMap<String, FieldSlot, RandomState>,
}

impl Template {
    /// Builds a template from an unnormalized list of segments, in layout order.
    ///
    /// Field names must be unique and non-empty.
    pub fn new<I>(segments: I) -> TemplateResult<Self>
    where
        I: IntoIterator<Item = Segment>,
    {
        let mut merged: Vec<Segment> = Vec::new();
        let mut slots = FastMap::with_hasher(RandomState::new());
        let mut offset = 0;

        for (index, segment) in segments.into_iter().enumerate() {
            match segment {
                Segment::Literal(bytes) => {
                    if bytes.is_empty() {
                        continue;
                    }
                    offset += bytes.len();
                    match merged.last_mut() {
                        Some(Segment::Literal(run)) => run.extend_from_slice(&bytes),
                        _ => merged.push(Segment::Literal(bytes)),
                    }
                }
                Segment::Field(field) => {
                    if field.name().is_empty() {
                        return Err(TemplateError::EmptyFieldName { index });
                    }
                    match slots.entry(field.name().to_owned()) {
                        Entry::Occupied(entry) => {
                            return Err(TemplateError::DuplicateField {
                                name: entry.key().clone(),
                            });
                        }
                        Entry::Vacant(entry) => {
                            entry.insert(FieldSlot {
                                segment: merged.len(),
                                offset,
                            });
                        }
                    }
                    offset += field.byte_len();
                    merged.push(Segment::Field(field));
                }
            }
        }

        trace!(
            "normalized template: {} segments, {} fields, {} bytes",
            merged.len(),
            slots.len(),
            offset
        );

        Ok(Template {
            byte_len: offset,
            segments: merged,
            slots,
        })
    }

    pub fn builder() -> TemplateBuilder {
        TemplateBuilder::new()
    }

    /// Total size in octets.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Canonical segments, in layout order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments paired with their byte offset from the start of the template.
    pub fn layout(&self) -> impl Iterator<Item = (usize, &Segment)> + '_ {
        self.segments.iter().scan(0usize, |offset, segment| {
            let start = *offset;
            *offset += segment.len();
            Some((start, segment))
        })
    }

    /// Fields in the order they appear in the layout.
    pub fn fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.segments.iter().filter_map(Segment::as_field)
    }

    pub fn field_count(&self) -> usize {
        self.slots.len()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        let slot = self.slots.get(name)?;
        self.segments[slot.segment].as_field()
    }

    /// Offset of the first byte of the named field.
    pub fn field_offset(&self, name: &str) -> Option<usize> {
        self.slots.get(name).map(|slot| slot.offset)
    }

    /// Offset immediately following the named field.
    ///
    /// Relative jump and call displacements are measured from here, since the operand is the last
    /// part of the instruction.
    pub fn field_end_offset(&self, name: &str) -> Option<usize> {
        let slot = self.slots.get(name)?;
        let field = self.segments[slot.segment].as_field()?;
        Some(slot.offset + field.byte_len())
    }

    /// The template's bytes with every field zero-filled.
    pub fn image(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len);
        for segment in &self.segments {
            match segment {
                Segment::Literal(run) => bytes.extend_from_slice(run),
                Segment::Field(field) => bytes.resize(bytes.len() + field.byte_len(), 0),
            }
        }
        bytes
    }
}

/// Incremental construction of a [`Template`], one instruction (or part of one) at a time.
///
/// Literal chunks can be supplied as small as convenient; they are merged by [`build`].
///
/// ```
/// use asm_templates::Template;
///
/// let jump = Template::builder()
///     .byte(0xe9) // jmp $target
///     .field("target", 4)
///     .build()
///     .unwrap();
///
/// assert_eq!(jump.byte_len(), 5);
/// assert_eq!(jump.field_end_offset("target"), Some(5));
/// ```
///
/// [`build`]: TemplateBuilder::build
#[derive(Debug, Clone, Default)]
pub struct TemplateBuilder {
    segments: Vec<Segment>,
    // First authoring error; reported by `build`.
    error: Option<TemplateError>,
}

impl TemplateBuilder {
    pub fn new() -> Self {
        TemplateBuilder::default()
    }

    pub fn byte(self, byte: u8) -> Self {
        self.bytes(&[byte])
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.segments.push(Segment::Literal(bytes.to_vec()));
        self
    }

    /// Appends a field of `width` octets (1, 2, 4 or 8).
    pub fn field(mut self, name: impl Into<String>, width: usize) -> Self {
        let name = name.into();
        match FieldWidth::from_bytes(width) {
            Some(width) => self.segments.push(Segment::field(name, width)),
            None => {
                self.error
                    .get_or_insert(TemplateError::UnsupportedWidth { name, width });
            }
        }
        self
    }

    pub fn segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn build(self) -> TemplateResult<Template> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Template::new(self.segments)
    }
}
