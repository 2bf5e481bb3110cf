//! Serializable template definitions.
//!
//! This is the on-disk form of a catalog: a JSON document listing templates as interleaved
//! literal chunks and fields, in the same style the built-in templates are authored in.
//!
//! ```json
//! {
//!   "templates": [
//!     {
//!       "name": "X64CallMonkeypatch",
//!       "arch": "x64",
//!       "segments": [
//!         { "bytes": "e8" },
//!         { "field": "relative_addr", "width": 4 },
//!         { "bytes": [144, 195] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Literal `bytes` may be a hex string (whitespace and `0x` prefixes allowed) or an array of
//! integers.

use serde::{Deserialize, Serialize};

use crate::catalog::Arch;
use crate::err::{TemplateError, TemplateResult};
use crate::segment::Segment;
use crate::template::{Template, TemplateBuilder};
use crate::utils::{parse_hex, to_hex_string};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogDefinition {
    pub templates: Vec<TemplateDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<Arch>,
    pub segments: Vec<SegmentDefinition>,
}

/// A literal chunk or a field. Each shape rejects the other's keys, so a segment can never be
/// read as a literal while its field keys are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentDefinition {
    Literal(LiteralDefinition),
    Field(FieldDefinition),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LiteralDefinition {
    pub bytes: LiteralBytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    pub field: String,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralBytes {
    Hex(String),
    Array(Vec<u8>),
}

impl LiteralBytes {
    pub fn to_bytes(&self) -> TemplateResult<Vec<u8>> {
        match self {
            LiteralBytes::Array(bytes) => Ok(bytes.clone()),
            LiteralBytes::Hex(text) => {
                parse_hex(text).map_err(|message| TemplateError::InvalidLiteral {
                    text: text.clone(),
                    message,
                })
            }
        }
    }
}

impl CatalogDefinition {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl TemplateDefinition {
    /// Describes an existing template. Literal runs are written as hex strings.
    pub fn from_template(name: impl Into<String>, arch: Option<Arch>, template: &Template) -> Self {
        let segments = template
            .segments()
            .iter()
            .map(|segment| match segment {
                Segment::Literal(bytes) => SegmentDefinition::Literal(LiteralDefinition {
                    bytes: LiteralBytes::Hex(to_hex_string(bytes)),
                }),
                Segment::Field(field) => SegmentDefinition::Field(FieldDefinition {
                    field: field.name().to_owned(),
                    width: field.byte_len(),
                }),
            })
            .collect();

        TemplateDefinition {
            name: name.into(),
            arch,
            segments,
        }
    }

    /// Validates and normalizes this definition into a [`Template`].
    pub fn to_template(&self) -> TemplateResult<Template> {
        let mut builder = TemplateBuilder::new();
        for segment in &self.segments {
            builder = match segment {
                SegmentDefinition::Literal(literal) => builder.bytes(&literal.bytes.to_bytes()?),
                SegmentDefinition::Field(field) => builder.field(field.field.as_str(), field.width),
            };
        }
        builder.build()
    }
}
