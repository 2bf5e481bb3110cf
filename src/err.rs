use thiserror::Error;

pub type TemplateResult<T> = std::result::Result<T, TemplateError>;
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Authoring errors, raised while a template is being constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("field `{name}` appears more than once in the template")]
    DuplicateField { name: String },

    #[error("field `{name}` has unsupported width {width} (expected one of 1, 2, 4, 8)")]
    UnsupportedWidth { name: String, width: usize },

    #[error("field at segment {index} has an empty name")]
    EmptyFieldName { index: usize },

    #[error("invalid literal bytes `{text}`: {message}")]
    InvalidLiteral { text: String, message: &'static str },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("buffer too short to match template (need {need} bytes, have {have})")]
    BufferTooShort { need: usize, have: usize },

    /// The buffer does not hold the expected instruction bytes.
    ///
    /// `offset` is the first differing byte, relative to the start of the template.
    #[error("literal bytes do not match template at offset {offset}")]
    LiteralMismatch { offset: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubstituteError {
    #[error("buffer too short to hold template (need {need} bytes, have {have})")]
    BufferTooShort { need: usize, have: usize },

    #[error("no value supplied for field `{name}`")]
    MissingField { name: String },

    #[error("value {value:#x} does not fit in field `{name}` ({width} bytes)")]
    ValueOutOfRange {
        name: String,
        value: u64,
        width: usize,
    },

    #[error("template has no field named `{name}`")]
    UnexpectedField { name: String },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("template `{name}` not found in catalog")]
    UnknownTemplate { name: String },

    #[error("template `{name}` is defined more than once")]
    DuplicateTemplate { name: String },

    #[error("template `{name}` is malformed: {source}")]
    InvalidTemplate {
        name: String,
        #[source]
        source: TemplateError,
    },

    #[error("failed to parse catalog definition: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("failed to read catalog definition: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
