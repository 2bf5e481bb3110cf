#![deny(unused_must_use)]
#![forbid(unsafe_code)]
//! Byte-exact templates for machine code stubs.
//!
//! A [`Template`] is a fixed-length byte layout: literal runs (instruction opcodes, ModRM bytes,
//! fixed immediates) interleaved with named, fixed-width [`Field`]s (jump displacements, syscall
//! numbers, return addresses). Given a template you can
//!
//! - check that a buffer holds the expected instructions and pull out its field values
//!   ([`Template::match_bytes`]),
//! - write the template into a buffer with new field values ([`Template::substitute`],
//!   [`Template::instantiate`]).
//!
//! Field values are unsigned integers encoded in [`TargetEndian`] (little-endian) order.
//!
//! The built-in x86 / x86-64 stubs live in [`Catalog::builtin`]:
//!
//! ```
//! use asm_templates::{Catalog, FieldValues};
//!
//! let jump = Catalog::builtin().get("X64JumpMonkeypatch").unwrap();
//!
//! let mut code = [0u8; 5];
//! jump.substitute(&mut code, &FieldValues::new().with("relative_addr", 0x100))
//!     .unwrap();
//! assert_eq!(code, [0xe9, 0x00, 0x01, 0x00, 0x00]);
//!
//! let fields = jump.match_bytes(&code).unwrap();
//! assert_eq!(fields.get("relative_addr"), Some(0x100));
//! assert_eq!(jump.field_end_offset("relative_addr"), Some(5));
//! ```

pub mod catalog;
pub mod engine;
pub mod err;
pub mod segment;
pub mod template;
pub mod utils;

pub use catalog::definition::{CatalogDefinition, TemplateDefinition};
pub use catalog::{Arch, Catalog, CatalogBuilder, CatalogEntry};
pub use engine::{FieldValues, TargetEndian, instantiate, match_template, substitute};
pub use err::{CatalogError, MatchError, SubstituteError, TemplateError};
pub use segment::{Field, FieldWidth, Segment};
pub use template::{Template, TemplateBuilder};

/// Looks up a template in the built-in catalog.
pub fn lookup(name: &str) -> err::CatalogResult<&'static Template> {
    Catalog::builtin().get(name)
}
