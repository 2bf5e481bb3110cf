//! Named, immutable templates.
//!
//! The built-in catalog ([`Catalog::builtin`]) holds the x86 and x86-64 stubs used to redirect
//! system calls and vDSO entry points. Their bytes are a binary contract with the code that is
//! patched at runtime: changing any literal byte is a breaking change.
//!
//! Additional catalogs can be assembled with [`CatalogBuilder`], typically by merging the
//! built-ins with templates loaded from a JSON definition (see [`definition`]).

pub mod definition;
pub mod x64;
pub mod x86;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use ahash::RandomState;
use hashbrown::HashMap as FastMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::err::{CatalogError, CatalogResult};
use crate::template::{Template, TemplateBuilder};

use self::definition::CatalogDefinition;

/// The instruction set a template's encoding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86,
    X64,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X64 => "x64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86" | "i386" | "i686" => Ok(Arch::X86),
            "x64" | "x86_64" | "amd64" => Ok(Arch::X64),
            other => Err(format!("unknown architecture `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    name: String,
    arch: Option<Arch>,
    template: Template,
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arch(&self) -> Option<Arch> {
        self.arch
    }

    pub fn template(&self) -> &Template {
        &self.template
    }
}

/// A read-only mapping from template name to [`Template`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: FastMap<String, CatalogEntry, RandomState>,
}

impl Catalog {
    /// The process-wide catalog of built-in x86 / x86-64 templates.
    ///
    /// Built on first use; never mutated afterwards.
    pub fn builtin() -> &'static Catalog {
        static BUILTIN: LazyLock<Catalog> = LazyLock::new(|| {
            CatalogBuilder::new()
                .with_builtins()
                .map(CatalogBuilder::build)
                .expect("built-in templates are well-formed")
        });
        &BUILTIN
    }

    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Looks up a template by name.
    pub fn get(&self, name: &str) -> CatalogResult<&Template> {
        self.entry(name).map(CatalogEntry::template)
    }

    pub fn entry(&self, name: &str) -> CatalogResult<&CatalogEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| CatalogError::UnknownTemplate {
                name: name.to_owned(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, sorted by name.
    pub fn entries(&self) -> Vec<&CatalogEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Entries for one architecture, sorted by name.
    pub fn entries_for(&self, arch: Arch) -> Vec<&CatalogEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.arch == Some(arch))
            .collect()
    }

    /// All template names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries().into_iter().map(CatalogEntry::name).collect()
    }
}

/// Assembles a [`Catalog`]. Template names must be unique across everything added.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: FastMap<String, CatalogEntry, RandomState>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        CatalogBuilder::default()
    }

    pub fn add(
        mut self,
        name: impl Into<String>,
        arch: Option<Arch>,
        template: Template,
    ) -> CatalogResult<Self> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(CatalogError::DuplicateTemplate { name });
        }
        self.entries.insert(
            name.clone(),
            CatalogEntry {
                name,
                arch,
                template,
            },
        );
        Ok(self)
    }

    /// Adds the built-in x86 and x86-64 templates.
    pub fn with_builtins(self) -> CatalogResult<Self> {
        let arches = [(Arch::X86, x86::templates()), (Arch::X64, x64::templates())];

        let mut builder = self;
        for (arch, templates) in arches {
            for (name, template) in templates {
                builder = builder.add_built(name, Some(arch), template)?;
            }
        }
        Ok(builder)
    }

    /// Adds every template in `definition`.
    pub fn with_definition(self, definition: &CatalogDefinition) -> CatalogResult<Self> {
        let mut builder = self;
        for entry in &definition.templates {
            let template =
                entry
                    .to_template()
                    .map_err(|source| CatalogError::InvalidTemplate {
                        name: entry.name.clone(),
                        source,
                    })?;
            builder = builder.add(entry.name.as_str(), entry.arch, template)?;
        }
        Ok(builder)
    }

    /// Adds every template in a JSON catalog definition.
    pub fn with_json(self, text: &str) -> CatalogResult<Self> {
        let definition = CatalogDefinition::from_json(text)?;
        self.with_definition(&definition)
    }

    /// Adds every template in the JSON catalog definition at `path`.
    pub fn with_json_file(self, path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        debug!("loading catalog definition from `{}`", path.display());
        let text = fs::read_to_string(path)?;
        self.with_json(&text)
    }

    pub fn build(self) -> Catalog {
        debug!("catalog built with {} templates", self.entries.len());
        Catalog {
            entries: self.entries,
        }
    }

    fn add_built(
        self,
        name: &str,
        arch: Option<Arch>,
        template: TemplateBuilder,
    ) -> CatalogResult<Self> {
        let template = template
            .build()
            .map_err(|source| CatalogError::InvalidTemplate {
                name: name.to_owned(),
                source,
            })?;
        self.add(name, arch, template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FieldValues;
    use crate::err::TemplateError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_catalog_contents() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.names(),
            vec![
                "X64JumpMonkeypatch",
                "X64SyscallStubExtendedJump",
                "X64SyscallStubMonkeypatch",
                "X64VsyscallMonkeypatch",
                "X86SyscallStubExtendedJump",
                "X86SyscallStubMonkeypatch",
                "X86SysenterVsyscallImplementation",
                "X86SysenterVsyscallSyscallHook",
                "X86SysenterVsyscallUseInt80",
                "X86VsyscallMonkeypatch",
            ]
        );
        assert_eq!(catalog.entries_for(Arch::X86).len(), 6);
        assert_eq!(catalog.entries_for(Arch::X64).len(), 4);
    }

    #[test]
    fn test_builtin_is_shared() {
        assert!(std::ptr::eq(Catalog::builtin(), Catalog::builtin()));
    }

    #[test]
    fn test_builtin_images() {
        let catalog = Catalog::builtin();
        let image = |name: &str| catalog.get(name).unwrap().image();

        assert_eq!(
            image(x86::SYSENTER_VSYSCALL_IMPLEMENTATION),
            vec![0x51, 0x52, 0x55, 0x89, 0xe5, 0x0f, 0x34]
        );
        assert_eq!(image(x86::SYSENTER_VSYSCALL_USE_INT80), vec![0xcd, 0x80, 0xc3]);
        assert_eq!(
            image(x86::VSYSCALL_MONKEYPATCH),
            vec![
                0x53, 0xb8, 0, 0, 0, 0, 0x8b, 0x5c, 0x24, 0x08, 0x8b, 0x4c, 0x24, 0x0c, 0xcd, 0x80,
                0x90, 0x90, 0x90, 0x5b, 0xc3
            ]
        );
        assert_eq!(
            image(x64::VSYSCALL_MONKEYPATCH),
            vec![0xb8, 0, 0, 0, 0, 0x0f, 0x05, 0x90, 0x90, 0x90, 0xc3]
        );
        assert_eq!(
            image(x64::SYSCALL_STUB_EXTENDED_JUMP),
            vec![0xff, 0x25, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_builtin_field_offsets() {
        let catalog = Catalog::builtin();

        let stub = catalog.get(x86::SYSCALL_STUB_MONKEYPATCH).unwrap();
        assert_eq!(stub.byte_len(), 33);
        assert_eq!(stub.field_offset("fake_return_addr"), Some(9));
        assert_eq!(stub.field_end_offset("trampoline_relative_addr"), Some(30));

        let stub = catalog.get(x64::SYSCALL_STUB_MONKEYPATCH).unwrap();
        assert_eq!(stub.byte_len(), 44);
        assert_eq!(stub.field_offset("return_addr_lo"), Some(10));
        assert_eq!(stub.field_offset("return_addr_hi"), Some(18));
        assert_eq!(stub.field_end_offset("trampoline_relative_addr"), Some(41));

        let hook = catalog.get(x86::SYSENTER_VSYSCALL_SYSCALL_HOOK).unwrap();
        assert_eq!(hook.field_end_offset("syscall_hook_trampoline"), Some(5));
    }

    #[test]
    fn test_unknown_template() {
        let err = Catalog::builtin().get("X64Nope").unwrap_err();
        assert!(matches!(
            err,
            CatalogError::UnknownTemplate { ref name } if name == "X64Nope"
        ));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let nop = Template::builder().byte(0x90).build().unwrap();
        let err = CatalogBuilder::new()
            .with_builtins()
            .unwrap()
            .add(x64::JUMP_MONKEYPATCH, Some(Arch::X64), nop)
            .unwrap_err();

        assert!(matches!(err, CatalogError::DuplicateTemplate { .. }));
    }

    #[test]
    fn test_with_json_merges_into_builtins() {
        let catalog = CatalogBuilder::new()
            .with_builtins()
            .unwrap()
            .with_json(
                r#"{ "templates": [ { "name": "X86Int3", "arch": "x86", "segments": [ { "bytes": "cc" } ] } ] }"#,
            )
            .unwrap()
            .build();

        assert_eq!(catalog.len(), 11);
        assert_eq!(catalog.entry("X86Int3").unwrap().arch(), Some(Arch::X86));
        assert!(catalog.get("X86Int3").unwrap().matches(&[0xcc]));
    }

    #[test]
    fn test_with_json_reports_template_name() {
        let err = CatalogBuilder::new()
            .with_json(
                r#"{ "templates": [ { "name": "Broken", "segments": [ { "field": "a", "width": 4 }, { "field": "a", "width": 4 } ] } ] }"#,
            )
            .unwrap_err();

        match err {
            CatalogError::InvalidTemplate { name, source } => {
                assert_eq!(name, "Broken");
                assert_eq!(
                    source,
                    TemplateError::DuplicateField {
                        name: "a".to_string()
                    }
                );
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_lookup_then_patch() {
        let jump = Catalog::builtin().get(x64::JUMP_MONKEYPATCH).unwrap();
        let bytes = jump
            .instantiate(&FieldValues::new().with("relative_addr", 0x100))
            .unwrap();
        assert_eq!(bytes, vec![0xe9, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_arch_from_str() {
        assert_eq!("x86_64".parse::<Arch>(), Ok(Arch::X64));
        assert_eq!("X86".parse::<Arch>(), Ok(Arch::X86));
        assert!("arm64".parse::<Arch>().is_err());
    }
}
