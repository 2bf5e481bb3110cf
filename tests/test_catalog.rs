
use fixtures::*;

use asm_templates::{
    Arch, Catalog, CatalogBuilder, CatalogError, FieldValues, MatchError, SubstituteError,
    Template, lookup,
};
use pretty_assertions::assert_eq;

#[test]
fn test_every_builtin_round_trips() {
    ensure_env_logger_initialized();

    for entry in Catalog::builtin().entries() {
        let template = entry.template();
        let values = distinct_values(template);

        let bytes = template.instantiate(&values).unwrap();
        assert_eq!(bytes.len(), template.byte_len(), "{}", entry.name());

        let extracted = template.match_bytes(&bytes).unwrap();
        assert_eq!(extracted, values, "{}", entry.name());
    }
}

#[test]
fn test_every_builtin_image_matches_itself() {
    for entry in Catalog::builtin().entries() {
        let template = entry.template();
        let image = template.image();

        let extracted = template.match_bytes(&image).unwrap();
        assert_eq!(extracted.len(), template.field_count());
        assert!(extracted.iter().all(|(_, value)| value == 0));
    }
}

#[test]
fn test_builtin_normalization_is_idempotent() {
    for entry in Catalog::builtin().entries() {
        let template = entry.template();
        let rebuilt = Template::new(template.segments().iter().cloned()).unwrap();
        assert_eq!(&rebuilt, template, "{}", entry.name());
    }
}

#[test]
fn test_buffer_one_byte_short_is_rejected() {
    for entry in Catalog::builtin().entries() {
        let template = entry.template();
        let values = distinct_values(template);
        let bytes = template.instantiate(&values).unwrap();
        let len = template.byte_len();

        assert_eq!(
            template.match_bytes(&bytes[..len - 1]),
            Err(MatchError::BufferTooShort {
                need: len,
                have: len - 1
            })
        );

        let mut short = vec![0; len - 1];
        assert_eq!(
            template.substitute(&mut short, &values),
            Err(SubstituteError::BufferTooShort {
                need: len,
                have: len - 1
            })
        );
        assert!(short.iter().all(|b| *b == 0));
    }
}

#[test]
fn test_substitute_only_touches_field_bytes() {
    let template = lookup("X64SyscallStubMonkeypatch").unwrap();
    let image = template.image();

    let mut buffer = image.clone();
    template
        .substitute(
            &mut buffer,
            &FieldValues::new()
                .with("return_addr_lo", 0xdead_beef)
                .with("return_addr_hi", 0)
                .with("trampoline_relative_addr", 0),
        )
        .unwrap();

    let lo = template.field_offset("return_addr_lo").unwrap();
    for (offset, (before, after)) in image.iter().zip(&buffer).enumerate() {
        if (lo..lo + 4).contains(&offset) {
            continue;
        }
        assert_eq!(before, after, "byte {} changed", offset);
    }
    assert_eq!(&buffer[lo..lo + 4], &[0xef, 0xbe, 0xad, 0xde]);
}

#[test]
fn test_jump_monkeypatch_scenario() {
    let jump = lookup("X64JumpMonkeypatch").unwrap();
    assert_eq!(jump.byte_len(), 5);

    let mut code = [0u8; 5];
    jump.substitute(&mut code, &FieldValues::new().with("relative_addr", 0x100))
        .unwrap();
    assert_eq!(code, [0xe9, 0x00, 0x01, 0x00, 0x00]);

    assert_eq!(
        jump.match_bytes(&code).unwrap(),
        FieldValues::new().with("relative_addr", 0x100)
    );
    assert_eq!(jump.field_end_offset("relative_addr"), Some(5));

    code[0] = 0xe8;
    assert_eq!(
        jump.match_bytes(&code),
        Err(MatchError::LiteralMismatch { offset: 0 })
    );
}

#[test]
fn test_syscall_stub_trampoline_end_offset() {
    let x86 = lookup("X86SyscallStubMonkeypatch").unwrap();
    assert_eq!(x86.field_end_offset("trampoline_relative_addr"), Some(30));

    let x64 = lookup("X64SyscallStubMonkeypatch").unwrap();
    assert_eq!(x64.field_end_offset("trampoline_relative_addr"), Some(41));
    assert_eq!(x64.field_end_offset("no_such_field"), None);
}

#[test]
fn test_value_too_wide_for_field() {
    let vsyscall = lookup("X86VsyscallMonkeypatch").unwrap();
    let mut buffer = vec![0; vsyscall.byte_len()];

    assert_eq!(
        vsyscall.substitute(
            &mut buffer,
            &FieldValues::new().with("syscall_number", 0x1_0000_0000)
        ),
        Err(SubstituteError::ValueOutOfRange {
            name: "syscall_number".to_string(),
            value: 0x1_0000_0000,
            width: 4
        })
    );
}

#[test]
fn test_unknown_template() {
    ensure_env_logger_initialized();

    assert!(matches!(
        lookup("X64NoSuchStub"),
        Err(CatalogError::UnknownTemplate { ref name }) if name == "X64NoSuchStub"
    ));
}

#[test]
fn test_loads_extra_templates_from_json_file() {
    ensure_env_logger_initialized();

    let catalog = CatalogBuilder::new()
        .with_builtins()
        .unwrap()
        .with_json_file(extra_catalog())
        .unwrap()
        .build();

    assert_eq!(catalog.len(), Catalog::builtin().len() + 2);
    assert_eq!(catalog.entries_for(Arch::X86).len(), 7);

    let int80 = catalog.get("X86Int80Syscall").unwrap();
    assert_eq!(int80.byte_len(), 10);
    assert_eq!(int80.field_offset("status"), Some(8));

    let code = int80
        .instantiate(&FieldValues::new().with("syscall_number", 1).with("status", 0x7f))
        .unwrap();
    assert_eq!(code, vec![0xb8, 0x01, 0x00, 0x00, 0x00, 0xcd, 0x80, 0x6a, 0x7f, 0xc3]);
}

#[test]
fn test_json_cannot_shadow_builtins() {
    let result = CatalogBuilder::new()
        .with_builtins()
        .unwrap()
        .with_json_file(clashing_catalog());

    assert!(matches!(
        result,
        Err(CatalogError::DuplicateTemplate { ref name }) if name == "X64JumpMonkeypatch"
    ));
}

#[test]
fn test_missing_json_file() {
    let result = CatalogBuilder::new().with_json_file(fixtures_dir().join("missing.json"));
    assert!(matches!(result, Err(CatalogError::Io { .. })));
}

#[test]
fn test_json_segment_with_literal_and_field_keys_is_rejected() {
    let result = CatalogBuilder::new().with_json(
        r#"{ "templates": [ { "name": "X64Mixed", "segments": [
             { "bytes": "e9", "field": "target", "width": 4 } ] } ] }"#,
    );

    assert!(matches!(result, Err(CatalogError::Json { .. })));
}
