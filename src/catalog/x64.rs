//! x86-64 stubs: vDSO redirection and the syscall patching stubs. These must stay byte-identical
//! to the stubs in the preload library's `syscall_hook.S`.

use crate::template::{Template, TemplateBuilder};

pub const JUMP_MONKEYPATCH: &str = "X64JumpMonkeypatch";
pub const VSYSCALL_MONKEYPATCH: &str = "X64VsyscallMonkeypatch";
pub const SYSCALL_STUB_EXTENDED_JUMP: &str = "X64SyscallStubExtendedJump";
pub const SYSCALL_STUB_MONKEYPATCH: &str = "X64SyscallStubMonkeypatch";

pub(super) fn templates() -> Vec<(&'static str, TemplateBuilder)> {
    vec![
        (
            JUMP_MONKEYPATCH,
            Template::builder()
                .byte(0xe9) // jmp $relative_addr
                .field("relative_addr", 4),
        ),
        (
            VSYSCALL_MONKEYPATCH,
            Template::builder()
                .byte(0xb8) // mov $syscall_number,%eax
                .field("syscall_number", 4)
                .bytes(&[0x0f, 0x05]) // syscall
                // NOP padding, later patched into a call to the preload library once syscall
                // buffering is initialized.
                .byte(0x90) // nop
                .byte(0x90) // nop
                .byte(0x90) // nop
                .byte(0xc3), // ret
        ),
        (
            SYSCALL_STUB_EXTENDED_JUMP,
            Template::builder()
                .bytes(&[0xff, 0x25, 0x00, 0x00, 0x00, 0x00]) // jmp *0(%rip)
                .field("jump_target", 8),
        ),
        (
            SYSCALL_STUB_MONKEYPATCH,
            Template::builder()
                .bytes(&[0x48, 0x81, 0xec, 0x00, 0x01, 0x00, 0x00]) // sub $256,%rsp
                .bytes(&[0xc7, 0x04, 0x24]) // movl $return_addr_lo,(%rsp)
                .field("return_addr_lo", 4)
                .bytes(&[0xc7, 0x44, 0x24, 0x04]) // movl $return_addr_hi,4(%rsp)
                .field("return_addr_hi", 4)
                .bytes(&[0x48, 0x89, 0x64, 0x24, 0x08]) // mov %rsp,8(%rsp)
                .bytes(&[0x48, 0x81, 0x44, 0x24, 0x08, 0x00, 0x01, 0x00, 0x00]) // addq $256,8(%rsp)
                .byte(0xe8) // call $trampoline_relative_addr
                .field("trampoline_relative_addr", 4)
                .bytes(&[0xc2, 0xf8, 0x00]), // ret $248
        ),
    ]
}
