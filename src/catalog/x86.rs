//! 32-bit x86 stubs: the `__kernel_vsyscall` sysenter sequence and the code used to redirect it,
//! plus the syscall patching stubs. These must stay byte-identical to the stubs in the preload
//! library's `syscall_hook.S`.

use crate::template::{Template, TemplateBuilder};

pub const SYSENTER_VSYSCALL_IMPLEMENTATION: &str = "X86SysenterVsyscallImplementation";
pub const SYSENTER_VSYSCALL_USE_INT80: &str = "X86SysenterVsyscallUseInt80";
pub const SYSENTER_VSYSCALL_SYSCALL_HOOK: &str = "X86SysenterVsyscallSyscallHook";
pub const VSYSCALL_MONKEYPATCH: &str = "X86VsyscallMonkeypatch";
pub const SYSCALL_STUB_EXTENDED_JUMP: &str = "X86SyscallStubExtendedJump";
pub const SYSCALL_STUB_MONKEYPATCH: &str = "X86SyscallStubMonkeypatch";

pub(super) fn templates() -> Vec<(&'static str, TemplateBuilder)> {
    vec![
        (
            SYSENTER_VSYSCALL_IMPLEMENTATION,
            Template::builder()
                .byte(0x51) // push %ecx
                .byte(0x52) // push %edx
                .byte(0x55) // push %ebp
                .bytes(&[0x89, 0xe5]) // mov %esp,%ebp
                .bytes(&[0x0f, 0x34]), // sysenter
        ),
        (
            SYSENTER_VSYSCALL_USE_INT80,
            Template::builder()
                .bytes(&[0xcd, 0x80]) // int $0x80
                .byte(0xc3), // ret
        ),
        (
            SYSENTER_VSYSCALL_SYSCALL_HOOK,
            Template::builder()
                .byte(0xe9) // jmp $syscall_hook_trampoline
                .field("syscall_hook_trampoline", 4),
        ),
        (
            VSYSCALL_MONKEYPATCH,
            Template::builder()
                .byte(0x53) // push %ebx
                .byte(0xb8) // mov $syscall_number,%eax
                .field("syscall_number", 4)
                // __vdso functions use the C calling convention; none take more than two
                // parameters on x86-32.
                .bytes(&[0x8b, 0x5c, 0x24, 0x08]) // mov 0x8(%esp),%ebx
                .bytes(&[0x8b, 0x4c, 0x24, 0x0c]) // mov 0xc(%esp),%ecx
                .bytes(&[0xcd, 0x80]) // int $0x80
                // NOP padding, later patched into a call to the preload library once syscall
                // buffering is initialized.
                .byte(0x90) // nop
                .byte(0x90) // nop
                .byte(0x90) // nop
                .byte(0x5b) // pop %ebx
                .byte(0xc3), // ret
        ),
        (
            SYSCALL_STUB_EXTENDED_JUMP,
            Template::builder()
                .byte(0xe9) // jmp
                .field("relative_jump_target", 4),
        ),
        (
            SYSCALL_STUB_MONKEYPATCH,
            // The stack pointer is adjusted without touching flags, at least on the return path.
            Template::builder()
                .bytes(&[0x81, 0xec, 0x00, 0x01, 0x00, 0x00]) // sub $256,%esp
                .bytes(&[0xc7, 0x04, 0x24]) // movl $fake_return_addr,(%esp)
                .field("fake_return_addr", 4)
                .bytes(&[0x89, 0x64, 0x24, 0x04]) // mov %esp,4(%esp)
                .bytes(&[0x81, 0x44, 0x24, 0x04, 0x00, 0x01, 0x00, 0x00]) // addl $256,4(%esp)
                .byte(0xe8) // call $trampoline_relative_addr
                .field("trampoline_relative_addr", 4)
                .bytes(&[0xc2, 0xfc, 0x00]), // ret $252
        ),
    ]
}
