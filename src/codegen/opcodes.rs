//! Java bytecode instruction opcodes.
//!
//! Only the subset emitted by the try-construct backend, defined according
//! to the Java Virtual Machine Specification and ordered by opcode value.

pub const NOP: u8 = 0x00;
pub const ACONST_NULL: u8 = 0x01;
pub const ICONST_M1: u8 = 0x02;
pub const ICONST_0: u8 = 0x03;
pub const ICONST_5: u8 = 0x08;
pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const LDC: u8 = 0x12;

// loads
pub const ILOAD: u8 = 0x15;
pub const ALOAD: u8 = 0x19;
pub const ILOAD_0: u8 = 0x1a;
pub const ILOAD_3: u8 = 0x1d;
pub const ALOAD_0: u8 = 0x2a;
pub const ALOAD_1: u8 = 0x2b;
pub const ALOAD_2: u8 = 0x2c;
pub const ALOAD_3: u8 = 0x2d;

// stores
pub const ISTORE: u8 = 0x36;
pub const ASTORE: u8 = 0x3a;
pub const ISTORE_0: u8 = 0x3b;
pub const ISTORE_3: u8 = 0x3e;
pub const ASTORE_0: u8 = 0x4b;
pub const ASTORE_1: u8 = 0x4c;
pub const ASTORE_2: u8 = 0x4d;
pub const ASTORE_3: u8 = 0x4e;

// stack
pub const POP: u8 = 0x57;
pub const DUP: u8 = 0x59;

// control
pub const IF_ACMPEQ: u8 = 0xa5;
pub const IF_ACMPNE: u8 = 0xa6;
pub const GOTO: u8 = 0xa7;
pub const IRETURN: u8 = 0xac;
pub const ARETURN: u8 = 0xb0;
pub const RETURN: u8 = 0xb1;

// field and method access
pub const GETFIELD: u8 = 0xb4;
pub const INVOKEVIRTUAL: u8 = 0xb6;
pub const INVOKESPECIAL: u8 = 0xb7;
pub const INVOKEINTERFACE: u8 = 0xb9;
pub const NEW: u8 = 0xbb;
pub const ATHROW: u8 = 0xbf;
pub const CHECKCAST: u8 = 0xc0;
pub const WIDE: u8 = 0xc4;
pub const IFNULL: u8 = 0xc6;
pub const IFNONNULL: u8 = 0xc7;

/// Mnemonic used by the disassembly helper; unknown bytes print in hex.
pub fn mnemonic(opcode: u8) -> Option<&'static str> {
    Some(match opcode {
        NOP => "nop",
        ACONST_NULL => "aconst_null",
        ICONST_M1 => "iconst_m1",
        BIPUSH => "bipush",
        SIPUSH => "sipush",
        LDC => "ldc",
        ILOAD => "iload",
        ALOAD => "aload",
        ALOAD_0 => "aload_0",
        ALOAD_1 => "aload_1",
        ALOAD_2 => "aload_2",
        ALOAD_3 => "aload_3",
        ISTORE => "istore",
        ASTORE => "astore",
        ASTORE_0 => "astore_0",
        ASTORE_1 => "astore_1",
        ASTORE_2 => "astore_2",
        ASTORE_3 => "astore_3",
        POP => "pop",
        DUP => "dup",
        IF_ACMPEQ => "if_acmpeq",
        IF_ACMPNE => "if_acmpne",
        GOTO => "goto",
        IRETURN => "ireturn",
        ARETURN => "areturn",
        RETURN => "return",
        GETFIELD => "getfield",
        INVOKEVIRTUAL => "invokevirtual",
        INVOKESPECIAL => "invokespecial",
        INVOKEINTERFACE => "invokeinterface",
        NEW => "new",
        ATHROW => "athrow",
        CHECKCAST => "checkcast",
        WIDE => "wide",
        IFNULL => "ifnull",
        IFNONNULL => "ifnonnull",
        op if op >= ICONST_0 && op <= ICONST_5 => return Some("iconst"),
        op if op >= ILOAD_0 && op <= ILOAD_3 => return Some("iload_n"),
        op if op >= ISTORE_0 && op <= ISTORE_3 => return Some("istore_n"),
        _ => return None,
    })
}
