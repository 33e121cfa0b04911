use log::warn;
use std::collections::HashMap;
use std::fmt::{Display, Error, Formatter};

/// Opcode values (top byte of the instruction word)
pub mod opcode {
    pub const CONV: u8 = 0x07;
    pub const MUL: u8 = 0x08;
    pub const DIV: u8 = 0x09;
    pub const REM: u8 = 0x0A;
    pub const MOD: u8 = 0x0B;
    pub const ADD: u8 = 0x0C;
    pub const SUB: u8 = 0x0D;
    pub const AND: u8 = 0x0E;
    pub const OR: u8 = 0x0F;
    pub const XOR: u8 = 0x10;
    pub const NEG: u8 = 0x11;
    pub const NOT: u8 = 0x12;
    pub const SHL: u8 = 0x13;
    pub const SHR: u8 = 0x14;
    pub const CMP: u8 = 0x15;
    pub const POP: u8 = 0x45;
    pub const PUSHI: u8 = 0x84;
    pub const DUP: u8 = 0x86;
    pub const RET: u8 = 0x9C;
    pub const EXIT: u8 = 0x9D;
    pub const POPZ: u8 = 0x9E;
    pub const B: u8 = 0xB6;
    pub const BT: u8 = 0xB7;
    pub const BF: u8 = 0xB8;
    pub const PUSHENV: u8 = 0xBA;
    pub const POPENV: u8 = 0xBB;
    pub const PUSH: u8 = 0xC0;
    pub const PUSHLOC: u8 = 0xC1;
    pub const PUSHGLB: u8 = 0xC2;
    pub const PUSHBLTN: u8 = 0xC3;
    pub const CALL: u8 = 0xD9;
    pub const BREAK: u8 = 0xFF;
}

/// Type tags carried in the two 4-bit fields of the instruction word
pub mod data_type {
    pub const DOUBLE: u8 = 0;
    pub const FLOAT: u8 = 1;
    pub const INT32: u8 = 2;
    pub const INT64: u8 = 3;
    pub const BOOLEAN: u8 = 4;
    pub const VARIABLE: u8 = 5;
    pub const STRING: u8 = 6;
    pub const INT16: u8 = 0x0F;
}

pub mod comparison {
    pub const LT: u8 = 1;
    pub const LTE: u8 = 2;
    pub const EQ: u8 = 3;
    pub const NEQ: u8 = 4;
    pub const GTE: u8 = 5;
    pub const GT: u8 = 6;
}

/// Instance selectors used by variable access and `with` targets
pub mod instance_type {
    pub const SELF: i32 = -1;
    pub const OTHER: i32 = -2;
    pub const ALL: i32 = -3;
    pub const NOONE: i32 = -4;
    pub const GLOBAL: i32 = -5;
    pub const BUILTIN: i32 = -6;
    pub const LOCAL: i32 = -7;
    pub const STACKTOP: i32 = -9;
}

/// Reference kinds in the top bits of a variable reference word
pub mod variable_type {
    pub const ARRAY: u8 = 0x00;
    pub const STACKTOP: u8 = 0x80;
    pub const NORMAL: u8 = 0xA0;
}

lazy_static! {
    static ref OPCODE_NAMES: HashMap<u8, &'static str> = {
        use opcode::*;
        let mut m = HashMap::new();
        m.insert(CONV, "conv");
        m.insert(MUL, "mul");
        m.insert(DIV, "div");
        m.insert(REM, "rem");
        m.insert(MOD, "mod");
        m.insert(ADD, "add");
        m.insert(SUB, "sub");
        m.insert(AND, "and");
        m.insert(OR, "or");
        m.insert(XOR, "xor");
        m.insert(NEG, "neg");
        m.insert(NOT, "not");
        m.insert(SHL, "shl");
        m.insert(SHR, "shr");
        m.insert(CMP, "cmp");
        m.insert(POP, "pop");
        m.insert(PUSHI, "pushi");
        m.insert(DUP, "dup");
        m.insert(RET, "ret");
        m.insert(EXIT, "exit");
        m.insert(POPZ, "popz");
        m.insert(B, "b");
        m.insert(BT, "bt");
        m.insert(BF, "bf");
        m.insert(PUSHENV, "pushenv");
        m.insert(POPENV, "popenv");
        m.insert(PUSH, "push");
        m.insert(PUSHLOC, "pushloc");
        m.insert(PUSHGLB, "pushglb");
        m.insert(PUSHBLTN, "pushbltn");
        m.insert(CALL, "call");
        m.insert(BREAK, "break");
        m
    };
}

pub fn opcode_name(op: u8) -> &'static str {
    OPCODE_NAMES.get(&op).copied().unwrap_or("unknown")
}

/// Inline payload of a literal push
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    None,
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    Bool(bool),
    /// Index into the string table
    Str(i32),
    Int16(i16),
    /// Payload of an unrecognised type tag, kept for disassembly
    Raw(u32),
}

/// One decoded bytecode instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Byte offset of the instruction word within its code entry
    pub offset: usize,
    pub opcode: u8,
    pub type1: u8,
    pub type2: u8,
    /// Bytes 0-1 as i16: instance type, argument count or dup size by opcode
    pub extra: i16,
    /// Low 24 bits of the word
    pub operand: u32,
    pub literal: Literal,
    /// Reference kind of a variable access (see [`variable_type`])
    pub variable_type: u8,
    /// Variable table index, -1 until reference resolution stamps it
    pub variable_index: i32,
    /// Function table index, -1 until reference resolution stamps it
    pub function_index: i32,
}

impl Instruction {
    pub fn instance_type(&self) -> i32 {
        self.extra as i32
    }

    pub fn arg_count(&self) -> usize {
        self.extra as u16 as usize
    }

    pub fn comparison(&self) -> u8 {
        ((self.operand >> 8) & 0xFF) as u8
    }

    /// Signed 23-bit branch delta in 4-byte words.
    pub fn branch_offset(&self) -> i32 {
        let raw = (self.operand & 0x7F_FFFF) as i32;
        if raw & 0x40_0000 != 0 {
            raw | !0x7F_FFFF
        } else {
            raw
        }
    }

    /// Byte offset a branch lands on, or None when it points before the entry.
    pub fn branch_target(&self) -> Option<usize> {
        let target = self.offset as i64 + self.branch_offset() as i64 * 4;
        usize::try_from(target).ok()
    }

    pub fn is_array_access(&self) -> bool {
        self.variable_type == variable_type::ARRAY
    }

    pub fn is_stacktop_access(&self) -> bool {
        self.variable_type == variable_type::STACKTOP
    }

    pub fn name(&self) -> &'static str {
        opcode_name(self.opcode)
    }

    /// Size in bytes including any payload.
    pub fn size(&self) -> usize {
        4 + payload_size(self.opcode, self.type1)
    }
}

/// Bytes following the instruction word.
fn payload_size(op: u8, type1: u8) -> usize {
    match op {
        opcode::PUSH => match type1 {
            data_type::DOUBLE | data_type::INT64 => 8,
            data_type::INT16 => 0,
            _ => 4,
        },
        opcode::PUSHLOC | opcode::PUSHGLB | opcode::PUSHBLTN | opcode::POP | opcode::CALL => 4,
        _ => 0,
    }
}

/// Decoded form of one code entry.
#[derive(Debug, Clone, Default)]
pub struct DecodedCode {
    pub instructions: Vec<Instruction>,
    /// Byte offset within the entry -> instruction index, one per instruction start
    pub offset_to_index: HashMap<usize, usize>,
}

impl DecodedCode {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn index_of(&self, offset: usize) -> Option<usize> {
        self.offset_to_index.get(&offset).copied()
    }
}

fn read_u32(bytes: &[u8], pos: usize) -> Option<u32> {
    bytes
        .get(pos..pos + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u64(bytes: &[u8], pos: usize) -> Option<u64> {
    let lo = read_u32(bytes, pos)? as u64;
    let hi = read_u32(bytes, pos + 4)? as u64;
    Some(lo | (hi << 32))
}

/// Decode a code entry's raw bytecode.
///
/// A trailing instruction whose payload runs past the end of the buffer is
/// dropped with a warning.
pub fn decode(bytes: &[u8]) -> DecodedCode {
    let mut code = DecodedCode::default();
    let mut pos = 0;

    while pos < bytes.len() {
        let word = match read_u32(bytes, pos) {
            Some(w) => w,
            None => {
                warn!("truncated instruction word at {:#x}", pos);
                break;
            }
        };
        let op = (word >> 24) as u8;
        let type1 = ((word >> 16) & 0xF) as u8;
        let mut instr = Instruction {
            offset: pos,
            opcode: op,
            type1,
            type2: ((word >> 20) & 0xF) as u8,
            extra: (word & 0xFFFF) as u16 as i16,
            operand: word & 0xFF_FFFF,
            literal: Literal::None,
            variable_type: 0,
            variable_index: -1,
            function_index: -1,
        };
        let payload_at = pos + 4;

        let payload = match op {
            opcode::PUSH => match type1 {
                data_type::DOUBLE => read_u64(bytes, payload_at).map(|v| Literal::Double(f64::from_bits(v))),
                data_type::INT64 => read_u64(bytes, payload_at).map(|v| Literal::Int64(v as i64)),
                data_type::FLOAT => read_u32(bytes, payload_at).map(|v| Literal::Float(f32::from_bits(v))),
                data_type::INT32 => read_u32(bytes, payload_at).map(|v| Literal::Int32(v as i32)),
                data_type::BOOLEAN => read_u32(bytes, payload_at).map(|v| Literal::Bool(v != 0)),
                data_type::STRING => read_u32(bytes, payload_at).map(|v| Literal::Str(v as i32)),
                data_type::INT16 => Some(Literal::Int16(instr.extra)),
                data_type::VARIABLE => read_u32(bytes, payload_at).map(|r| {
                    instr.variable_type = ((r >> 24) & 0xF8) as u8;
                    Literal::None
                }),
                _ => read_u32(bytes, payload_at).map(Literal::Raw),
            },
            opcode::PUSHLOC | opcode::PUSHGLB | opcode::PUSHBLTN | opcode::POP => {
                read_u32(bytes, payload_at).map(|r| {
                    instr.variable_type = ((r >> 24) & 0xF8) as u8;
                    Literal::None
                })
            }
            opcode::CALL => read_u32(bytes, payload_at).map(|_| Literal::None),
            opcode::PUSHI => Some(Literal::Int16(instr.extra)),
            _ => Some(Literal::None),
        };

        match payload {
            Some(literal) => instr.literal = literal,
            None => {
                warn!(
                    "{} at {:#x} runs past end of bytecode ({} bytes)",
                    opcode_name(op),
                    pos,
                    bytes.len()
                );
                break;
            }
        }

        pos += instr.size();
        code.offset_to_index.insert(instr.offset, code.instructions.len());
        code.instructions.push(instr);
    }

    code
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{:05x}: {}", self.offset, self.name())?;
        match self.opcode {
            opcode::PUSH | opcode::PUSHI => match self.literal {
                Literal::Double(v) => write!(f, ".d {}", v),
                Literal::Float(v) => write!(f, ".f {}", v),
                Literal::Int32(v) => write!(f, ".i {}", v),
                Literal::Int64(v) => write!(f, ".l {}", v),
                Literal::Bool(v) => write!(f, ".b {}", v),
                Literal::Str(v) => write!(f, ".s string[{}]", v),
                Literal::Int16(v) => write!(f, ".e {}", v),
                Literal::Raw(v) => write!(f, ".? {:#x}", v),
                Literal::None => write!(
                    f,
                    ".v {} var[{}] type={:#x}",
                    self.extra, self.variable_index, self.variable_type
                ),
            },
            opcode::PUSHLOC | opcode::PUSHGLB | opcode::PUSHBLTN | opcode::POP => write!(
                f,
                " {} var[{}] type={:#x}",
                self.extra, self.variable_index, self.variable_type
            ),
            opcode::CALL => write!(f, " func[{}] argc={}", self.function_index, self.arg_count()),
            opcode::CMP => write!(f, " cmp={}", self.comparison()),
            opcode::B | opcode::BT | opcode::BF | opcode::PUSHENV | opcode::POPENV => {
                write!(f, " {:+}", self.branch_offset())
            }
            opcode::DUP => write!(f, " {}", self.extra & 0xFF),
            _ => Ok(()),
        }
    }
}
