//! Bytecode encoder, the inverse of [`crate::instruction::decode`].
//!
//! Variable and function references are emitted with an empty link field and
//! recorded in [`Assembled`], so a container writer can thread the occurrence
//! chains once it knows where the bytecode lands.

use crate::instruction::{data_type, instance_type, opcode, variable_type};

/// Output of [`Assembler::assemble`].
#[derive(Debug, Clone, Default)]
pub struct Assembled {
    pub bytes: Vec<u8>,
    /// (instruction offset, variable table index)
    pub variable_refs: Vec<(usize, usize)>,
    /// (instruction offset, function table index)
    pub function_refs: Vec<(usize, usize)>,
}

#[derive(Debug, Default)]
pub struct Assembler {
    out: Assembled,
}

fn word(op: u8, type1: u8, type2: u8, low: u32) -> u32 {
    ((op as u32) << 24) | ((type2 as u32 & 0xF) << 20) | ((type1 as u32 & 0xF) << 16) | (low & 0xFFFF)
}

impl Assembler {
    pub fn new() -> Self {
        Assembler::default()
    }

    /// Byte offset the next instruction will be written at.
    pub fn here(&self) -> usize {
        self.out.bytes.len()
    }

    fn emit_u32(&mut self, v: u32) -> &mut Self {
        self.out.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn emit_u64(&mut self, v: u64) -> &mut Self {
        self.out.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Any instruction without a payload.
    pub fn op(&mut self, op: u8) -> &mut Self {
        self.emit_u32(word(op, data_type::DOUBLE, data_type::DOUBLE, 0))
    }

    pub fn op_typed(&mut self, op: u8, type1: u8, type2: u8) -> &mut Self {
        self.emit_u32(word(op, type1, type2, 0))
    }

    pub fn push_double(&mut self, v: f64) -> &mut Self {
        self.emit_u32(word(opcode::PUSH, data_type::DOUBLE, 0, 0))
            .emit_u64(v.to_bits())
    }

    pub fn push_float(&mut self, v: f32) -> &mut Self {
        self.emit_u32(word(opcode::PUSH, data_type::FLOAT, 0, 0))
            .emit_u32(v.to_bits())
    }

    pub fn push_int32(&mut self, v: i32) -> &mut Self {
        self.emit_u32(word(opcode::PUSH, data_type::INT32, 0, 0))
            .emit_u32(v as u32)
    }

    pub fn push_int64(&mut self, v: i64) -> &mut Self {
        self.emit_u32(word(opcode::PUSH, data_type::INT64, 0, 0))
            .emit_u64(v as u64)
    }

    pub fn push_bool(&mut self, v: bool) -> &mut Self {
        self.emit_u32(word(opcode::PUSH, data_type::BOOLEAN, 0, 0))
            .emit_u32(v as u32)
    }

    /// Push an entry of the string table.
    pub fn push_string(&mut self, string_index: i32) -> &mut Self {
        self.emit_u32(word(opcode::PUSH, data_type::STRING, 0, 0))
            .emit_u32(string_index as u32)
    }

    pub fn push_int16(&mut self, v: i16) -> &mut Self {
        self.emit_u32(word(opcode::PUSH, data_type::INT16, 0, v as u16 as u32))
    }

    pub fn pushi(&mut self, v: i16) -> &mut Self {
        self.emit_u32(word(opcode::PUSHI, data_type::INT16, 0, v as u16 as u32))
    }

    fn variable(&mut self, op: u8, inst: i32, vtype: u8, var: usize) -> &mut Self {
        let at = self.here();
        self.out.variable_refs.push((at, var));
        self.emit_u32(word(op, data_type::VARIABLE, data_type::VARIABLE, inst as i16 as u16 as u32))
            .emit_u32((vtype as u32) << 24)
    }

    /// `push.v` of a plain variable through instance selector `inst`.
    pub fn push_var(&mut self, inst: i32, var: usize) -> &mut Self {
        self.variable(opcode::PUSH, inst, variable_type::NORMAL, var)
    }

    pub fn push_var_typed(&mut self, inst: i32, vtype: u8, var: usize) -> &mut Self {
        self.variable(opcode::PUSH, inst, vtype, var)
    }

    pub fn pushloc(&mut self, var: usize) -> &mut Self {
        self.variable(opcode::PUSHLOC, instance_type::LOCAL, variable_type::NORMAL, var)
    }

    pub fn pushglb(&mut self, var: usize) -> &mut Self {
        self.variable(opcode::PUSHGLB, instance_type::GLOBAL, variable_type::NORMAL, var)
    }

    pub fn pushbltn(&mut self, inst: i32, var: usize) -> &mut Self {
        self.variable(opcode::PUSHBLTN, inst, variable_type::NORMAL, var)
    }

    pub fn pop_var(&mut self, inst: i32, var: usize) -> &mut Self {
        self.variable(opcode::POP, inst, variable_type::NORMAL, var)
    }

    pub fn pop_var_typed(&mut self, inst: i32, vtype: u8, var: usize) -> &mut Self {
        self.variable(opcode::POP, inst, vtype, var)
    }

    pub fn popz(&mut self) -> &mut Self {
        self.op_typed(opcode::POPZ, data_type::VARIABLE, 0)
    }

    pub fn call(&mut self, func: usize, argc: u16) -> &mut Self {
        let at = self.here();
        self.out.function_refs.push((at, func));
        self.emit_u32(word(opcode::CALL, data_type::INT32, 0, argc as u32))
            .emit_u32(0)
    }

    pub fn cmp(&mut self, kind: u8) -> &mut Self {
        self.emit_u32(word(opcode::CMP, data_type::DOUBLE, data_type::DOUBLE, (kind as u32) << 8))
    }

    /// Duplicate the top `extra + 1` stack items.
    pub fn dup(&mut self, extra: u8) -> &mut Self {
        self.emit_u32(word(opcode::DUP, data_type::VARIABLE, 0, extra as u32))
    }

    fn branch(&mut self, op: u8, words: i32) -> &mut Self {
        self.emit_u32(((op as u32) << 24) | (words as u32 & 0x7F_FFFF))
    }

    pub fn b(&mut self, words: i32) -> &mut Self {
        self.branch(opcode::B, words)
    }

    pub fn bt(&mut self, words: i32) -> &mut Self {
        self.branch(opcode::BT, words)
    }

    pub fn bf(&mut self, words: i32) -> &mut Self {
        self.branch(opcode::BF, words)
    }

    pub fn pushenv(&mut self, words: i32) -> &mut Self {
        self.branch(opcode::PUSHENV, words)
    }

    pub fn popenv(&mut self, words: i32) -> &mut Self {
        self.branch(opcode::POPENV, words)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.op_typed(opcode::RET, data_type::VARIABLE, 0)
    }

    pub fn exit(&mut self) -> &mut Self {
        self.op_typed(opcode::EXIT, data_type::INT32, 0)
    }

    /// Rewrite the delta of the branch at `at` so it lands on byte offset `target`.
    pub fn patch_branch(&mut self, at: usize, target: usize) -> &mut Self {
        let words = (target as i64 - at as i64) / 4;
        if let Some(slot) = self.out.bytes.get_mut(at..at + 4) {
            let old = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
            let new = (old & 0xFF80_0000) | (words as u32 & 0x7F_FFFF);
            slot.copy_from_slice(&new.to_le_bytes());
        }
        self
    }

    pub fn assemble(&mut self) -> Assembled {
        std::mem::take(&mut self.out)
    }

    /// Raw bytes only.
    pub fn finish(&mut self) -> Vec<u8> {
        self.assemble().bytes
    }
}

/// Write the 27-bit occurrence link after the reference at `at`.
pub fn set_link(bytes: &mut [u8], at: usize, delta: u32) {
    if let Some(slot) = bytes.get_mut(at + 4..at + 8) {
        let old = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
        let new = (old & !0x07FF_FFFF) | (delta & 0x07FF_FFFF);
        slot.copy_from_slice(&new.to_le_bytes());
    }
}
