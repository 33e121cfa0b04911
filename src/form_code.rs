//! Code chunks: bytecode entries, scripts and the variable/function reference tables.

use crate::error::FormResult;
use crate::form::{Chunk, FormReader};
use crate::game_data::{CodeEntry, Function, Script, Variable};
use log::debug;

const VARI_HEADER: usize = 12;
const VARI_RECORD: usize = 20;
const FUNC_RECORD: usize = 12;

impl FormReader {
    pub(crate) fn parse_code(&mut self, chunk: Chunk) -> FormResult<Vec<CodeEntry>> {
        let pointers = self.pointer_list(chunk.data_offset)?;
        let mut entries = Vec::with_capacity(pointers.len());
        for (i, ptr) in pointers.into_iter().enumerate() {
            self.code_by_offset.insert(ptr, i as i32);

            let length = self.u32_at(ptr + 4)? as usize;
            // The bytecode address is relative to the field holding it.
            let relative = self.i32_at(ptr + 12)? as i64;
            let address = (ptr as i64 + 12 + relative).max(0) as usize;

            entries.push(CodeEntry {
                name: self.string_ref_at(ptr)?,
                locals_count: self.u16_at(ptr + 8)?,
                arguments_count: self.u16_at(ptr + 10)? & 0x7FFF,
                bytecode_offset: address,
                bytecode: self.bytes_at(address, length)?.to_vec(),
            });
        }
        debug!("CODE: {} entries", entries.len());
        Ok(entries)
    }

    pub(crate) fn parse_scpt(&self, chunk: Chunk) -> FormResult<Vec<Script>> {
        self.pointer_list(chunk.data_offset)?
            .into_iter()
            .map(|ptr| {
                Ok(Script {
                    name: self.string_ref_at(ptr)?,
                    code_id: self.i32_at(ptr + 4)?,
                })
            })
            .collect()
    }

    /// Flat table: a 12-byte header, then 20-byte records to the end of the chunk.
    pub(crate) fn parse_vari(&self, chunk: Chunk) -> FormResult<Vec<Variable>> {
        let end = chunk.end();
        let mut offset = chunk.data_offset + VARI_HEADER;
        let mut variables = Vec::new();
        while offset + VARI_RECORD <= end {
            variables.push(Variable {
                name: self.string_ref_at(offset)?,
                instance_type: self.i32_at(offset + 4)?,
                var_id: self.i32_at(offset + 8)?,
                occurrences: self.i32_at(offset + 12)?,
                first_occurrence: self.i32_at(offset + 16)?,
            });
            offset += VARI_RECORD;
        }
        debug!("VARI: {} variables", variables.len());
        Ok(variables)
    }

    /// Flat table: a count, then 12-byte records.
    pub(crate) fn parse_func(&self, chunk: Chunk) -> FormResult<Vec<Function>> {
        let count = self.u32_at(chunk.data_offset)? as usize;
        self.bytes_at(chunk.data_offset + 4, count.saturating_mul(FUNC_RECORD))?;
        let functions = (0..count)
            .map(|i| {
                let offset = chunk.data_offset + 4 + i * FUNC_RECORD;
                Ok(Function {
                    name: self.string_ref_at(offset)?,
                    occurrences: self.i32_at(offset + 4)?,
                    first_occurrence: self.i32_at(offset + 8)?,
                })
            })
            .collect::<FormResult<Vec<_>>>()?;
        debug!("FUNC: {} functions", functions.len());
        Ok(functions)
    }
}
