//! FORM container reader
//!
//! An archive is a `FORM` envelope (magic + u32 size) holding a sequence of
//! `(tag, u32 size, data)` chunks. All integers are little-endian and every
//! pointer inside a chunk is an absolute file offset.
//!
//! Chunk bodies are parsed in dependency order by the `form_assets`,
//! `form_code` and `form_world` modules, which extend [`FormReader`].

use crate::error::{FormResult, FormatError};
use crate::game_data::GameData;
use log::{debug, info, warn};
use std::collections::HashMap;

const FORM_MAGIC: &[u8; 4] = b"FORM";

/// Chunks the loader cannot do without, in parse order.
pub const REQUIRED_CHUNKS: [&str; 14] = [
    "STRG", "GEN8", "TPAG", "TXTR", "SPRT", "BGND", "PATH", "FONT", "CODE", "OBJT", "ROOM",
    "SCPT", "VARI", "FUNC",
];

/// Location of one chunk's data inside the file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk {
    pub tag: [u8; 4],
    /// Absolute offset of the first data byte (past tag and size).
    pub data_offset: usize,
    pub size: usize,
}

impl Chunk {
    pub fn tag_str(&self) -> &str {
        std::str::from_utf8(&self.tag).unwrap_or("????")
    }

    pub fn end(&self) -> usize {
        self.data_offset + self.size
    }
}

/// Reads a FORM archive into [`GameData`].
pub struct FormReader {
    pub(crate) buf: Vec<u8>,
    pub(crate) chunks: Vec<Chunk>,
    /// Absolute offset -> index maps used to resolve cross-references.
    pub(crate) strings_by_offset: HashMap<usize, usize>,
    pub(crate) tpag_by_offset: HashMap<usize, i32>,
    pub(crate) code_by_offset: HashMap<usize, i32>,
}

impl FormReader {
    pub fn new(buf: Vec<u8>) -> Self {
        FormReader {
            buf,
            chunks: Vec::new(),
            strings_by_offset: HashMap::new(),
            tpag_by_offset: HashMap::new(),
            code_by_offset: HashMap::new(),
        }
    }

    /// Verify the envelope and index every chunk.
    pub fn scan_chunks(&mut self) -> FormResult<()> {
        let magic = self.tag_at(0)?;
        if &magic != FORM_MAGIC {
            return Err(FormatError::InvalidMagic {
                expected: "FORM".to_string(),
                found: String::from_utf8_lossy(&magic).into_owned(),
            });
        }
        let form_size = self.u32_at(4)? as usize;
        let form_end = (8 + form_size).min(self.buf.len());

        let mut offset = 8;
        while offset + 8 <= form_end {
            let tag = self.tag_at(offset)?;
            let size = self.u32_at(offset + 4)? as usize;
            let chunk = Chunk {
                tag,
                data_offset: offset + 8,
                size,
            };
            debug!(
                "chunk {} at {:#x}, {} bytes",
                chunk.tag_str(),
                chunk.data_offset,
                size
            );
            self.chunks.push(chunk);
            offset += 8 + size;
        }

        info!("Found {} chunks", self.chunks.len());
        Ok(())
    }

    pub fn chunk(&self, tag: &'static str) -> FormResult<Chunk> {
        self.chunks
            .iter()
            .find(|c| &c.tag == tag.as_bytes())
            .copied()
            .ok_or(FormatError::MissingChunk(tag))
    }

    /// Parse the whole archive in dependency order.
    pub fn read(mut self) -> FormResult<GameData> {
        self.scan_chunks()?;
        for tag in REQUIRED_CHUNKS {
            self.chunk(tag)?;
        }

        let strings = self.parse_strg(self.chunk("STRG")?)?;
        let gen8 = self.parse_gen8(self.chunk("GEN8")?)?;
        let texture_items = self.parse_tpag(self.chunk("TPAG")?)?;
        let texture_pages = self.parse_txtr(self.chunk("TXTR")?)?;
        let sprites = self.parse_sprt(self.chunk("SPRT")?)?;
        let backgrounds = self.parse_bgnd(self.chunk("BGND")?)?;
        let paths = self.parse_path(self.chunk("PATH")?)?;
        let fonts = self.parse_font(self.chunk("FONT")?)?;
        let code = self.parse_code(self.chunk("CODE")?)?;
        let objects = self.parse_objt(self.chunk("OBJT")?)?;
        let rooms = self.parse_room(self.chunk("ROOM")?)?;
        let scripts = self.parse_scpt(self.chunk("SCPT")?)?;
        let variables = self.parse_vari(self.chunk("VARI")?)?;
        let functions = self.parse_func(self.chunk("FUNC")?)?;

        info!(
            "Loaded '{}': {} sprites, {} objects, {} rooms, {} code entries",
            gen8.game_name,
            sprites.len(),
            objects.len(),
            rooms.len(),
            code.len()
        );
        info!(
            "  {} variables, {} functions, {} scripts, {} fonts, {} paths",
            variables.len(),
            functions.len(),
            scripts.len(),
            fonts.len(),
            paths.len()
        );

        Ok(GameData {
            gen8,
            strings,
            texture_items,
            texture_pages,
            sprites,
            backgrounds,
            paths,
            fonts,
            code,
            objects,
            rooms,
            scripts,
            variables,
            functions,
            buffer: self.buf,
        })
    }

    // ---- primitive reads ----

    pub(crate) fn bytes_at(&self, offset: usize, len: usize) -> FormResult<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.buf.get(offset..end))
            .ok_or(FormatError::UnexpectedEof {
                offset,
                need: len,
                len: self.buf.len(),
            })
    }

    pub(crate) fn tag_at(&self, offset: usize) -> FormResult<[u8; 4]> {
        let b = self.bytes_at(offset, 4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    pub(crate) fn u8_at(&self, offset: usize) -> FormResult<u8> {
        Ok(self.bytes_at(offset, 1)?[0])
    }

    pub(crate) fn u16_at(&self, offset: usize) -> FormResult<u16> {
        let b = self.bytes_at(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32_at(&self, offset: usize) -> FormResult<u32> {
        let b = self.bytes_at(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn i32_at(&self, offset: usize) -> FormResult<i32> {
        Ok(self.u32_at(offset)? as i32)
    }

    pub(crate) fn bool_at(&self, offset: usize) -> FormResult<bool> {
        Ok(self.u32_at(offset)? != 0)
    }

    pub(crate) fn f32_at(&self, offset: usize) -> FormResult<f32> {
        Ok(f32::from_bits(self.u32_at(offset)?))
    }

    /// Pointer stored at `offset`, as a usize.
    pub(crate) fn ptr_at(&self, offset: usize) -> FormResult<usize> {
        Ok(self.u32_at(offset)? as usize)
    }

    /// Count followed by that many absolute pointers.
    pub(crate) fn pointer_list(&self, offset: usize) -> FormResult<Vec<usize>> {
        let count = self.u32_at(offset)? as usize;
        // A count larger than the file can hold is corrupt data, not a huge allocation.
        self.bytes_at(offset + 4, count.saturating_mul(4))?;
        (0..count).map(|i| self.ptr_at(offset + 4 + i * 4)).collect()
    }

    fn utf8(&self, offset: usize, bytes: &[u8]) -> FormResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|_| FormatError::InvalidString { offset })
    }

    /// String table entry: `offset` points at the u32 length.
    pub(crate) fn string_at(&self, offset: usize) -> FormResult<String> {
        let len = self.u32_at(offset)? as usize;
        let bytes = self.bytes_at(offset + 4, len)?;
        self.utf8(offset, bytes)
    }

    /// String reference used by every chunk but STRG: `ptr` points at the
    /// content and the length sits 4 bytes before it. A null pointer is "".
    pub(crate) fn string_ref(&self, ptr: usize) -> FormResult<String> {
        if ptr == 0 {
            return Ok(String::new());
        }
        let len_offset = ptr.checked_sub(4).ok_or(FormatError::UnexpectedEof {
            offset: ptr,
            need: 4,
            len: self.buf.len(),
        })?;
        let len = self.u32_at(len_offset)? as usize;
        let bytes = self.bytes_at(ptr, len)?;
        self.utf8(ptr, bytes)
    }

    pub(crate) fn string_ref_at(&self, offset: usize) -> FormResult<String> {
        self.string_ref(self.ptr_at(offset)?)
    }

    /// Swap a malformed nested structure for its default instead of failing the load.
    pub(crate) fn degrade<T: Default>(&self, what: &str, owner: &str, result: FormResult<T>) -> T {
        match result {
            Ok(v) => v,
            Err(e) => {
                warn!("{} of '{}' unreadable, using empty value: {}", what, owner, e);
                T::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn form(chunks: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (tag, data) in chunks {
            body.extend_from_slice(*tag);
            body.extend_from_slice(&(data.len() as u32).to_le_bytes());
            body.extend_from_slice(data);
        }
        let mut file = b"FORM".to_vec();
        file.extend_from_slice(&(body.len() as u32).to_le_bytes());
        file.extend(body);
        file
    }

    #[test]
    fn test_scan_chunks_indexes_every_chunk() {
        let bytes = form(&[(b"GEN8", vec![0; 8]), (b"STRG", vec![0; 4])]);
        let mut reader = FormReader::new(bytes);
        reader.scan_chunks().unwrap();
        assert_eq!(reader.chunks.len(), 2);
        let strg = reader.chunk("STRG").unwrap();
        assert_eq!(strg.data_offset, 8 + 8 + 8 + 8);
        assert_eq!(strg.size, 4);
        assert!(matches!(
            reader.chunk("ROOM"),
            Err(FormatError::MissingChunk("ROOM"))
        ));
    }

    #[test]
    fn test_bad_magic_is_format_error() {
        let mut bytes = form(&[]);
        bytes[0..4].copy_from_slice(b"MROF");
        let err = FormReader::new(bytes).read().unwrap_err();
        assert!(matches!(err, FormatError::InvalidMagic { .. }));
    }

    #[test]
    fn test_missing_required_chunk_is_fatal() {
        let bytes = form(&[(b"STRG", vec![0; 4])]);
        let err = FormReader::new(bytes).read().unwrap_err();
        assert!(matches!(err, FormatError::MissingChunk("GEN8")));
    }

    #[test]
    fn test_string_conventions() {
        // [0..4] len=2, [4..6] "hi", [6] NUL
        let mut buf = vec![2, 0, 0, 0, b'h', b'i', 0];
        buf.extend_from_slice(&[3, 0, 0, 0, b'a', b'b', b'c', 0]);
        let reader = FormReader::new(buf);
        assert_eq!(reader.string_at(0).unwrap(), "hi");
        assert_eq!(reader.string_ref(11).unwrap(), "abc");
        assert_eq!(reader.string_ref(0).unwrap(), "");
    }

    #[test]
    fn test_truncated_read_reports_offset() {
        let reader = FormReader::new(vec![1, 2, 3]);
        match reader.u32_at(1) {
            Err(FormatError::UnexpectedEof { offset, need, .. }) => {
                assert_eq!(offset, 1);
                assert_eq!(need, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
