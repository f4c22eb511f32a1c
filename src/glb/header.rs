// src/glb/header.rs
// ============================================================================
// GLB HEADER - Cabecera de 12 bytes + cabeceras de chunk de 8 bytes
// ============================================================================
//
// offset 0   u32 LE  magic "glTF"
// offset 4   u32 LE  versión (2)
// offset 8   u32 LE  longitud total
// offset 12  u32 LE  longitud chunk 0 │ u32 LE tipo "JSON" │ payload
//            u32 LE  longitud chunk 1 │ u32 LE tipo "BIN\0" │ payload
//
// ============================================================================

use std::io::{Cursor, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, TranscodeError};

/// "glTF" leído como u32 little-endian
pub const MAGIC: u32 = 0x4654_6C67;
pub const VERSION: u32 = 2;

pub const HEADER_SIZE: usize = 12;
pub const CHUNK_HEADER_SIZE: usize = 8;

/// "JSON"
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
/// "BIN\0"
pub const CHUNK_BIN: u32 = 0x004E_4942;

/// Relleno del chunk JSON (espacio ASCII)
pub const JSON_PAD: u8 = 0x20;
/// Relleno del chunk BIN
pub const BIN_PAD: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlbHeader {
    pub magic: u32,
    pub version: u32,
    pub length: u32,
}

impl GlbHeader {
    pub fn new(length: u32) -> Self {
        Self { magic: MAGIC, version: VERSION, length }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.magic);
        LittleEndian::write_u32(&mut buf[4..8], self.version);
        LittleEndian::write_u32(&mut buf[8..12], self.length);
        buf
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_u32::<LittleEndian>(self.magic)?;
        out.write_u32::<LittleEndian>(self.version)?;
        out.write_u32::<LittleEndian>(self.length)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(TranscodeError::container(format!(
                "container too short for header: {} bytes",
                data.len()
            )));
        }
        let mut cursor = Cursor::new(data);
        Ok(Self {
            magic: cursor.read_u32::<LittleEndian>()?,
            version: cursor.read_u32::<LittleEndian>()?,
            length: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Valida magic y versión
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.magic != MAGIC {
            return Err(format!("Invalid magic: 0x{:08x}", self.magic));
        }
        if self.version != VERSION {
            return Err(format!("Unsupported version: {}", self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub length: u32,
    pub chunk_type: u32,
}

impl ChunkHeader {
    pub fn json(length: u32) -> Self {
        Self { length, chunk_type: CHUNK_JSON }
    }

    pub fn bin(length: u32) -> Self {
        Self { length, chunk_type: CHUNK_BIN }
    }

    pub fn to_bytes(&self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut buf = [0u8; CHUNK_HEADER_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.length);
        LittleEndian::write_u32(&mut buf[4..8], self.chunk_type);
        buf
    }

    pub fn from_bytes(data: &[u8], offset: usize) -> Result<Self> {
        let end = offset.checked_add(CHUNK_HEADER_SIZE);
        match end {
            Some(end) if end <= data.len() => Ok(Self {
                length: LittleEndian::read_u32(&data[offset..offset + 4]),
                chunk_type: LittleEndian::read_u32(&data[offset + 4..end]),
            }),
            _ => Err(TranscodeError::container(format!(
                "truncated chunk header at offset {}",
                offset
            ))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.chunk_type {
            CHUNK_JSON => "JSON",
            CHUNK_BIN => "BIN",
            _ => "unknown",
        }
    }
}

/// Bytes de relleno hasta el siguiente múltiplo de 4
pub fn padding_for(len: usize) -> usize {
    (4 - len % 4) % 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_spells_gltf() {
        let header = GlbHeader::new(100);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &[100, 0, 0, 0]);
    }

    #[test]
    fn test_chunk_tags() {
        assert_eq!(&ChunkHeader::json(0).to_bytes()[4..8], b"JSON");
        assert_eq!(&ChunkHeader::bin(0).to_bytes()[4..8], b"BIN\0");
    }

    #[test]
    fn test_write_to_matches_to_bytes() {
        let header = GlbHeader::new(4096);
        let mut out = Vec::new();
        header.write_to(&mut out).unwrap();
        assert_eq!(out, header.to_bytes());
        assert_eq!(GlbHeader::from_bytes(&out).unwrap(), header);
    }

    #[test]
    fn test_validate_rejects_bad_magic() {
        let header = GlbHeader { magic: 0xdead_beef, version: 2, length: 12 };
        assert!(header.validate().is_err());
        let header = GlbHeader { version: 1, ..GlbHeader::new(12) };
        assert!(header.validate().is_err());
    }

    #[test]
    fn test_truncated_chunk_header() {
        assert!(ChunkHeader::from_bytes(&[0u8; 10], 4).is_err());
        assert!(GlbHeader::from_bytes(&[0u8; 11]).is_err());
    }

    #[test]
    fn test_padding_for() {
        assert_eq!(padding_for(0), 0);
        assert_eq!(padding_for(1), 3);
        assert_eq!(padding_for(4), 0);
        assert_eq!(padding_for(7), 1);
    }
}
