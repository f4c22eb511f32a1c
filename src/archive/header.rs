// src/archive/header.rs
// ============================================================================
// ZIP HEADERS - Local file header, central directory y EOCD
// ============================================================================
//
// Layout (little-endian):
//   Local file header   30 bytes + name + extra
//   Central dir header  46 bytes + name + extra + comment
//   End of central dir  22 bytes + comment
//
// ============================================================================

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Result, TranscodeError};

pub const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
pub const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
pub const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;
pub const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;

pub const LOCAL_HEADER_SIZE: usize = 30;
pub const CENTRAL_HEADER_SIZE: usize = 46;
pub const END_OF_CENTRAL_DIR_SIZE: usize = 22;

pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;

pub const FLAG_ENCRYPTED: u16 = 1 << 0;
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// Marcador de zip64 en campos de 32 bits
const ZIP64_MARKER: u32 = 0xFFFF_FFFF;

/// Lee la firma de 4 bytes en `offset`, si hay bytes suficientes
pub fn peek_signature(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn truncated(what: &str, offset: usize) -> TranscodeError {
    TranscodeError::archive(format!("truncated {} at offset {}", what, offset))
}

fn decode_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Local file header
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name: String,
    /// Bytes totales del header (fijo + nombre + extra)
    pub header_len: usize,
}

impl LocalFileHeader {
    /// Parsea el header que empieza en `offset` (la firma incluida)
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let fixed = data
            .get(offset..offset + LOCAL_HEADER_SIZE)
            .ok_or_else(|| truncated("local file header", offset))?;
        let mut cursor = Cursor::new(fixed);

        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != LOCAL_HEADER_SIG {
            return Err(TranscodeError::archive(format!(
                "unrecognized local header signature 0x{:08x} at offset {}",
                signature, offset
            )));
        }

        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let method = cursor.read_u16::<LittleEndian>()?;
        let _mod_time = cursor.read_u16::<LittleEndian>()?;
        let _mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()? as usize;
        let extra_len = cursor.read_u16::<LittleEndian>()? as usize;

        let name_start = offset + LOCAL_HEADER_SIZE;
        let name = data
            .get(name_start..name_start + name_len)
            .ok_or_else(|| truncated("entry name", name_start))?;
        let header_len = LOCAL_HEADER_SIZE + name_len + extra_len;
        if offset + header_len > data.len() {
            return Err(truncated("extra field", name_start + name_len));
        }

        let header = Self {
            version_needed,
            flags,
            method,
            crc32,
            compressed_size,
            uncompressed_size,
            name: decode_name(name),
            header_len,
        };
        header.check_supported()?;
        Ok(header)
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    fn check_supported(&self) -> Result<()> {
        check_common(&self.name, self.flags, self.compressed_size, self.uncompressed_size)
    }
}

/// Entrada del central directory
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub flags: u16,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name: String,
    pub local_header_offset: u32,
    /// Bytes totales del registro (fijo + nombre + extra + comentario)
    pub record_len: usize,
}

impl CentralDirectoryHeader {
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let fixed = data
            .get(offset..offset + CENTRAL_HEADER_SIZE)
            .ok_or_else(|| truncated("central directory header", offset))?;
        let mut cursor = Cursor::new(fixed);

        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != CENTRAL_HEADER_SIG {
            return Err(TranscodeError::archive(format!(
                "unrecognized central directory signature 0x{:08x} at offset {}",
                signature, offset
            )));
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let method = cursor.read_u16::<LittleEndian>()?;
        let _mod_time = cursor.read_u16::<LittleEndian>()?;
        let _mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()? as usize;
        let extra_len = cursor.read_u16::<LittleEndian>()? as usize;
        let comment_len = cursor.read_u16::<LittleEndian>()? as usize;
        let _disk_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let local_header_offset = cursor.read_u32::<LittleEndian>()?;

        let name_start = offset + CENTRAL_HEADER_SIZE;
        let name = data
            .get(name_start..name_start + name_len)
            .ok_or_else(|| truncated("entry name", name_start))?;
        let record_len = CENTRAL_HEADER_SIZE + name_len + extra_len + comment_len;
        if offset + record_len > data.len() {
            return Err(truncated("central directory record", offset));
        }

        let header = Self {
            flags,
            method,
            crc32,
            compressed_size,
            uncompressed_size,
            name: decode_name(name),
            local_header_offset,
            record_len,
        };
        check_common(&header.name, flags, compressed_size, uncompressed_size)?;
        if local_header_offset == ZIP64_MARKER {
            return Err(TranscodeError::archive(format!(
                "entry '{}': zip64 archives are not supported",
                header.name
            )));
        }
        Ok(header)
    }
}

fn check_common(name: &str, flags: u16, compressed: u32, uncompressed: u32) -> Result<()> {
    if flags & FLAG_ENCRYPTED != 0 {
        return Err(TranscodeError::archive(format!(
            "entry '{}' is encrypted",
            name
        )));
    }
    if compressed == ZIP64_MARKER || uncompressed == ZIP64_MARKER {
        return Err(TranscodeError::archive(format!(
            "entry '{}': zip64 archives are not supported",
            name
        )));
    }
    Ok(())
}

/// End of central directory record
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    /// Offset del propio registro dentro del buffer
    pub offset: usize,
    pub total_entries: u16,
    pub directory_size: u32,
    pub directory_offset: u32,
}

impl EndOfCentralDirectory {
    /// Busca el EOCD desde el final (el comentario puede ocupar hasta 64 KiB)
    pub fn locate(data: &[u8]) -> Option<Self> {
        if data.len() < END_OF_CENTRAL_DIR_SIZE {
            return None;
        }
        let last = data.len() - END_OF_CENTRAL_DIR_SIZE;
        let first = last.saturating_sub(u16::MAX as usize);

        (first..=last)
            .rev()
            .find(|&pos| peek_signature(data, pos) == Some(END_OF_CENTRAL_DIR_SIG))
            .and_then(|pos| Self::parse(data, pos).ok())
    }

    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let fixed = data
            .get(offset..offset + END_OF_CENTRAL_DIR_SIZE)
            .ok_or_else(|| truncated("end of central directory", offset))?;
        let mut cursor = Cursor::new(fixed);

        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != END_OF_CENTRAL_DIR_SIG {
            return Err(TranscodeError::archive(format!(
                "unrecognized end of central directory signature 0x{:08x}",
                signature
            )));
        }
        let _disk = cursor.read_u16::<LittleEndian>()?;
        let _disk_with_directory = cursor.read_u16::<LittleEndian>()?;
        let _disk_entries = cursor.read_u16::<LittleEndian>()?;
        let total_entries = cursor.read_u16::<LittleEndian>()?;
        let directory_size = cursor.read_u32::<LittleEndian>()?;
        let directory_offset = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            offset,
            total_entries,
            directory_size,
            directory_offset,
        })
    }
}

/// Data descriptor que sigue al payload cuando FLAG_DATA_DESCRIPTOR está activo
#[derive(Debug, Clone)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// 12 o 16 bytes según lleve firma
    pub len: usize,
}

impl DataDescriptor {
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let signed = peek_signature(data, offset) == Some(DATA_DESCRIPTOR_SIG);
        let start = if signed { offset + 4 } else { offset };
        let fixed = data
            .get(start..start + 12)
            .ok_or_else(|| truncated("data descriptor", offset))?;
        let mut cursor = Cursor::new(fixed);

        Ok(Self {
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            len: if signed { 16 } else { 12 },
        })
    }
}
