// src/archive/central.rs
// ============================================================================
// CENTRAL DIRECTORY READER - Acceso aleatorio vía EOCD
// ============================================================================

use rayon::prelude::*;

use super::header::{CentralDirectoryHeader, EndOfCentralDirectory, LocalFileHeader};
use super::{extract_payload, is_directory, ArchiveBackend, RawArchiveEntry};
use crate::error::{Result, TranscodeError};

/// Lee el zip a partir de su central directory
pub struct CentralDirectoryReader {
    eocd: EndOfCentralDirectory,
}

impl CentralDirectoryReader {
    pub fn new(eocd: EndOfCentralDirectory) -> Self {
        Self { eocd }
    }

    /// Lista las entradas del directorio (sin descomprimir)
    pub fn directory(&self, data: &[u8]) -> Result<Vec<CentralDirectoryHeader>> {
        let mut offset = self.eocd.directory_offset as usize;
        let end = offset + self.eocd.directory_size as usize;
        if end > self.eocd.offset {
            return Err(TranscodeError::archive(format!(
                "central directory [{}..{}] overlaps end record at {}",
                offset, end, self.eocd.offset
            )));
        }

        let mut headers = Vec::with_capacity(self.eocd.total_entries as usize);
        for _ in 0..self.eocd.total_entries {
            let header = CentralDirectoryHeader::parse(data, offset)?;
            offset += header.record_len;
            headers.push(header);
        }
        Ok(headers)
    }
}

fn extract(data: &[u8], entry: &CentralDirectoryHeader, verify_crc: bool) -> Result<RawArchiveEntry> {
    // Los tamaños del local header pueden ser 0 (data descriptor): mandan los del directorio
    let local = LocalFileHeader::parse(data, entry.local_header_offset as usize)?;
    let start = entry.local_header_offset as usize + local.header_len;
    let end = start + entry.compressed_size as usize;
    let payload = data.get(start..end).ok_or_else(|| {
        TranscodeError::archive(format!(
            "entry '{}' payload [{}..{}] past end of archive ({} bytes)",
            entry.name,
            start,
            end,
            data.len()
        ))
    })?;

    let bytes = extract_payload(
        &entry.name,
        entry.method,
        payload,
        entry.uncompressed_size as usize,
        entry.crc32,
        verify_crc,
    )?;
    Ok(RawArchiveEntry { name: entry.name.clone(), bytes })
}

impl ArchiveBackend for CentralDirectoryReader {
    fn name(&self) -> &'static str {
        "central_directory"
    }

    fn read_entries(&self, data: &[u8], verify_crc: bool) -> Result<Vec<RawArchiveEntry>> {
        let directory = self.directory(data)?;

        // Entradas independientes: se descomprimen en paralelo, el orden se conserva
        directory
            .par_iter()
            .filter(|entry| !is_directory(&entry.name))
            .map(|entry| extract(data, entry, verify_crc))
            .collect()
    }
}
