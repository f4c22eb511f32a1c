// src/archive/walker.rs
// ============================================================================
// LOCAL HEADER WALKER - Recorrido secuencial de registros
// ============================================================================
//
// Para al encontrar la firma del central directory (o el EOCD, o el final
// del buffer). Cualquier otra firma aborta la lectura completa.
//
// ============================================================================

use super::header::{
    peek_signature, DataDescriptor, LocalFileHeader, CENTRAL_HEADER_SIG, END_OF_CENTRAL_DIR_SIG,
    LOCAL_HEADER_SIG, METHOD_DEFLATE,
};
use super::{
    extract_payload, inflate_raw, is_directory, verify_entry, ArchiveBackend, RawArchiveEntry,
};
use crate::error::{Result, TranscodeError};

/// Recorre los local headers en orden de aparición
pub struct LocalHeaderWalker;

impl LocalHeaderWalker {
    /// Entrada con data descriptor: el final del payload lo marca el propio stream DEFLATE
    fn read_described(
        data: &[u8],
        header: &LocalFileHeader,
        start: usize,
        verify_crc: bool,
    ) -> Result<(RawArchiveEntry, usize)> {
        if header.method != METHOD_DEFLATE {
            return Err(TranscodeError::archive(format!(
                "entry '{}': data descriptor requires deflate when walking local headers",
                header.name
            )));
        }

        let inflated = inflate_raw(&data[start..], None)?;
        let descriptor = DataDescriptor::parse(data, start + inflated.consumed)?;
        if descriptor.compressed_size as usize != inflated.consumed {
            return Err(TranscodeError::archive(format!(
                "entry '{}': data descriptor declares {} compressed bytes, stream used {}",
                header.name, descriptor.compressed_size, inflated.consumed
            )));
        }

        verify_entry(
            &header.name,
            &inflated.data,
            descriptor.uncompressed_size as usize,
            descriptor.crc32,
            verify_crc,
        )?;
        let next = start + inflated.consumed + descriptor.len;
        Ok((RawArchiveEntry { name: header.name.clone(), bytes: inflated.data }, next))
    }
}

impl ArchiveBackend for LocalHeaderWalker {
    fn name(&self) -> &'static str {
        "local_headers"
    }

    fn read_entries(&self, data: &[u8], verify_crc: bool) -> Result<Vec<RawArchiveEntry>> {
        let mut entries = Vec::new();
        let mut offset = 0usize;

        loop {
            let signature = match peek_signature(data, offset) {
                Some(sig) => sig,
                // Sin central directory: fin del buffer
                None => break,
            };

            match signature {
                LOCAL_HEADER_SIG => {}
                CENTRAL_HEADER_SIG | END_OF_CENTRAL_DIR_SIG => break,
                other => {
                    return Err(TranscodeError::archive(format!(
                        "unrecognized record signature 0x{:08x} at offset {}",
                        other, offset
                    )))
                }
            }

            let header = LocalFileHeader::parse(data, offset)?;
            let start = offset + header.header_len;

            let (entry, next) = if header.has_data_descriptor() && header.compressed_size == 0 {
                Self::read_described(data, &header, start, verify_crc)?
            } else {
                let end = start + header.compressed_size as usize;
                let payload = data.get(start..end).ok_or_else(|| {
                    TranscodeError::archive(format!(
                        "entry '{}' payload [{}..{}] past end of archive ({} bytes)",
                        header.name,
                        start,
                        end,
                        data.len()
                    ))
                })?;
                let bytes = extract_payload(
                    &header.name,
                    header.method,
                    payload,
                    header.uncompressed_size as usize,
                    header.crc32,
                    verify_crc,
                )?;
                let mut next = end;
                if header.has_data_descriptor() {
                    next += DataDescriptor::parse(data, end)?.len;
                }
                (RawArchiveEntry { name: header.name.clone(), bytes }, next)
            };

            if !is_directory(&entry.name) {
                entries.push(entry);
            }
            offset = next;
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ZipBuilder, ZipMethod};

    #[test]
    fn test_walks_without_central_directory() {
        let zip = ZipBuilder::new()
            .entry("rot6d.npy", b"rotations", ZipMethod::Deflate)
            .entry("text.npy", b"label", ZipMethod::Stored)
            .without_central_directory()
            .finish();

        let entries = LocalHeaderWalker.read_entries(&zip, true).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "rot6d.npy");
        assert_eq!(entries[0].bytes, b"rotations");
        assert_eq!(entries[1].bytes, b"label");
    }

    #[test]
    fn test_stops_at_central_directory() {
        let zip = ZipBuilder::new()
            .entry("a.npy", b"1", ZipMethod::Stored)
            .finish();
        let entries = LocalHeaderWalker.read_entries(&zip, true).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_data_descriptor_entries() {
        let zip = ZipBuilder::new()
            .entry("a.npy", b"first entry", ZipMethod::DeflateWithDescriptor)
            .entry("b.npy", b"second", ZipMethod::Stored)
            .without_central_directory()
            .finish();

        let entries = LocalHeaderWalker.read_entries(&zip, true).unwrap();
        assert_eq!(entries[0].bytes, b"first entry");
        assert_eq!(entries[1].bytes, b"second");
    }

    #[test]
    fn test_unrecognized_signature_aborts() {
        let mut zip = ZipBuilder::new()
            .entry("a.npy", b"1", ZipMethod::Stored)
            .without_central_directory()
            .finish();
        zip.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0, 0]);

        let err = LocalHeaderWalker.read_entries(&zip, true).unwrap_err();
        assert!(matches!(err, TranscodeError::ArchiveFormat(_)));
        assert!(err.to_string().contains("0xddccbbaa"));
    }

    #[test]
    fn test_empty_buffer() {
        assert!(LocalHeaderWalker.read_entries(&[], true).unwrap().is_empty());
    }
}
