// src/glb/container.rs
// ============================================================================
// BINARY CONTAINER - Resultado final: header ∥ JSON ∥ BIN
// ============================================================================

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use xxhash_rust::xxh3::Xxh3;

use super::document::Document;
use super::header::*;
use crate::error::{Result, TranscodeError};

/// Contenedor binario inmutable.
///
/// `json` y `bin` guardan los payloads ya rellenados a múltiplo de 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryContainer {
    header: GlbHeader,
    json: Vec<u8>,
    bin: Vec<u8>,
}

impl BinaryContainer {
    /// Ensambla a partir de los payloads; aplica el relleno de cada chunk
    pub fn assemble(mut json: Vec<u8>, mut bin: Vec<u8>) -> Result<Self> {
        json.resize(json.len() + padding_for(json.len()), JSON_PAD);
        bin.resize(bin.len() + padding_for(bin.len()), BIN_PAD);

        let total = HEADER_SIZE + CHUNK_HEADER_SIZE + json.len() + CHUNK_HEADER_SIZE + bin.len();
        let length = u32::try_from(total)
            .map_err(|_| TranscodeError::container(format!("container too large: {} bytes", total)))?;

        Ok(Self { header: GlbHeader::new(length), json, bin })
    }

    /// Re-parsea un contenedor serializado
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = GlbHeader::from_bytes(data)?;
        header.validate().map_err(TranscodeError::container)?;
        if header.length as usize != data.len() {
            return Err(TranscodeError::container(format!(
                "header length {} does not match {} bytes",
                header.length,
                data.len()
            )));
        }

        let json = read_chunk(data, HEADER_SIZE, CHUNK_JSON)?;
        let bin_start = HEADER_SIZE + CHUNK_HEADER_SIZE + json.len();
        let bin = read_chunk(data, bin_start, CHUNK_BIN)?;

        let end = bin_start + CHUNK_HEADER_SIZE + bin.len();
        if end != data.len() {
            return Err(TranscodeError::container(format!(
                "{} trailing bytes after BIN chunk",
                data.len() - end
            )));
        }

        Ok(Self { header, json: json.to_vec(), bin: bin.to_vec() })
    }

    pub fn header(&self) -> &GlbHeader {
        &self.header
    }

    /// Payload JSON (con relleno)
    pub fn json_chunk(&self) -> &[u8] {
        &self.json
    }

    /// Payload BIN (con relleno)
    pub fn bin_chunk(&self) -> &[u8] {
        &self.bin
    }

    pub fn document(&self) -> Result<Document> {
        Document::from_json_bytes(&self.json)
    }

    pub fn len(&self) -> usize {
        self.header.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        self.header.write_to(out)?;
        out.write_all(&ChunkHeader::json(self.json.len() as u32).to_bytes())?;
        out.write_all(&self.json)?;
        out.write_all(&ChunkHeader::bin(self.bin.len() as u32).to_bytes())?;
        out.write_all(&self.bin)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&ChunkHeader::json(self.json.len() as u32).to_bytes());
        out.extend_from_slice(&self.json);
        out.extend_from_slice(&ChunkHeader::bin(self.bin.len() as u32).to_bytes());
        out.extend_from_slice(&self.bin);
        out
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.to_bytes()
    }

    /// Escribe a disco
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = BufWriter::new(File::create(path.as_ref())?);
        self.write_to(&mut file)?;
        file.flush()?;
        Ok(())
    }

    /// XXH3-64 de los bytes serializados
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(&self.header.to_bytes());
        hasher.update(&ChunkHeader::json(self.json.len() as u32).to_bytes());
        hasher.update(&self.json);
        hasher.update(&ChunkHeader::bin(self.bin.len() as u32).to_bytes());
        hasher.update(&self.bin);
        hasher.digest()
    }
}

fn read_chunk(data: &[u8], offset: usize, expected: u32) -> Result<&[u8]> {
    let chunk = ChunkHeader::from_bytes(data, offset)?;
    if chunk.chunk_type != expected {
        return Err(TranscodeError::container(format!(
            "unexpected chunk type 0x{:08x} at offset {}",
            chunk.chunk_type, offset
        )));
    }
    let start = offset + CHUNK_HEADER_SIZE;
    let end = start
        .checked_add(chunk.length as usize)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            TranscodeError::container(format!(
                "{} chunk at offset {} overruns container",
                chunk.type_name(),
                offset
            ))
        })?;
    Ok(&data[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use xxhash_rust::xxh3::xxh3_64;

    #[test]
    fn test_assemble_pads_chunks() {
        let container = BinaryContainer::assemble(b"{\"a\":1}".to_vec(), vec![1, 2, 3, 4, 5]).unwrap();
        assert_eq!(container.json_chunk(), b"{\"a\":1} ");
        assert_eq!(container.bin_chunk(), &[1, 2, 3, 4, 5, 0, 0, 0]);
        assert_eq!(container.len(), 12 + 8 + 8 + 8 + 8);

        let bytes = container.to_bytes();
        assert_eq!(bytes.len(), container.len());
        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(&bytes[16..20], b"JSON");
        assert_eq!(&bytes[32..36], b"BIN\0");
    }

    #[test]
    fn test_parse_serialized() {
        let container = BinaryContainer::assemble(b"{}".to_vec(), vec![0u8; 12]).unwrap();
        let parsed = BinaryContainer::parse(&container.to_bytes()).unwrap();
        assert_eq!(parsed, container);
    }

    #[test]
    fn test_parse_rejects_length_mismatch() {
        let mut bytes = BinaryContainer::assemble(b"{}".to_vec(), vec![0u8; 4]).unwrap().into_bytes();
        bytes.push(0);
        assert!(matches!(BinaryContainer::parse(&bytes), Err(TranscodeError::Container(_))));
    }

    #[test]
    fn test_parse_rejects_swapped_chunks() {
        let mut bytes = BinaryContainer::assemble(b"{}".to_vec(), vec![0u8; 4]).unwrap().into_bytes();
        bytes[16..20].copy_from_slice(b"BIN\0");
        assert!(BinaryContainer::parse(&bytes).is_err());
    }

    #[test]
    fn test_parse_rejects_overrun() {
        let mut bytes = BinaryContainer::assemble(b"{}".to_vec(), vec![0u8; 4]).unwrap().into_bytes();
        bytes[12] = 200;
        assert!(BinaryContainer::parse(&bytes).is_err());
    }

    #[test]
    fn test_write_to_and_fingerprint_agree() {
        let container = BinaryContainer::assemble(b"{\"x\":true}".to_vec(), vec![9u8; 7]).unwrap();
        let mut out = Vec::new();
        container.write_to(&mut out).unwrap();
        assert_eq!(out, container.to_bytes());
        assert_eq!(container.fingerprint(), xxh3_64(&out));
    }

    #[test]
    fn test_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.vrma");
        let container = BinaryContainer::assemble(b"{}".to_vec(), vec![1u8; 4]).unwrap();
        container.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), container.to_bytes());
    }
}
