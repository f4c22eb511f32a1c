// src/archive/mod.rs
// ============================================================================
// ARCHIVE - Lector de zips con los .npy del generador de movimiento
// ============================================================================
//
// Dos backends intercambiables detrás de `ArchiveBackend`:
//   - CentralDirectoryReader: usa el central directory (tamaños fiables,
//     entradas extraídas en paralelo)
//   - LocalHeaderWalker: recorre local headers en orden, tolera que falte
//     el central directory
//
// `select_backend` elige uno por llamada sondeando si hay EOCD.
//
// ============================================================================

pub mod central;
pub mod header;
pub mod inflate;
pub mod walker;

use serde::Deserialize;

use crate::error::{Result, TranscodeError};

pub use central::CentralDirectoryReader;
pub use header::EndOfCentralDirectory;
pub use inflate::{inflate_raw, Inflated};
pub use walker::LocalHeaderWalker;

use header::{METHOD_DEFLATE, METHOD_STORED};

/// Entrada descomprimida del zip
#[derive(Debug, Clone)]
pub struct RawArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Estrategia de lectura
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStrategy {
    /// Central directory si existe, si no walker
    #[default]
    Auto,
    CentralDirectory,
    LocalHeaders,
}

impl ArchiveStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "central" | "central_directory" | "cd" => Some(Self::CentralDirectory),
            "walk" | "local" | "local_headers" => Some(Self::LocalHeaders),
            _ => None,
        }
    }
}

/// Backend de lectura de zip
pub trait ArchiveBackend: Send + Sync {
    /// Nombre del backend (para logs y estadísticas)
    fn name(&self) -> &'static str;

    /// Lee y descomprime todas las entradas de fichero
    fn read_entries(&self, data: &[u8], verify_crc: bool) -> Result<Vec<RawArchiveEntry>>;
}

/// Elige el backend según la estrategia y lo que ofrece el buffer
pub fn select_backend(strategy: ArchiveStrategy, data: &[u8]) -> Result<Box<dyn ArchiveBackend>> {
    match strategy {
        ArchiveStrategy::LocalHeaders => Ok(Box::new(LocalHeaderWalker)),
        ArchiveStrategy::CentralDirectory => {
            let eocd = EndOfCentralDirectory::locate(data).ok_or_else(|| {
                TranscodeError::archive("no end of central directory record found")
            })?;
            Ok(Box::new(CentralDirectoryReader::new(eocd)))
        }
        ArchiveStrategy::Auto => match EndOfCentralDirectory::locate(data) {
            Some(eocd) => Ok(Box::new(CentralDirectoryReader::new(eocd))),
            None => {
                log::debug!("no central directory found, walking local headers");
                Ok(Box::new(LocalHeaderWalker))
            }
        },
    }
}

/// Descomprime el payload de una entrada y verifica su CRC-32
pub(crate) fn extract_payload(
    name: &str,
    method: u16,
    payload: &[u8],
    uncompressed_size: usize,
    crc32: u32,
    verify_crc: bool,
) -> Result<Vec<u8>> {
    let bytes = match method {
        METHOD_STORED => payload.to_vec(),
        METHOD_DEFLATE => inflate_raw(payload, Some(uncompressed_size))?.data,
        other => {
            return Err(TranscodeError::archive(format!(
                "entry '{}' uses unsupported compression method {}",
                name, other
            )))
        }
    };

    verify_entry(name, &bytes, uncompressed_size, crc32, verify_crc)?;
    Ok(bytes)
}

/// Comprueba tamaño descomprimido y CRC-32 de una entrada
pub(crate) fn verify_entry(
    name: &str,
    bytes: &[u8],
    uncompressed_size: usize,
    crc32: u32,
    verify_crc: bool,
) -> Result<()> {
    if bytes.len() != uncompressed_size {
        return Err(TranscodeError::archive(format!(
            "entry '{}' decompressed to {} bytes, expected {}",
            name,
            bytes.len(),
            uncompressed_size
        )));
    }

    if verify_crc {
        let actual = crc32fast::hash(bytes);
        if actual != crc32 {
            return Err(TranscodeError::archive(format!(
                "entry '{}' CRC mismatch: 0x{:08x} != 0x{:08x}",
                name, actual, crc32
            )));
        }
    }

    Ok(())
}

pub(crate) fn is_directory(name: &str) -> bool {
    name.ends_with('/')
}

/// Entradas leídas de un zip, consultables por nombre, basename o stem
#[derive(Debug, Default)]
pub struct ArchiveEntries {
    entries: Vec<RawArchiveEntry>,
}

impl ArchiveEntries {
    pub fn new(entries: Vec<RawArchiveEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    fn position(&self, key: &str) -> Option<usize> {
        let basename = |name: &str| name.rsplit('/').next().unwrap_or(name).to_string();
        let stem = |name: &str| {
            let base = basename(name);
            match base.rsplit_once('.') {
                Some((stem, _)) => stem.to_string(),
                None => base,
            }
        };

        self.entries
            .iter()
            .position(|e| e.name == key)
            .or_else(|| self.entries.iter().position(|e| basename(&e.name) == key))
            .or_else(|| self.entries.iter().position(|e| stem(&e.name) == key))
    }

    pub fn get(&self, key: &str) -> Option<&RawArchiveEntry> {
        self.position(key).map(|i| &self.entries[i])
    }

    /// Extrae la entrada (cada una se consume una sola vez)
    pub fn take(&mut self, key: &str) -> Option<RawArchiveEntry> {
        self.position(key).map(|i| self.entries.remove(i))
    }
}

/// Lee un zip completo con la estrategia dada
pub fn read_archive(data: &[u8], strategy: ArchiveStrategy, verify_crc: bool) -> Result<(ArchiveEntries, &'static str)> {
    let backend = select_backend(strategy, data)?;
    let entries = backend.read_entries(data, verify_crc)?;
    log::debug!("{} read {} entries", backend.name(), entries.len());
    Ok((ArchiveEntries::new(entries), backend.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ZipBuilder, ZipMethod};

    #[test]
    fn test_probe_prefers_central_directory() {
        let zip = ZipBuilder::new().entry("a.npy", b"1", ZipMethod::Stored).finish();
        let backend = select_backend(ArchiveStrategy::Auto, &zip).unwrap();
        assert_eq!(backend.name(), "central_directory");
    }

    #[test]
    fn test_probe_falls_back_to_walker() {
        let zip = ZipBuilder::new()
            .entry("a.npy", b"1", ZipMethod::Stored)
            .without_central_directory()
            .finish();
        let backend = select_backend(ArchiveStrategy::Auto, &zip).unwrap();
        assert_eq!(backend.name(), "local_headers");
    }

    #[test]
    fn test_forced_central_without_directory() {
        let zip = ZipBuilder::new()
            .entry("a.npy", b"1", ZipMethod::Stored)
            .without_central_directory()
            .finish();
        assert!(matches!(
            select_backend(ArchiveStrategy::CentralDirectory, &zip),
            Err(TranscodeError::ArchiveFormat(_))
        ));
    }

    #[test]
    fn test_both_backends_agree() {
        let zip = ZipBuilder::new()
            .entry("rot6d.npy", b"rotation payload", ZipMethod::Deflate)
            .entry("text.npy", b"hello", ZipMethod::Stored)
            .finish();

        let (a, _) = read_archive(&zip, ArchiveStrategy::CentralDirectory, true).unwrap();
        let (b, _) = read_archive(&zip, ArchiveStrategy::LocalHeaders, true).unwrap();
        assert_eq!(a.names().collect::<Vec<_>>(), b.names().collect::<Vec<_>>());
        assert_eq!(a.get("rot6d").unwrap().bytes, b.get("rot6d").unwrap().bytes);
        assert_eq!(a.get("rot6d.npy").unwrap().bytes, b"rotation payload");
    }

    #[test]
    fn test_lookup_by_basename_and_stem() {
        let mut entries = ArchiveEntries::new(vec![
            RawArchiveEntry { name: "out/rot6d.npy".into(), bytes: vec![1] },
            RawArchiveEntry { name: "out/transl.npy".into(), bytes: vec![2] },
        ]);
        assert_eq!(entries.get("out/rot6d.npy").unwrap().bytes, vec![1]);
        assert_eq!(entries.get("transl.npy").unwrap().bytes, vec![2]);
        assert_eq!(entries.get("transl").unwrap().bytes, vec![2]);
        assert!(entries.get("duration").is_none());

        let taken = entries.take("rot6d").unwrap();
        assert_eq!(taken.name, "out/rot6d.npy");
        assert!(entries.get("rot6d").is_none());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_unsupported_method() {
        let err = extract_payload("x.npy", 12, b"data", 4, 0, false).unwrap_err();
        assert!(err.to_string().contains("unsupported compression method 12"));
    }

    #[test]
    fn test_crc_mismatch() {
        let err = extract_payload("x.npy", 0, b"data", 4, 0xdeadbeef, true).unwrap_err();
        assert!(matches!(err, TranscodeError::ArchiveFormat(_)));
        assert!(extract_payload("x.npy", 0, b"data", 4, 0xdeadbeef, false).is_ok());
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(ArchiveStrategy::from_str("AUTO"), Some(ArchiveStrategy::Auto));
        assert_eq!(ArchiveStrategy::from_str("central"), Some(ArchiveStrategy::CentralDirectory));
        assert_eq!(ArchiveStrategy::from_str("walk"), Some(ArchiveStrategy::LocalHeaders));
        assert_eq!(ArchiveStrategy::from_str("tar"), None);
    }
}
