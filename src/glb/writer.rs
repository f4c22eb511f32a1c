// src/glb/writer.rs
// ============================================================================
// BINARY WRITER - Buffer contiguo con bloques alineados a 4 bytes
// ============================================================================

use byteorder::{ByteOrder, LittleEndian};

/// Alineación de cada bloque dentro del buffer BIN
pub const BLOCK_ALIGN: usize = 4;

/// Acumula bloques de bytes y devuelve el offset de cada uno.
///
/// Tras cada `append` el buffer se rellena con ceros hasta `BLOCK_ALIGN`,
/// así que el siguiente bloque siempre arranca alineado.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    /// Añade un bloque; devuelve su offset (ya alineado)
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let offset = self.buf.len();
        self.buf.extend_from_slice(bytes);
        self.align_to(BLOCK_ALIGN, 0);
        offset
    }

    /// Añade floats little-endian; devuelve `(offset, byte_length)`
    pub fn append_f32s(&mut self, values: &[f32]) -> (usize, usize) {
        let offset = self.buf.len();
        let byte_len = values.len() * 4;
        self.buf.resize(offset + byte_len, 0);
        LittleEndian::write_f32_into(values, &mut self.buf[offset..]);
        self.align_to(BLOCK_ALIGN, 0);
        (offset, byte_len)
    }

    /// Rellena con `pad` hasta múltiplo de `n`
    pub fn align_to(&mut self, n: usize, pad: u8) {
        if n == 0 {
            return;
        }
        let remainder = self.buf.len() % n;
        if remainder != 0 {
            self.buf.resize(self.buf.len() + n - remainder, pad);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
