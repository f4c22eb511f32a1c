// src/archive/inflate.rs
// ============================================================================
// INFLATE - Decodificador DEFLATE crudo (RFC 1951)
// ============================================================================
//
// Bloques soportados:
//   BTYPE 00  stored
//   BTYPE 01  Huffman fijo
//   BTYPE 10  Huffman dinámico
//
// Los códigos Huffman se decodifican con la tabla canónica (counts + symbols),
// bit a bit, MSB primero dentro del código.
//
// ============================================================================

use crate::error::{Result, TranscodeError};

const MAX_BITS: usize = 15;
const MAX_LIT_CODES: usize = 286;
const MAX_DIST_CODES: usize = 30;
const FIXED_LIT_CODES: usize = 288;

const LEN_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115,
    131, 163, 195, 227, 258,
];
const LEN_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Orden de las longitudes del alfabeto de code lengths
const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Resultado de inflar un stream
#[derive(Debug)]
pub struct Inflated {
    pub data: Vec<u8>,
    /// Bytes de entrada consumidos hasta el final del último bloque
    pub consumed: usize,
}

fn corrupt(msg: &str) -> TranscodeError {
    TranscodeError::archive(format!("corrupt deflate stream: {}", msg))
}

// ============================================================================
// BIT READER
// ============================================================================

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buf: u64,
    bit_count: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, bit_buf: 0, bit_count: 0 }
    }

    fn refill(&mut self, need: u32) -> Result<()> {
        while self.bit_count < need {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or_else(|| corrupt("unexpected end of input"))?;
            self.bit_buf |= (byte as u64) << self.bit_count;
            self.pos += 1;
            self.bit_count += 8;
        }
        Ok(())
    }

    fn bits(&mut self, n: u32) -> Result<u32> {
        if n == 0 {
            return Ok(0);
        }
        self.refill(n)?;
        let value = (self.bit_buf & ((1u64 << n) - 1)) as u32;
        self.bit_buf >>= n;
        self.bit_count -= n;
        Ok(value)
    }

    /// Descarta los bits hasta el siguiente límite de byte
    fn align_to_byte(&mut self) {
        let drop = self.bit_count % 8;
        self.bit_buf >>= drop;
        self.bit_count -= drop;
    }

    /// Toma `n` bytes crudos (solo tras `align_to_byte`)
    fn take_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        // Devolver al buffer los bytes enteros que quedaron en bit_buf
        self.pos -= (self.bit_count / 8) as usize;
        self.bit_buf = 0;
        self.bit_count = 0;

        let end = self.pos.checked_add(n).ok_or_else(|| corrupt("stored length overflow"))?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| corrupt("stored block past end of input"))?;
        self.pos = end;
        Ok(bytes)
    }

    fn consumed(&self) -> usize {
        self.pos - (self.bit_count / 8) as usize
    }
}

// ============================================================================
// HUFFMAN
// ============================================================================

struct Huffman {
    counts: [u16; MAX_BITS + 1],
    symbols: Vec<u16>,
}

impl Huffman {
    fn new(lengths: &[u8]) -> Result<Self> {
        let mut counts = [0u16; MAX_BITS + 1];
        for &len in lengths {
            counts[len as usize] += 1;
        }

        // Verificar que el código no está sobre-suscrito
        let mut left: i32 = 1;
        for len in 1..=MAX_BITS {
            left <<= 1;
            left -= counts[len] as i32;
            if left < 0 {
                return Err(corrupt("over-subscribed huffman code"));
            }
        }

        let mut offsets = [0u16; MAX_BITS + 2];
        for len in 1..=MAX_BITS {
            offsets[len + 1] = offsets[len] + counts[len];
        }

        let mut symbols = vec![0u16; lengths.len()];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbols[offsets[len as usize] as usize] = symbol as u16;
                offsets[len as usize] += 1;
            }
        }

        Ok(Self { counts, symbols })
    }

    fn decode(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;

        for len in 1..=MAX_BITS {
            code |= reader.bits(1)? as i32;
            let count = self.counts[len] as i32;
            if code - count < first {
                return Ok(self.symbols[(index + (code - first)) as usize]);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }

        Err(corrupt("invalid huffman code"))
    }
}

fn fixed_tables() -> Result<(Huffman, Huffman)> {
    let mut lengths = [0u8; FIXED_LIT_CODES];
    lengths[..144].fill(8);
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths[280..].fill(8);
    let lit = Huffman::new(&lengths)?;
    let dist = Huffman::new(&[5u8; MAX_DIST_CODES])?;
    Ok((lit, dist))
}

fn dynamic_tables(reader: &mut BitReader<'_>) -> Result<(Huffman, Huffman)> {
    let hlit = reader.bits(5)? as usize + 257;
    let hdist = reader.bits(5)? as usize + 1;
    let hclen = reader.bits(4)? as usize + 4;
    if hlit > MAX_LIT_CODES || hdist > MAX_DIST_CODES {
        return Err(corrupt("too many length or distance codes"));
    }

    let mut cl_lengths = [0u8; 19];
    for &slot in CODE_LENGTH_ORDER.iter().take(hclen) {
        cl_lengths[slot] = reader.bits(3)? as u8;
    }
    let cl_huffman = Huffman::new(&cl_lengths)?;

    let mut lengths = vec![0u8; hlit + hdist];
    let mut i = 0;
    while i < lengths.len() {
        let symbol = cl_huffman.decode(reader)?;
        let (value, repeat) = match symbol {
            0..=15 => (symbol as u8, 1),
            16 => {
                if i == 0 {
                    return Err(corrupt("repeat with no previous length"));
                }
                (lengths[i - 1], 3 + reader.bits(2)? as usize)
            }
            17 => (0, 3 + reader.bits(3)? as usize),
            18 => (0, 11 + reader.bits(7)? as usize),
            _ => return Err(corrupt("invalid code length symbol")),
        };
        if i + repeat > lengths.len() {
            return Err(corrupt("code lengths overflow"));
        }
        lengths[i..i + repeat].fill(value);
        i += repeat;
    }

    if lengths[256] == 0 {
        return Err(corrupt("missing end-of-block code"));
    }

    let lit = Huffman::new(&lengths[..hlit])?;
    let dist = Huffman::new(&lengths[hlit..])?;
    Ok((lit, dist))
}

fn inflate_codes(
    reader: &mut BitReader<'_>,
    out: &mut Vec<u8>,
    lit: &Huffman,
    dist: &Huffman,
    limit: Option<usize>,
) -> Result<()> {
    loop {
        let symbol = lit.decode(reader)? as usize;
        match symbol {
            0..=255 => out.push(symbol as u8),
            256 => return Ok(()),
            _ => {
                let idx = symbol - 257;
                if idx >= LEN_BASE.len() {
                    return Err(corrupt("invalid length symbol"));
                }
                let len = LEN_BASE[idx] as usize + reader.bits(LEN_EXTRA[idx] as u32)? as usize;

                let dsym = dist.decode(reader)? as usize;
                if dsym >= DIST_BASE.len() {
                    return Err(corrupt("invalid distance symbol"));
                }
                let distance =
                    DIST_BASE[dsym] as usize + reader.bits(DIST_EXTRA[dsym] as u32)? as usize;
                if distance > out.len() {
                    return Err(corrupt("distance too far back"));
                }

                // Copia byte a byte: el rango puede solaparse con la salida
                let start = out.len() - distance;
                for k in 0..len {
                    let byte = out[start + k];
                    out.push(byte);
                }
            }
        }

        if let Some(limit) = limit {
            if out.len() > limit {
                return Err(corrupt("output exceeds declared size"));
            }
        }
    }
}

/// Infla un stream DEFLATE crudo (sin cabecera zlib).
///
/// `expected_size` reserva capacidad y, si se da, limita la salida.
pub fn inflate_raw(input: &[u8], expected_size: Option<usize>) -> Result<Inflated> {
    let mut reader = BitReader::new(input);
    let mut out = Vec::with_capacity(expected_size.unwrap_or(input.len() * 4));

    loop {
        let is_final = reader.bits(1)? == 1;
        let block_type = reader.bits(2)?;

        match block_type {
            0 => {
                reader.align_to_byte();
                let len = reader.bits(16)? as u16;
                let nlen = reader.bits(16)? as u16;
                if len != !nlen {
                    return Err(corrupt("stored block length mismatch"));
                }
                out.extend_from_slice(reader.take_bytes(len as usize)?);
            }
            1 => {
                let (lit, dist) = fixed_tables()?;
                inflate_codes(&mut reader, &mut out, &lit, &dist, expected_size)?;
            }
            2 => {
                let (lit, dist) = dynamic_tables(&mut reader)?;
                inflate_codes(&mut reader, &mut out, &lit, &dist, expected_size)?;
            }
            _ => return Err(corrupt("reserved block type")),
        }

        if let Some(limit) = expected_size {
            if out.len() > limit {
                return Err(corrupt("output exceeds declared size"));
            }
        }

        if is_final {
            break;
        }
    }

    reader.align_to_byte();
    Ok(Inflated { data: out, consumed: reader.consumed() })
}
