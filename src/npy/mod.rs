// src/npy/mod.rs
// ============================================================================
// NPY - Decoder de arrays NumPy (.npy)
// ============================================================================
//
// Layout:
//   [0:6]   magic "\x93NUMPY"
//   [6]     versión mayor
//   [7]     versión menor
//   [8:..]  header_len  u16 (v1) | u32 (v2, v3)
//   [..]    header ASCII (dict literal)
//   [..]    payload crudo
//
// ============================================================================

pub mod header;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Result, TranscodeError};
pub use header::NpyHeader;

pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Tipo de elemento soportado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F32,
    F64,
    Text,
}

/// Datos decodificados (planos, orden C)
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    Text(String),
}

/// Vista anidada para rank 1..=4
#[derive(Debug, Clone, PartialEq)]
pub enum Nested {
    Scalar(f64),
    List(Vec<Nested>),
}

impl Nested {
    pub fn as_list(&self) -> Option<&[Nested]> {
        match self {
            Self::List(items) => Some(items),
            Self::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::List(_) => None,
        }
    }
}

/// Array NumPy decodificado
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub data: ArrayData,
    /// Informativo: los datos se entregan tal cual vienen
    pub fortran_order: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Float(usize),
    Bytes(usize),
    Unicode(usize),
}

impl ElementKind {
    /// Bytes por elemento (U<n> son n code points UCS-4)
    fn item_size(self) -> Result<usize> {
        match self {
            ElementKind::Float(w) | ElementKind::Bytes(w) => Ok(w),
            ElementKind::Unicode(w) => w
                .checked_mul(4)
                .ok_or_else(|| TranscodeError::array("npy item size overflows")),
        }
    }
}

/// Producto de dimensiones, sin desbordar
pub fn shape_numel(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| TranscodeError::array(format!("npy shape {:?} overflows", shape)))
}

/// Interpreta `descr` (ej: "<f4", ">f8", "|S16", "<U12")
fn parse_descr(descr: &str) -> Result<(Endian, ElementKind)> {
    let unsupported = || TranscodeError::array(format!("unsupported dtype '{}'", descr));

    let (endian, rest) = match descr.chars().next() {
        Some('<') => (Endian::Little, &descr[1..]),
        Some('>') => (Endian::Big, &descr[1..]),
        Some('|') => (Endian::Little, &descr[1..]),
        Some('=') => {
            let native = if cfg!(target_endian = "big") { Endian::Big } else { Endian::Little };
            (native, &descr[1..])
        }
        _ => (Endian::Little, descr),
    };

    let mut chars = rest.chars();
    let code = chars.next().ok_or_else(unsupported)?;
    let width: usize = chars.as_str().parse().map_err(|_| unsupported())?;

    let kind = match (code, width) {
        ('f', 4) => ElementKind::Float(4),
        ('f', 8) => ElementKind::Float(8),
        ('S', n) | ('a', n) => ElementKind::Bytes(n),
        ('U', n) => ElementKind::Unicode(n),
        _ => return Err(unsupported()),
    };
    Ok((endian, kind))
}

fn decode_text(payload: &[u8], endian: Endian, kind: ElementKind, itemsize: usize, numel: usize) -> Result<String> {
    let mut parts = Vec::with_capacity(numel);

    match kind {
        ElementKind::Bytes(_) => {
            for element in payload.chunks_exact(itemsize.max(1)).take(numel) {
                let end = element.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                parts.push(String::from_utf8_lossy(&element[..end]).into_owned());
            }
        }
        ElementKind::Unicode(_) => {
            for element in payload.chunks_exact(itemsize.max(4)).take(numel) {
                let mut units = vec![0u32; element.len() / 4];
                match endian {
                    Endian::Little => LittleEndian::read_u32_into(element, &mut units),
                    Endian::Big => BigEndian::read_u32_into(element, &mut units),
                }
                let end = units.iter().rposition(|&u| u != 0).map_or(0, |i| i + 1);
                let text = units[..end]
                    .iter()
                    .map(|&u| {
                        char::from_u32(u).ok_or_else(|| {
                            TranscodeError::array(format!("invalid code point U+{:X} in text array", u))
                        })
                    })
                    .collect::<Result<String>>()?;
                parts.push(text);
            }
        }
        ElementKind::Float(_) => return Err(TranscodeError::array("float dtype is not text")),
    }

    Ok(parts.join("\n"))
}

/// Decodifica un .npy completo
pub fn decode_npy(bytes: &[u8]) -> Result<NumericArray> {
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(TranscodeError::array("invalid npy magic"));
    }

    let major = bytes[6];
    let minor = bytes[7];
    let (header_len, header_start) = match major {
        1 => (LittleEndian::read_u16(&bytes[8..10]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(TranscodeError::array("truncated npy header length"));
            }
            (LittleEndian::read_u32(&bytes[8..12]) as usize, 12)
        }
        _ => {
            return Err(TranscodeError::array(format!(
                "unsupported npy version {}.{}",
                major, minor
            )))
        }
    };

    let header_end = header_start + header_len;
    let header_bytes = bytes
        .get(header_start..header_end)
        .ok_or_else(|| TranscodeError::array("truncated npy header"))?;
    let header_text = std::str::from_utf8(header_bytes)
        .map_err(|_| TranscodeError::array("npy header is not valid text"))?;
    let header = NpyHeader::parse(header_text)?;

    if header.fortran_order {
        log::warn!("npy array uses fortran_order, data is read as stored");
    }

    let (endian, kind) = parse_descr(&header.descr)?;
    let numel = shape_numel(&header.shape)?;
    let itemsize = kind.item_size()?;

    let payload = &bytes[header_end..];
    let needed = numel
        .checked_mul(itemsize)
        .ok_or_else(|| TranscodeError::array("npy shape overflows"))?;
    if payload.len() < needed {
        return Err(TranscodeError::array(format!(
            "npy payload has {} bytes, shape {:?} of '{}' needs {}",
            payload.len(),
            header.shape,
            header.descr,
            needed
        )));
    }
    let payload = &payload[..needed];

    // Copia a buffers propios: el payload no tiene por qué estar alineado
    let (dtype, data) = match kind {
        ElementKind::Float(4) => {
            let mut out = vec![0f32; numel];
            match endian {
                Endian::Little => LittleEndian::read_f32_into(payload, &mut out),
                Endian::Big => BigEndian::read_f32_into(payload, &mut out),
            }
            (DType::F32, ArrayData::F32(out))
        }
        ElementKind::Float(_) => {
            let mut out = vec![0f64; numel];
            match endian {
                Endian::Little => LittleEndian::read_f64_into(payload, &mut out),
                Endian::Big => BigEndian::read_f64_into(payload, &mut out),
            }
            (DType::F64, ArrayData::F64(out))
        }
        text_kind => (DType::Text, ArrayData::Text(decode_text(payload, endian, text_kind, itemsize, numel)?)),
    };

    Ok(NumericArray {
        dtype,
        shape: header.shape,
        data,
        fortran_order: header.fortran_order,
    })
}

impl NumericArray {
    /// Número de elementos (1 para escalares)
    pub fn numel(&self) -> Result<usize> {
        shape_numel(&self.shape)
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn is_numeric(&self) -> bool {
        self.dtype != DType::Text
    }

    /// Datos planos como f32 (f64 se convierte)
    pub fn to_f32_vec(&self) -> Option<Vec<f32>> {
        match &self.data {
            ArrayData::F32(v) => Some(v.clone()),
            ArrayData::F64(v) => Some(v.iter().map(|&x| x as f32).collect()),
            ArrayData::Text(_) => None,
        }
    }

    /// Datos planos como f64 (f32 se amplía sin pérdida)
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match &self.data {
            ArrayData::F32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            ArrayData::F64(v) => Some(v.clone()),
            ArrayData::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            ArrayData::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Valor de un array escalar o de un solo elemento
    pub fn scalar(&self) -> Option<f64> {
        match &self.data {
            ArrayData::F32(v) if v.len() == 1 => Some(v[0] as f64),
            ArrayData::F64(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// Vista anidada según `shape` (rank 0..=4)
    pub fn nested(&self) -> Result<Nested> {
        let flat = self
            .to_f64_vec()
            .ok_or_else(|| TranscodeError::array("text arrays have no numeric nesting"))?;
        if self.rank() > 4 {
            return Err(TranscodeError::array(format!(
                "rank {} arrays are not supported (max 4)",
                self.rank()
            )));
        }
        if self.shape.is_empty() {
            return Ok(Nested::Scalar(flat.first().copied().unwrap_or(0.0)));
        }
        let numel = self.numel()?;
        if numel != flat.len() {
            return Err(TranscodeError::array(format!(
                "shape {:?} needs {} values, array holds {}",
                self.shape,
                numel,
                flat.len()
            )));
        }

        fn build(flat: &[f64], shape: &[usize]) -> Nested {
            if shape.len() == 1 {
                return Nested::List(flat.iter().map(|&v| Nested::Scalar(v)).collect());
            }
            let stride: usize = shape[1..].iter().product();
            Nested::List(
                (0..shape[0])
                    .map(|i| build(&flat[i * stride..(i + 1) * stride], &shape[1..]))
                    .collect(),
            )
        }

        Ok(build(&flat, &self.shape))
    }
}
