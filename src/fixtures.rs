// src/fixtures.rs
// ============================================================================
// FIXTURES - Generación de archivos de movimiento sintéticos
// ============================================================================
//
// Escribe .npy y zips mínimos para tests y benchmarks. No intenta comprimir:
// el método DEFLATE se emite con bloques stored, que cualquier inflater acepta.
//
// ============================================================================

use byteorder::{LittleEndian, WriteBytesExt};

/// Método con el que se escribe una entrada del zip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipMethod {
    Stored,
    /// DEFLATE (bloques stored)
    Deflate,
    /// DEFLATE con tamaños a cero en el local header y data descriptor firmado
    DeflateWithDescriptor,
}

struct PendingEntry {
    name: String,
    data: Vec<u8>,
    method: ZipMethod,
}

/// Constructor de archivos zip
pub struct ZipBuilder {
    entries: Vec<PendingEntry>,
    central_directory: bool,
}

impl Default for ZipBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self { entries: Vec::new(), central_directory: true }
    }

    pub fn entry(mut self, name: &str, data: &[u8], method: ZipMethod) -> Self {
        self.entries.push(PendingEntry { name: name.to_string(), data: data.to_vec(), method });
        self
    }

    /// Omite central directory y EOCD (zip truncado / en streaming)
    pub fn without_central_directory(mut self) -> Self {
        self.central_directory = false;
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let offset = out.len() as u32;
            let crc = crc32fast::hash(&entry.data);
            let payload = match entry.method {
                ZipMethod::Stored => entry.data.clone(),
                ZipMethod::Deflate | ZipMethod::DeflateWithDescriptor => deflate_stored(&entry.data),
            };
            let (method, flags) = match entry.method {
                ZipMethod::Stored => (0u16, 0u16),
                ZipMethod::Deflate => (8, 0),
                ZipMethod::DeflateWithDescriptor => (8, 1 << 3),
            };
            let descriptor = entry.method == ZipMethod::DeflateWithDescriptor;
            let (local_crc, local_csize, local_usize) = if descriptor {
                (0, 0, 0)
            } else {
                (crc, payload.len() as u32, entry.data.len() as u32)
            };

            write_local_header(&mut out, &entry.name, method, flags, local_crc, local_csize, local_usize);
            out.extend_from_slice(&payload);
            if descriptor {
                put_u32(&mut out, 0x0807_4b50);
                put_u32(&mut out, crc);
                put_u32(&mut out, payload.len() as u32);
                put_u32(&mut out, entry.data.len() as u32);
            }

            write_central_header(
                &mut central,
                &entry.name,
                method,
                flags,
                crc,
                payload.len() as u32,
                entry.data.len() as u32,
                offset,
            );
        }

        if self.central_directory {
            let directory_offset = out.len() as u32;
            out.extend_from_slice(&central);
            put_u32(&mut out, 0x0605_4b50);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0);
            put_u16(&mut out, self.entries.len() as u16);
            put_u16(&mut out, self.entries.len() as u16);
            put_u32(&mut out, central.len() as u32);
            put_u32(&mut out, directory_offset);
            put_u16(&mut out, 0);
        }

        out
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_local_header(
    out: &mut Vec<u8>,
    name: &str,
    method: u16,
    flags: u16,
    crc: u32,
    compressed: u32,
    uncompressed: u32,
) {
    put_u32(out, 0x0403_4b50);
    put_u16(out, 20);
    put_u16(out, flags);
    put_u16(out, method);
    put_u16(out, 0);
    put_u16(out, 0x21);
    put_u32(out, crc);
    put_u32(out, compressed);
    put_u32(out, uncompressed);
    put_u16(out, name.len() as u16);
    put_u16(out, 0);
    out.extend_from_slice(name.as_bytes());
}

#[allow(clippy::too_many_arguments)]
fn write_central_header(
    out: &mut Vec<u8>,
    name: &str,
    method: u16,
    flags: u16,
    crc: u32,
    compressed: u32,
    uncompressed: u32,
    local_offset: u32,
) {
    put_u32(out, 0x0201_4b50);
    put_u16(out, 20);
    put_u16(out, 20);
    put_u16(out, flags);
    put_u16(out, method);
    put_u16(out, 0);
    put_u16(out, 0x21);
    put_u32(out, crc);
    put_u32(out, compressed);
    put_u32(out, uncompressed);
    put_u16(out, name.len() as u16);
    put_u16(out, 0);
    put_u16(out, 0);
    put_u16(out, 0);
    put_u16(out, 0);
    put_u32(out, 0);
    put_u32(out, local_offset);
    out.extend_from_slice(name.as_bytes());
}

/// Stream DEFLATE crudo hecho solo de bloques stored
pub fn deflate_stored(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 5 * (data.len() / 0xFFFF + 1));
    let mut chunks = data.chunks(0xFFFF).peekable();

    if chunks.peek().is_none() {
        out.extend_from_slice(&[0x01, 0x00, 0x00, 0xFF, 0xFF]);
        return out;
    }

    while let Some(chunk) = chunks.next() {
        let is_final = chunks.peek().is_none();
        out.push(is_final as u8);
        put_u16(&mut out, chunk.len() as u16);
        put_u16(&mut out, !(chunk.len() as u16));
        out.extend_from_slice(chunk);
    }
    out
}

// ============================================================================
// NPY
// ============================================================================

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Serializa un .npy versión 1.0 con el descriptor y payload dados
pub fn npy_raw(descr: &str, shape: &[usize], payload: &[u8]) -> Vec<u8> {
    npy_raw_versioned(1, descr, shape, payload)
}

/// Igual que `npy_raw` pero eligiendo versión mayor (1 → u16, 2/3 → u32)
pub fn npy_raw_versioned(major: u8, descr: &str, shape: &[usize], payload: &[u8]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr,
        shape_literal(shape)
    );
    let prefix = if major == 1 { 10 } else { 12 };
    // Alinear a 64 bytes incluyendo el '\n' final
    let total = prefix + header.len() + 1;
    let pad = (64 - total % 64) % 64;
    header.extend(std::iter::repeat(' ').take(pad));
    header.push('\n');

    let mut out = Vec::with_capacity(prefix + header.len() + payload.len());
    out.extend_from_slice(b"\x93NUMPY");
    out.push(major);
    out.push(0);
    if major == 1 {
        put_u16(&mut out, header.len() as u16);
    } else {
        put_u32(&mut out, header.len() as u32);
    }
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn npy_f32(shape: &[usize], data: &[f32]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(data.len() * 4);
    for &v in data {
        // Escribir en un Vec no falla
        let _ = payload.write_f32::<LittleEndian>(v);
    }
    npy_raw("<f4", shape, &payload)
}

pub fn npy_f64(shape: &[usize], data: &[f64]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(data.len() * 8);
    for &v in data {
        let _ = payload.write_f64::<LittleEndian>(v);
    }
    npy_raw("<f8", shape, &payload)
}

/// Texto como array escalar `<U{n}` (UCS-4), igual que `np.save(str)`
pub fn npy_text(text: &str) -> Vec<u8> {
    let chars: Vec<char> = text.chars().collect();
    let width = chars.len().max(1);
    let mut payload = Vec::with_capacity(width * 4);
    for c in &chars {
        put_u32(&mut payload, *c as u32);
    }
    payload.resize(width * 4, 0);
    npy_raw(&format!("<U{}", width), &[], &payload)
}

// ============================================================================
// MOTION ARCHIVE
// ============================================================================

/// Constructor de archivos de movimiento con la estructura del generador
#[derive(Debug, Clone)]
pub struct MotionArchive {
    pub frames: usize,
    pub joints: usize,
    pub identity: bool,
    pub translation_frames: Option<usize>,
    pub duration: Option<f32>,
    pub text: Option<String>,
    pub include_rotation: bool,
    pub method: ZipMethod,
    pub central_directory: bool,
}

impl MotionArchive {
    pub fn new(frames: usize, joints: usize) -> Self {
        Self {
            frames,
            joints,
            identity: false,
            translation_frames: None,
            duration: None,
            text: None,
            include_rotation: true,
            method: ZipMethod::Deflate,
            central_directory: true,
        }
    }

    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    pub fn with_translation(mut self) -> Self {
        self.translation_frames = Some(self.frames);
        self
    }

    pub fn with_translation_frames(mut self, frames: usize) -> Self {
        self.translation_frames = Some(frames);
        self
    }

    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn without_rotation(mut self) -> Self {
        self.include_rotation = false;
        self
    }

    pub fn method(mut self, method: ZipMethod) -> Self {
        self.method = method;
        self
    }

    pub fn without_central_directory(mut self) -> Self {
        self.central_directory = false;
        self
    }

    /// Muestra 6D determinista para (frame, joint)
    pub fn sample(&self, frame: usize, joint: usize) -> [f32; 6] {
        if self.identity {
            return [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        }
        let seed = (frame * 131 + joint * 17) as f32;
        let mut v = [0.0f32; 6];
        for (k, slot) in v.iter_mut().enumerate() {
            *slot = ((seed + k as f32 * 7.0) * 0.37).sin();
        }
        // Mantener a1 y a2 lejos de ser paralelos
        v[0] += 1.5;
        v[4] += 1.5;
        v
    }

    pub fn rot6d_values(&self) -> Vec<f32> {
        let mut values = Vec::with_capacity(self.frames * self.joints * 6);
        for f in 0..self.frames {
            for j in 0..self.joints {
                values.extend_from_slice(&self.sample(f, j));
            }
        }
        values
    }

    pub fn translation_values(&self, frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|f| {
                let t = f as f32 * 0.01;
                [t, 0.9 + t * 0.5, -t * 2.0]
            })
            .collect()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipBuilder::new();

        if self.include_rotation {
            let rot = npy_f32(&[self.frames, self.joints, 6], &self.rot6d_values());
            zip = zip.entry("rot6d.npy", &rot, self.method);
        }
        if let Some(frames) = self.translation_frames {
            let transl = npy_f32(&[frames, 3], &self.translation_values(frames));
            zip = zip.entry("transl.npy", &transl, self.method);
        }
        if let Some(duration) = self.duration {
            zip = zip.entry("duration.npy", &npy_f64(&[1], &[duration as f64]), self.method);
        }
        if let Some(text) = &self.text {
            zip = zip.entry("text.npy", &npy_text(text), self.method);
        }

        if !self.central_directory {
            zip = zip.without_central_directory();
        }
        zip.finish()
    }
}
