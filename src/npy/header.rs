// src/npy/header.rs
// ============================================================================
// NPY HEADER - Parser del dict literal de Python
// ============================================================================
//
// Ejemplo:
//   {'descr': '<f4', 'fortran_order': False, 'shape': (10, 22, 6), }
//
// Solo se aceptan los literales que np.save produce: strings, bools, None,
// enteros y tuplas de enteros.
//
// ============================================================================

use std::collections::HashMap;

use crate::error::{Result, TranscodeError};

/// Anidamiento máximo de tuplas (shape es plana)
const MAX_TUPLE_DEPTH: usize = 2;

/// Valor literal del header
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Tuple(Vec<PyValue>),
    None,
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0, depth: 0 }
    }

    fn error(&self, msg: &str) -> TranscodeError {
        TranscodeError::array(format!("malformed npy header at byte {}: {}", self.pos, msg))
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn expect(&mut self, c: u8) -> Result<()> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c as char)))
        }
    }

    fn parse_dict(&mut self) -> Result<HashMap<String, PyValue>> {
        self.expect(b'{')?;
        let mut dict = HashMap::new();

        loop {
            if self.peek() == Some(b'}') {
                self.pos += 1;
                break;
            }
            let key = match self.parse_value()? {
                PyValue::Str(s) => s,
                _ => return Err(self.error("dict keys must be strings")),
            };
            self.expect(b':')?;
            let value = self.parse_value()?;
            dict.insert(key, value);

            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }

        Ok(dict)
    }

    fn parse_value(&mut self) -> Result<PyValue> {
        match self.peek() {
            Some(b'\'') | Some(b'"') => self.parse_string(),
            Some(b'(') => self.parse_tuple(),
            Some(c) if c.is_ascii_digit() || c == b'-' => self.parse_int(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_ident(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of header")),
        }
    }

    fn parse_string(&mut self) -> Result<PyValue> {
        let quote = self.src[self.pos];
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos] != quote {
            self.pos += 1;
        }
        if self.pos >= self.src.len() {
            return Err(self.error("unterminated string"));
        }
        let s = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.pos += 1;
        Ok(PyValue::Str(s))
    }

    fn parse_int(&mut self) -> Result<PyValue> {
        let start = self.pos;
        if self.src[self.pos] == b'-' {
            self.pos += 1;
        }
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| self.error("invalid integer"))?;
        let value = text.parse::<i64>().map_err(|_| self.error("invalid integer"))?;
        // Sufijo 'L' de Python 2
        if self.src.get(self.pos) == Some(&b'L') {
            self.pos += 1;
        }
        Ok(PyValue::Int(value))
    }

    fn parse_ident(&mut self) -> Result<PyValue> {
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_alphanumeric() {
            self.pos += 1;
        }
        match &self.src[start..self.pos] {
            b"True" => Ok(PyValue::Bool(true)),
            b"False" => Ok(PyValue::Bool(false)),
            b"None" => Ok(PyValue::None),
            _ => Err(self.error("unknown identifier")),
        }
    }

    fn parse_tuple(&mut self) -> Result<PyValue> {
        if self.depth >= MAX_TUPLE_DEPTH {
            return Err(self.error("nested too deeply"));
        }
        self.expect(b'(')?;
        self.depth += 1;
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(b')') {
                self.pos += 1;
                break;
            }
            items.push(self.parse_value()?);
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {}
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
        self.depth -= 1;
        Ok(PyValue::Tuple(items))
    }
}

/// Campos del header que interesan al decoder
#[derive(Debug, Clone, PartialEq)]
pub struct NpyHeader {
    pub descr: String,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

impl NpyHeader {
    pub fn parse(text: &str) -> Result<Self> {
        let mut dict = Parser::new(text).parse_dict()?;

        let descr = match dict.remove("descr") {
            Some(PyValue::Str(s)) => s,
            Some(_) => return Err(TranscodeError::array("'descr' must be a string (structured dtypes are not supported)")),
            None => return Err(TranscodeError::array("npy header has no 'descr'")),
        };

        let fortran_order = match dict.remove("fortran_order") {
            Some(PyValue::Bool(b)) => b,
            Some(_) => return Err(TranscodeError::array("'fortran_order' must be a bool")),
            None => return Err(TranscodeError::array("npy header has no 'fortran_order'")),
        };

        let shape = match dict.remove("shape") {
            Some(PyValue::Tuple(items)) => items
                .into_iter()
                .map(|item| match item {
                    PyValue::Int(n) if n >= 0 => Ok(n as usize),
                    _ => Err(TranscodeError::array("'shape' must contain non-negative integers")),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(TranscodeError::array("'shape' must be a tuple")),
            None => return Err(TranscodeError::array("npy header has no 'shape'")),
        };

        Ok(Self { descr, fortran_order, shape })
    }
}
