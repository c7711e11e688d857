//! Struct-style field layouts
//!
//! The firmware describes each function by two short strings such as `"Bc"`
//! or `"IB"`. Each character is a little-endian primitive field code. The
//! single code `s` has a special meaning: as an argument layout the one
//! argument is sent unmodified (raw bytes), as a return layout the whole
//! payload is text.

use crate::error::{BincomsError, BincomsResult};
use crate::value::Value;
use bytes::{Buf, BufMut};
use std::fmt;

/// Layout string marking a raw argument or a text result.
pub const STRING_MARKER: &str = "s";

/// Primitive field code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCode {
    /// `b`
    I8,
    /// `B`
    U8,
    /// `c`
    Char,
    /// `?`
    Bool,
    /// `h`
    I16,
    /// `H`
    U16,
    /// `i`
    I32,
    /// `I`
    U32,
    /// `q`
    I64,
    /// `Q`
    U64,
    /// `f`
    F32,
    /// `d`
    F64,
}

impl FieldCode {
    pub fn from_char(code: char) -> BincomsResult<Self> {
        Ok(match code {
            'b' => FieldCode::I8,
            'B' => FieldCode::U8,
            'c' => FieldCode::Char,
            '?' => FieldCode::Bool,
            'h' => FieldCode::I16,
            'H' => FieldCode::U16,
            'i' => FieldCode::I32,
            'I' => FieldCode::U32,
            'q' => FieldCode::I64,
            'Q' => FieldCode::U64,
            'f' => FieldCode::F32,
            'd' => FieldCode::F64,
            other => return Err(BincomsError::UnknownFieldCode(other)),
        })
    }

    pub fn as_char(self) -> char {
        match self {
            FieldCode::I8 => 'b',
            FieldCode::U8 => 'B',
            FieldCode::Char => 'c',
            FieldCode::Bool => '?',
            FieldCode::I16 => 'h',
            FieldCode::U16 => 'H',
            FieldCode::I32 => 'i',
            FieldCode::U32 => 'I',
            FieldCode::I64 => 'q',
            FieldCode::U64 => 'Q',
            FieldCode::F32 => 'f',
            FieldCode::F64 => 'd',
        }
    }

    /// Encoded width in bytes.
    pub fn size(self) -> usize {
        match self {
            FieldCode::I8 | FieldCode::U8 | FieldCode::Char | FieldCode::Bool => 1,
            FieldCode::I16 | FieldCode::U16 => 2,
            FieldCode::I32 | FieldCode::U32 | FieldCode::F32 => 4,
            FieldCode::I64 | FieldCode::U64 | FieldCode::F64 => 8,
        }
    }

    fn integer_range(self) -> Option<(i128, i128)> {
        match self {
            FieldCode::I8 => Some((i8::MIN as i128, i8::MAX as i128)),
            FieldCode::U8 | FieldCode::Char => Some((0, u8::MAX as i128)),
            FieldCode::Bool => Some((0, 1)),
            FieldCode::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
            FieldCode::U16 => Some((0, u16::MAX as i128)),
            FieldCode::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
            FieldCode::U32 => Some((0, u32::MAX as i128)),
            FieldCode::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
            FieldCode::U64 => Some((0, u64::MAX as i128)),
            FieldCode::F32 | FieldCode::F64 => None,
        }
    }

    /// Pack one value into `buf`.
    ///
    /// Integers are accepted for any integer field they fit in, numbers of
    /// either kind for float fields, and one-byte text for `c`.
    pub fn pack<B: BufMut>(self, index: usize, value: &Value, buf: &mut B) -> BincomsResult<()> {
        let mismatch = || BincomsError::ArgumentType {
            index,
            expected: self.as_char().to_string(),
            found: value.to_string(),
        };

        match self {
            FieldCode::F32 => buf.put_f32_le(value.as_f64().ok_or_else(mismatch)? as f32),
            FieldCode::F64 => buf.put_f64_le(value.as_f64().ok_or_else(mismatch)?),
            _ => {
                let integer = match (self, value) {
                    (FieldCode::Char, Value::Text(s)) if s.len() == 1 => s.as_bytes()[0] as i128,
                    (FieldCode::Char, Value::Bytes(b)) if b.len() == 1 => b[0] as i128,
                    _ => value.as_integer().ok_or_else(mismatch)?,
                };
                let (min, max) = self.integer_range().ok_or_else(mismatch)?;
                if integer < min || integer > max {
                    return Err(mismatch());
                }
                match self {
                    FieldCode::I8 => buf.put_i8(integer as i8),
                    FieldCode::U8 | FieldCode::Char | FieldCode::Bool => buf.put_u8(integer as u8),
                    FieldCode::I16 => buf.put_i16_le(integer as i16),
                    FieldCode::U16 => buf.put_u16_le(integer as u16),
                    FieldCode::I32 => buf.put_i32_le(integer as i32),
                    FieldCode::U32 => buf.put_u32_le(integer as u32),
                    FieldCode::I64 => buf.put_i64_le(integer as i64),
                    FieldCode::U64 => buf.put_u64_le(integer as u64),
                    FieldCode::F32 | FieldCode::F64 => return Err(mismatch()),
                }
            }
        }
        Ok(())
    }

    /// Unpack one value. The caller guarantees `buf` holds at least `size()` bytes.
    pub fn unpack<B: Buf>(self, buf: &mut B) -> Value {
        match self {
            FieldCode::I8 => Value::I8(buf.get_i8()),
            FieldCode::U8 => Value::U8(buf.get_u8()),
            FieldCode::Char => Value::Char(buf.get_u8()),
            FieldCode::Bool => Value::Bool(buf.get_u8() != 0),
            FieldCode::I16 => Value::I16(buf.get_i16_le()),
            FieldCode::U16 => Value::U16(buf.get_u16_le()),
            FieldCode::I32 => Value::I32(buf.get_i32_le()),
            FieldCode::U32 => Value::U32(buf.get_u32_le()),
            FieldCode::I64 => Value::I64(buf.get_i64_le()),
            FieldCode::U64 => Value::U64(buf.get_u64_le()),
            FieldCode::F32 => Value::F32(buf.get_f32_le()),
            FieldCode::F64 => Value::F64(buf.get_f64_le()),
        }
    }
}

fn parse_fields(layout: &str) -> BincomsResult<Vec<FieldCode>> {
    layout.chars().map(FieldCode::from_char).collect()
}

fn fields_to_string(fields: &[FieldCode]) -> String {
    fields.iter().map(|f| f.as_char()).collect()
}

/// How call arguments are packed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentLayout {
    /// One argument forwarded without encoding
    Raw,
    Fields(Vec<FieldCode>),
}

impl ArgumentLayout {
    pub fn parse(layout: &str) -> BincomsResult<Self> {
        if layout == STRING_MARKER {
            Ok(ArgumentLayout::Raw)
        } else {
            Ok(ArgumentLayout::Fields(parse_fields(layout)?))
        }
    }

    /// Number of arguments a call must provide.
    pub fn arity(&self) -> usize {
        match self {
            ArgumentLayout::Raw => 1,
            ArgumentLayout::Fields(fields) => fields.len(),
        }
    }

    /// Pack `args` in order. The caller is expected to have checked the arity.
    pub fn pack<B: BufMut>(&self, args: &[Value], buf: &mut B) -> BincomsResult<()> {
        match self {
            ArgumentLayout::Raw => match args.first() {
                Some(Value::Bytes(bytes)) => buf.put_slice(bytes),
                Some(Value::Text(text)) => buf.put_slice(text.as_bytes()),
                Some(other) => {
                    return Err(BincomsError::ArgumentType {
                        index: 0,
                        expected: STRING_MARKER.to_string(),
                        found: other.to_string(),
                    });
                }
                None => {}
            },
            ArgumentLayout::Fields(fields) => {
                for (index, (field, value)) in fields.iter().zip(args).enumerate() {
                    field.pack(index, value, buf)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for ArgumentLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentLayout::Raw => f.write_str(STRING_MARKER),
            ArgumentLayout::Fields(fields) => f.write_str(&fields_to_string(fields)),
        }
    }
}

/// How a response payload is decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnLayout {
    /// Whole payload is a string
    Text,
    Fields(Vec<FieldCode>),
}

impl ReturnLayout {
    pub fn parse(layout: &str) -> BincomsResult<Self> {
        if layout == STRING_MARKER {
            Ok(ReturnLayout::Text)
        } else {
            Ok(ReturnLayout::Fields(parse_fields(layout)?))
        }
    }

    /// Exact payload size for field layouts, `None` for text.
    pub fn expected_size(&self) -> Option<usize> {
        match self {
            ReturnLayout::Text => None,
            ReturnLayout::Fields(fields) => Some(fields.iter().map(|f| f.size()).sum()),
        }
    }

    /// Decode a payload.
    ///
    /// Returns `None` when the payload does not match the layout; the caller
    /// decides how to recover the link.
    pub fn unpack(&self, payload: &[u8]) -> Option<Value> {
        match self {
            ReturnLayout::Text => std::str::from_utf8(payload)
                .ok()
                .map(|s| Value::Text(s.to_string())),
            ReturnLayout::Fields(fields) => {
                if self.expected_size() != Some(payload.len()) {
                    return None;
                }
                let mut buf = payload;
                let mut values: Vec<Value> = fields.iter().map(|f| f.unpack(&mut buf)).collect();
                Some(match values.len() {
                    0 => Value::Unit,
                    1 => values.remove(0),
                    _ => Value::Tuple(values),
                })
            }
        }
    }
}

impl fmt::Display for ReturnLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnLayout::Text => f.write_str(STRING_MARKER),
            ReturnLayout::Fields(fields) => f.write_str(&fields_to_string(fields)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layouts() {
        assert_eq!(ArgumentLayout::parse("s").unwrap(), ArgumentLayout::Raw);
        assert_eq!(ReturnLayout::parse("s").unwrap(), ReturnLayout::Text);
        let args = ArgumentLayout::parse("Bc").unwrap();
        assert_eq!(args.arity(), 2);
        assert_eq!(args.to_string(), "Bc");
        assert_eq!(ArgumentLayout::parse("").unwrap().arity(), 0);
    }

    #[test]
    fn test_unknown_code_fails() {
        match ArgumentLayout::parse("Bx") {
            Err(BincomsError::UnknownFieldCode('x')) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(ReturnLayout::parse("<I").is_err());
    }

    #[test]
    fn test_pack_little_endian() {
        let layout = ArgumentLayout::parse("BHf").unwrap();
        let mut buf = Vec::new();
        layout
            .pack(&[Value::U8(3), Value::U32(0x0102), Value::F64(1.0)], &mut buf)
            .unwrap();
        assert_eq!(buf, vec![3, 0x02, 0x01, 0x00, 0x00, 0x80, 0x3F]);
    }

    #[test]
    fn test_pack_char_from_text() {
        let layout = ArgumentLayout::parse("Bc").unwrap();
        let mut buf = Vec::new();
        layout.pack(&[Value::I64(0), Value::from("r")], &mut buf).unwrap();
        assert_eq!(buf, vec![0, b'r']);
    }

    #[test]
    fn test_pack_out_of_range() {
        let layout = ArgumentLayout::parse("B").unwrap();
        let mut buf = Vec::new();
        match layout.pack(&[Value::I32(300)], &mut buf) {
            Err(BincomsError::ArgumentType { index: 0, .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(layout.pack(&[Value::I32(-1)], &mut buf).is_err());
        assert!(layout.pack(&[Value::F32(1.0)], &mut buf).is_err());
    }

    #[test]
    fn test_pack_raw() {
        let mut buf = Vec::new();
        ArgumentLayout::Raw
            .pack(&[Value::Bytes(vec![0, 1, 0xFF])], &mut buf)
            .unwrap();
        assert_eq!(buf, vec![0, 1, 0xFF]);
    }

    #[test]
    fn test_unpack_values() {
        let single = ReturnLayout::parse("H").unwrap();
        assert_eq!(single.unpack(&[0x10, 0x27]), Some(Value::U16(10000)));

        let pair = ReturnLayout::parse("IB").unwrap();
        assert_eq!(pair.expected_size(), Some(5));
        assert_eq!(
            pair.unpack(&[1, 0, 0, 0, 0xFF]),
            Some(Value::Tuple(vec![Value::U32(1), Value::U8(0xFF)]))
        );

        let empty = ReturnLayout::parse("").unwrap();
        assert_eq!(empty.unpack(&[]), Some(Value::Unit));

        assert_eq!(
            ReturnLayout::Text.unpack(b"start"),
            Some(Value::Text("start".into()))
        );
    }

    #[test]
    fn test_unpack_size_mismatch() {
        let layout = ReturnLayout::parse("H").unwrap();
        assert_eq!(layout.unpack(&[1]), None);
        assert_eq!(layout.unpack(&[1, 2, 3]), None);
        assert_eq!(ReturnLayout::parse("").unwrap().unpack(&[0]), None);
        assert_eq!(ReturnLayout::Text.unpack(&[0xFF, 0xFE]), None);
    }
}
