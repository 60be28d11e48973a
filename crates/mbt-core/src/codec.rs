// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Conversion between register values and 16-bit wire words.
//!
//! All functions here are pure: they read the register's metadata (datatype,
//! byte order, word order, and for strings the length of the current value)
//! and never mutate it.
//!
//! # Wire layout
//!
//! A numeric value is laid out most significant byte first and split into
//! words. `Big` byte order then swaps the two bytes inside each word, and
//! `Little` word order reverses the word sequence so the least significant
//! word travels first. 8-bit types occupy the low byte of a single word.
//!
//! Strings are packed two bytes per word, first character in the high byte,
//! and are not affected by byte or word order. A string register has a fixed
//! length equal to the byte length of its current value; shorter inputs are
//! right-padded with spaces and longer ones truncated.
//!
//! # Examples
//!
//! ```
//! use mbt_core::codec;
//! use mbt_core::register::Register;
//! use mbt_core::types::{DataType, Value};
//!
//! let register = Register::new(10, DataType::Uint16, 0);
//! let value = codec::cast(&register, &Value::from("300")).unwrap();
//! assert_eq!(value, Value::Int(300));
//! assert_eq!(codec::encode(&register, &value).unwrap(), vec![300]);
//! ```

use crate::error::{CastError, CoreResult, DecodeError};
use crate::register::Register;
use crate::types::{DataType, Endian, Value};

// =============================================================================
// Width
// =============================================================================

/// Number of 16-bit words a register occupies on the wire.
///
/// Strings take `ceil(len / 2)` words; an empty string still takes one.
pub fn words_needed(register: &Register) -> usize {
    match register.dtype.fixed_width() {
        Some(width) => width,
        None => text_len(register).div_ceil(2).max(1),
    }
}

/// Declared byte length of a string register.
fn text_len(register: &Register) -> usize {
    match &register.value {
        Value::Text(s) => s.len(),
        other => other.to_string().len(),
    }
}

// =============================================================================
// Encode
// =============================================================================

/// Casts `value` to the register's datatype and encodes it into words.
pub fn encode(register: &Register, value: &Value) -> CoreResult<Vec<u16>> {
    let value = cast(register, value)?;
    Ok(pack(register, &value))
}

/// Encodes a value that already has the register's native type.
fn pack(register: &Register, value: &Value) -> Vec<u16> {
    match register.dtype.canonical() {
        DataType::Bit => vec![u16::from(truthy(value))],
        DataType::String => pack_text(value, words_needed(register)),
        dtype => {
            let bytes = numeric_bytes(dtype, value);
            let words = bytes
                .chunks(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            apply_order(words, register.byte_order, register.word_order)
        }
    }
}

fn numeric_bytes(dtype: DataType, value: &Value) -> Vec<u8> {
    let int = integer_of(value);
    let float = float_of(value);
    match dtype {
        DataType::Int8 => vec![0, int as i8 as u8],
        DataType::Uint8 => vec![0, int as u8],
        DataType::Int16 => (int as i16).to_be_bytes().to_vec(),
        DataType::Uint16 => (int as u16).to_be_bytes().to_vec(),
        DataType::Int32 => (int as i32).to_be_bytes().to_vec(),
        DataType::Uint32 => (int as u32).to_be_bytes().to_vec(),
        DataType::Float16 => half::f16::from_f64(float).to_be_bytes().to_vec(),
        DataType::Float32 => (float as f32).to_be_bytes().to_vec(),
        _ => float.to_be_bytes().to_vec(),
    }
}

fn pack_text(value: &Value, width: usize) -> Vec<u16> {
    let text = value.to_string();
    let mut bytes = text.into_bytes();
    bytes.resize(width * 2, b' ');
    bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Converts most-significant-first words into wire order.
fn apply_order(mut words: Vec<u16>, byte_order: Endian, word_order: Endian) -> Vec<u16> {
    if byte_order == Endian::Big {
        words.iter_mut().for_each(|w| *w = w.swap_bytes());
    }
    if word_order == Endian::Little {
        words.reverse();
    }
    words
}

/// Converts wire-order words back into most-significant-first order.
fn remove_order(words: &[u16], byte_order: Endian, word_order: Endian) -> Vec<u16> {
    let mut words = words.to_vec();
    if word_order == Endian::Little {
        words.reverse();
    }
    if byte_order == Endian::Big {
        words.iter_mut().for_each(|w| *w = w.swap_bytes());
    }
    words
}

// =============================================================================
// Decode
// =============================================================================

/// Decodes wire words into a native value.
///
/// Fails with [`DecodeError`] when the word count does not match
/// [`words_needed`] or string bytes are not valid UTF-8.
pub fn decode(register: &Register, words: &[u16]) -> Result<Value, DecodeError> {
    let expected = words_needed(register);
    if words.len() != expected {
        return Err(DecodeError::word_count(register.dtype.tag(), expected, words.len()));
    }

    let dtype = register.dtype.canonical();
    if dtype == DataType::Bit {
        return Ok(Value::Bool(words[0] != 0));
    }
    if dtype == DataType::String {
        let mut bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        bytes.truncate(text_len(register));
        return String::from_utf8(bytes)
            .map(Value::Text)
            .map_err(|e| DecodeError::invalid_text(register.dtype.tag(), e.utf8_error().valid_up_to()));
    }

    let ordered = remove_order(words, register.byte_order, register.word_order);
    let bytes: Vec<u8> = ordered.iter().flat_map(|w| w.to_be_bytes()).collect();

    let value = match dtype {
        DataType::Int8 => Value::Int(bytes[1] as i8 as i64),
        DataType::Uint8 => Value::Int(bytes[1] as i64),
        DataType::Int16 => Value::Int(i16::from_be_bytes([bytes[0], bytes[1]]) as i64),
        DataType::Uint16 => Value::Int(u16::from_be_bytes([bytes[0], bytes[1]]) as i64),
        DataType::Int32 => Value::Int(i32::from_be_bytes(quad(&bytes)) as i64),
        DataType::Uint32 => Value::Int(u32::from_be_bytes(quad(&bytes)) as i64),
        DataType::Float16 => {
            Value::Float(half::f16::from_be_bytes([bytes[0], bytes[1]]).to_f64())
        }
        DataType::Float32 => Value::Float(f32::from_be_bytes(quad(&bytes)) as f64),
        _ => {
            let mut octet = [0u8; 8];
            octet.copy_from_slice(&bytes[..8]);
            Value::Float(f64::from_be_bytes(octet))
        }
    };
    Ok(value)
}

fn quad(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

// =============================================================================
// Cast
// =============================================================================

/// Coerces a possibly mistyped input into the register's native type.
///
/// Integers wrap to the datatype's bit width, floats round-trip through the
/// datatype's precision, bits treat `"FALSE"` and `"0"` as false, and
/// strings are truncated or space-padded to the declared length.
pub fn cast(register: &Register, raw: &Value) -> Result<Value, CastError> {
    let dtype = register.dtype.canonical();
    match dtype {
        DataType::Bit => Ok(Value::Bool(truthy(raw))),
        DataType::String => Ok(Value::Text(fit_text(&raw.to_string(), text_len(register)))),
        _ if dtype.is_integer() => {
            let wide = parse_integer(raw)
                .ok_or_else(|| CastError::not_an_integer(register.dtype.tag(), raw))?;
            let wrapped = match dtype {
                DataType::Int8 => wide as i8 as i64,
                DataType::Uint8 => wide as u8 as i64,
                DataType::Int16 => wide as i16 as i64,
                DataType::Uint16 => wide as u16 as i64,
                DataType::Int32 => wide as i32 as i64,
                _ => wide as u32 as i64,
            };
            Ok(Value::Int(wrapped))
        }
        _ => {
            let wide =
                parse_float(raw).ok_or_else(|| CastError::not_a_float(register.dtype.tag(), raw))?;
            let narrowed = match dtype {
                DataType::Float16 => half::f16::from_f64(wide).to_f64(),
                DataType::Float32 => wide as f32 as f64,
                _ => wide,
            };
            Ok(Value::Float(narrowed))
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Text(s) => !(s.is_empty() || s == "0" || s.to_uppercase() == "FALSE"),
    }
}

fn parse_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Bool(b) => Some(i128::from(*b)),
        Value::Int(i) => Some(i128::from(*i)),
        Value::Float(f) if f.is_finite() => Some(f.trunc() as i128),
        Value::Float(_) => None,
        Value::Text(s) => s.trim().parse::<i128>().ok(),
    }
}

fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Text(s) => s.trim().parse::<f64>().ok(),
    }
}

fn integer_of(value: &Value) -> i128 {
    parse_integer(value).unwrap_or(0)
}

fn float_of(value: &Value) -> f64 {
    parse_float(value).unwrap_or(0.0)
}

/// Truncates on a character boundary, then pads with spaces to `len` bytes.
fn fit_text(input: &str, len: usize) -> String {
    let mut end = len.min(input.len());
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = input[..end].to_string();
    while out.len() < len {
        out.push(' ');
    }
    out
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ORDERS: [(Endian, Endian); 4] = [
        (Endian::Little, Endian::Little),
        (Endian::Little, Endian::Big),
        (Endian::Big, Endian::Little),
        (Endian::Big, Endian::Big),
    ];

    fn reg(dtype: DataType, bo: Endian, wo: Endian) -> Register {
        Register::new(0, dtype, 0)
            .with_byte_order(bo)
            .with_word_order(wo)
    }

    #[test]
    fn test_holding_register_scenario() {
        let r = reg(DataType::Uint16, Endian::Little, Endian::Little);
        let value = cast(&r, &Value::from("300")).unwrap();
        assert_eq!(value, Value::Int(300));
        assert_eq!(encode(&r, &value).unwrap(), vec![300]);
    }

    #[test]
    fn test_byte_and_word_order() {
        let r = reg(DataType::Uint16, Endian::Big, Endian::Little);
        assert_eq!(encode(&r, &Value::Int(0x012C)).unwrap(), vec![0x2C01]);

        let r = reg(DataType::Int32, Endian::Little, Endian::Little);
        assert_eq!(encode(&r, &Value::Int(0x12345678)).unwrap(), vec![0x5678, 0x1234]);

        let r = reg(DataType::Int32, Endian::Little, Endian::Big);
        assert_eq!(encode(&r, &Value::Int(0x12345678)).unwrap(), vec![0x1234, 0x5678]);

        let r = reg(DataType::Float32, Endian::Little, Endian::Big);
        assert_eq!(encode(&r, &Value::Float(1.0)).unwrap(), vec![0x3F80, 0x0000]);

        let r = reg(DataType::Uint8, Endian::Little, Endian::Little);
        assert_eq!(encode(&r, &Value::Int(0xAB)).unwrap(), vec![0x00AB]);
    }

    #[test]
    fn test_round_trip_at_boundaries() {
        let cases: Vec<(DataType, Vec<Value>)> = vec![
            (DataType::Int8, vec![(-128).into(), 127.into(), 0.into(), (-1).into()]),
            (DataType::Uint8, vec![0.into(), 255.into()]),
            (DataType::Int16, vec![i64::from(i16::MIN).into(), i64::from(i16::MAX).into(), (-1).into()]),
            (DataType::Uint16, vec![0.into(), 65535.into()]),
            (DataType::Int32, vec![i64::from(i32::MIN).into(), i64::from(i32::MAX).into(), (-1).into()]),
            (DataType::Uint32, vec![0.into(), i64::from(u32::MAX).into()]),
            (DataType::Float16, vec![0.0.into(), (-1.0).into(), 65504.0.into()]),
            (DataType::Float32, vec![f64::from(f32::MIN).into(), f64::from(f32::MAX).into(), (-1.0).into()]),
            (DataType::Float64, vec![f64::MIN.into(), f64::MAX.into(), 0.0.into()]),
            (DataType::Word, vec![(-1).into()]),
            (DataType::Int, vec![(-1).into()]),
            (DataType::Float, vec![1.5.into()]),
            (DataType::Double, vec![(-2.25).into()]),
            (DataType::Bit, vec![true.into(), false.into()]),
        ];

        for (dtype, values) in cases {
            for (bo, wo) in ORDERS {
                let r = reg(dtype, bo, wo);
                for value in &values {
                    let words = encode(&r, value).unwrap();
                    assert_eq!(words.len(), words_needed(&r), "{dtype} width");
                    assert_eq!(&decode(&r, &words).unwrap(), value, "{dtype} {bo}{wo}");
                }
            }
        }
    }

    #[test]
    fn test_string_encoding() {
        let r = Register::new(0, DataType::String, "HELLO");
        assert_eq!(words_needed(&r), 3);
        let words = encode(&r, &Value::from("HELLO")).unwrap();
        assert_eq!(words, vec![0x4845, 0x4C4C, 0x4F20]);
        assert_eq!(decode(&r, &words).unwrap(), Value::from("HELLO"));

        let r = Register::new(0, DataType::String, "ABCD");
        assert_eq!(cast(&r, &Value::from("xy")).unwrap(), Value::from("xy  "));
        assert_eq!(cast(&r, &Value::from("toolong")).unwrap(), Value::from("tool"));
        assert_eq!(encode(&r, &Value::Int(7)).unwrap(), vec![0x3720, 0x2020]);
    }

    #[test]
    fn test_string_decode_rejects_invalid_utf8() {
        let r = Register::new(0, DataType::String, "ab");
        assert_eq!(
            decode(&r, &[0xFF41]).unwrap_err(),
            DecodeError::invalid_text("string", 0)
        );

        // "é" is two bytes; a four byte register cut after "xyz" splits it.
        let r = Register::new(0, DataType::String, "abcd");
        assert!(matches!(
            decode(&r, &[0x7879, 0x7AC3, 0xA900]),
            Err(DecodeError::WordCount { .. })
        ));
        assert_eq!(
            decode(&r, &[0x7879, 0x7AC3]).unwrap_err(),
            DecodeError::invalid_text("string", 3)
        );

        let r = Register::new(0, DataType::String, "é!");
        assert_eq!(decode(&r, &[0xC3A9, 0x2100]).unwrap(), Value::from("é!"));
    }

    #[test]
    fn test_decode_word_count_mismatch() {
        let r = reg(DataType::Float32, Endian::Little, Endian::Little);
        let err = decode(&r, &[1]).unwrap_err();
        assert_eq!(err, DecodeError::word_count("float32", 2, 1));

        let r = reg(DataType::Bit, Endian::Little, Endian::Little);
        assert!(decode(&r, &[]).is_err());
    }

    #[test]
    fn test_integer_cast_wraps() {
        let r = reg(DataType::Uint8, Endian::Little, Endian::Little);
        assert_eq!(cast(&r, &Value::from("300")).unwrap(), Value::Int(44));

        let r = reg(DataType::Int16, Endian::Little, Endian::Little);
        assert_eq!(cast(&r, &Value::Int(40000)).unwrap(), Value::Int(-25536));

        let r = reg(DataType::Uint16, Endian::Little, Endian::Little);
        assert_eq!(cast(&r, &Value::Int(-1)).unwrap(), Value::Int(65535));
        assert_eq!(cast(&r, &Value::Float(12.9)).unwrap(), Value::Int(12));
        assert!(cast(&r, &Value::from("abc")).is_err());
    }

    #[test]
    fn test_float_cast_narrows() {
        let r = reg(DataType::Float32, Endian::Little, Endian::Little);
        assert_eq!(cast(&r, &Value::from("0.1")).unwrap(), Value::Float(0.1f32 as f64));
        assert!(cast(&r, &Value::from("x")).is_err());

        let r = reg(DataType::Float16, Endian::Little, Endian::Little);
        assert_eq!(cast(&r, &Value::Int(2)).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_boolean_cast() {
        let r = reg(DataType::Bit, Endian::Little, Endian::Little);
        assert_eq!(cast(&r, &Value::from("FALSE")).unwrap(), Value::Bool(false));
        assert_eq!(cast(&r, &Value::from("false")).unwrap(), Value::Bool(false));
        assert_eq!(cast(&r, &Value::from("0")).unwrap(), Value::Bool(false));
        assert_eq!(cast(&r, &Value::from("1")).unwrap(), Value::Bool(true));
        assert_eq!(cast(&r, &Value::from("anything")).unwrap(), Value::Bool(true));
        assert_eq!(cast(&r, &Value::Int(0)).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_cast_is_idempotent() {
        let inputs = [
            Value::from("-70000"),
            Value::from("3.14159"),
            Value::from("FALSE"),
            Value::Int(123456789),
            Value::Float(1e10),
        ];
        let dtypes = [
            DataType::Int8,
            DataType::Uint16,
            DataType::Int32,
            DataType::Uint32,
            DataType::Float16,
            DataType::Float32,
            DataType::Float64,
            DataType::Bit,
            DataType::String,
        ];
        for dtype in dtypes {
            let r = Register::new(0, dtype, "abc");
            for input in &inputs {
                if let Ok(once) = cast(&r, input) {
                    assert_eq!(cast(&r, &once).unwrap(), once, "{dtype} {input}");
                }
            }
        }
    }

    #[test]
    fn test_width_matches_encoding_for_odd_strings() {
        for text in ["", "A", "AB", "ABC", "ABCDEFG"] {
            let r = Register::new(0, DataType::String, text);
            let words = encode(&r, &r.value).unwrap();
            assert_eq!(words.len(), words_needed(&r), "{text:?}");
        }
    }
}
