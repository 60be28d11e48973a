// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register model primitives.
//!
//! - **RegisterClass**: the four register banks (`di`, `co`, `hr`, `ir`)
//! - **DataType**: the datatype tags a profile may declare, aliases included
//! - **Endian**: byte order within a word, or word order within a value
//! - **Access**: read-only or read-write access mode
//! - **Value**: a decoded scalar as held in a profile
//!
//! # Examples
//!
//! ```
//! use mbt_core::types::{DataType, RegisterClass};
//!
//! let class: RegisterClass = "hr".parse().unwrap();
//! assert!(class.is_writable());
//!
//! let dtype: DataType = "word".parse().unwrap();
//! assert_eq!(dtype.canonical(), DataType::Int16);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

// =============================================================================
// RegisterClass
// =============================================================================

/// One of the four protocol-defined register banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterClass {
    /// Discrete input (read-only, 1 bit).
    DiscreteInput,
    /// Coil (read/write, 1 bit).
    Coil,
    /// Holding register (read/write, 16-bit words).
    HoldingRegister,
    /// Input register (read-only, 16-bit words).
    InputRegister,
}

impl RegisterClass {
    /// All register classes in profile order.
    pub const ALL: [RegisterClass; 4] = [
        Self::DiscreteInput,
        Self::Coil,
        Self::HoldingRegister,
        Self::InputRegister,
    ];

    /// Returns `true` if remote writes are permitted for this class.
    #[inline]
    pub const fn is_writable(&self) -> bool {
        matches!(self, Self::Coil | Self::HoldingRegister)
    }

    /// Returns `true` if this is a bit-type class.
    #[inline]
    pub const fn is_bit(&self) -> bool {
        matches!(self, Self::Coil | Self::DiscreteInput)
    }

    /// Returns `true` if this is a word-type class.
    #[inline]
    pub const fn is_word(&self) -> bool {
        matches!(self, Self::HoldingRegister | Self::InputRegister)
    }

    /// Returns the profile key (`di`, `co`, `hr`, `ir`).
    pub const fn key(&self) -> &'static str {
        match self {
            Self::DiscreteInput => "di",
            Self::Coil => "co",
            Self::HoldingRegister => "hr",
            Self::InputRegister => "ir",
        }
    }

    /// Returns the human-readable bank name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DiscreteInput => "Discrete input",
            Self::Coil => "Coil",
            Self::HoldingRegister => "Holding register",
            Self::InputRegister => "Input register",
        }
    }

    /// Returns the function code used to read this class.
    pub const fn read_function_code(&self) -> u8 {
        match self {
            Self::Coil => 0x01,
            Self::DiscreteInput => 0x02,
            Self::HoldingRegister => 0x03,
            Self::InputRegister => 0x04,
        }
    }

    /// Returns the function code used to write this class, if writable.
    pub const fn write_function_code(&self) -> Option<u8> {
        match self {
            Self::Coil => Some(0x05),
            Self::HoldingRegister => Some(0x10),
            Self::DiscreteInput | Self::InputRegister => None,
        }
    }
}

impl fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RegisterClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "di" | "discreteinput" | "discreteinputs" => Ok(Self::DiscreteInput),
            "co" | "coil" | "coils" => Ok(Self::Coil),
            "hr" | "holdingregister" | "holdingregisters" => Ok(Self::HoldingRegister),
            "ir" | "inputregister" | "inputregisters" => Ok(Self::InputRegister),
            _ => Err(ValidationError::unknown_class(s)),
        }
    }
}

impl Serialize for RegisterClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for RegisterClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// DataType
// =============================================================================

/// Datatype tag of a register.
///
/// `Word`, `Int`, `Float` and `Double` are aliases kept distinct so that a
/// saved profile reproduces the tag it was loaded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Single boolean.
    Bit,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    Uint8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    Uint32,
    /// IEEE 754 half precision float.
    Float16,
    /// IEEE 754 single precision float.
    Float32,
    /// IEEE 754 double precision float.
    Float64,
    /// Fixed-length text, two bytes per word.
    String,
    /// Alias of `Int16`.
    Word,
    /// Alias of `Int32`.
    Int,
    /// Alias of `Float32`.
    Float,
    /// Alias of `Float64`.
    Double,
}

impl DataType {
    /// Resolves aliases to their canonical type.
    pub const fn canonical(self) -> DataType {
        match self {
            Self::Word => Self::Int16,
            Self::Int => Self::Int32,
            Self::Float => Self::Float32,
            Self::Double => Self::Float64,
            other => other,
        }
    }

    /// Returns the tag as written in profiles.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Bit => "bit",
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Word => "word",
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// Returns the width in 16-bit words, or `None` for strings whose
    /// width depends on the declared length.
    pub const fn fixed_width(&self) -> Option<usize> {
        match self.canonical() {
            Self::Bit | Self::Int8 | Self::Uint8 | Self::Int16 | Self::Uint16 | Self::Float16 => {
                Some(1)
            }
            Self::Int32 | Self::Uint32 | Self::Float32 => Some(2),
            Self::Float64 => Some(4),
            _ => None,
        }
    }

    /// Returns `true` for integer types.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self.canonical(),
            Self::Int8 | Self::Uint8 | Self::Int16 | Self::Uint16 | Self::Int32 | Self::Uint32
        )
    }

    /// Returns `true` for floating point types.
    pub const fn is_float(&self) -> bool {
        matches!(self.canonical(), Self::Float16 | Self::Float32 | Self::Float64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for DataType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dtype = match s.trim().to_lowercase().as_str() {
            "bit" | "bool" => Self::Bit,
            "int8" => Self::Int8,
            "uint8" => Self::Uint8,
            "int16" => Self::Int16,
            "uint16" => Self::Uint16,
            "int32" => Self::Int32,
            "uint32" => Self::Uint32,
            "float16" => Self::Float16,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "string" => Self::String,
            "word" => Self::Word,
            "int" => Self::Int,
            "float" => Self::Float,
            "double" => Self::Double,
            _ => return Err(ValidationError::unknown_data_type(s)),
        };
        Ok(dtype)
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Endian
// =============================================================================

/// Ordering of bytes within a word, or of words within a multi-word value.
///
/// Profiles write these as `<` (little) and `>` (big). With `Little` byte
/// order a word carries its 16 bits in natural significance, so the integer
/// 300 encodes as the word `300`; `Big` swaps the two bytes of every word.
/// With `Little` word order the least significant word comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    /// `<`
    #[default]
    Little,
    /// `>`
    Big,
}

impl Endian {
    /// Returns the profile symbol.
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Little => "<",
            Self::Big => ">",
        }
    }
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Endian {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "<" | "little" | "le" => Ok(Self::Little),
            ">" | "big" | "be" | "!" => Ok(Self::Big),
            _ => Err(ValidationError::invalid_field("bo/wo", format!("unknown order '{s}'"))),
        }
    }
}

impl Serialize for Endian {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Endian {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Access
// =============================================================================

/// Access mode of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// `r`
    ReadOnly,
    /// `rw`
    ReadWrite,
}

impl Access {
    /// Returns the profile symbol.
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::ReadOnly => "r",
            Self::ReadWrite => "rw",
        }
    }

    /// Returns `true` if writes are permitted.
    pub const fn is_writable(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl FromStr for Access {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "r" | "ro" => Ok(Self::ReadOnly),
            "rw" | "wr" | "w" => Ok(Self::ReadWrite),
            _ => Err(ValidationError::invalid_field("rtype", format!("unknown access '{s}'"))),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Serialize for Access {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Access {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A decoded register value.
///
/// After casting, the variant always matches the register's datatype:
/// `Bool` for bits, `Int` for integer types, `Float` for float types and
/// `Text` for strings. Before casting it may be anything a human typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Integer, wide enough for every integer datatype.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
}

impl Value {
    /// Returns the boolean, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is an `Int`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a float view of numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the text, if this is a `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the variant name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// =============================================================================
// Tests
// =============================================================================
