// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register metadata and its construction from partial profile input.
//!
//! A profile file may leave out any register field. [`Register::from_spec`]
//! fills the gaps with the documented defaults and casts the initial value,
//! so every `Register` in memory is fully populated:
//!
//! | field   | default                                                    |
//! |---------|------------------------------------------------------------|
//! | `dtype` | forced to `bit` for `di`/`co`, `int16` for `hr`/`ir`        |
//! | `rtype` | forced to `r` for `di`/`ir`, `rw` for `co`/`hr`             |
//! | `dsc`   | `Unknown`                                                  |
//! | `bo`    | `<`                                                        |
//! | `wo`    | `<`                                                        |
//! | `value` | `0` (empty text for strings)                               |

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::ValidationError;
use crate::types::{Access, DataType, Endian, RegisterClass, Value};

/// Description used when a profile omits `dsc`.
pub const DEFAULT_DESCRIPTION: &str = "Unknown";

// =============================================================================
// RegisterSpec
// =============================================================================

/// A register as written in a profile file, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterSpec {
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsc: Option<String>,
    /// Datatype tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    /// Access mode (`r` or `rw`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtype: Option<String>,
    /// Byte order (`<` or `>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bo: Option<String>,
    /// Word order (`<` or `>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wo: Option<String>,
    /// Initial value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

// =============================================================================
// Register
// =============================================================================

/// One addressable, fully populated register.
#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    /// Register address as declared in the profile.
    pub address: u16,
    /// Human-readable description.
    pub description: String,
    /// Datatype tag.
    pub dtype: DataType,
    /// Access mode.
    pub access: Access,
    /// Byte order within each word.
    pub byte_order: Endian,
    /// Word order within multi-word values.
    pub word_order: Endian,
    /// Current value, always in native decoded form.
    pub value: Value,
}

impl Register {
    /// Creates a read-write register with default orders and description.
    ///
    /// The value is taken as given; use [`codec::cast`] first when it comes
    /// from untrusted input.
    pub fn new(address: u16, dtype: DataType, value: impl Into<Value>) -> Self {
        Self {
            address,
            description: DEFAULT_DESCRIPTION.to_string(),
            dtype,
            access: Access::ReadWrite,
            byte_order: Endian::Little,
            word_order: Endian::Little,
            value: value.into(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the access mode.
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Sets the byte order.
    pub fn with_byte_order(mut self, order: Endian) -> Self {
        self.byte_order = order;
        self
    }

    /// Sets the word order.
    pub fn with_word_order(mut self, order: Endian) -> Self {
        self.word_order = order;
        self
    }

    /// Builds a register from partial profile input plus defaults.
    ///
    /// The initial value is cast to the resolved datatype; a value that
    /// cannot be cast is a validation failure.
    pub fn from_spec(
        class: RegisterClass,
        address: u16,
        spec: &RegisterSpec,
    ) -> Result<Self, ValidationError> {
        let dtype = if class.is_bit() {
            DataType::Bit
        } else {
            match spec.dtype.as_deref() {
                Some(tag) => tag.parse()?,
                None => DataType::Int16,
            }
        };

        let access = if class.is_writable() {
            match spec.rtype.as_deref() {
                Some(symbol) => symbol.parse()?,
                None => Access::ReadWrite,
            }
        } else {
            Access::ReadOnly
        };

        let byte_order = match spec.bo.as_deref() {
            Some(symbol) => symbol.parse()?,
            None => Endian::Little,
        };
        let word_order = match spec.wo.as_deref() {
            Some(symbol) => symbol.parse()?,
            None => Endian::Little,
        };

        let raw = match (&spec.value, dtype) {
            (Some(value), DataType::String) => Value::Text(value.to_string()),
            (Some(value), _) => value.clone(),
            (None, DataType::String) => Value::Text(String::new()),
            (None, _) => Value::Int(0),
        };

        let mut register = Self {
            address,
            description: spec
                .dsc
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            dtype,
            access,
            byte_order,
            word_order,
            value: raw.clone(),
        };

        register.value =
            codec::cast(&register, &raw).map_err(|source| ValidationError::InitialValue {
                class: class.key().to_string(),
                address,
                source,
            })?;

        Ok(register)
    }

    /// Returns the fully populated spec for serialization.
    pub fn to_spec(&self) -> RegisterSpec {
        RegisterSpec {
            dsc: Some(self.description.clone()),
            dtype: Some(self.dtype.tag().to_string()),
            rtype: Some(self.access.symbol().to_string()),
            bo: Some(self.byte_order.symbol().to_string()),
            wo: Some(self.word_order.symbol().to_string()),
            value: Some(self.value.clone()),
        }
    }

    /// Width of this register in 16-bit words.
    pub fn width(&self) -> usize {
        codec::words_needed(self)
    }

    /// Returns `true` if every word of this register has an address.
    pub fn fits_address_space(&self) -> bool {
        self.address as usize + self.width() <= u16::MAX as usize + 1
    }

    /// Returns `true` if `address` falls inside this register's words.
    pub fn covers(&self, address: u16) -> bool {
        let start = self.address as usize;
        let address = address as usize;
        address >= start && address < start + self.width()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(json: &str) -> RegisterSpec {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults_for_holding_register() {
        let r = Register::from_spec(RegisterClass::HoldingRegister, 10, &spec("{}")).unwrap();
        assert_eq!(r.dtype, DataType::Int16);
        assert_eq!(r.access, Access::ReadWrite);
        assert_eq!(r.description, "Unknown");
        assert_eq!(r.byte_order, Endian::Little);
        assert_eq!(r.word_order, Endian::Little);
        assert_eq!(r.value, Value::Int(0));
    }

    #[test]
    fn test_bit_classes_force_bit() {
        let r = Register::from_spec(
            RegisterClass::DiscreteInput,
            1,
            &spec(r#"{"dtype":"float32","rtype":"rw","value":1}"#),
        )
        .unwrap();
        assert_eq!(r.dtype, DataType::Bit);
        assert_eq!(r.access, Access::ReadOnly);
        assert_eq!(r.value, Value::Bool(true));

        let r = Register::from_spec(RegisterClass::Coil, 1, &spec("{}")).unwrap();
        assert_eq!(r.access, Access::ReadWrite);
        assert_eq!(r.value, Value::Bool(false));
    }

    #[test]
    fn test_input_register_forced_read_only() {
        let r = Register::from_spec(
            RegisterClass::InputRegister,
            3,
            &spec(r#"{"dtype":"uint32","rtype":"rw","value":"70000"}"#),
        )
        .unwrap();
        assert_eq!(r.access, Access::ReadOnly);
        assert_eq!(r.dtype, DataType::Uint32);
        assert_eq!(r.value, Value::Int(70000));
        assert_eq!(r.width(), 2);
    }

    #[test]
    fn test_string_register() {
        let r = Register::from_spec(
            RegisterClass::HoldingRegister,
            20,
            &spec(r#"{"dtype":"string","value":"HELLO"}"#),
        )
        .unwrap();
        assert_eq!(r.value, Value::Text("HELLO".into()));
        assert_eq!(r.width(), 3);
        assert!(r.covers(22));
        assert!(!r.covers(23));
    }

    #[test]
    fn test_invalid_metadata() {
        assert!(Register::from_spec(
            RegisterClass::HoldingRegister,
            1,
            &spec(r#"{"dtype":"complex"}"#)
        )
        .is_err());
        assert!(Register::from_spec(
            RegisterClass::HoldingRegister,
            1,
            &spec(r#"{"dtype":"uint16","value":"abc"}"#)
        )
        .is_err());
        assert!(Register::from_spec(RegisterClass::HoldingRegister, 1, &spec(r#"{"bo":"?"}"#)).is_err());
    }

    #[test]
    fn test_to_spec_is_complete() {
        let r = Register::new(5, DataType::Word, 12).with_description("Setpoint");
        let s = r.to_spec();
        assert_eq!(s.dsc.as_deref(), Some("Setpoint"));
        assert_eq!(s.dtype.as_deref(), Some("word"));
        assert_eq!(s.rtype.as_deref(), Some("rw"));
        assert_eq!(s.bo.as_deref(), Some("<"));
        assert_eq!(s.value, Some(Value::Int(12)));
    }
}
