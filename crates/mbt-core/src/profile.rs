// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The declarative register bank.
//!
//! A profile is a JSON document:
//!
//! ```json
//! {
//!     "identity": "Demo device",
//!     "datablocks": {
//!         "hr": { "10": { "dsc": "Setpoint", "dtype": "uint16", "value": 300 } }
//!     }
//! }
//! ```
//!
//! Loading fills metadata defaults and casts every value once (see
//! [`Register::from_spec`]). After that the profile is only mutated through
//! store and session operations. Saving rewrites the whole document with the
//! current values, four-space indented, addresses in numeric order.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

use crate::codec;
use crate::error::{CoreResult, ProfileError, ValidationError};
use crate::register::{Register, RegisterSpec};
use crate::types::{RegisterClass, Value};

/// Registers of one class, keyed and iterated by address.
pub type RegisterBank = BTreeMap<u16, Register>;

/// A profile shared between the store, sessions and workers.
pub type SharedProfile = Arc<RwLock<Profile>>;

/// Raw document shape as found on disk.
#[derive(Debug, Default, Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    identity: String,
    #[serde(default)]
    datablocks: BTreeMap<String, BTreeMap<String, RegisterSpec>>,
}

// =============================================================================
// Profile
// =============================================================================

/// Identity plus the four register banks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    /// Free-form device identity.
    pub identity: String,
    banks: [RegisterBank; 4],
}

const fn slot(class: RegisterClass) -> usize {
    match class {
        RegisterClass::DiscreteInput => 0,
        RegisterClass::Coil => 1,
        RegisterClass::HoldingRegister => 2,
        RegisterClass::InputRegister => 3,
    }
}

impl Profile {
    /// Creates an empty profile.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            banks: Default::default(),
        }
    }

    /// Parses and validates a profile from JSON text.
    pub fn from_json_str(text: &str) -> CoreResult<Self> {
        let document: ProfileDocument = serde_json::from_str(text)
            .map_err(|e| ProfileError::parse("<string>", e.to_string()))?;
        Ok(Self::from_document(document)?)
    }

    /// Loads a profile file.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ProfileError::io(path, e))?;
        let document: ProfileDocument =
            serde_json::from_str(&text).map_err(|e| ProfileError::parse(path, e.to_string()))?;
        let profile = Self::from_document(document)?;
        tracing::debug!(
            path = %path.display(),
            registers = profile.len(),
            "Profile loaded"
        );
        Ok(profile)
    }

    fn from_document(document: ProfileDocument) -> Result<Self, ValidationError> {
        let mut profile = Self::new(document.identity);

        for (key, registers) in &document.datablocks {
            let class: RegisterClass = key.parse()?;
            for (address, spec) in registers {
                let address: u16 = address
                    .trim()
                    .parse()
                    .map_err(|_| ValidationError::invalid_address(class.key(), address.as_str()))?;
                let register = Register::from_spec(class, address, spec)?;
                if !register.fits_address_space() {
                    return Err(ValidationError::address_overflow(
                        class.key(),
                        address,
                        register.width(),
                    ));
                }
                if profile.banks[slot(class)].contains_key(&address) {
                    return Err(ValidationError::Overlap {
                        class: class.key().to_string(),
                        address,
                        other: address,
                    });
                }
                profile.banks[slot(class)].insert(address, register);
            }
        }

        profile.check_overlaps()?;
        Ok(profile)
    }

    fn check_overlaps(&self) -> Result<(), ValidationError> {
        for class in RegisterClass::ALL {
            let mut previous: Option<&Register> = None;
            for register in self.bank(class).values() {
                if let Some(prev) = previous {
                    if prev.covers(register.address) {
                        return Err(ValidationError::Overlap {
                            class: class.key().to_string(),
                            address: register.address,
                            other: prev.address,
                        });
                    }
                }
                previous = Some(register);
            }
        }
        Ok(())
    }

    /// Serializes to pretty JSON with four-space indentation.
    pub fn to_json_string(&self) -> CoreResult<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)
            .map_err(|e| ProfileError::Serialize { message: e.to_string() })?;
        String::from_utf8(out)
            .map_err(|e| ProfileError::Serialize { message: e.to_string() }.into())
    }

    /// Writes the whole profile, current values included.
    pub fn save(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        let text = self.to_json_string()?;
        fs::write(path, text).map_err(|e| ProfileError::io(path, e))?;
        tracing::info!(path = %path.display(), "Profile saved");
        Ok(())
    }

    /// Wraps the profile for sharing.
    pub fn into_shared(self) -> SharedProfile {
        Arc::new(RwLock::new(self))
    }

    /// Registers of one class.
    pub fn bank(&self, class: RegisterClass) -> &RegisterBank {
        &self.banks[slot(class)]
    }

    /// Looks up a register by its start address.
    pub fn register(&self, class: RegisterClass, address: u16) -> Option<&Register> {
        self.banks[slot(class)].get(&address)
    }

    /// Mutable lookup by start address.
    pub fn register_mut(&mut self, class: RegisterClass, address: u16) -> Option<&mut Register> {
        self.banks[slot(class)].get_mut(&address)
    }

    /// Finds the register whose words include `address`.
    pub fn covering(&self, class: RegisterClass, address: u16) -> Option<&Register> {
        self.banks[slot(class)]
            .range(..=address)
            .next_back()
            .map(|(_, r)| r)
            .filter(|r| r.covers(address))
    }

    /// Inserts or replaces a register.
    pub fn insert(&mut self, class: RegisterClass, mut register: Register) {
        if class.is_bit() {
            register.dtype = crate::types::DataType::Bit;
        }
        self.banks[slot(class)].insert(register.address, register);
    }

    /// Casts `value` and stores it as the register's current value.
    ///
    /// Returns the stored, cast value. Nothing changes on failure.
    pub fn set_value(
        &mut self,
        class: RegisterClass,
        address: u16,
        value: &Value,
    ) -> CoreResult<Value> {
        let register = self
            .register_mut(class, address)
            .ok_or_else(|| ValidationError::invalid_address(class.key(), address.to_string()))?;
        let cast = codec::cast(register, value)?;
        register.value = cast.clone();
        Ok(cast)
    }

    /// Iterates every register in class order, then address order.
    pub fn iter(&self) -> impl Iterator<Item = (RegisterClass, &Register)> {
        RegisterClass::ALL
            .into_iter()
            .flat_map(move |class| self.bank(class).values().map(move |r| (class, r)))
    }

    /// Every `(class, address)` pair in iteration order.
    pub fn register_list(&self) -> Vec<(RegisterClass, u16)> {
        self.iter().map(|(class, r)| (class, r.address)).collect()
    }

    /// Total number of registers.
    pub fn len(&self) -> usize {
        self.banks.iter().map(BTreeMap::len).sum()
    }

    /// Returns `true` if no class holds any register.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Serialization
// =============================================================================

impl Serialize for Profile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = serializer.serialize_struct("Profile", 2)?;
        doc.serialize_field("identity", &self.identity)?;
        doc.serialize_field("datablocks", &Datablocks(self))?;
        doc.end()
    }
}

struct Datablocks<'a>(&'a Profile);

impl Serialize for Datablocks<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(RegisterClass::ALL.len()))?;
        for class in RegisterClass::ALL {
            map.serialize_entry(class.key(), &Bank(self.0.bank(class)))?;
        }
        map.end()
    }
}

struct Bank<'a>(&'a RegisterBank);

impl Serialize for Bank<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (address, register) in self.0 {
            map.serialize_entry(&address.to_string(), &register.to_spec())?;
        }
        map.end()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::types::{Access, DataType};

    const DEMO: &str = r#"{
        "identity": "Demo",
        "datablocks": {
            "di": { "0": {"dsc": "Door"} },
            "co": { "1": {"value": "FALSE"} },
            "hr": {
                "10": {"dtype": "uint16", "bo": "<", "value": "300"},
                "2": {"dtype": "float32", "value": 1.5},
                "20": {"dtype": "string", "value": "ABC"}
            },
            "ir": { "5": {"dtype": "int32", "rtype": "rw", "value": -1} }
        }
    }"#;

    #[test]
    fn test_load_fills_defaults() {
        let profile = Profile::from_json_str(DEMO).unwrap();
        assert_eq!(profile.identity, "Demo");
        assert_eq!(profile.len(), 6);

        let di = profile.register(RegisterClass::DiscreteInput, 0).unwrap();
        assert_eq!(di.description, "Door");
        assert_eq!(di.value, Value::Bool(false));

        let hr = profile.register(RegisterClass::HoldingRegister, 10).unwrap();
        assert_eq!(hr.dtype, DataType::Uint16);
        assert_eq!(hr.value, Value::Int(300));

        let ir = profile.register(RegisterClass::InputRegister, 5).unwrap();
        assert_eq!(ir.access, Access::ReadOnly);
    }

    #[test]
    fn test_iteration_order() {
        let profile = Profile::from_json_str(DEMO).unwrap();
        let list = profile.register_list();
        assert_eq!(
            list,
            vec![
                (RegisterClass::DiscreteInput, 0),
                (RegisterClass::Coil, 1),
                (RegisterClass::HoldingRegister, 2),
                (RegisterClass::HoldingRegister, 10),
                (RegisterClass::HoldingRegister, 20),
                (RegisterClass::InputRegister, 5),
            ]
        );
    }

    #[test]
    fn test_covering_lookup() {
        let profile = Profile::from_json_str(DEMO).unwrap();
        let r = profile.covering(RegisterClass::HoldingRegister, 3).unwrap();
        assert_eq!(r.address, 2);
        assert!(profile.covering(RegisterClass::HoldingRegister, 4).is_none());
        assert_eq!(profile.covering(RegisterClass::HoldingRegister, 21).unwrap().address, 20);
    }

    #[test]
    fn test_missing_sections() {
        let profile = Profile::from_json_str("{}").unwrap();
        assert!(profile.is_empty());
        assert_eq!(profile.identity, "");
    }

    #[test]
    fn test_validation_failures() {
        let err = Profile::from_json_str(r#"{"datablocks": {"xx": {}}}"#).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::UnknownClass { .. })));

        let err = Profile::from_json_str(r#"{"datablocks": {"hr": {"abc": {}}}}"#).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::InvalidAddress { .. })));

        let err = Profile::from_json_str(
            r#"{"datablocks": {"hr": {"0": {"dtype": "uint32"}, "1": {}}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Overlap { .. })));

        let err = Profile::from_json_str("not json").unwrap_err();
        assert!(matches!(err, CoreError::Profile(ProfileError::Parse { .. })));
    }

    #[test]
    fn test_register_past_last_address_is_rejected() {
        let err = Profile::from_json_str(
            r#"{"datablocks": {"hr": {"0": {"dtype": "uint16", "value": 7},
                                      "65535": {"dtype": "uint32", "value": 65538}}}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::AddressOverflow {
                address: 65535,
                width: 2,
                ..
            })
        ));

        let profile = Profile::from_json_str(
            r#"{"datablocks": {"hr": {"65534": {"dtype": "uint32"}}, "ir": {"65535": {}}}}"#,
        )
        .unwrap();
        assert_eq!(profile.len(), 2);
    }

    #[test]
    fn test_set_value_casts() {
        let mut profile = Profile::from_json_str(DEMO).unwrap();
        let v = profile
            .set_value(RegisterClass::HoldingRegister, 10, &Value::from("70000"))
            .unwrap();
        assert_eq!(v, Value::Int(70000 - 65536));

        let err = profile.set_value(RegisterClass::HoldingRegister, 10, &Value::from("x"));
        assert!(err.is_err());
        assert_eq!(
            profile.register(RegisterClass::HoldingRegister, 10).unwrap().value,
            Value::Int(4464)
        );
    }

    #[test]
    fn test_save_and_reload() {
        let profile = Profile::from_json_str(DEMO).unwrap();
        let file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        profile.save(file.path()).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("\n    \"identity\": \"Demo\""));
        assert!(text.find("\"2\"").unwrap() < text.find("\"10\"").unwrap());

        let reloaded = Profile::load(file.path()).unwrap();
        assert_eq!(reloaded, profile);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Profile::load("/nonexistent/profile.json").unwrap_err();
        assert!(matches!(err, CoreError::Profile(ProfileError::Io { .. })));
    }
}
