// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Pre-built profiles shared by the integration suites.

use mbt_core::{Access, DataType, Endian, Profile, Register, RegisterClass, Value};

// =============================================================================
// Profile Fixtures
// =============================================================================

/// Profile fixtures.
pub struct ProfileFixtures;

impl ProfileFixtures {
    /// A small pump controller touching every register class.
    pub fn pump_json() -> &'static str {
        r#"{
            "identity": "Pump Controller",
            "datablocks": {
                "di": {
                    "0": {"dsc": "Running", "value": true},
                    "1": {"dsc": "Fault"}
                },
                "co": {
                    "0": {"dsc": "Start", "value": false}
                },
                "hr": {
                    "10": {"dsc": "Setpoint", "dtype": "uint16", "bo": "<", "value": 300},
                    "20": {"dsc": "Flow", "dtype": "float32", "wo": ">", "value": 12.5},
                    "30": {"dsc": "Tag", "dtype": "string", "value": "P-101"}
                },
                "ir": {
                    "0": {"dsc": "Pressure", "dtype": "int16", "value": -5}
                }
            }
        }"#
    }

    /// Parsed [`pump_json`](Self::pump_json).
    pub fn pump() -> Profile {
        Profile::from_json_str(Self::pump_json()).expect("pump fixture parses")
    }

    /// The single-register scenario: `hr[10]`, uint16, little byte order,
    /// value 300.
    pub fn scenario() -> Profile {
        let mut profile = Profile::new("Scenario");
        profile.insert(
            RegisterClass::HoldingRegister,
            Register::new(10, DataType::Uint16, 300)
                .with_description("Setpoint")
                .with_byte_order(Endian::Little),
        );
        profile
    }

    /// `count` consecutive uint16 holding registers starting at 0, valued by
    /// address.
    pub fn holding_registers(count: u16) -> Profile {
        let mut profile = Profile::new(format!("{count} holding registers"));
        for address in 0..count {
            profile.insert(
                RegisterClass::HoldingRegister,
                Register::new(address, DataType::Uint16, i64::from(address)),
            );
        }
        profile
    }

    /// One register of every class, each valued 1.
    pub fn every_class() -> Profile {
        let mut profile = Profile::new("Every class");
        for class in RegisterClass::ALL {
            let register = if class.is_bit() {
                Register::new(1, DataType::Bit, true)
            } else {
                Register::new(1, DataType::Uint16, 1)
            };
            let access = if class.is_writable() {
                Access::ReadWrite
            } else {
                Access::ReadOnly
            };
            profile.insert(class, register.with_access(access));
        }
        profile
    }
}

// =============================================================================
// Register Fixtures
// =============================================================================

/// Register fixtures.
pub struct RegisterFixtures;

impl RegisterFixtures {
    /// One register per fixed-width datatype.
    pub fn fixed_width() -> Vec<Register> {
        [
            DataType::Bit,
            DataType::Int8,
            DataType::Uint8,
            DataType::Int16,
            DataType::Uint16,
            DataType::Int32,
            DataType::Uint32,
            DataType::Float16,
            DataType::Float32,
            DataType::Float64,
        ]
        .into_iter()
        .map(|dtype| Register::new(0, dtype, Value::Int(0)))
        .collect()
    }

    /// Every byte/word order combination of `dtype`.
    pub fn orders(dtype: DataType) -> Vec<Register> {
        let mut registers = Vec::with_capacity(4);
        for byte_order in [Endian::Little, Endian::Big] {
            for word_order in [Endian::Little, Endian::Big] {
                registers.push(
                    Register::new(0, dtype, Value::Int(0))
                        .with_byte_order(byte_order)
                        .with_word_order(word_order),
                );
            }
        }
        registers
    }
}
