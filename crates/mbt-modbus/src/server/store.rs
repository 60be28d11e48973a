// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Sparse register store backing the local server.
//!
//! A [`RegisterStore`] holds the encoded words of one register class. It is
//! seeded from the profile and keeps the profile's decoded values in step
//! with every `set`. Observers attach to `get` and `set` and may replace
//! the words that flow through them.
//!
//! # Thread Safety
//!
//! The word map sits behind a `parking_lot::RwLock` that is never held
//! while observers run, so an observer may call back into the store.
//!
//! # Example
//!
//! ```rust
//! use mbt_core::{Profile, RegisterClass};
//! use mbt_modbus::server::RegisterStore;
//!
//! let profile = Profile::from_json_str(
//!     r#"{"identity": "Demo", "datablocks": {"hr": {"10": {"dtype": "uint16", "value": 300}}}}"#,
//! ).unwrap().into_shared();
//!
//! let store = RegisterStore::from_profile(RegisterClass::HoldingRegister, profile).unwrap();
//! assert!(store.validate(10, 1));
//! assert_eq!(store.get(10, 1).unwrap(), vec![300]);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use mbt_core::{codec, CoreResult, RegisterClass, SharedProfile, ValidationError};
use parking_lot::RwLock;

use crate::error::{ModbusResult, OperationError};
use crate::hooks::{HookList, StoreAccess, StoreHook};

// =============================================================================
// RegisterStore
// =============================================================================

/// Encoded words of one register class, with access observers.
pub struct RegisterStore {
    class: RegisterClass,
    words: RwLock<BTreeMap<u16, u16>>,
    profile: SharedProfile,
    read_hooks: HookList<StoreHook>,
    write_hooks: HookList<StoreHook>,
}

impl RegisterStore {
    /// Builds the store for `class` from the profile's current values.
    pub fn from_profile(class: RegisterClass, profile: SharedProfile) -> CoreResult<Self> {
        let mut words = BTreeMap::new();
        {
            let guard = profile.read();
            for register in guard.bank(class).values() {
                let encoded = codec::encode(register, &register.value)?;
                for (offset, word) in encoded.into_iter().enumerate() {
                    let address = u16::try_from(offset)
                        .ok()
                        .and_then(|offset| register.address.checked_add(offset))
                        .ok_or_else(|| {
                            ValidationError::address_overflow(
                                class.key(),
                                register.address,
                                register.width(),
                            )
                        })?;
                    words.insert(address, word);
                }
            }
        }

        Ok(Self {
            class,
            words: RwLock::new(words),
            profile,
            read_hooks: HookList::new(),
            write_hooks: HookList::new(),
        })
    }

    /// The register class held by this store.
    pub fn class(&self) -> RegisterClass {
        self.class
    }

    /// Number of populated addresses.
    pub fn len(&self) -> usize {
        self.words.read().len()
    }

    /// Returns `true` if no address is populated.
    pub fn is_empty(&self) -> bool {
        self.words.read().is_empty()
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Registers a read observer.
    pub fn on_read<F>(&self, hook: F)
    where
        F: Fn(&StoreAccess<'_>) -> Option<Vec<u16>> + Send + Sync + 'static,
    {
        self.read_hooks.push(Arc::new(hook));
    }

    /// Registers a write observer.
    pub fn on_write<F>(&self, hook: F)
    where
        F: Fn(&StoreAccess<'_>) -> Option<Vec<u16>> + Send + Sync + 'static,
    {
        self.write_hooks.push(Arc::new(hook));
    }

    /// Number of registered `(read, write)` observers.
    pub fn observer_count(&self) -> (usize, usize) {
        (self.read_hooks.len(), self.write_hooks.len())
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Returns `true` if every address in `address..address + count` is
    /// populated. Never invokes observers.
    pub fn validate(&self, address: u16, count: usize) -> bool {
        let words = self.words.read();
        Self::in_range(&words, address, count)
    }

    fn in_range(words: &BTreeMap<u16, u16>, address: u16, count: usize) -> bool {
        let start = address as usize;
        count > 0
            && start + count <= u16::MAX as usize + 1
            && (start..start + count).all(|a| words.contains_key(&(a as u16)))
    }

    /// Reads the stored words without invoking observers.
    pub fn snapshot(&self, address: u16, count: usize) -> ModbusResult<Vec<u16>> {
        let words = self.words.read();
        if !Self::in_range(&words, address, count) {
            return Err(OperationError::invalid_range(self.class, address, count).into());
        }
        Ok((0..count)
            .filter_map(|i| words.get(&address.wrapping_add(i as u16)).copied())
            .collect())
    }

    /// Reads `count` words and threads them through the read observers.
    pub fn get(&self, address: u16, count: usize) -> ModbusResult<Vec<u16>> {
        let words = self.snapshot(address, count)?;
        Ok(self.read_hooks.thread(self.class, address, words, None))
    }

    /// Stores `values`, then threads them through the write observers.
    ///
    /// When an observer replaces the words, the replacement is stored as
    /// well. Returns the words finally held by the store.
    pub fn set(&self, address: u16, values: &[u16]) -> ModbusResult<Vec<u16>> {
        let previous = self.replace(address, values)?;
        self.refresh(address, values.len());

        let effective = self
            .write_hooks
            .thread(self.class, address, values.to_vec(), Some(&previous));

        if effective.as_slice() != values {
            if effective.len() == values.len() {
                self.replace(address, &effective)?;
                self.refresh(address, effective.len());
            } else {
                tracing::warn!(
                    class = self.class.key(),
                    address,
                    expected = values.len(),
                    actual = effective.len(),
                    "Write observer returned a replacement of the wrong length; ignored"
                );
                return self.snapshot(address, values.len());
            }
        }
        Ok(effective)
    }

    /// Writes `values` and returns the words they replaced.
    fn replace(&self, address: u16, values: &[u16]) -> ModbusResult<Vec<u16>> {
        let mut words = self.words.write();
        if !Self::in_range(&words, address, values.len()) {
            return Err(OperationError::invalid_range(self.class, address, values.len()).into());
        }
        let mut previous = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            let slot = address.wrapping_add(i as u16);
            previous.push(words.insert(slot, *value).unwrap_or_default());
        }
        Ok(previous)
    }

    /// Re-decodes every profile register overlapping the written range.
    fn refresh(&self, address: u16, count: usize) {
        let end = (address as usize + count).saturating_sub(1).min(u16::MAX as usize) as u16;
        let touched: Vec<(u16, usize)> = {
            let profile = self.profile.read();
            let bank = profile.bank(self.class);
            let first = profile
                .covering(self.class, address)
                .map_or(address, |r| r.address);
            bank.range(first..=end)
                .map(|(start, r)| (*start, r.width()))
                .collect()
        };

        for (start, width) in touched {
            let Ok(words) = self.snapshot(start, width) else {
                continue;
            };
            let mut profile = self.profile.write();
            let Some(register) = profile.register_mut(self.class, start) else {
                continue;
            };
            match codec::decode(register, &words) {
                Ok(value) => register.value = value,
                Err(e) => tracing::warn!(
                    class = self.class.key(),
                    address = start,
                    error = %e,
                    "Stored words do not decode"
                ),
            }
        }
    }
}

impl fmt::Debug for RegisterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterStore")
            .field("class", &self.class)
            .field("len", &self.len())
            .field("read_hooks", &self.read_hooks)
            .field("write_hooks", &self.write_hooks)
            .finish()
    }
}

// =============================================================================
// DeviceStore
// =============================================================================

/// The four register stores served under one device id.
#[derive(Debug)]
pub struct DeviceStore {
    device_id: u8,
    profile: SharedProfile,
    stores: [Arc<RegisterStore>; 4],
}

impl DeviceStore {
    /// Builds all four stores from `profile`.
    pub fn from_profile(device_id: u8, profile: SharedProfile) -> CoreResult<Self> {
        let build = |class| RegisterStore::from_profile(class, Arc::clone(&profile)).map(Arc::new);
        let stores = [
            build(RegisterClass::DiscreteInput)?,
            build(RegisterClass::Coil)?,
            build(RegisterClass::HoldingRegister)?,
            build(RegisterClass::InputRegister)?,
        ];
        Ok(Self {
            device_id,
            profile,
            stores,
        })
    }

    /// The device id requests must carry.
    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    /// The shadow profile.
    pub fn profile(&self) -> &SharedProfile {
        &self.profile
    }

    /// The store for `class`.
    pub fn store(&self, class: RegisterClass) -> &Arc<RegisterStore> {
        let index = match class {
            RegisterClass::DiscreteInput => 0,
            RegisterClass::Coil => 1,
            RegisterClass::HoldingRegister => 2,
            RegisterClass::InputRegister => 3,
        };
        &self.stores[index]
    }

    /// Iterates the stores in class order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisterStore>> {
        self.stores.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mbt_core::{DataType, Endian, Profile, Register, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shared() -> SharedProfile {
        let mut profile = Profile::new("store");
        profile.insert(
            RegisterClass::HoldingRegister,
            Register::new(10, DataType::Uint16, 300),
        );
        profile.insert(
            RegisterClass::HoldingRegister,
            Register::new(20, DataType::Int32, -2).with_word_order(Endian::Big),
        );
        profile.insert(RegisterClass::Coil, Register::new(0, DataType::Bit, true));
        profile.into_shared()
    }

    fn hr() -> RegisterStore {
        RegisterStore::from_profile(RegisterClass::HoldingRegister, shared()).unwrap()
    }

    #[test]
    fn test_seeded_from_profile() {
        let store = hr();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(10, 1).unwrap(), vec![300]);
        assert_eq!(store.get(20, 2).unwrap(), vec![0xFFFF, 0xFFFE]);
    }

    #[test]
    fn test_validate_is_sparse() {
        let store = hr();
        assert!(store.validate(10, 1));
        assert!(store.validate(20, 2));
        assert!(!store.validate(10, 2));
        assert!(!store.validate(11, 1));
        assert!(!store.validate(10, 0));
        assert!(!store.validate(u16::MAX, 2));
        assert!(store.get(11, 1).is_err());
        assert!(store.set(12, &[1]).is_err());
    }

    #[test]
    fn test_set_updates_profile_value() {
        let profile = shared();
        let store =
            RegisterStore::from_profile(RegisterClass::HoldingRegister, Arc::clone(&profile))
                .unwrap();

        assert_eq!(store.set(10, &[42]).unwrap(), vec![42]);
        store.set(20, &[0, 7]).unwrap();

        let profile = profile.read();
        let value = |a| profile.register(RegisterClass::HoldingRegister, a).unwrap().value.clone();
        assert_eq!(value(10), Value::Int(42));
        assert_eq!(value(20), Value::Int(7));
    }

    #[test]
    fn test_partial_write_of_wide_register_refreshes_it() {
        let profile = shared();
        let store =
            RegisterStore::from_profile(RegisterClass::HoldingRegister, Arc::clone(&profile))
                .unwrap();

        store.set(21, &[5]).unwrap();
        let value = profile
            .read()
            .register(RegisterClass::HoldingRegister, 20)
            .unwrap()
            .value
            .clone();
        assert_eq!(value, Value::Int(0xFFFF_0005_u32 as i32 as i64));
    }

    #[test]
    fn test_read_observers_thread_in_order() {
        let store = hr();
        store.on_read(|access| {
            assert_eq!(access.class, RegisterClass::HoldingRegister);
            assert!(!access.is_write());
            Some(access.words.iter().map(|w| w + 1).collect())
        });
        store.on_read(|access| Some(access.words.iter().map(|w| w * 2).collect()));

        assert_eq!(store.get(10, 1).unwrap(), vec![602]);
        assert_eq!(store.snapshot(10, 1).unwrap(), vec![300]);
    }

    #[test]
    fn test_write_observer_can_override() {
        let profile = shared();
        let store =
            RegisterStore::from_profile(RegisterClass::HoldingRegister, Arc::clone(&profile))
                .unwrap();
        store.on_write(|access| access.previous.map(<[u16]>::to_vec));

        assert_eq!(store.set(10, &[9]).unwrap(), vec![300]);
        assert_eq!(store.snapshot(10, 1).unwrap(), vec![300]);
        assert_eq!(
            profile
                .read()
                .register(RegisterClass::HoldingRegister, 10)
                .unwrap()
                .value,
            Value::Int(300)
        );
    }

    #[test]
    fn test_wrong_length_override_is_ignored() {
        let store = hr();
        store.on_write(|_| Some(vec![1, 2, 3]));
        assert_eq!(store.set(10, &[9]).unwrap(), vec![9]);
    }

    #[test]
    fn test_validate_fires_no_observers() {
        let store = hr();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.on_read(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            None
        });
        store.validate(10, 1);
        store.snapshot(10, 1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        store.get(10, 1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_observer_may_reenter_store() {
        let store = Arc::new(hr());
        let inner = Arc::downgrade(&store);
        store.on_read(move |access| {
            let store = inner.upgrade()?;
            store.set(access.address, &[77]).ok()
        });
        assert_eq!(store.get(10, 1).unwrap(), vec![77]);
        assert_eq!(store.snapshot(10, 1).unwrap(), vec![77]);
    }

    #[test]
    fn test_device_store_classes() {
        let device = DeviceStore::from_profile(3, shared()).unwrap();
        assert_eq!(device.device_id(), 3);
        assert_eq!(device.store(RegisterClass::Coil).get(0, 1).unwrap(), vec![1]);
        assert!(device.store(RegisterClass::InputRegister).is_empty());
        let classes: Vec<_> = device.iter().map(|s| s.class()).collect();
        assert_eq!(classes, RegisterClass::ALL.to_vec());
    }
}
