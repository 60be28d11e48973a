// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # MBTester Integration Tests
//!
//! Cross-crate tests for the MBTester harness, plus the fixtures and mocks
//! they share.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Profiles and registers used across suites
//!   - `mocks`: In-memory remote devices and transports
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p mbt-tests
//!
//! # Run one suite
//! cargo test -p mbt-tests --test integration_codec
//! cargo test -p mbt-tests --test integration_store
//! cargo test -p mbt-tests --test integration_session
//! cargo test -p mbt-tests --test integration_poller
//! cargo test -p mbt-tests --test integration_proxy
//! cargo test -p mbt-tests --test integration_server
//!
//! # Show logs
//! RUST_LOG=debug cargo test -p mbt-tests -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! ### Codec (`integration_codec.rs`)
//! - Width and cast invariants over every datatype
//! - Byte and word order layouts
//!
//! ### Store (`integration_store.rs`)
//! - Observer ordering and replacement
//! - Profile values kept in step with stored words
//!
//! ### Session (`integration_session.rs`)
//! - Typed reads and writes through a mock transport
//! - Read-only classes, offsets and downloads
//!
//! ### Poller (`integration_poller.rs`)
//! - Backlog draining, intervals, pause and close
//!
//! ### Proxy (`integration_proxy.rs`)
//! - Reentrancy, rollback and serialized remote access
//!
//! ### Server (`integration_server.rs`)
//! - Modbus TCP loopback and an end-to-end proxy chain
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use mbt_tests::common::{MockRemote, ProfileFixtures};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let profile = ProfileFixtures::scenario().into_shared();
//!     let remote = MockRemote::new();
//!     // ... test logic
//! }
//! ```

pub mod common;
