//! # idvault Testkit
//!
//! Testing utilities for idvault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Field vectors**: field lists with their expected canonical fingerprints
//! - **Generators**: Proptest strategies for profiles, field names and payloads
//! - **Fixtures**: A vault over in-memory collaborators with a fast KDF
//!
//! ## Field Vectors
//!
//! Fingerprints are what duplicate detection matches on, so they must not
//! drift:
//!
//! ```rust
//! use idvault_testkit::vectors::{all_vectors, fingerprint_of};
//!
//! for vector in all_vectors() {
//!     assert_eq!(fingerprint_of(&vector).unwrap(), vector.expected);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use idvault_testkit::generators::account_profile;
//! use idvault_core::AccountData;
//!
//! proptest! {
//!     #[test]
//!     fn profiles_validate(profile in account_profile()) {
//!         prop_assert!(AccountData::from_profile(&profile, 0).is_ok());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use idvault_testkit::fixtures::TestFixture;
//!
//! # async fn example() -> idvault::Result<()> {
//! let fixture = TestFixture::new();
//! let anna = fixture.person("anna").await?;
//! fixture.document(&anna, "passport", b"scan").await?;
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{fast_config, profile, sample_profiles, MemoryVault, TestFixture};
pub use generators::{account_profile, VersionOp};
pub use vectors::{all_vectors, fingerprint_of, verify_all_vectors, FieldVector};
