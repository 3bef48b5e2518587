//! # idvault Crypto
//!
//! Envelope encryption for account records and document versions.
//!
//! ## Overview
//!
//! Two encryption paths share one set of primitives:
//!
//! 1. **Account records**: the whole [`PersonAccount`](idvault_core::PersonAccount)
//!    aggregate is serialized and sealed under an [`AccountKey`] derived from
//!    the owner's passphrase (Argon2id).
//! 2. **Document versions**: each version gets a fresh content key and a fresh
//!    X25519 key pair. Content is sealed under the content key, and the
//!    content key is wrapped under the version's public key. Leaking one
//!    version's private key exposes no other version.
//!
//! ## Primitives
//!
//! - [`seal`] / [`open`] - AES-256-GCM, nonce embedded in the output
//! - [`generate_key_pair`] - X25519 key pair
//! - [`wrap_key`] / [`unwrap_key`] - ephemeral X25519 ECDH + Blake3 KDF +
//!   ChaCha20-Poly1305 over a symmetric key
//!
//! ## Failure Model
//!
//! Decryption failures are uniform. [`CryptoError::Authentication`] and
//! [`CryptoError::Unwrap`] never say whether the key was wrong or the bytes
//! were tampered with.
//!
//! ## Usage
//!
//! ```rust
//! use idvault_crypto::{CipherEnvelope, Result};
//!
//! fn roundtrip() -> Result<()> {
//!     let sealed = CipherEnvelope::seal(b"scan bytes")?;
//!     let plain = CipherEnvelope::open_with_private_key(
//!         &sealed.ciphertext,
//!         &sealed.header,
//!         &sealed.private_key,
//!     )?;
//!     assert_eq!(plain, b"scan bytes");
//!     Ok(())
//! }
//! # roundtrip().unwrap();
//! ```

pub mod asymmetric;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod passphrase;
pub mod symmetric;
pub mod wrap;

pub use asymmetric::{generate_key_pair, PrivateKey, PublicKey, SharedKey};
pub use codec::AccountRecordCodec;
pub use envelope::{CipherEnvelope, EnvelopeHeader, SealedArtifact};
pub use error::{CryptoError, Result};
pub use passphrase::{AccountKey, KdfParams, KdfSalt};
pub use symmetric::{open, seal, seal_with_key_bytes, SymmetricKey, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use wrap::{unwrap_key, wrap_key, WrappedKey};
