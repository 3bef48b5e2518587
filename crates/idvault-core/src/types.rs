//! Strong type definitions for idvault.
//!
//! All identifiers are newtypes to prevent misuse at compile time. They
//! serialize as hex strings so ledger records can be matched by rich queries.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.to_hex()
            }
        }

        impl TryFrom<String> for $name {
            type Error = hex::FromHexError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::from_hex(&s)
            }
        }
    };
}

hex_id! {
    /// The secret identifier of an account.
    ///
    /// Only ever stored inside the encrypted account record.
    PrivateId
}

hex_id! {
    /// The public identifier of an account: Blake3(domain || private id).
    ///
    /// Used as the ledger key and as the party id in share requests.
    PublicId
}

hex_id! {
    /// Identifier of a share request.
    RequestId
}

hex_id! {
    /// Content address of a blob: Blake3 hash of its bytes.
    ContentId
}

hex_id! {
    /// Handle for a sealed private key held by the key store.
    KeyRef
}

impl PrivateId {
    /// Generate a new random private id.
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    /// Derive the public id for this private id.
    pub fn public_id(&self) -> PublicId {
        PublicId::derive(self)
    }
}

impl PublicId {
    /// Derive a public id from a private id.
    ///
    /// One-way: the private id cannot be recovered from the result.
    pub fn derive(private_id: &PrivateId) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key("idvault-public-id-v1");
        hasher.update(&private_id.0);
        Self(*hasher.finalize().as_bytes())
    }
}

impl RequestId {
    /// Generate a fresh request id.
    pub fn generate() -> Self {
        Self(random_bytes())
    }
}

impl ContentId {
    /// Compute the content address of some bytes.
    pub fn for_content(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }
}

impl KeyRef {
    /// Generate a fresh key handle.
    pub fn generate() -> Self {
        Self(random_bytes())
    }
}

fn random_bytes() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Opaque encoded key material (public keys, wrapped keys).
///
/// Never holds an unwrapped secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial({} bytes)", self.0.len())
    }
}

impl From<KeyMaterial> for String {
    fn from(k: KeyMaterial) -> String {
        hex::encode(k.0)
    }
}

impl TryFrom<String> for KeyMaterial {
    type Error = hex::FromHexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        hex::decode(s).map(Self)
    }
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
