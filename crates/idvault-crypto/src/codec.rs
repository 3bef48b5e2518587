//! Encrypted account record codec.
//!
//! An account aggregate is serialized to JSON and sealed as one blob under
//! the account key. Field order in the JSON is not significant; the
//! round-trip is exact.

use idvault_core::PersonAccount;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::passphrase::AccountKey;
use crate::symmetric::{open, seal};

/// Encodes and decodes sealed [`PersonAccount`] records.
pub struct AccountRecordCodec;

impl AccountRecordCodec {
    /// Serialize then seal.
    pub fn encode(account: &PersonAccount, key: &AccountKey) -> Result<Vec<u8>> {
        let plain = Zeroizing::new(
            serde_json::to_vec(account).map_err(|e| CryptoError::Serialization(e.to_string()))?,
        );
        seal(&plain, key.as_symmetric())
    }

    /// Open then deserialize.
    ///
    /// A wrong key or tampered bytes yield [`CryptoError::Decryption`]; a
    /// record that opens but does not parse yields
    /// [`CryptoError::MalformedRecord`].
    pub fn decode(sealed: &[u8], key: &AccountKey) -> Result<PersonAccount> {
        let plain = Zeroizing::new(
            open(sealed, key.as_symmetric()).map_err(|_| CryptoError::Decryption)?,
        );

        let account: PersonAccount = serde_json::from_slice(&plain)
            .map_err(|e| CryptoError::MalformedRecord(e.to_string()))?;

        if !account.is_consistent() {
            return Err(CryptoError::MalformedRecord(
                "public id does not match private id".into(),
            ));
        }
        Ok(account)
    }
}
