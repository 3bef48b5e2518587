//! Account lifecycle.

use tracing::{debug, info};

use idvault_core::{
    now_millis, AccountData, AccountField, AccountProfile, PersonAccount, PrivateId, PublicId,
};
use idvault_crypto::{AccountKey, KdfSalt};
use idvault_store::{BlobStore, KeyStore, Ledger, TxId};

use crate::error::{Result, VaultError};
use crate::vault::{account_key, AccountRecord, Mutation, Vault};

/// What a new account's owner receives, once.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    /// Secret identifier. The public id is derived from it.
    pub private_id: PrivateId,
    pub public_id: PublicId,
    /// The passphrase-derived key the account is sealed under.
    pub key: AccountKey,
}

/// One ledger entry of an account, decrypted.
#[derive(Debug, Clone)]
pub struct AccountRevision {
    pub tx_id: TxId,
    pub timestamp: i64,
    /// `None` for the tombstone written by account deletion.
    pub account: Option<PersonAccount>,
}

impl<L: Ledger, B: BlobStore, K: KeyStore> Vault<L, B, K> {
    /// Register a new account sealed under a key derived from `passphrase`.
    pub async fn create_account(
        &self,
        profile: &AccountProfile,
        passphrase: &str,
    ) -> Result<AccountCredentials> {
        self.ensure_open()?;
        let now = now_millis();
        AccountData::from_profile(profile, now)?;

        let salt = KdfSalt::generate()?;
        let key = self.derive_key(passphrase, salt).await?;
        let private_id = PrivateId::generate();

        let mut mutation = Mutation::new();
        let outcome = async {
            let root = mutation.created(
                self.blob_call("blobs.new_directory", self.blobs().new_directory())
                    .await?,
            );
            let account = PersonAccount::new(private_id, profile, root, now)?;
            self.store_account(&account, salt, &key).await?;
            Ok::<_, VaultError>(account.public_id)
        }
        .await;
        let public_id = self.settle(mutation, outcome).await?;

        info!(account = %public_id, "account created");
        Ok(AccountCredentials {
            private_id,
            public_id,
            key,
        })
    }

    /// Re-derive an account's key from its passphrase.
    ///
    /// The key is checked by decrypting the current record, so a wrong
    /// passphrase fails here with a decryption error.
    pub async fn unlock(&self, public_id: &PublicId, passphrase: &str) -> Result<AccountKey> {
        self.ensure_open()?;
        let record = self.load_record(public_id).await?;
        let key = self.derive_key(passphrase, record.kdf_salt).await?;
        record.open(public_id, &key)?;
        debug!(account = %public_id, "account unlocked");
        Ok(key)
    }

    pub async fn get_account(&self, public_id: &PublicId, key: &AccountKey) -> Result<PersonAccount> {
        self.ensure_open()?;
        let (account, _) = self.load_account(public_id, key).await?;
        Ok(account)
    }

    /// Every ledger revision of an account, oldest first, including the
    /// deletion tombstone.
    pub async fn account_history(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
    ) -> Result<Vec<AccountRevision>> {
        self.ensure_open()?;
        let ledger_key = account_key(public_id);
        let entries = self
            .ledger_call("ledger.history", self.ledger().history(&ledger_key))
            .await?;

        entries
            .into_iter()
            .map(|entry| -> Result<AccountRevision> {
                let account = match &entry.value {
                    Some(bytes) => {
                        Some(AccountRecord::parse(&ledger_key, bytes)?.open(public_id, key)?)
                    }
                    None => None,
                };
                Ok(AccountRevision {
                    tx_id: entry.tx_id,
                    timestamp: entry.timestamp,
                    account,
                })
            })
            .collect()
    }

    /// Replace one personal field.
    pub async fn update_account_field(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
        field: AccountField,
        value: &str,
    ) -> Result<PersonAccount> {
        self.ensure_open()?;
        let _guard = self.lock_account(public_id).await;

        let (mut account, salt) = self.load_account(public_id, key).await?;
        account.account_data.set(field, value, now_millis())?;
        self.store_account(&account, salt, key).await?;

        debug!(account = %public_id, %field, "account field updated");
        Ok(account)
    }

    /// Delete an account and everything it owns.
    ///
    /// The ledger entry is tombstoned first; then every version blob, sealed
    /// version key and directory is released. Share requests are kept.
    pub async fn delete_account(&self, public_id: &PublicId, key: &AccountKey) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.lock_account(public_id).await;

        let (account, _) = self.load_account(public_id, key).await?;
        self.ledger_call("ledger.delete", self.ledger().delete(&account_key(public_id)))
            .await?;
        info!(
            account = %public_id,
            documents = account.document_count(),
            "account deleted"
        );

        let mut blobs = Vec::new();
        let mut keys = Vec::new();
        for directory in account.documents() {
            blobs.push(directory.blob_ref);
            for version in directory.versions() {
                blobs.push(version.content_ref);
                keys.push(version.key_ref);
            }
        }
        blobs.push(account.blob_root);
        self.cleanup(&blobs, &keys).await
    }
}
