//! Document directories and their encrypted versions.
//!
//! ## Blob Layout
//!
//! ```text
//! account root ──<document key>──▶ document directory ──<version number>──▶ sealed content
//! ```
//!
//! Every node is content-addressed, so adding or removing a version yields a
//! new document directory and, in turn, a new account root. The account
//! record stores the current root; superseded nodes are released only after
//! the record is persisted.
//!
//! ## Version Keys
//!
//! Each version is sealed by [`CipherEnvelope`] under a fresh content key
//! and a fresh X25519 key pair. The version's private key is itself sealed
//! under the account key and kept in the [`KeyStore`] at the version's
//! `key_ref`; it never reaches the Ledger or the BlobStore.

use bytes::Bytes;
use tracing::{debug, info};
use zeroize::Zeroizing;

use idvault_core::{
    now_millis, ContentId, DocumentDirectory, DocumentField, DocumentVersion, KeyMaterial, KeyRef,
    PersonAccount, PublicId,
};
use idvault_crypto::{
    open, seal, unwrap_key, AccountKey, CipherEnvelope, CryptoError, EnvelopeHeader, PrivateKey,
    PublicKey, SymmetricKey, WrappedKey,
};
use idvault_store::{BlobStore, KeyStore, Ledger};

use crate::error::{Result, VaultError};
use crate::vault::{Mutation, Vault};

impl<L: Ledger, B: BlobStore, K: KeyStore> Vault<L, B, K> {
    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a document directory holding `content` as version 1.
    ///
    /// Fails with `DuplicateDocument` if the account already has a document
    /// with this name, compared case-insensitively.
    pub async fn create_document(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
        name: &str,
        holder: &str,
        country_issue: &str,
        content: &[u8],
    ) -> Result<DocumentVersion> {
        self.ensure_open()?;
        let now = now_millis();
        // Placeholder node; replaced once the directory blob exists.
        let mut directory =
            DocumentDirectory::new(name, holder, country_issue, ContentId::from_bytes([0; 32]), now)?;

        let _guard = self.lock_account(public_id).await;
        let (mut account, salt) = self.load_account(public_id, key).await?;
        let doc_key = account.ensure_document_absent(name)?;

        let mut mutation = Mutation::new();
        let outcome = async {
            let empty = mutation.created(
                self.blob_call("blobs.new_directory", self.blobs().new_directory())
                    .await?,
            );
            mutation.supersede(empty);

            let (version, node) = self
                .seal_version(&mut mutation, key, empty, directory.next_version()?, content, now)
                .await?;
            directory.blob_ref = node;
            directory.insert_version(version.clone())?;

            self.relink_document(&mut mutation, &mut account, &doc_key, node)
                .await?;
            account.insert_document(directory)?;
            self.store_account(&account, salt, key).await?;
            Ok::<_, VaultError>(version)
        }
        .await;
        let version = self.settle(mutation, outcome).await?;

        info!(account = %public_id, document = %doc_key, "document created");
        Ok(version)
    }

    /// Add the next version of an existing document.
    ///
    /// The number is one past the highest ever assigned, so numbers of
    /// deleted versions are never reused.
    pub async fn add_version(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
        name: &str,
        content: &[u8],
    ) -> Result<DocumentVersion> {
        self.ensure_open()?;
        let _guard = self.lock_account(public_id).await;
        let (mut account, salt) = self.load_account(public_id, key).await?;

        let directory = account.document(name)?;
        let doc_key = directory.key();
        let number = directory.next_version()?;
        let previous = directory.blob_ref;
        let now = now_millis();

        let mut mutation = Mutation::new();
        let outcome = async {
            let (version, node) = self
                .seal_version(&mut mutation, key, previous, number, content, now)
                .await?;
            mutation.supersede(previous);

            let directory = account.document_mut(name)?;
            directory.blob_ref = node;
            directory.insert_version(version.clone())?;

            self.relink_document(&mut mutation, &mut account, &doc_key, node)
                .await?;
            self.store_account(&account, salt, key).await?;
            Ok::<_, VaultError>(version)
        }
        .await;
        let version = self.settle(mutation, outcome).await?;

        debug!(account = %public_id, document = %doc_key, version = version.number, "version added");
        Ok(version)
    }

    /// Update `holder` or `countryIssue`. The document name cannot change.
    pub async fn update_document_field(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
        name: &str,
        field: DocumentField,
        value: &str,
    ) -> Result<DocumentDirectory> {
        self.ensure_open()?;
        let _guard = self.lock_account(public_id).await;
        let (mut account, salt) = self.load_account(public_id, key).await?;

        let directory = account.document_mut(name)?;
        directory.set_field(field, value, now_millis())?;
        let directory = directory.clone();
        self.store_account(&account, salt, key).await?;

        debug!(account = %public_id, document = %directory.key(), %field, "document field updated");
        Ok(directory)
    }

    /// Delete one version. The directory is kept, even when left empty.
    ///
    /// Once the account record is updated the version's content blob and
    /// sealed private key are released; a failure there is reported as
    /// [`VaultError::Cleanup`].
    pub async fn delete_version(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
        name: &str,
        number: u32,
    ) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.lock_account(public_id).await;
        let (mut account, salt) = self.load_account(public_id, key).await?;

        let directory = account.document_mut(name)?;
        let removed = directory.remove_version(number, now_millis())?;
        let doc_key = directory.key();
        let previous = directory.blob_ref;

        let mut mutation = Mutation::new();
        let outcome = async {
            let node = mutation.created(
                self.blob_call(
                    "blobs.unlink_child",
                    self.blobs().unlink_child(&previous, &removed.link_name()),
                )
                .await?,
            );
            mutation.supersede(previous);
            mutation.supersede(removed.content_ref);
            mutation.retire_key(removed.key_ref);
            account.document_mut(name)?.blob_ref = node;

            self.relink_document(&mut mutation, &mut account, &doc_key, node)
                .await?;
            self.store_account(&account, salt, key).await?;
            Ok::<_, VaultError>(())
        }
        .await;
        self.settle(mutation, outcome).await?;

        debug!(account = %public_id, document = %doc_key, version = number, "version deleted");
        Ok(())
    }

    /// Delete a document directory and all of its versions.
    pub async fn delete_document(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
        name: &str,
    ) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.lock_account(public_id).await;
        let (mut account, salt) = self.load_account(public_id, key).await?;

        let directory = account.remove_document(name)?;
        let doc_key = directory.key();
        let previous_root = account.blob_root;

        let mut mutation = Mutation::new();
        let outcome = async {
            let root = mutation.created(
                self.blob_call(
                    "blobs.unlink_child",
                    self.blobs().unlink_child(&previous_root, &doc_key),
                )
                .await?,
            );
            mutation.supersede(previous_root);
            mutation.supersede(directory.blob_ref);
            for version in directory.versions() {
                mutation.supersede(version.content_ref);
                mutation.retire_key(version.key_ref);
            }
            account.blob_root = root;
            self.store_account(&account, salt, key).await?;
            Ok::<_, VaultError>(())
        }
        .await;
        self.settle(mutation, outcome).await?;

        info!(account = %public_id, document = %doc_key, "document deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_document(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
        name: &str,
    ) -> Result<DocumentDirectory> {
        self.ensure_open()?;
        let (account, _) = self.load_account(public_id, key).await?;
        Ok(account.document(name)?.clone())
    }

    /// Surviving versions of a document, ascending.
    pub async fn list_versions(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
        name: &str,
    ) -> Result<Vec<DocumentVersion>> {
        self.ensure_open()?;
        let (account, _) = self.load_account(public_id, key).await?;
        Ok(account.document(name)?.versions().cloned().collect())
    }

    /// Decrypt a version using its private key from the KeyStore.
    pub async fn read_version(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
        name: &str,
        number: u32,
    ) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let (account, _) = self.load_account(public_id, key).await?;
        let version = account.document(name)?.version(number)?;
        self.read_sealed_version(version, key).await
    }

    /// Decrypt a version, obtaining its content key through `unwrap`.
    ///
    /// `unwrap` receives the stored wrapped key; its errors are returned
    /// unchanged.
    pub async fn read_version_with<F>(
        &self,
        public_id: &PublicId,
        key: &AccountKey,
        name: &str,
        number: u32,
        unwrap: F,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce(&WrappedKey) -> idvault_crypto::Result<SymmetricKey> + Send,
    {
        self.ensure_open()?;
        let (account, _) = self.load_account(public_id, key).await?;
        let version = account.document(name)?.version(number)?;
        self.open_version(version, unwrap).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Decrypt `version` with the private key held sealed in the KeyStore.
    pub(crate) async fn read_sealed_version(
        &self,
        version: &DocumentVersion,
        key: &AccountKey,
    ) -> Result<Vec<u8>> {
        let sealed_private = self
            .ledger_call("keys.get", self.keys().get_key(&version.key_ref))
            .await?
            .ok_or(CryptoError::Unwrap)?;

        self.open_version(version, |wrapped| {
            let private = open_private_key(&sealed_private, key)?;
            unwrap_key(wrapped, &private)
        })
        .await
    }

    async fn open_version<F>(&self, version: &DocumentVersion, unwrap: F) -> Result<Vec<u8>>
    where
        F: FnOnce(&WrappedKey) -> idvault_crypto::Result<SymmetricKey> + Send,
    {
        let header = EnvelopeHeader {
            public_key: PublicKey::from_slice(version.public_key.as_bytes())?,
            wrapped_key: WrappedKey::from_bytes(version.wrapped_key.as_bytes())?,
        };
        let ciphertext = self
            .blob_call("blobs.get", self.blobs().get_blob(&version.content_ref))
            .await?;
        Ok(CipherEnvelope::open(&ciphertext, &header, unwrap)?)
    }

    /// Seal `content` as version `number` and link it under `directory`.
    ///
    /// Returns the version metadata and the new directory node.
    async fn seal_version(
        &self,
        mutation: &mut Mutation,
        key: &AccountKey,
        directory: ContentId,
        number: u32,
        content: &[u8],
        now: i64,
    ) -> Result<(DocumentVersion, ContentId)> {
        let sealed = CipherEnvelope::seal(content)?;
        let private_bytes = sealed.private_key.to_bytes();
        let sealed_private = seal(private_bytes.as_slice(), key.as_symmetric())?;
        let wrapped_key = sealed.header.wrapped_key.to_bytes()?;

        let key_ref = KeyRef::generate();
        mutation.created_key(key_ref);
        self.ledger_call("keys.put", self.keys().put_key(&key_ref, &sealed_private))
            .await?;

        let content_ref = mutation.created(
            self.blob_call("blobs.put", self.blobs().put_blob(Bytes::from(sealed.ciphertext)))
                .await?,
        );

        let version = DocumentVersion {
            number,
            content_ref,
            public_key: KeyMaterial::new(sealed.header.public_key.as_bytes().to_vec()),
            wrapped_key: KeyMaterial::new(wrapped_key),
            key_ref,
            created_at: now,
            updated_at: now,
        };

        let node = mutation.created(
            self.blob_call(
                "blobs.link_child",
                self.blobs()
                    .link_child(&directory, &version.link_name(), &content_ref),
            )
            .await?,
        );
        Ok((version, node))
    }

    /// Point the account root at a new node for one document.
    async fn relink_document(
        &self,
        mutation: &mut Mutation,
        account: &mut PersonAccount,
        doc_key: &str,
        node: ContentId,
    ) -> Result<()> {
        let previous = account.blob_root;
        let root = mutation.created(
            self.blob_call(
                "blobs.link_child",
                self.blobs().link_child(&previous, doc_key, &node),
            )
            .await?,
        );
        mutation.supersede(previous);
        account.blob_root = root;
        Ok(())
    }
}

/// Recover a version private key sealed under the account key.
///
/// Any failure is an unwrap failure.
fn open_private_key(sealed: &[u8], key: &AccountKey) -> idvault_crypto::Result<PrivateKey> {
    let bytes = Zeroizing::new(open(sealed, key.as_symmetric()).map_err(|_| CryptoError::Unwrap)?);
    let mut raw = Zeroizing::new([0u8; 32]);
    if bytes.len() != raw.len() {
        return Err(CryptoError::Unwrap);
    }
    raw.copy_from_slice(&bytes);
    Ok(PrivateKey::from_bytes(*raw))
}
