//! Partial failures, timeouts and concurrent callers.

mod support;

use std::sync::Arc;
use std::time::Duration;

use idvault::core::{CoreError, RequestTarget};
use idvault::store::StoreError;
use idvault::{AccountCredentials, ErrorCategory, VaultError};

use support::{
    account, anna, bank, config, has_key, key_count, vault, vault_with, PutStall, TestVault,
};

fn fast_timeouts() -> TestVault {
    vault_with(
        config()
            .with_ledger_timeout(Duration::from_millis(50))
            .with_blob_timeout(Duration::from_millis(50)),
    )
}

async fn version_numbers(vault: &TestVault, owner: &AccountCredentials) -> Vec<u32> {
    vault
        .list_versions(&owner.public_id, &owner.key, "passport")
        .await
        .unwrap()
        .iter()
        .map(|v| v.number)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Compensation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_ledger_write_releases_new_version() {
    let vault = vault();
    let anna = account(&vault, &anna()).await;
    vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap();

    let blobs = vault.blobs().blob_count();
    let keys = key_count(&vault);

    vault.ledger().fail_puts(true);
    let err = vault
        .add_version(&anna.public_id, &anna.key, "passport", b"v2")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Store(StoreError::Unavailable(_))));
    assert!(err.is_retryable());

    assert_eq!(vault.blobs().blob_count(), blobs);
    assert_eq!(key_count(&vault), keys);

    // The account record never saw version 2, so the number is still free.
    vault.ledger().fail_puts(false);
    let v2 = vault
        .add_version(&anna.public_id, &anna.key, "passport", b"v2")
        .await
        .unwrap();
    assert_eq!(v2.number, 2);
    assert_eq!(
        vault
            .read_version(&anna.public_id, &anna.key, "passport", 1)
            .await
            .unwrap(),
        b"v1"
    );
}

#[tokio::test]
async fn test_failed_link_releases_new_document() {
    let vault = vault();
    let anna = account(&vault, &anna()).await;
    let blobs = vault.blobs().blob_count();

    vault.blobs().fail_links(true);
    let err = vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Store(_)));

    assert_eq!(vault.blobs().blob_count(), blobs);
    assert_eq!(key_count(&vault), 0);

    vault.blobs().fail_links(false);
    let err = vault
        .get_document(&anna.public_id, &anna.key, "passport")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Core(CoreError::DocumentNotFound(_))));
}

#[tokio::test]
async fn test_failed_upload_leaves_nothing() {
    let vault = vault();
    let anna = account(&vault, &anna()).await;
    vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap();
    let blobs = vault.blobs().blob_count();
    let keys = key_count(&vault);

    vault.blobs().fail_puts(true);
    assert!(vault
        .add_version(&anna.public_id, &anna.key, "passport", b"v2")
        .await
        .is_err());

    assert_eq!(vault.blobs().blob_count(), blobs);
    assert_eq!(key_count(&vault), keys);
}

#[tokio::test]
async fn test_failed_compensation_is_reported() {
    let vault = vault();
    let anna = account(&vault, &anna()).await;
    vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap();
    let keys = key_count(&vault);

    vault.ledger().fail_puts(true);
    vault.blobs().fail_unlinks(true);
    let err = vault
        .add_version(&anna.public_id, &anna.key, "passport", b"v2")
        .await
        .unwrap_err();

    match &err {
        VaultError::Compensation { failures, .. } => assert!(!failures.is_empty()),
        other => panic!("expected compensation failure, got {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::PartialFailure);
    assert!(!err.is_retryable());
    assert!(matches!(
        err.root(),
        VaultError::Store(StoreError::Unavailable(_))
    ));

    // Keys live in a separate store and were still released.
    assert_eq!(key_count(&vault), keys);
}

// ─────────────────────────────────────────────────────────────────────────────
// Cleanup after commit
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cleanup_failure_after_committed_delete() {
    let vault = vault();
    let anna = account(&vault, &anna()).await;
    let v1 = vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap();
    vault
        .add_version(&anna.public_id, &anna.key, "passport", b"v2")
        .await
        .unwrap();

    vault.blobs().fail_unlinks(true);
    let err = vault
        .delete_version(&anna.public_id, &anna.key, "passport", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Cleanup { .. }));
    assert_eq!(err.category(), ErrorCategory::PartialFailure);

    // The delete itself took effect.
    let numbers: Vec<u32> = vault
        .list_versions(&anna.public_id, &anna.key, "passport")
        .await
        .unwrap()
        .iter()
        .map(|v| v.number)
        .collect();
    assert_eq!(numbers, vec![2]);

    // The blob could not be released; the key could.
    assert!(vault.blobs().contains(&v1.content_ref));
    assert!(!has_key(&vault, &v1.key_ref).await);
}

#[tokio::test]
async fn test_cleanup_failure_after_committed_version() {
    let vault = vault();
    let anna = account(&vault, &anna()).await;
    let v1 = vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap();
    let blobs = vault.blobs().blob_count();

    vault.blobs().fail_unlinks(true);
    let err = vault
        .add_version(&anna.public_id, &anna.key, "passport", b"v2")
        .await
        .unwrap_err();
    match &err {
        VaultError::Cleanup { failures } => assert_eq!(failures.len(), 2),
        other => panic!("expected cleanup failure, got {other:?}"),
    }
    assert!(!err.is_retryable());

    // Version 2 committed; the old document and root nodes were kept.
    vault.blobs().fail_unlinks(false);
    assert_eq!(version_numbers(&vault, &anna).await, vec![1, 2]);
    assert_eq!(
        vault
            .read_version(&anna.public_id, &anna.key, "passport", 2)
            .await
            .unwrap(),
        b"v2"
    );
    assert_eq!(vault.blobs().blob_count(), blobs + 3);
    assert!(vault.blobs().contains(&v1.content_ref));
}

// ─────────────────────────────────────────────────────────────────────────────
// Timeouts
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_stalled_ledger_times_out() {
    let vault = vault_with(config().with_ledger_timeout(Duration::from_millis(50)));
    let anna = account(&vault, &anna()).await;

    vault.ledger().stall(true);
    let err = vault
        .get_account(&anna.public_id, &anna.key)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VaultError::Timeout {
            operation: "ledger.get"
        }
    ));
    assert_eq!(err.category(), ErrorCategory::Infrastructure);
    assert!(err.is_retryable());

    vault.ledger().stall(false);
    assert!(vault.get_account(&anna.public_id, &anna.key).await.is_ok());
}

#[tokio::test]
async fn test_write_stalled_before_landing_is_undone() {
    let vault = fast_timeouts();
    let anna = account(&vault, &anna()).await;
    vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap();
    let blobs = vault.blobs().blob_count();
    let keys = key_count(&vault);

    vault.ledger().stall_puts(PutStall::BeforeApply);
    let err = vault
        .add_version(&anna.public_id, &anna.key, "passport", b"v2")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Timeout {
            operation: "ledger.put"
        }
    ));
    assert!(err.is_retryable());

    assert_eq!(vault.blobs().blob_count(), blobs);
    assert_eq!(key_count(&vault), keys);
    assert_eq!(version_numbers(&vault, &anna).await, vec![1]);

    vault.ledger().stall_puts(PutStall::Never);
    let v2 = vault
        .add_version(&anna.public_id, &anna.key, "passport", b"v2")
        .await
        .unwrap();
    assert_eq!(v2.number, 2);
}

#[tokio::test]
async fn test_write_landed_before_timeout_is_kept() {
    let vault = fast_timeouts();
    let anna = account(&vault, &anna()).await;
    vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap();
    let blobs = vault.blobs().blob_count();
    let keys = key_count(&vault);

    vault.ledger().stall_puts(PutStall::AfterApply);
    let v2 = vault
        .add_version(&anna.public_id, &anna.key, "passport", b"v2")
        .await
        .unwrap();
    assert_eq!(v2.number, 2);
    vault.ledger().stall_puts(PutStall::Never);

    assert_eq!(
        vault
            .read_version(&anna.public_id, &anna.key, "passport", 2)
            .await
            .unwrap(),
        b"v2"
    );
    // New content, document and root nodes; the old two released.
    assert_eq!(vault.blobs().blob_count(), blobs + 1);
    assert_eq!(key_count(&vault), keys + 1);
    assert!(has_key(&vault, &v2.key_ref).await);
}

#[tokio::test]
async fn test_unconfirmable_write_keeps_material() {
    let vault = fast_timeouts();
    let anna = account(&vault, &anna()).await;
    vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap();
    let blobs = vault.blobs().blob_count();
    let keys = key_count(&vault);

    vault.ledger().stall_puts(PutStall::AfterApplyWedged);
    let err = vault
        .add_version(&anna.public_id, &anna.key, "passport", b"v2")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Unconfirmed {
            operation: "ledger.put",
            ..
        }
    ));
    assert_eq!(err.category(), ErrorCategory::PartialFailure);
    assert!(!err.is_retryable());

    // Nothing was released: neither the new version nor what it replaced.
    assert_eq!(vault.blobs().blob_count(), blobs + 3);
    assert_eq!(key_count(&vault), keys + 1);

    vault.ledger().stall_puts(PutStall::Never);
    vault.ledger().stall(false);
    assert_eq!(version_numbers(&vault, &anna).await, vec![1, 2]);
    assert_eq!(
        vault
            .read_version(&anna.public_id, &anna.key, "passport", 2)
            .await
            .unwrap(),
        b"v2"
    );
}

#[tokio::test]
async fn test_stalled_link_releases_new_document() {
    let vault = fast_timeouts();
    let anna = account(&vault, &anna()).await;
    let blobs = vault.blobs().blob_count();

    vault.blobs().stall_links(true);
    let err = vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Timeout {
            operation: "blobs.link_child"
        }
    ));

    assert_eq!(vault.blobs().blob_count(), blobs);
    assert_eq!(key_count(&vault), 0);

    vault.blobs().stall_links(false);
    let err = vault
        .get_document(&anna.public_id, &anna.key, "passport")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Core(CoreError::DocumentNotFound(_))));
}

#[tokio::test]
async fn test_stalled_key_write_releases_new_document() {
    let vault = fast_timeouts();
    let anna = account(&vault, &anna()).await;
    let blobs = vault.blobs().blob_count();

    vault.keys().stall_puts(true);
    let err = vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Timeout {
            operation: "keys.put"
        }
    ));

    assert_eq!(vault.blobs().blob_count(), blobs);
    assert_eq!(key_count(&vault), 0);

    vault.keys().stall_puts(false);
    let v1 = vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap();
    assert_eq!(v1.number, 1);
}

#[tokio::test]
async fn test_request_write_landed_before_timeout_is_kept() {
    let vault = fast_timeouts();
    let anna = account(&vault, &anna()).await;
    let bank = account(&vault, &bank()).await;

    vault.ledger().stall_puts(PutStall::AfterApply);
    let request = vault
        .create_request(&bank.public_id, &anna.public_id, RequestTarget::Account, &["email"])
        .await
        .unwrap();
    vault.ledger().stall_puts(PutStall::Never);

    let stored = vault.get_request(&request.public_id).await.unwrap();
    assert_eq!(stored, request);
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_versions_get_distinct_numbers() {
    let vault = Arc::new(vault());
    let anna = account(&vault, &anna()).await;
    vault
        .create_document(&anna.public_id, &anna.key, "passport", "anna", "NL", b"v1")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8u8 {
        let vault = Arc::clone(&vault);
        let anna = anna.clone();
        handles.push(tokio::spawn(async move {
            vault
                .add_version(&anna.public_id, &anna.key, "passport", &[i])
                .await
                .map(|v| v.number)
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().unwrap());
    }
    numbers.sort_unstable();
    assert_eq!(numbers, (2..=9).collect::<Vec<u32>>());

    let stored = vault
        .list_versions(&anna.public_id, &anna.key, "passport")
        .await
        .unwrap();
    assert_eq!(stored.len(), 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_requests_admit_one() {
    let vault = Arc::new(vault());
    let anna = account(&vault, &anna()).await;
    let bank = account(&vault, &bank()).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let vault = Arc::clone(&vault);
        let (from, to) = (bank.public_id, anna.public_id);
        handles.push(tokio::spawn(async move {
            vault
                .create_request(&from, &to, RequestTarget::Account, &["email", "phone"])
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(VaultError::DuplicateRequest { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_accept_and_reject_race() {
    let vault = Arc::new(vault());
    let anna = account(&vault, &anna()).await;
    let bank = account(&vault, &bank()).await;
    let request = vault
        .create_request(&bank.public_id, &anna.public_id, RequestTarget::Account, &["email"])
        .await
        .unwrap();
    let id = request.public_id;

    let accept = {
        let vault = Arc::clone(&vault);
        let anna = anna.clone();
        tokio::spawn(async move {
            vault
                .accept_request(&id, &anna.public_id, &anna.key, &["email"])
                .await
                .map(|outcome| outcome.request)
        })
    };
    let reject = {
        let vault = Arc::clone(&vault);
        let recipient = anna.public_id;
        tokio::spawn(async move { vault.reject_request(&id, &recipient).await })
    };

    let results = [accept.await.unwrap(), reject.await.unwrap()];
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for result in &results {
        if let Err(err) = result {
            assert!(matches!(err, VaultError::Core(CoreError::StatusConflict { .. })));
        }
    }

    let stored = vault.get_request(&id).await.unwrap();
    assert_eq!(&stored, winners[0]);
}
