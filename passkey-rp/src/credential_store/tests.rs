use chrono::Utc;
use passkey_rp_types::authenticator::Aaguid;

use super::*;
use crate::testing::TestKey;

fn credential(id: &[u8], owner: &RelyingPartyUser) -> StoredCredential {
    StoredCredential {
        credential_id: id.into(),
        user_handle: owner.id.clone(),
        public_key: TestKey::random().credential_key(),
        sign_count: 0,
        transports: None,
        attestation_format: "none".into(),
        aaguid: Aaguid::new_empty(),
        backup_eligible: true,
        backed_up: false,
        device_public_keys: Vec::new(),
        registered_at: Utc::now(),
    }
}

#[tokio::test]
async fn users_get_a_stable_random_handle() {
    let store = MemoryStore::new();
    let alice = store
        .get_or_create_user("alice", "Alice")
        .await
        .expect("create alice");
    let again = store
        .get_or_create_user("alice", "Alice Liddell")
        .await
        .expect("get alice");
    let bob = store
        .get_or_create_user("bob", "Bob")
        .await
        .expect("create bob");

    assert_eq!(alice, again);
    assert_eq!(alice.id.len(), USER_HANDLE_LEN);
    assert_ne!(alice.id, bob.id);
    assert_eq!(
        store.get_user_by_id(&bob.id).await.expect("lookup"),
        Some(bob)
    );
    assert_eq!(store.get_user("carol").await.expect("lookup"), None);
}

#[tokio::test]
async fn add_credential_is_insert_if_absent() {
    let store = MemoryStore::new();
    let alice = store.get_or_create_user("alice", "Alice").await.expect("alice");
    let bob = store.get_or_create_user("bob", "Bob").await.expect("bob");

    store
        .add_credential(credential(b"cred-1", &alice))
        .await
        .expect("first insert");
    let err = store
        .add_credential(credential(b"cred-1", &bob))
        .await
        .expect_err("same id for another user");
    assert_eq!(err, StoreError::DuplicateCredential);

    let owners = store
        .list_users_for_credential_id(b"cred-1")
        .await
        .expect("owners");
    assert_eq!(owners, vec![alice]);
    assert!(store
        .list_credentials_for_user("bob")
        .await
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn credential_ids_are_compared_bytewise() {
    let store = MemoryStore::new();
    let alice = store.get_or_create_user("alice", "Alice").await.expect("alice");
    store
        .add_credential(credential(&[0xc3, 0xa9], &alice))
        .await
        .expect("insert");

    assert!(store
        .get_credential_by_id("é".as_bytes())
        .await
        .expect("lookup")
        .is_some());
    assert!(store
        .get_credential_by_id(&[0xc3])
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn update_sign_count_is_compare_and_swap() {
    let store = MemoryStore::new();
    let alice = store.get_or_create_user("alice", "Alice").await.expect("alice");
    store
        .add_credential(credential(b"cred", &alice))
        .await
        .expect("insert");

    let updated = store
        .update_sign_count(
            b"cred",
            CredentialUpdate {
                expected_sign_count: 0,
                sign_count: 4,
                backed_up: true,
                new_device_public_key: Some(vec![1, 2, 3].into()),
            },
        )
        .await
        .expect("counter matches");
    assert_eq!(updated.sign_count, 4);
    assert!(updated.backed_up);
    assert_eq!(updated.device_public_keys, vec![Bytes::from(vec![1, 2, 3])]);

    let err = store
        .update_sign_count(
            b"cred",
            CredentialUpdate {
                expected_sign_count: 0,
                sign_count: 5,
                backed_up: true,
                new_device_public_key: None,
            },
        )
        .await
        .expect_err("stale counter");
    assert_eq!(err, StoreError::Conflict);

    let err = store
        .update_sign_count(
            b"missing",
            CredentialUpdate {
                expected_sign_count: 0,
                sign_count: 1,
                backed_up: false,
                new_device_public_key: None,
            },
        )
        .await
        .expect_err("unknown credential");
    assert_eq!(err, StoreError::NotFound);
}

#[tokio::test]
async fn shared_store_through_arc() {
    let store = Arc::new(MemoryStore::new());
    let alice = store.get_or_create_user("alice", "Alice").await.expect("alice");
    let handle = Arc::clone(&store);
    handle
        .add_credential(credential(b"cred", &alice))
        .await
        .expect("insert");

    let credentials = store
        .list_credentials_for_user_handle(&alice.id)
        .await
        .expect("list");
    assert_eq!(credentials.len(), 1);
    assert_eq!(store.credential_count(), 1);
}
