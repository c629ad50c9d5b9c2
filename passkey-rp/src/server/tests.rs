use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use passkey_rp_types::{
    authenticator::Flags,
    webauthn::{
        AttestationConveyancePreference, CredentialPropertiesOutput, UserVerificationRequirement,
    },
};

use super::*;
use crate::{
    config::RelyingPartyConfig,
    credential_store::MemoryStore,
    testing::{SoftwareAuthenticator, ORIGIN, RP_ID},
};

fn server<S: CredentialStore>(store: S) -> PasskeyServer<S> {
    let config = RelyingPartyConfig::new(RP_ID, "Example", [ORIGIN]);
    let relying_party = RelyingParty::new(config).expect("valid config");
    PasskeyServer::new(relying_party, store)
}

async fn register<S: CredentialStore>(
    server: &PasskeyServer<S>,
    username: &str,
    authenticator: &mut SoftwareAuthenticator,
) -> Result<RegistrationOutcome, Error> {
    let (token, options) = server
        .start_registration(username, username, None, AttestationConveyancePreference::None)
        .await
        .expect("registration options");
    let response = authenticator.register(&options.public_key, ORIGIN);
    server.finish_registration(&token, &response).await
}

async fn sign_in<S: CredentialStore>(
    server: &PasskeyServer<S>,
    username: Option<&str>,
    authenticator: &mut SoftwareAuthenticator,
) -> Result<AssertionOutcome, Error> {
    let (token, options) = server
        .start_assertion(username, UserVerificationRequirement::Preferred)
        .await?;
    let response = authenticator.assert(&options.public_key, ORIGIN);
    server.finish_assertion(&token, &response).await
}

#[tokio::test]
async fn register_then_sign_in() {
    let server = server(MemoryStore::new());
    let mut authenticator = SoftwareAuthenticator::new();
    authenticator.extensions.cred_props = Some(CredentialPropertiesOutput {
        discoverable: Some(true),
    });

    let registered = register(&server, "alice", &mut authenticator)
        .await
        .expect("registration succeeds");
    assert_eq!(registered.discoverable, Some(true));
    assert_eq!(server.store().credential_count(), 1);

    let (_, options) = server
        .start_assertion(Some("alice"), UserVerificationRequirement::Preferred)
        .await
        .expect("request options");
    let allowed = options
        .public_key
        .allow_credentials
        .expect("allow list for a known user");
    assert_eq!(allowed.len(), 1);
    assert_eq!(allowed[0].id, registered.credential.credential_id);

    let outcome = sign_in(&server, Some("alice"), &mut authenticator)
        .await
        .expect("sign in succeeds");
    assert_eq!(outcome.user.name, "alice");
    assert_eq!(outcome.credential.sign_count, 1);
    assert!(outcome.user_verified);

    let stored = server
        .store()
        .get_credential_by_id(&registered.credential.credential_id)
        .await
        .expect("store works")
        .expect("credential exists");
    assert_eq!(stored.sign_count, 1);
}

#[tokio::test]
async fn purge_loop_drops_abandoned_ceremonies() {
    let config =
        RelyingPartyConfig::new(RP_ID, "Example", [ORIGIN]).timeout(Duration::from_millis(1));
    let relying_party = RelyingParty::new(config).expect("valid config");
    let server = Arc::new(PasskeyServer::new(relying_party, MemoryStore::new()));
    for username in ["alice", "bob", "carol"] {
        server
            .start_registration(username, username, None, AttestationConveyancePreference::None)
            .await
            .expect("registration options");
    }
    assert_eq!(server.pending(), 3);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (shutdown, receiver) = watch::channel(false);
    let task = tokio::spawn({
        let server = server.clone();
        async move { server.run(receiver).await }
    });
    for _ in 0..100 {
        if server.pending() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(server.pending(), 0);

    shutdown.send(true).expect("loop is running");
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("loop stops on shutdown")
        .expect("loop does not panic");
}

#[tokio::test]
async fn second_registration_excludes_existing_credentials() {
    let server = server(MemoryStore::new());
    let mut first = SoftwareAuthenticator::new();
    let registered = register(&server, "alice", &mut first)
        .await
        .expect("registration succeeds");

    let (_, options) = server
        .start_registration("alice", "Alice", None, AttestationConveyancePreference::None)
        .await
        .expect("registration options");
    let excluded = options
        .public_key
        .exclude_credentials
        .expect("existing credential is excluded");
    assert_eq!(excluded[0].id, registered.credential.credential_id);
    assert_eq!(options.public_key.user.id, registered.credential.user_handle);
}

#[tokio::test]
async fn discoverable_sign_in_identifies_the_user() {
    let server = server(MemoryStore::new());
    let mut authenticator = SoftwareAuthenticator::new();
    register(&server, "alice", &mut authenticator)
        .await
        .expect("registration succeeds");

    let outcome = sign_in(&server, None, &mut authenticator)
        .await
        .expect("sign in succeeds");
    assert_eq!(outcome.user.name, "alice");
}

#[tokio::test]
async fn tokens_are_single_use() {
    let server = server(MemoryStore::new());
    let mut authenticator = SoftwareAuthenticator::new();
    let (token, options) = server
        .start_registration("alice", "Alice", None, AttestationConveyancePreference::None)
        .await
        .expect("registration options");
    let response = authenticator.register(&options.public_key, ORIGIN);
    server
        .finish_registration(&token, &response)
        .await
        .expect("first use succeeds");

    let err = server
        .finish_registration(&token, &response)
        .await
        .expect_err("replayed token");
    assert_eq!(err.kind(), ErrorKind::OptionsExpired);

    let (token, options) = server
        .start_assertion(Some("alice"), UserVerificationRequirement::Preferred)
        .await
        .expect("request options");
    let response = authenticator.assert(&options.public_key, ORIGIN);
    server
        .finish_assertion(&token, &response)
        .await
        .expect("first use succeeds");
    let err = server
        .finish_assertion(&token, &response)
        .await
        .expect_err("replayed token");
    assert_eq!(err.kind(), ErrorKind::OptionsExpired);
    assert_eq!(server.purge_expired(), 0);
}

#[tokio::test]
async fn credential_ids_are_unique_across_users() {
    let server = server(MemoryStore::new());
    let mut first = SoftwareAuthenticator::new();
    register(&server, "alice", &mut first)
        .await
        .expect("registration succeeds");

    let mut second = SoftwareAuthenticator::new();
    second.credential_id = first.credential_id.clone();
    let err = register(&server, "bob", &mut second)
        .await
        .expect_err("credential id already taken");
    assert_eq!(err.kind(), ErrorKind::DuplicateCredential);
    assert_eq!(server.store().credential_count(), 1);
    assert!(server
        .store()
        .list_credentials_for_user("bob")
        .await
        .expect("store works")
        .is_empty());
}

#[tokio::test]
async fn failed_registration_stores_nothing() {
    let server = server(MemoryStore::new());
    let mut authenticator = SoftwareAuthenticator::new();
    let (token, options) = server
        .start_registration("alice", "Alice", None, AttestationConveyancePreference::None)
        .await
        .expect("registration options");
    let response = authenticator.register(&options.public_key, "https://evil.example");

    let err = server
        .finish_registration(&token, &response)
        .await
        .expect_err("foreign origin");
    assert_eq!(err.kind(), ErrorKind::OriginNotAllowed);
    assert_eq!(server.store().credential_count(), 0);
}

#[tokio::test]
async fn unknown_users_cannot_start_a_sign_in() {
    let server = server(MemoryStore::new());
    let err = server
        .start_assertion(Some("mallory"), UserVerificationRequirement::Preferred)
        .await
        .expect_err("unknown user");
    assert_eq!(err.kind(), ErrorKind::UserNotFound);

    server
        .store()
        .get_or_create_user("carol", "Carol")
        .await
        .expect("user created");
    let err = server
        .start_assertion(Some("carol"), UserVerificationRequirement::Preferred)
        .await
        .expect_err("user without credentials");
    assert_eq!(err.kind(), ErrorKind::CredentialNotFound);
}

#[tokio::test]
async fn rejected_assertions_leave_the_counter_alone() {
    let server = server(MemoryStore::new());
    let mut authenticator = SoftwareAuthenticator::new().with_counter(5);
    let registered = register(&server, "alice", &mut authenticator)
        .await
        .expect("registration succeeds");
    sign_in(&server, Some("alice"), &mut authenticator)
        .await
        .expect("sign in succeeds");

    let (token, options) = server
        .start_assertion(Some("alice"), UserVerificationRequirement::Preferred)
        .await
        .expect("request options");
    let response = authenticator.assert_with_counter(&options.public_key, ORIGIN, 3);
    let err = server
        .finish_assertion(&token, &response)
        .await
        .expect_err("counter went backwards");
    assert_eq!(err.kind(), ErrorKind::PossibleCloning);

    let stored = server
        .store()
        .get_credential_by_id(&registered.credential.credential_id)
        .await
        .expect("store works")
        .expect("credential exists");
    assert_eq!(stored.sign_count, 6);
}

#[tokio::test]
async fn user_presence_is_required() {
    let server = server(MemoryStore::new());
    let mut authenticator = SoftwareAuthenticator::new();
    register(&server, "alice", &mut authenticator)
        .await
        .expect("registration succeeds");

    authenticator.flags = Flags::UV;
    let err = sign_in(&server, Some("alice"), &mut authenticator)
        .await
        .expect_err("no user presence");
    assert_eq!(err.kind(), ErrorKind::UserPresenceRequired);
}

/// A store whose next credential read returns a snapshot taken earlier, as if another
/// assertion committed between the read and the update.
#[derive(Default)]
struct LaggingStore {
    inner: MemoryStore,
    stale: Mutex<Option<StoredCredential>>,
}

impl LaggingStore {
    fn lag_behind(&self, snapshot: StoredCredential) {
        *self.stale.lock().expect("lock") = Some(snapshot);
    }
}

#[async_trait::async_trait]
impl CredentialStore for LaggingStore {
    async fn get_user(&self, name: &str) -> Result<Option<RelyingPartyUser>, StoreError> {
        self.inner.get_user(name).await
    }

    async fn get_user_by_id(&self, id: &[u8]) -> Result<Option<RelyingPartyUser>, StoreError> {
        self.inner.get_user_by_id(id).await
    }

    async fn get_or_create_user(
        &self,
        name: &str,
        display_name: &str,
    ) -> Result<RelyingPartyUser, StoreError> {
        self.inner.get_or_create_user(name, display_name).await
    }

    async fn list_credentials_for_user(
        &self,
        name: &str,
    ) -> Result<Vec<StoredCredential>, StoreError> {
        self.inner.list_credentials_for_user(name).await
    }

    async fn get_credential_by_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<StoredCredential>, StoreError> {
        let stale = self.stale.lock().expect("lock").take();
        match stale {
            Some(snapshot) => Ok(Some(snapshot)),
            None => self.inner.get_credential_by_id(credential_id).await,
        }
    }

    async fn add_credential(&self, credential: StoredCredential) -> Result<(), StoreError> {
        self.inner.add_credential(credential).await
    }

    async fn update_sign_count(
        &self,
        credential_id: &[u8],
        update: CredentialUpdate,
    ) -> Result<StoredCredential, StoreError> {
        self.inner.update_sign_count(credential_id, update).await
    }

    async fn list_users_for_credential_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Vec<RelyingPartyUser>, StoreError> {
        self.inner.list_users_for_credential_id(credential_id).await
    }

    async fn list_credentials_for_user_handle(
        &self,
        user_handle: &[u8],
    ) -> Result<Vec<StoredCredential>, StoreError> {
        self.inner.list_credentials_for_user_handle(user_handle).await
    }
}

async fn commit(store: &LaggingStore, credential: &StoredCredential, sign_count: u32) {
    store
        .inner
        .update_sign_count(
            &credential.credential_id,
            CredentialUpdate {
                expected_sign_count: credential.sign_count,
                sign_count,
                backed_up: credential.backed_up,
                new_device_public_key: None,
            },
        )
        .await
        .expect("concurrent commit");
}

#[tokio::test]
async fn lost_race_with_a_higher_counter_is_cloning() {
    let server = server(LaggingStore::default());
    let mut authenticator = SoftwareAuthenticator::new();
    let registered = register(&server, "alice", &mut authenticator)
        .await
        .expect("registration succeeds")
        .credential;

    commit(server.store(), &registered, 3).await;
    server.store().lag_behind(registered);

    let err = sign_in(&server, Some("alice"), &mut authenticator)
        .await
        .expect_err("counter 1 lost to counter 3");
    assert_eq!(err.kind(), ErrorKind::PossibleCloning);
}

#[tokio::test]
async fn lost_race_with_a_lower_counter_is_retried() {
    let server = server(LaggingStore::default());
    let mut authenticator = SoftwareAuthenticator::new().with_counter(1);
    let registered = register(&server, "alice", &mut authenticator)
        .await
        .expect("registration succeeds")
        .credential;

    commit(server.store(), &registered, 2).await;
    server.store().lag_behind(registered);
    authenticator.counter = 4;

    let outcome = sign_in(&server, Some("alice"), &mut authenticator)
        .await
        .expect("counter 5 is still ahead after the retry");
    assert_eq!(outcome.credential.sign_count, 5);
}
