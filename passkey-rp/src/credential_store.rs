//! The persistence boundary consumed by [`PasskeyServer`](crate::PasskeyServer).
//!
//! All lookups are keyed by raw bytes. Credential ids and user handles are compared byte-wise,
//! never through a string encoding.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use passkey_rp_types::{
    authenticator::Aaguid,
    cose::CredentialPublicKey,
    rand::random_vec,
    webauthn::{AuthenticatorTransport, PublicKeyCredentialDescriptor},
    Bytes,
};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Length of the user handles generated by [`MemoryStore::get_or_create_user`].
pub const USER_HANDLE_LEN: usize = 32;

/// An account of the relying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelyingPartyUser {
    /// The user handle. Opaque random bytes, assigned once and never reused.
    pub id: Bytes,
    /// The unique account name, e.g. an email address.
    pub name: String,
    /// A human friendly name.
    pub display_name: String,
}

/// A registered public key credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredential {
    /// The credential id chosen by the authenticator.
    pub credential_id: Bytes,
    /// Handle of the owning [`RelyingPartyUser`].
    pub user_handle: Bytes,
    /// The credential public key.
    pub public_key: CredentialPublicKey,
    /// Last signature counter seen, `0` when the authenticator has none.
    pub sign_count: u32,
    /// Transports reported at registration, handed back in allow and exclude lists.
    #[serde(default)]
    pub transports: Option<Vec<AuthenticatorTransport>>,
    /// The attestation statement format the credential was registered with.
    pub attestation_format: String,
    /// The authenticator model.
    pub aaguid: Aaguid,
    /// Whether the credential may be synced. Fixed at registration.
    pub backup_eligible: bool,
    /// Whether the credential is currently backed up.
    pub backed_up: bool,
    /// COSE encoded device bound keys seen for this credential, oldest first.
    #[serde(default)]
    pub device_public_keys: Vec<Bytes>,
    /// When the credential was registered.
    pub registered_at: DateTime<Utc>,
}

impl StoredCredential {
    /// Describe this credential for exclude and allow lists.
    pub fn descriptor(&self) -> PublicKeyCredentialDescriptor {
        PublicKeyCredentialDescriptor::new(self.credential_id.clone(), self.transports.clone())
    }
}

/// The state an assertion leaves behind, written with [`CredentialStore::update_sign_count`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    /// The counter the update was computed from.
    pub expected_sign_count: u32,
    /// The counter to store.
    pub sign_count: u32,
    /// The backup state reported by the authenticator.
    pub backed_up: bool,
    /// A device key to append to [`StoredCredential::device_public_keys`].
    pub new_device_public_key: Option<Bytes>,
}

/// Errors reported by a [`CredentialStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A credential with the same id is already registered.
    #[error("a credential with this id already exists")]
    DuplicateCredential,
    /// The credential or user does not exist.
    #[error("not found")]
    NotFound,
    /// The stored sign counter changed since it was read.
    #[error("the credential was updated concurrently")]
    Conflict,
    /// The storage backend failed.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Storage of users and their credentials.
///
/// Implementations must make [`add_credential`](Self::add_credential) an atomic insert-if-absent
/// and [`update_sign_count`](Self::update_sign_count) an atomic compare-and-swap, serialized per
/// credential id.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user by account name.
    async fn get_user(&self, name: &str) -> Result<Option<RelyingPartyUser>, StoreError>;

    /// Find a user by user handle.
    async fn get_user_by_id(&self, id: &[u8]) -> Result<Option<RelyingPartyUser>, StoreError>;

    /// Find a user by account name, creating it with a fresh random handle when missing.
    async fn get_or_create_user(
        &self,
        name: &str,
        display_name: &str,
    ) -> Result<RelyingPartyUser, StoreError>;

    /// All credentials of the named user, empty for an unknown user.
    async fn list_credentials_for_user(
        &self,
        name: &str,
    ) -> Result<Vec<StoredCredential>, StoreError>;

    /// Look up a credential by its id.
    async fn get_credential_by_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<StoredCredential>, StoreError>;

    /// Persist a new credential unless one with the same id exists.
    async fn add_credential(&self, credential: StoredCredential) -> Result<(), StoreError>;

    /// Apply an assertion's outcome if the stored counter still equals
    /// [`CredentialUpdate::expected_sign_count`], [`StoreError::Conflict`] otherwise.
    async fn update_sign_count(
        &self,
        credential_id: &[u8],
        update: CredentialUpdate,
    ) -> Result<StoredCredential, StoreError>;

    /// Users owning a credential with this id.
    async fn list_users_for_credential_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Vec<RelyingPartyUser>, StoreError>;

    /// All credentials owned by a user handle.
    async fn list_credentials_for_user_handle(
        &self,
        user_handle: &[u8],
    ) -> Result<Vec<StoredCredential>, StoreError>;
}

/// In-memory store.
///
/// Useful for tests and single instance deployments. Every map is sharded so that updates to
/// different credentials never contend on one lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, RelyingPartyUser>,
    user_names: DashMap<Vec<u8>, String>,
    credentials: DashMap<Vec<u8>, StoredCredential>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered credentials.
    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }

    fn credentials_where(&self, owner: &[u8]) -> Vec<StoredCredential> {
        let mut credentials: Vec<StoredCredential> = self
            .credentials
            .iter()
            .filter(|c| c.user_handle.as_slice() == owner)
            .map(|c| c.value().clone())
            .collect();
        credentials.sort_by_key(|c| c.registered_at);
        credentials
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryStore {
    async fn get_user(&self, name: &str) -> Result<Option<RelyingPartyUser>, StoreError> {
        Ok(self.users.get(name).map(|u| u.value().clone()))
    }

    async fn get_user_by_id(&self, id: &[u8]) -> Result<Option<RelyingPartyUser>, StoreError> {
        let Some(name) = self.user_names.get(id).map(|n| n.value().clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&name).map(|u| u.value().clone()))
    }

    async fn get_or_create_user(
        &self,
        name: &str,
        display_name: &str,
    ) -> Result<RelyingPartyUser, StoreError> {
        match self.users.entry(name.to_owned()) {
            Entry::Occupied(user) => Ok(user.get().clone()),
            Entry::Vacant(slot) => {
                let mut id = random_vec(USER_HANDLE_LEN);
                while self.user_names.contains_key(&id) {
                    id = random_vec(USER_HANDLE_LEN);
                }
                let user = RelyingPartyUser {
                    id: id.clone().into(),
                    name: name.to_owned(),
                    display_name: display_name.to_owned(),
                };
                self.user_names.insert(id, name.to_owned());
                log::debug!("created user {name}");
                Ok(slot.insert(user).value().clone())
            }
        }
    }

    async fn list_credentials_for_user(
        &self,
        name: &str,
    ) -> Result<Vec<StoredCredential>, StoreError> {
        let Some(handle) = self.users.get(name).map(|u| u.id.clone()) else {
            return Ok(Vec::new());
        };
        Ok(self.credentials_where(&handle))
    }

    async fn get_credential_by_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<StoredCredential>, StoreError> {
        Ok(self.credentials.get(credential_id).map(|c| c.value().clone()))
    }

    async fn add_credential(&self, credential: StoredCredential) -> Result<(), StoreError> {
        match self.credentials.entry(credential.credential_id.to_vec()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateCredential),
            Entry::Vacant(slot) => {
                slot.insert(credential);
                Ok(())
            }
        }
    }

    async fn update_sign_count(
        &self,
        credential_id: &[u8],
        update: CredentialUpdate,
    ) -> Result<StoredCredential, StoreError> {
        let mut credential = self
            .credentials
            .get_mut(credential_id)
            .ok_or(StoreError::NotFound)?;
        if credential.sign_count != update.expected_sign_count {
            return Err(StoreError::Conflict);
        }
        credential.sign_count = update.sign_count;
        credential.backed_up = update.backed_up;
        if let Some(key) = update.new_device_public_key {
            credential.device_public_keys.push(key);
        }
        Ok(credential.clone())
    }

    async fn list_users_for_credential_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Vec<RelyingPartyUser>, StoreError> {
        let Some(handle) = self
            .credentials
            .get(credential_id)
            .map(|c| c.user_handle.clone())
        else {
            return Ok(Vec::new());
        };
        Ok(self.get_user_by_id(&handle).await?.into_iter().collect())
    }

    async fn list_credentials_for_user_handle(
        &self,
        user_handle: &[u8],
    ) -> Result<Vec<StoredCredential>, StoreError> {
        Ok(self.credentials_where(user_handle))
    }
}

#[async_trait::async_trait]
impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    async fn get_user(&self, name: &str) -> Result<Option<RelyingPartyUser>, StoreError> {
        (**self).get_user(name).await
    }

    async fn get_user_by_id(&self, id: &[u8]) -> Result<Option<RelyingPartyUser>, StoreError> {
        (**self).get_user_by_id(id).await
    }

    async fn get_or_create_user(
        &self,
        name: &str,
        display_name: &str,
    ) -> Result<RelyingPartyUser, StoreError> {
        (**self).get_or_create_user(name, display_name).await
    }

    async fn list_credentials_for_user(
        &self,
        name: &str,
    ) -> Result<Vec<StoredCredential>, StoreError> {
        (**self).list_credentials_for_user(name).await
    }

    async fn get_credential_by_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<StoredCredential>, StoreError> {
        (**self).get_credential_by_id(credential_id).await
    }

    async fn add_credential(&self, credential: StoredCredential) -> Result<(), StoreError> {
        (**self).add_credential(credential).await
    }

    async fn update_sign_count(
        &self,
        credential_id: &[u8],
        update: CredentialUpdate,
    ) -> Result<StoredCredential, StoreError> {
        (**self).update_sign_count(credential_id, update).await
    }

    async fn list_users_for_credential_id(
        &self,
        credential_id: &[u8],
    ) -> Result<Vec<RelyingPartyUser>, StoreError> {
        (**self).list_users_for_credential_id(credential_id).await
    }

    async fn list_credentials_for_user_handle(
        &self,
        user_handle: &[u8],
    ) -> Result<Vec<StoredCredential>, StoreError> {
        (**self).list_credentials_for_user_handle(user_handle).await
    }
}
