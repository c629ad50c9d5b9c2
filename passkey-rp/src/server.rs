//! A ready to use server side: a [`RelyingParty`], a [`CredentialStore`] and the table of
//! pending ceremonies.
//!
//! The transport layer only moves options and responses back and forth and keeps the
//! [`CeremonyToken`] of each ceremony, for instance in a cookie.

use passkey_rp_types::webauthn::{
    AttestationConveyancePreference, AuthenticatedPublicKeyCredential,
    AuthenticationExtensionsClientInputs, AuthenticatorSelectionCriteria,
    CreatedPublicKeyCredential, CredentialCreationOptions, CredentialPropertiesOutput,
    CredentialRequestOptions, UserVerificationRequirement,
};
use tokio::sync::watch;

use crate::{
    credential_store::{
        CredentialStore, CredentialUpdate, RelyingPartyUser, StoreError, StoredCredential,
    },
    pending::{CeremonyToken, PendingCeremonies},
    relying_party::{check_sign_count, AssertionResult},
    state::{AssertionState, RegistrationState},
    Error, ErrorKind, RelyingParty,
};

#[cfg(test)]
mod tests;

/// A successful sign in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOutcome {
    /// The signed in user.
    pub user: RelyingPartyUser,
    /// The credential after the update.
    pub credential: StoredCredential,
    /// Whether the authenticator verified the user.
    pub user_verified: bool,
}

/// A registered credential and what the client reported about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    /// The stored credential.
    pub credential: StoredCredential,
    /// Whether the client reported the credential as discoverable.
    pub discoverable: Option<bool>,
}

/// Drives both ceremonies against a credential store.
#[derive(Debug)]
pub struct PasskeyServer<S> {
    relying_party: RelyingParty,
    store: S,
    registrations: PendingCeremonies<RegistrationState>,
    assertions: PendingCeremonies<AssertionState>,
}

impl<S: CredentialStore> PasskeyServer<S> {
    /// Create a server with no pending ceremonies.
    pub fn new(relying_party: RelyingParty, store: S) -> Self {
        Self {
            relying_party,
            store,
            registrations: PendingCeremonies::new(),
            assertions: PendingCeremonies::new(),
        }
    }

    /// Read access to the relying party.
    pub fn relying_party(&self) -> &RelyingParty {
        &self.relying_party
    }

    /// Read access to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Begin registering a credential for `username`, creating the account on first use.
    pub async fn start_registration(
        &self,
        username: &str,
        display_name: &str,
        authenticator_selection: Option<AuthenticatorSelectionCriteria>,
        attestation: AttestationConveyancePreference,
    ) -> Result<(CeremonyToken, CredentialCreationOptions), Error> {
        let user = self.store.get_or_create_user(username, display_name).await?;
        let exclude_credentials = self
            .store
            .list_credentials_for_user(username)
            .await?
            .iter()
            .map(StoredCredential::descriptor)
            .collect();
        let extensions = AuthenticationExtensionsClientInputs {
            cred_props: Some(true),
            ..Default::default()
        };

        let (options, state) = self.relying_party.begin_registration(
            &user,
            exclude_credentials,
            authenticator_selection,
            attestation,
            Some(extensions),
        );
        Ok((self.registrations.insert(state), options))
    }

    /// Verify a registration response and persist the credential.
    pub async fn finish_registration(
        &self,
        token: &CeremonyToken,
        response: &CreatedPublicKeyCredential,
    ) -> Result<RegistrationOutcome, Error> {
        let state = self.registrations.take(token)?;
        let result = self
            .relying_party
            .finish_registration(state, response, &self.store)
            .await?;

        self.store
            .add_credential(result.credential.clone())
            .await
            .map_err(|e| {
                log::warn!("could not store the new credential: {e}");
                Error::from(e)
            })?;

        Ok(RegistrationOutcome {
            credential: result.credential,
            discoverable: response
                .client_extension_results
                .cred_props
                .and_then(|CredentialPropertiesOutput { discoverable }| discoverable),
        })
    }

    /// Begin a sign in.
    ///
    /// With a username the options list that user's credentials. Without one any discoverable
    /// credential may answer.
    pub async fn start_assertion(
        &self,
        username: Option<&str>,
        user_verification: UserVerificationRequirement,
    ) -> Result<(CeremonyToken, CredentialRequestOptions), Error> {
        let allow_credentials = match username {
            Some(username) => {
                if self.store.get_user(username).await?.is_none() {
                    return Err(Error::new(
                        ErrorKind::UserNotFound,
                        format!("no user named {username}"),
                    ));
                }
                let credentials = self.store.list_credentials_for_user(username).await?;
                if credentials.is_empty() {
                    return Err(Error::new(
                        ErrorKind::CredentialNotFound,
                        format!("{username} has no credentials"),
                    ));
                }
                credentials.iter().map(StoredCredential::descriptor).collect()
            }
            None => Vec::new(),
        };

        let (options, state) =
            self.relying_party
                .begin_assertion(allow_credentials, user_verification, None);
        Ok((self.assertions.insert(state), options))
    }

    /// Verify an assertion response and persist the new counter and device key.
    pub async fn finish_assertion(
        &self,
        token: &CeremonyToken,
        response: &AuthenticatedPublicKeyCredential,
    ) -> Result<AssertionOutcome, Error> {
        let state = self.assertions.take(token)?;
        let credential = self
            .store
            .get_credential_by_id(&response.raw_id)
            .await?
            .ok_or_else(|| {
                Error::new(ErrorKind::CredentialNotFound, "unknown credential id")
            })?;

        let result = self
            .relying_party
            .finish_assertion(state, response, &credential, &self.store)
            .await?;
        let credential = self.persist(&credential, &result).await?;

        let user = self
            .store
            .get_user_by_id(&credential.user_handle)
            .await?
            .ok_or_else(|| Error::new(ErrorKind::UserNotFound, "credential owner is gone"))?;
        log::debug!("{} signed in", user.name);

        Ok(AssertionOutcome {
            user,
            credential,
            user_verified: result.user_verified,
        })
    }

    /// Drop expired pending ceremonies, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.registrations.purge_expired() + self.assertions.purge_expired()
    }

    /// Number of ceremonies started and not yet finished or purged.
    pub fn pending(&self) -> usize {
        self.registrations.len() + self.assertions.len()
    }

    /// Purge expired ceremonies once per ceremony timeout until `shutdown` changes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let purged = self.purge_expired();
            if purged > 0 {
                log::debug!("dropped {purged} abandoned ceremonies");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.relying_party.config().timeout) => {}
                _ = shutdown.changed() => break,
            }
        }
        log::debug!("ceremony purge loop stopped");
    }

    /// Compare-and-swap the counter. When another assertion won the race the counter is checked
    /// again against the fresh value before a single retry.
    async fn persist(
        &self,
        read: &StoredCredential,
        result: &AssertionResult,
    ) -> Result<StoredCredential, Error> {
        let update = CredentialUpdate {
            expected_sign_count: read.sign_count,
            sign_count: result.new_sign_count,
            backed_up: result.backed_up,
            new_device_public_key: result.new_device_public_key.clone(),
        };
        match self.store.update_sign_count(&read.credential_id, update).await {
            Err(StoreError::Conflict) => {}
            other => return other.map_err(Error::from),
        }

        let current = self
            .store
            .get_credential_by_id(&read.credential_id)
            .await?
            .ok_or_else(|| Error::from(StoreError::NotFound))?;
        check_sign_count(current.sign_count, result.new_sign_count).map_err(|err| {
            log::warn!("assertion rejected after a concurrent update: {err}");
            err
        })?;
        let new_device_public_key = result
            .new_device_public_key
            .clone()
            .filter(|key| !current.device_public_keys.contains(key));
        let update = CredentialUpdate {
            expected_sign_count: current.sign_count,
            sign_count: result.new_sign_count,
            backed_up: result.backed_up,
            new_device_public_key,
        };
        Ok(self
            .store
            .update_sign_count(&read.credential_id, update)
            .await?)
    }
}
