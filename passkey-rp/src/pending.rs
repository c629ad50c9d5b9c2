//! Ceremony states waiting for the client's response, keyed by an opaque token.

use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use passkey_rp_types::{encoding, rand::random_vec};
use serde::{Deserialize, Serialize};

use crate::{state::Expiring, Error, ErrorKind};

const TOKEN_LEN: usize = 32;

/// Expired states are swept on every this many inserts.
const PURGE_EVERY: usize = 64;

/// Identifies a pending ceremony. Handed to the transport layer, e.g. as a cookie value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CeremonyToken(String);

impl CeremonyToken {
    fn generate() -> Self {
        Self(encoding::base64url(&random_vec(TOKEN_LEN)))
    }

    /// The token's string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CeremonyToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Display for CeremonyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single use storage for ceremony states.
///
/// Abandoned ceremonies are swept as new ones are inserted, so the table stays bounded by the
/// number of ceremonies started within one timeout. [`PendingCeremonies::purge_expired`] can
/// also be called on a schedule.
#[derive(Debug)]
pub struct PendingCeremonies<T> {
    states: DashMap<CeremonyToken, T>,
    inserts: AtomicUsize,
}

impl<T> Default for PendingCeremonies<T> {
    fn default() -> Self {
        Self {
            states: DashMap::new(),
            inserts: AtomicUsize::new(0),
        }
    }
}

impl<T: Expiring> PendingCeremonies<T> {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a state under a fresh token.
    pub fn insert(&self, state: T) -> CeremonyToken {
        if (self.inserts.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_EVERY == 0 {
            let purged = self.purge_expired();
            if purged > 0 {
                log::debug!("dropped {purged} abandoned ceremonies");
            }
        }
        loop {
            let token = CeremonyToken::generate();
            if let Entry::Vacant(slot) = self.states.entry(token.clone()) {
                slot.insert(state);
                return token;
            }
        }
    }

    /// Remove and return the state of a token.
    ///
    /// The entry is removed whether or not it is still valid, so a token can be redeemed at most
    /// once.
    pub fn take(&self, token: &CeremonyToken) -> Result<T, Error> {
        let (_, state) = self.states.remove(token).ok_or_else(|| {
            Error::new(
                ErrorKind::OptionsExpired,
                "unknown or already used ceremony token",
            )
        })?;
        state.check_expiry(Utc::now())?;
        Ok(state)
    }

    /// Drop every expired state, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.states.len();
        self.states.retain(|_, state| !state.is_expired(now));
        before.saturating_sub(self.states.len())
    }

    /// Number of pending ceremonies.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no ceremony is pending.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration};

    use super::*;

    #[derive(Debug)]
    struct Fake(DateTime<Utc>);

    impl Expiring for Fake {
        fn expires_at(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn tokens_are_single_use() {
        let pending = PendingCeremonies::new();
        let token = pending.insert(Fake(Utc::now() + Duration::minutes(1)));
        assert_eq!(
            encoding::try_from_base64url(token.as_str()).map(|raw| raw.len()),
            Some(TOKEN_LEN)
        );

        pending.take(&token).expect("first use");
        let err = pending.take(&token).expect_err("second use");
        assert_eq!(err.kind(), ErrorKind::OptionsExpired);
    }

    #[test]
    fn expired_states_are_removed_on_take() {
        let pending = PendingCeremonies::new();
        let token = pending.insert(Fake(Utc::now() - Duration::seconds(1)));

        let err = pending.take(&token).expect_err("expired");
        assert_eq!(err.kind(), ErrorKind::OptionsExpired);
        assert!(pending.is_empty());
    }

    #[test]
    fn purge_keeps_live_states() {
        let pending = PendingCeremonies::new();
        pending.insert(Fake(Utc::now() - Duration::seconds(1)));
        pending.insert(Fake(Utc::now() - Duration::seconds(1)));
        let live = pending.insert(Fake(Utc::now() + Duration::minutes(5)));

        assert_eq!(pending.purge_expired(), 2);
        assert_eq!(pending.len(), 1);
        pending.take(&live).expect("live state survives");
    }

    #[test]
    fn inserts_sweep_abandoned_states() {
        let pending = PendingCeremonies::new();
        for _ in 1..PURGE_EVERY {
            pending.insert(Fake(Utc::now() - Duration::seconds(1)));
        }
        assert_eq!(pending.len(), PURGE_EVERY - 1);

        let live = pending.insert(Fake(Utc::now() + Duration::minutes(5)));
        assert_eq!(pending.len(), 1);
        pending.take(&live).expect("the new state is kept");
    }

    #[test]
    fn unknown_token() {
        let pending = PendingCeremonies::<Fake>::new();
        let err = pending
            .take(&CeremonyToken::from("bm90LWEtdG9rZW4".to_owned()))
            .expect_err("never issued");
        assert_eq!(err.kind(), ErrorKind::OptionsExpired);
    }
}
