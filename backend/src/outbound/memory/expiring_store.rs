//! Process-local expiring store.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::{Clock, DefaultClock};

use crate::domain::ports::{ExpiringStore, ExpiringStoreError};

struct Entry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    values: HashMap<String, Entry<String>>,
    sets: HashMap<String, Entry<BTreeSet<String>>>,
}

/// [`ExpiringStore`] kept in a mutex-guarded map.
///
/// Expired keys are treated as absent and pruned lazily on access.
pub struct InMemoryExpiringStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryExpiringStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl InMemoryExpiringStore {
    /// Store whose expiry follows `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
        }
    }

    fn deadline(&self, ttl: Duration) -> Result<DateTime<Utc>, ExpiringStoreError> {
        let delta = TimeDelta::from_std(ttl)
            .map_err(|err| ExpiringStoreError::backend(format!("invalid ttl: {err}")))?;
        Ok(self.clock.utc() + delta)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ExpiringStore for InMemoryExpiringStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ExpiringStoreError> {
        let expires_at = self.deadline(ttl)?;
        self.state().values.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ExpiringStoreError> {
        let now = self.clock.utc();
        let mut state = self.state();
        match state.values.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                state.values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), ExpiringStoreError> {
        let mut state = self.state();
        state.values.remove(key);
        state.sets.remove(key);
        Ok(())
    }

    async fn add_member(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), ExpiringStoreError> {
        let expires_at = self.deadline(ttl)?;
        let now = self.clock.utc();
        let mut state = self.state();
        let entry = state.sets.entry(key.to_owned()).or_insert_with(|| Entry {
            value: BTreeSet::new(),
            expires_at,
        });
        if entry.expires_at <= now {
            entry.value.clear();
        }
        entry.value.insert(member.to_owned());
        entry.expires_at = expires_at;
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, ExpiringStoreError> {
        let now = self.clock.utc();
        let state = self.state();
        Ok(state
            .sets
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), ExpiringStoreError> {
        if let Some(entry) = self.state().sets.get_mut(key) {
            entry.value.remove(member);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::test_support::MutableClock;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    #[fixture]
    fn clock() -> Arc<MutableClock> {
        Arc::new(MutableClock::new(
            Utc.with_ymd_and_hms(2031, 1, 1, 12, 0, 0)
                .single()
                .expect("valid timestamp"),
        ))
    }

    #[rstest]
    #[tokio::test]
    async fn values_expire_after_their_ttl(clock: Arc<MutableClock>) {
        let store = InMemoryExpiringStore::with_clock(clock.clone());
        store
            .put("k", "v", Duration::from_secs(600))
            .await
            .expect("put");
        clock.advance_seconds(599);
        assert_eq!(store.get("k").await.expect("get"), Some("v".to_owned()));
        clock.advance_seconds(1);
        assert_eq!(store.get("k").await.expect("get"), None);
    }

    #[rstest]
    #[tokio::test]
    async fn put_resets_the_expiry(clock: Arc<MutableClock>) {
        let store = InMemoryExpiringStore::with_clock(clock.clone());
        store.put("k", "a", Duration::from_secs(10)).await.expect("put");
        clock.advance_seconds(8);
        store.put("k", "b", Duration::from_secs(10)).await.expect("put");
        clock.advance_seconds(8);
        assert_eq!(store.get("k").await.expect("get"), Some("b".to_owned()));
    }

    #[rstest]
    #[tokio::test]
    async fn sets_track_members_until_expiry(clock: Arc<MutableClock>) {
        let store = InMemoryExpiringStore::with_clock(clock.clone());
        let ttl = Duration::from_secs(30);
        store.add_member("s", "one", ttl).await.expect("add");
        store.add_member("s", "two", ttl).await.expect("add");
        store.remove_member("s", "one").await.expect("remove");
        assert_eq!(store.members("s").await.expect("members"), vec!["two".to_owned()]);
        clock.advance_seconds(31);
        assert!(store.members("s").await.expect("members").is_empty());
    }
}
