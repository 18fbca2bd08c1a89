//! Auth profile pool.
//!
//! Owns the per-provider credentials ("profiles") used for outbound model
//! calls. Selection is round-robin by least-recently-used with a preference
//! for profiles that succeeded within the last hour; failures put a profile
//! on an exponentially growing cooldown.
//!
//! Concurrency: each provider's pool sits behind its own mutex, and the
//! whole select/stamp read-modify-write happens under that one lock without
//! ever awaiting, so concurrent callers cannot pick the same profile
//! believing it free or interleave `failure_count`/`cooldown_until` updates.
//! There is no lock shared across providers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// How recently a profile must have succeeded to count as "recently good".
const RECENT_GOOD_WINDOW_MS: i64 = 3_600_000;

/// Default backoff base: one minute.
pub const DEFAULT_BASE_DELAY_MS: i64 = 60_000;

/// Default backoff ceiling: one hour.
pub const DEFAULT_MAX_COOLDOWN_MS: i64 = 3_600_000;

/// A stored credential for one provider, with health-tracking state.
#[derive(Debug)]
struct AuthProfile {
    id: String,
    provider: String,
    credential: SecretString,
    last_used_ms: i64,
    last_good_ms: i64,
    failure_count: u32,
    cooldown_until_ms: i64,
    success_count: u64,
    /// Registration order, used as the sort tie-breaker so selection stays
    /// deterministic when timestamps collide.
    seq: u64,
}

impl AuthProfile {
    fn is_available(&self, now_ms: i64) -> bool {
        self.cooldown_until_ms == 0 || now_ms >= self.cooldown_until_ms
    }
}

/// Read-only health snapshot of a profile, safe to expose to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileStatus {
    pub id: String,
    pub provider: String,
    pub last_used_ms: i64,
    pub last_good_ms: i64,
    pub failure_count: u32,
    pub cooldown_until_ms: i64,
    pub success_count: u64,
    pub available: bool,
}

impl ProfileStatus {
    fn from_profile(p: &AuthProfile, now_ms: i64) -> Self {
        Self {
            id: p.id.clone(),
            provider: p.provider.clone(),
            last_used_ms: p.last_used_ms,
            last_good_ms: p.last_good_ms,
            failure_count: p.failure_count,
            cooldown_until_ms: p.cooldown_until_ms,
            success_count: p.success_count,
            available: p.is_available(now_ms),
        }
    }
}

/// A profile picked for one outbound call.
pub struct SelectedProfile {
    pub id: String,
    pub provider: String,
    credential: SecretString,
}

impl SelectedProfile {
    pub fn credential(&self) -> &SecretString {
        &self.credential
    }
}

impl std::fmt::Debug for SelectedProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedProfile")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Owns the pool of per-provider credentials.
pub struct AuthProfileManager {
    pools: RwLock<HashMap<String, Mutex<Vec<AuthProfile>>>>,
    /// id → provider, so mark/remove don't have to scan every pool.
    index: RwLock<HashMap<String, String>>,
    base_delay_ms: i64,
    max_cooldown_ms: i64,
    next_seq: AtomicU64,
}

impl AuthProfileManager {
    pub fn new(base_delay_ms: i64, max_cooldown_ms: i64) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
            base_delay_ms,
            max_cooldown_ms,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a credential. Re-registering an id replaces the old entry
    /// and resets its health state.
    pub fn add_profile(
        &self,
        id: impl Into<String>,
        provider: impl Into<String>,
        credential: SecretString,
    ) {
        let id = id.into();
        let provider = provider.into();
        self.remove_profile(&id);

        let profile = AuthProfile {
            id: id.clone(),
            provider: provider.clone(),
            credential,
            last_used_ms: 0,
            last_good_ms: 0,
            failure_count: 0,
            cooldown_until_ms: 0,
            success_count: 0,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        let mut pools = write_lock(&self.pools);
        let pool = pools
            .entry(provider.clone())
            .or_insert_with(|| Mutex::new(Vec::new()));
        lock(pool).push(profile);
        drop(pools);

        write_lock(&self.index).insert(id.clone(), provider.clone());
        tracing::debug!(profile = %id, %provider, "auth profile registered");
    }

    /// Remove a credential. Returns whether it existed.
    pub fn remove_profile(&self, id: &str) -> bool {
        let Some(provider) = write_lock(&self.index).remove(id) else {
            return false;
        };
        let pools = read_lock(&self.pools);
        let Some(pool) = pools.get(&provider) else {
            return false;
        };
        let mut pool = lock(pool);
        let before = pool.len();
        pool.retain(|p| p.id != id);
        before != pool.len()
    }

    /// Health snapshot for one profile.
    pub fn profile_status(&self, id: &str) -> Option<ProfileStatus> {
        let provider = read_lock(&self.index).get(id).cloned()?;
        let now = now_ms();
        let pools = read_lock(&self.pools);
        let pool = lock(pools.get(&provider)?);
        pool.iter()
            .find(|p| p.id == id)
            .map(|p| ProfileStatus::from_profile(p, now))
    }

    /// Health snapshots for every profile of one provider, sorted by id.
    pub fn profiles_for_provider(&self, provider: &str) -> Vec<ProfileStatus> {
        let now = now_ms();
        let pools = read_lock(&self.pools);
        let Some(pool) = pools.get(provider) else {
            return Vec::new();
        };
        let mut statuses: Vec<ProfileStatus> = lock(pool)
            .iter()
            .map(|p| ProfileStatus::from_profile(p, now))
            .collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }

    /// Total registered profiles, across all providers.
    pub fn profile_count(&self) -> usize {
        let pools = read_lock(&self.pools);
        pools.values().map(|pool| lock(pool).len()).sum()
    }

    /// Profiles currently selectable (cooldown expired or never set).
    pub fn available_profile_count(&self) -> usize {
        let now = now_ms();
        let pools = read_lock(&self.pools);
        pools
            .values()
            .map(|pool| lock(pool).iter().filter(|p| p.is_available(now)).count())
            .sum()
    }

    /// Pick a profile for one call to `provider`, or `None` when every
    /// profile is cooling down.
    ///
    /// Ordering: least-recently-used first for fairness, but a profile
    /// with a success inside the last hour is taken ahead of colder ones.
    /// Stamps `last_used` on the winner as a side effect.
    pub fn get_available_profile(&self, provider: &str) -> Option<SelectedProfile> {
        let now = now_ms();
        let pools = read_lock(&self.pools);
        let mut pool = lock(pools.get(provider)?);

        let mut available: Vec<&mut AuthProfile> = pool
            .iter_mut()
            .filter(|p| p.is_available(now))
            .collect();
        if available.is_empty() {
            tracing::debug!(%provider, "every auth profile is cooling down");
            return None;
        }
        available.sort_by_key(|p| (p.last_used_ms, p.seq));

        let recently_good = available
            .iter()
            .position(|p| p.last_good_ms > 0 && now - p.last_good_ms < RECENT_GOOD_WINDOW_MS);
        let chosen = &mut available[recently_good.unwrap_or(0)];
        chosen.last_used_ms = now;

        tracing::trace!(profile = %chosen.id, %provider, "auth profile selected");
        Some(SelectedProfile {
            id: chosen.id.clone(),
            provider: chosen.provider.clone(),
            credential: chosen.credential.clone(),
        })
    }

    /// Record a successful call: clears failure history and the cooldown,
    /// and marks the profile recently good.
    pub fn mark_success(&self, id: &str) -> Result<(), ProfileError> {
        self.with_profile(id, |p| {
            p.success_count += 1;
            p.failure_count = 0;
            p.cooldown_until_ms = 0;
            p.last_good_ms = now_ms();
        })
    }

    /// Record a failed call: bumps the failure count and puts the profile
    /// on cooldown for `base_delay * 2^(failures-1)`, capped at the
    /// configured ceiling. Returns the applied cooldown.
    pub fn mark_failure(&self, id: &str) -> Result<Duration, ProfileError> {
        let base = self.base_delay_ms;
        let max = self.max_cooldown_ms;
        let mut applied = Duration::ZERO;
        self.with_profile(id, |p| {
            p.failure_count += 1;
            let exponent = (p.failure_count - 1).min(30);
            let delay_ms = base.saturating_mul(1_i64 << exponent).min(max);
            p.cooldown_until_ms = now_ms() + delay_ms;
            applied = Duration::from_millis(delay_ms as u64);
            tracing::warn!(
                profile = %p.id,
                provider = %p.provider,
                failures = p.failure_count,
                cooldown_ms = delay_ms,
                "auth profile failure recorded"
            );
        })?;
        Ok(applied)
    }

    fn with_profile(
        &self,
        id: &str,
        f: impl FnOnce(&mut AuthProfile),
    ) -> Result<(), ProfileError> {
        let provider = read_lock(&self.index)
            .get(id)
            .cloned()
            .ok_or_else(|| ProfileError::ProfileNotFound(id.to_string()))?;
        let pools = read_lock(&self.pools);
        let pool = pools
            .get(&provider)
            .ok_or_else(|| ProfileError::ProfileNotFound(id.to_string()))?;
        let mut pool = lock(pool);
        let profile = pool
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ProfileError::ProfileNotFound(id.to_string()))?;
        f(profile);
        Ok(())
    }
}

impl Default for AuthProfileManager {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_COOLDOWN_MS)
    }
}

impl std::fmt::Debug for AuthProfileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProfileManager")
            .field("profiles", &self.profile_count())
            .field("available", &self.available_profile_count())
            .finish()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// Lock helpers that survive poisoning: profile state is plain counters and
// timestamps, always left consistent between mutations.
fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_lock<'a, T>(rwlock: &'a RwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
    rwlock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<'a, T>(rwlock: &'a RwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
    rwlock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn manager_with(n: usize) -> AuthProfileManager {
        let m = AuthProfileManager::default();
        for i in 0..n {
            m.add_profile(format!("key-{i}"), "anthropic", secret("sk-test"));
        }
        m
    }

    #[test]
    fn round_robin_visits_each_profile_once() {
        let m = manager_with(3);
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(m.get_available_profile("anthropic").unwrap().id);
        }
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3, "each profile used exactly once: {seen:?}");

        // The fourth call wraps around to whichever went first.
        let fourth = m.get_available_profile("anthropic").unwrap();
        assert_eq!(fourth.id, seen[0]);
    }

    #[test]
    fn recent_success_beats_fairness() {
        let m = manager_with(2);
        let first = m.get_available_profile("anthropic").unwrap();
        m.mark_success(&first.id).unwrap();

        // key-1 has never been used, but key-0 is recently good.
        let second = m.get_available_profile("anthropic").unwrap();
        assert_eq!(second.id, first.id);
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let m = AuthProfileManager::new(60_000, 300_000);
        m.add_profile("p", "openai", secret("sk"));

        let expected = [60_000, 120_000, 240_000, 300_000, 300_000, 300_000];
        for want in expected {
            let applied = m.mark_failure("p").unwrap();
            assert_eq!(applied, Duration::from_millis(want));
        }
    }

    #[test]
    fn deep_failure_history_stays_capped() {
        let m = AuthProfileManager::new(60_000, 300_000);
        m.add_profile("p", "openai", secret("sk"));
        for _ in 0..40 {
            let applied = m.mark_failure("p").unwrap();
            assert!(applied <= Duration::from_millis(300_000));
        }
    }

    #[test]
    fn success_clears_failures_and_cooldown() {
        let m = manager_with(1);
        let id = "key-0";
        m.mark_failure(id).unwrap();
        m.mark_failure(id).unwrap();
        assert_eq!(m.available_profile_count(), 0);

        m.mark_success(id).unwrap();
        let status = m.profile_status(id).unwrap();
        assert_eq!(status.failure_count, 0);
        assert_eq!(status.cooldown_until_ms, 0);
        assert!(status.available);
        assert_eq!(status.success_count, 1);
    }

    #[test]
    fn cooling_profile_is_skipped() {
        let m = manager_with(2);
        m.mark_failure("key-0").unwrap();

        // Only key-1 is selectable now, repeatedly.
        for _ in 0..3 {
            assert_eq!(m.get_available_profile("anthropic").unwrap().id, "key-1");
        }
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let m = manager_with(1);
        m.mark_failure("key-0").unwrap();
        assert!(m.get_available_profile("anthropic").is_none());
    }

    #[test]
    fn unknown_provider_returns_none() {
        let m = manager_with(1);
        assert!(m.get_available_profile("google").is_none());
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let m = manager_with(1);
        assert_eq!(
            m.mark_success("nope"),
            Err(ProfileError::ProfileNotFound("nope".into()))
        );
        assert!(m.mark_failure("nope").is_err());
    }

    #[test]
    fn remove_profile_works() {
        let m = manager_with(2);
        assert!(m.remove_profile("key-0"));
        assert!(!m.remove_profile("key-0"));
        assert_eq!(m.profile_count(), 1);
        assert!(m.profile_status("key-0").is_none());
    }

    #[test]
    fn providers_are_isolated() {
        let m = AuthProfileManager::default();
        m.add_profile("a", "anthropic", secret("sk-a"));
        m.add_profile("o", "openai", secret("sk-o"));

        m.mark_failure("a").unwrap();
        // Anthropic exhausted, OpenAI untouched.
        assert!(m.get_available_profile("anthropic").is_none());
        assert_eq!(m.get_available_profile("openai").unwrap().id, "o");
    }

    #[test]
    fn reregistering_resets_health() {
        let m = manager_with(1);
        m.mark_failure("key-0").unwrap();
        m.add_profile("key-0", "anthropic", secret("sk-new"));
        let status = m.profile_status("key-0").unwrap();
        assert_eq!(status.failure_count, 0);
        assert!(status.available);
        assert_eq!(m.profile_count(), 1);
    }

    #[test]
    fn selected_profile_debug_hides_credential() {
        let m = manager_with(1);
        let p = m.get_available_profile("anthropic").unwrap();
        let debug = format!("{p:?}");
        assert!(!debug.contains("sk-test"));
    }

    #[test]
    fn concurrent_selection_stays_consistent() {
        use std::sync::Arc;

        let m = Arc::new(manager_with(4));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = Arc::clone(&m);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    if let Some(p) = m.get_available_profile("anthropic") {
                        let _ = m.mark_success(&p.id);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // 400 successes landed somewhere; counters must add up.
        let total: u64 = m
            .profiles_for_provider("anthropic")
            .iter()
            .map(|s| s.success_count)
            .sum();
        assert_eq!(total, 400);
        assert_eq!(m.available_profile_count(), 4);
    }
}
