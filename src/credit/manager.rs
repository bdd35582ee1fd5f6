//! Credit manager: replenishment, spending and blocking accumulation.
//!
//! Balances live in a [`BalanceStore`] and every write restarts the key's
//! 60 second expiry. The remaining TTL therefore tells how long ago the balance
//! was last written, and the manager credits `quota / 60` per elapsed second
//! on the next read. No timestamp is stored.
//!
//! Reading the balance and persisting the debit are separate round-trips, so
//! concurrent spenders on one resource may overspend it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::config::ManagerConfig;
use crate::error::{CreditError, Result};
use crate::store::BalanceStore;

use super::key::{BalanceKey, ResourceKey};
use super::registry::{RegisteredResource, Rejection, ResourceRegistry};
use super::resource::RegulatedResource;
use super::sleeper::{Sleeper, TokioSleeper};

/// Tracks per-minute credit balances for registered resources.
///
/// Safe to share across tasks behind an `Arc`. The registry is local to this
/// instance; balances are shared with every process using the same store and
/// key prefix.
pub struct CreditManager {
    store: Arc<dyn BalanceStore>,
    sleeper: Arc<dyn Sleeper>,
    registry: ResourceRegistry,
    key_prefix: String,
}

impl CreditManager {
    /// Create a credit manager with default settings.
    pub fn new(store: Arc<dyn BalanceStore>) -> Self {
        Self::with_config(store, ManagerConfig::default())
    }

    /// Create a credit manager with configuration.
    pub fn with_config(store: Arc<dyn BalanceStore>, config: ManagerConfig) -> Self {
        Self {
            store,
            sleeper: Arc::new(TokioSleeper),
            registry: ResourceRegistry::new(),
            key_prefix: config.key_prefix,
        }
    }

    /// Replace the sleeper used while accumulating credits.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Register a resource.
    ///
    /// Returns `false` without changing anything if the resource's quota is
    /// below one credit per minute or the resource is already registered.
    pub fn register<R: RegulatedResource + ?Sized>(&self, resource: &R) -> bool {
        let key = ResourceKey::of(resource);
        let quota = resource.credits_per_minute();
        let balance_key = BalanceKey::derive(&self.key_prefix, &key);

        match self.registry.insert(key.clone(), quota, balance_key) {
            Ok(()) => {
                info!(
                    resource = %key.id,
                    resource_type = resource.type_tag(),
                    quota = quota,
                    "Registered resource"
                );
                true
            }
            Err(Rejection::InvalidQuota) => {
                warn!(
                    resource = %key.id,
                    quota = quota,
                    "Refusing to register resource with quota below 1 credit per minute"
                );
                false
            }
            Err(Rejection::AlreadyRegistered) => {
                debug!(resource = %key.id, "Resource is already registered");
                false
            }
        }
    }

    /// Unregister a resource. Returns `false` if it was not registered.
    ///
    /// The shared balance is left in the store to expire on its own.
    pub fn unregister<R: RegulatedResource + ?Sized>(&self, resource: &R) -> bool {
        let key = ResourceKey::of(resource);
        if self.registry.remove(&key).is_none() {
            return false;
        }
        info!(resource = %key.id, "Unregistered resource");
        true
    }

    /// Whether a resource is currently registered with this manager.
    pub fn is_registered<R: RegulatedResource + ?Sized>(&self, resource: &R) -> bool {
        self.registry.contains(&ResourceKey::of(resource))
    }

    /// Get the number of registered resources.
    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    /// The quota a resource was registered with.
    pub fn quota_of<R: RegulatedResource + ?Sized>(&self, resource: &R) -> Option<i64> {
        self.registry
            .get(&ResourceKey::of(resource))
            .map(|entry| entry.quota)
    }

    /// The store key holding a registered resource's balance.
    pub fn balance_key_of<R: RegulatedResource + ?Sized>(&self, resource: &R) -> Option<BalanceKey> {
        self.registry
            .get(&ResourceKey::of(resource))
            .map(|entry| entry.balance_key)
    }

    /// Spend `credits` from a resource's balance.
    ///
    /// If the balance is short, the calling task sleeps until enough credits
    /// should have been replenished, then reads the balance again. The debit is
    /// only written once the balance covers the whole request.
    ///
    /// Requests below one credit are ignored.
    pub async fn spend_credits<R: RegulatedResource + ?Sized>(
        &self,
        resource: &R,
        credits: i64,
    ) -> Result<()> {
        if credits < 1 {
            trace!(credits = credits, "Ignoring spend of less than one credit");
            return Ok(());
        }

        let (key, entry) = self.lookup(resource)?;
        if credits > entry.quota {
            return Err(CreditError::QuotaExceeded {
                requested: credits,
                quota: entry.quota,
            });
        }

        let mut balance = self.load_balance(&key, &entry).await?;
        debug!(
            resource = %key.id,
            credits = credits,
            balance = balance,
            "Spending credits"
        );

        if balance < credits {
            self.accumulate_to(&key, &entry, credits).await?;
            balance = self.load_balance(&key, &entry).await?;
            debug!(
                resource = %key.id,
                credits = credits,
                balance = balance,
                "Balance after accumulation"
            );
        }

        if balance < credits {
            return Err(CreditError::InsufficientCredits {
                requested: credits,
                balance,
            });
        }

        self.save_balance(&key, &entry, balance - credits).await
    }

    /// Read a resource's balance, applying replenishment for the time elapsed
    /// since its last write.
    ///
    /// A resource with no balance in the store starts with its full quota.
    pub async fn retrieve_balance<R: RegulatedResource + ?Sized>(&self, resource: &R) -> Result<i64> {
        let (key, entry) = self.lookup(resource)?;
        self.load_balance(&key, &entry).await
    }

    /// Wait until the balance should have grown to `target` credits.
    ///
    /// Returns immediately if the balance already covers `target`. Fails with
    /// [`CreditError::WindowExceeded`] if the wait would be longer than one
    /// window. The balance is not read again after the wait; callers must do
    /// that themselves.
    pub async fn accumulate<R: RegulatedResource + ?Sized>(&self, resource: &R, target: i64) -> Result<()> {
        let (key, entry) = self.lookup(resource)?;
        self.accumulate_to(&key, &entry, target).await
    }

    fn lookup<R: RegulatedResource + ?Sized>(
        &self,
        resource: &R,
    ) -> Result<(ResourceKey, RegisteredResource)> {
        let key = ResourceKey::of(resource);
        match self.registry.get(&key) {
            Some(entry) => Ok((key, entry)),
            None => Err(CreditError::NotRegistered { resource: key.id }),
        }
    }

    async fn load_balance(&self, key: &ResourceKey, entry: &RegisteredResource) -> Result<i64> {
        let slot = entry.balance_key.as_str();

        let stored = if self.store.exists(slot).await? {
            self.store.get(slot).await?
        } else {
            None
        };
        let Some(stored) = stored else {
            self.save_balance(key, entry, entry.quota).await?;
            return Ok(entry.quota);
        };

        // Another writer may have left a value outside this resource's range.
        let stored = stored.clamp(0, entry.quota);
        let ttl = self.store.ttl(slot).await?;
        let window = entry.balance_key.ttl_secs() as i64;
        let elapsed = window - ttl;
        trace!(
            resource = %key.id,
            balance = stored,
            ttl = ttl,
            "Retrieved stored balance"
        );

        if elapsed <= 0 {
            return Ok(stored);
        }

        let replenishment = elapsed.saturating_mul(entry.quota) / window;
        let balance = stored.saturating_add(replenishment).min(entry.quota);
        trace!(
            resource = %key.id,
            balance = balance,
            ttl = ttl,
            replenishment = replenishment,
            "Replenished balance"
        );

        self.save_balance(key, entry, balance).await?;
        Ok(balance)
    }

    async fn save_balance(
        &self,
        key: &ResourceKey,
        entry: &RegisteredResource,
        balance: i64,
    ) -> Result<()> {
        trace!(resource = %key.id, balance = balance, "Saving balance");
        self.store
            .set_with_ttl(entry.balance_key.as_str(), balance, entry.balance_key.ttl_secs())
            .await?;
        Ok(())
    }

    async fn accumulate_to(
        &self,
        key: &ResourceKey,
        entry: &RegisteredResource,
        target: i64,
    ) -> Result<()> {
        let balance = self.load_balance(key, entry).await?;
        let deficit = target.saturating_sub(balance);
        debug!(
            resource = %key.id,
            target = target,
            balance = balance,
            deficit = deficit,
            "Accumulating credits"
        );
        if deficit < 1 {
            return Ok(());
        }

        let window = entry.balance_key.ttl_secs() as i64;
        let required_secs = required_wait_secs(deficit, entry.quota, window);
        if required_secs > window {
            return Err(CreditError::WindowExceeded { required_secs });
        }

        debug!(resource = %key.id, sleep_secs = required_secs, "Waiting for credits");
        self.sleeper
            .sleep(Duration::from_secs(required_secs as u64))
            .await;
        Ok(())
    }
}

/// Seconds needed to replenish `deficit` credits at `quota` credits per
/// `window` seconds, rounded up.
fn required_wait_secs(deficit: i64, quota: i64, window: i64) -> i64 {
    let needed = deficit as i128 * window as i128;
    let quota = quota as i128;
    let secs = (needed + quota - 1) / quota;
    i64::try_from(secs).unwrap_or(i64::MAX)
}
