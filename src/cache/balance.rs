//! Read-through cache for the previous month's closing balance
//!
//! Lookups are answered from, in order: the in-memory tier, the durable
//! store, a fetch already in flight for the same key, and finally a new
//! network fetch. Failures degrade to `None` and are never surfaced.
//!
//! Each in-flight fetch holds a ticket. Invalidation retires the ticket, so a
//! fetch that settles afterwards still answers its own waiters but publishes
//! nothing to memory or disk.

use super::key::CacheKey;
use super::store::DurableStore;
use crate::error::FintrackResult;
use crate::http::ApiRequest;
use crate::session::SessionClient;
use chrono::{DateTime, Local, NaiveDate, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

const PREVIOUS_BALANCE_PATH: &str = "/monthly-balance/previous";

/// Balance carried over from a closed month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBalance {
    pub closing_balance: f64,
    pub month: u32,
    pub year: i32,
}

/// On-disk form of a resolved balance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableRecord {
    pub balance: f64,
    pub month: u32,
    pub year: i32,
    pub stored_at: DateTime<Utc>,
}

impl DurableRecord {
    fn new(key: &CacheKey, balance: f64) -> Self {
        Self {
            balance,
            month: key.month,
            year: key.year,
            stored_at: Utc::now(),
        }
    }

    fn is_valid_for(&self, key: &CacheKey) -> bool {
        self.balance.is_finite() && self.month == key.month && self.year == key.year
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviousBalanceResponse {
    #[serde(default)]
    closing_balance: Option<serde_json::Value>,
    #[serde(default)]
    opening_balance: Option<serde_json::Value>,
}

impl PreviousBalanceResponse {
    /// Closing balance, else opening balance
    fn balance(&self) -> Option<f64> {
        numeric(self.closing_balance.as_ref()).or_else(|| numeric(self.opening_balance.as_ref()))
    }
}

/// Numbers and numeric strings (decimal columns often arrive as strings)
fn numeric(value: Option<&serde_json::Value>) -> Option<f64> {
    let number = match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

type SharedLookup = Shared<BoxFuture<'static, Option<MonthlyBalance>>>;

struct InflightLookup {
    ticket: u64,
    lookup: SharedLookup,
}

#[derive(Default)]
struct InflightTier {
    next_ticket: u64,
    lookups: HashMap<CacheKey, InflightLookup>,
}

impl InflightTier {
    fn holds(&self, key: &CacheKey, ticket: u64) -> bool {
        self.lookups.get(key).is_some_and(|l| l.ticket == ticket)
    }

    fn take(&mut self, key: &CacheKey, ticket: u64) -> Option<InflightLookup> {
        if self.holds(key, ticket) {
            self.lookups.remove(key)
        } else {
            None
        }
    }
}

// Lock order: inflight, then memory
struct Tiers {
    client: SessionClient,
    store: Arc<dyn DurableStore>,
    memory: Mutex<HashMap<CacheKey, Option<MonthlyBalance>>>,
    inflight: Mutex<InflightTier>,
}

/// Three-tier read-through cache; clones share all tiers
#[derive(Clone)]
pub struct BalanceCache {
    tiers: Arc<Tiers>,
}

impl BalanceCache {
    pub fn new(client: SessionClient, store: Arc<dyn DurableStore>) -> Self {
        Self {
            tiers: Arc::new(Tiers {
                client,
                store,
                memory: Mutex::new(HashMap::new()),
                inflight: Mutex::new(InflightTier::default()),
            }),
        }
    }

    /// Previous month's balance for `user_id`, relative to the local date
    pub async fn get(&self, user_id: &str) -> Option<MonthlyBalance> {
        self.get_for_date(user_id, Local::now().date_naive()).await
    }

    /// Previous month's balance for `user_id`, relative to `today`
    pub async fn get_for_date(&self, user_id: &str, today: NaiveDate) -> Option<MonthlyBalance> {
        let key = CacheKey::previous_month(user_id, today);

        if let Some(cached) = self.tiers.remembered(&key) {
            debug!("Balance for {} served from memory", key);
            return cached;
        }

        if let Some(balance) = self.tiers.read_durable(&key).await {
            debug!("Balance for {} served from durable store", key);
            self.tiers.remember(&key, Some(balance.clone()));
            return Some(balance);
        }

        let lookup = {
            let mut inflight = lock(&self.tiers.inflight);
            // A fetch may have settled while the durable tier was read
            if let Some(cached) = self.tiers.remembered(&key) {
                return cached;
            }
            let joined = inflight.lookups.get(&key).map(|l| l.lookup.clone());
            match joined {
                Some(lookup) => lookup,
                None => {
                    debug!("Fetching balance for {}", key);
                    inflight.next_ticket += 1;
                    let ticket = inflight.next_ticket;
                    let lookup = dispatch(Arc::clone(&self.tiers), key.clone(), ticket);
                    inflight.lookups.insert(
                        key.clone(),
                        InflightLookup {
                            ticket,
                            lookup: lookup.clone(),
                        },
                    );
                    lookup
                }
            }
        };

        lookup.await
    }

    /// Forget what is cached for `user_id`'s current previous month.
    ///
    /// Call after a mutation that changes that month's figures. Fetches
    /// already in flight for the user are detached and their results dropped.
    pub async fn invalidate(&self, user_id: &str) -> FintrackResult<()> {
        self.invalidate_for_date(user_id, Local::now().date_naive())
            .await
    }

    pub async fn invalidate_for_date(&self, user_id: &str, today: NaiveDate) -> FintrackResult<()> {
        let key = CacheKey::previous_month(user_id, today);
        let detached: Vec<InflightLookup> = {
            let mut inflight = lock(&self.tiers.inflight);
            lock(&self.tiers.memory).retain(|k, _| k.user_id != user_id);
            let keys: Vec<CacheKey> = inflight
                .lookups
                .keys()
                .filter(|k| k.user_id == user_id)
                .cloned()
                .collect();
            let mut detached = Vec::with_capacity(keys.len());
            for k in &keys {
                detached.extend(inflight.lookups.remove(k));
            }
            detached
        };
        // Dropping the last handle of a lookup re-enters the in-flight lock
        drop(detached);
        self.tiers.store.remove(&key.storage_key()).await
    }

    /// Drop every cached balance, in memory and on disk
    pub async fn clear(&self) -> FintrackResult<()> {
        let detached = {
            let mut inflight = lock(&self.tiers.inflight);
            lock(&self.tiers.memory).clear();
            std::mem::take(&mut inflight.lookups)
        };
        drop(detached);
        self.tiers.store.clear().await
    }

    /// Number of fetches currently in flight
    pub fn pending_fetches(&self) -> usize {
        lock(&self.tiers.inflight).lookups.len()
    }
}

impl Tiers {
    fn remembered(&self, key: &CacheKey) -> Option<Option<MonthlyBalance>> {
        lock(&self.memory).get(key).cloned()
    }

    fn remember(&self, key: &CacheKey, value: Option<MonthlyBalance>) {
        lock(&self.memory).insert(key.clone(), value);
    }

    fn is_current(&self, key: &CacheKey, ticket: u64) -> bool {
        lock(&self.inflight).holds(key, ticket)
    }

    /// Publish a settled fetch to memory and retire its ticket.
    /// Returns `false` if the ticket was invalidated first.
    fn commit(&self, key: &CacheKey, ticket: u64, value: Option<MonthlyBalance>) -> bool {
        let retired = {
            let mut inflight = lock(&self.inflight);
            let retired = inflight.take(key, ticket);
            if retired.is_some() {
                lock(&self.memory).insert(key.clone(), value);
            }
            retired
        };
        retired.is_some()
    }

    fn retire(&self, key: &CacheKey, ticket: u64) {
        let retired = lock(&self.inflight).take(key, ticket);
        drop(retired);
    }

    async fn read_durable(&self, key: &CacheKey) -> Option<MonthlyBalance> {
        let raw = match self.store.load(&key.storage_key()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Durable cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str::<DurableRecord>(&raw) {
            Ok(record) if record.is_valid_for(key) => Some(MonthlyBalance {
                closing_balance: record.balance,
                month: record.month,
                year: record.year,
            }),
            Ok(_) => {
                debug!("Ignoring durable record for {}: period or balance mismatch", key);
                None
            }
            Err(e) => {
                debug!("Ignoring malformed durable record for {}: {}", key, e);
                None
            }
        }
    }

    async fn write_durable(&self, key: &CacheKey, balance: f64) {
        let record = DurableRecord::new(key, balance);
        let result = match serde_json::to_string(&record) {
            Ok(json) => self.store.save(&key.storage_key(), &json).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("Durable cache write failed for {}: {}", key, e);
        }
    }

    async fn remove_durable(&self, key: &CacheKey) {
        if let Err(e) = self.store.remove(&key.storage_key()).await {
            warn!("Durable cache remove failed for {}: {}", key, e);
        }
    }

    async fn fetch(&self, key: &CacheKey) -> Option<MonthlyBalance> {
        let request = ApiRequest::get(PREVIOUS_BALANCE_PATH).query("userId", key.user_id.as_str());
        let response = self
            .client
            .request(request)
            .await
            .and_then(|reply| reply.decode::<Option<PreviousBalanceResponse>>());

        match response {
            Ok(body) => body
                .and_then(|body| body.balance())
                .map(|closing_balance| MonthlyBalance {
                    closing_balance,
                    month: key.month,
                    year: key.year,
                }),
            Err(e) => {
                warn!("Failed to fetch previous balance for {}: {}", key, e);
                None
            }
        }
    }
}

fn dispatch(tiers: Arc<Tiers>, key: CacheKey, ticket: u64) -> SharedLookup {
    let release = InflightRelease {
        tiers: Arc::clone(&tiers),
        key: key.clone(),
        ticket,
    };

    async move {
        let _release = release;
        let balance = tiers.fetch(&key).await;

        let persisted = match &balance {
            Some(balance) if tiers.is_current(&key, ticket) => {
                tiers.write_durable(&key, balance.closing_balance).await;
                true
            }
            _ => false,
        };
        if !tiers.commit(&key, ticket, balance.clone()) {
            debug!("Lookup for {} invalidated while in flight", key);
            if persisted {
                tiers.remove_durable(&key).await;
            }
        }
        balance
    }
    .boxed()
    .shared()
}

/// Retires the in-flight entry if its fetch is dropped before committing
struct InflightRelease {
    tiers: Arc<Tiers>,
    key: CacheKey,
    ticket: u64,
}

impl Drop for InflightRelease {
    fn drop(&mut self) {
        self.tiers.retire(&self.key, self.ticket);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
