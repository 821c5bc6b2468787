//! Balance lookup cache
//!
//! | Tier | Lifetime | Written when |
//! |------|----------|--------------|
//! | memory | process | every settled fetch, including `None` |
//! | durable | across runs | fetch resolved to a finite number |
//! | in-flight | until the fetch settles | first miss for a key |

pub mod balance;
pub mod key;
pub mod store;

pub use balance::{BalanceCache, DurableRecord, MonthlyBalance};
pub use key::CacheKey;
pub use store::{DurableStore, FileStore, MemoryStore};
