//! # Subscription Registry
//!
//! Bookkeeping for the cross-MTA configuration directory: which entries a
//! deployment publishes or discontinues, and which subscriber applications
//! must have their environment recomputed and be restarted as a result.

pub mod entries;
pub mod store;
pub mod subscribers;

pub use entries::{compute_entry_changes, query_existing_entries, CurrentTarget, EntryChanges};
pub use store::{ConfigurationStore, InMemoryConfigurationStore};
pub use subscribers::{SubscriberUpdate, SubscriberUpdater};
