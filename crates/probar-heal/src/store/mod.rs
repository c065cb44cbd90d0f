//! Locator Store: persistent alternates keyed by locator identity.
//!
//! Access is always a short scoped acquisition: [`LocatorStore::open`]
//! yields a [`StoreHandle`], one logical operation runs against it, and
//! the handle is closed. [`with_handle`] packages that sequence and closes
//! the handle on every exit path.
//!
//! Normative semantics, shared by every backend:
//!
//! - `put` upserts the `(identity, strategy)` slot; the slot becomes the
//!   most recent record for that identity
//! - `get_all` returns one record per strategy, most recent first
//! - writers touching different identities never wait on each other for
//!   longer than one short operation

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryLocatorStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLocatorStore;

use crate::locator::{LocatorIdentity, LocatorRecord, Selector};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Default namespace for stored locators
pub const DEFAULT_NAMESPACE: &str = "probar_heal_locators";

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O failure (creating the store directory, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding the store was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,

    /// A persisted row could not be decoded
    #[error("Invalid record for {identity}: {message}")]
    InvalidRecord {
        /// Identity the row belongs to
        identity: String,
        /// What was wrong with it
        message: String,
    },
}

/// A persistent key-value service for alternate locators
pub trait LocatorStore: Send + Sync + fmt::Debug {
    /// Namespace all records of this store live under
    fn namespace(&self) -> &str;

    /// Acquire a handle for one logical operation
    fn open(&self) -> Result<Box<dyn StoreHandle + '_>, StoreError>;
}

/// Open connection to a [`LocatorStore`]
pub trait StoreHandle {
    /// Upsert the `(identity, selector strategy)` slot and make it most recent
    fn put(&mut self, identity: &LocatorIdentity, selector: &Selector) -> Result<(), StoreError>;

    /// Write a whole recording batch. `selectors` are in preference order;
    /// afterwards the first one is the most recent record.
    fn put_all(
        &mut self,
        identity: &LocatorIdentity,
        selectors: &[Selector],
    ) -> Result<(), StoreError> {
        for selector in selectors.iter().rev() {
            self.put(identity, selector)?;
        }
        Ok(())
    }

    /// All records for `identity`, most recent first
    fn get_all(&self, identity: &LocatorIdentity) -> Result<Vec<LocatorRecord>, StoreError>;

    /// Every identity with at least one record
    fn identities(&self) -> Result<Vec<LocatorIdentity>, StoreError>;

    /// Drop every record for `identity`, returning how many were removed
    fn remove(&mut self, identity: &LocatorIdentity) -> Result<usize, StoreError>;

    /// Release the handle
    fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// Open `store`, run `op`, and close the handle whatever happens.
///
/// If `op` fails its error wins; a close failure after it is only logged.
pub fn with_handle<T, F>(store: &dyn LocatorStore, op: F) -> Result<T, StoreError>
where
    F: FnOnce(&mut dyn StoreHandle) -> Result<T, StoreError>,
{
    let mut handle = store.open()?;
    let result = op(handle.as_mut());
    let closed = handle.close();
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(op_err), Ok(())) => Err(op_err),
        (Err(op_err), Err(close_err)) => {
            warn!(error = %close_err, "failed to close locator store after error");
            Err(op_err)
        }
    }
}
