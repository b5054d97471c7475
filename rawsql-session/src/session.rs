//! Unit-of-work sessions.
//!
//! A session is opened from a [`Database`], accumulates tracked entities
//! while open, and drops all of them when closed. A closed session rejects
//! every further query or tracking call with `ScopeClosed`.

use chrono::Utc;
use rawsql_core::{
    Entity, Fingerprint, RawSqlResult, ScopeError, ScopeId, Timestamp, Value,
};
use rawsql_storage::{ChangeTracker, EntryInfo};
use tracing::{debug, info};

use crate::database::Database;
use crate::query::Query;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeState {
    Open,
    Closed,
}

/// One unit of work.
pub struct Session {
    id: ScopeId,
    state: ScopeState,
    opened_at: Timestamp,
    closed_at: Option<Timestamp>,
    tracker: ChangeTracker,
    database: Database,
}

impl Session {
    pub(crate) fn open(database: Database) -> Self {
        let id = ScopeId::now_v7();
        info!(scope_id = %id, "session opened");
        Self {
            id,
            state: ScopeState::Open,
            opened_at: Utc::now(),
            closed_at: None,
            tracker: ChangeTracker::new(),
            database,
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ScopeState::Open
    }

    pub fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    pub fn closed_at(&self) -> Option<Timestamp> {
        self.closed_at
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub(crate) fn ensure_open(&self) -> RawSqlResult<()> {
        match self.state {
            ScopeState::Open => Ok(()),
            ScopeState::Closed => Err(ScopeError::ScopeClosed { scope_id: self.id }.into()),
        }
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    /// Start a query from raw SQL with positional `{n}` parameters.
    ///
    /// Fails with `InvalidFingerprint` when a placeholder has no matching
    /// parameter, and with `ScopeClosed` after [`Session::close`].
    pub fn from_sql<T: Entity>(
        &mut self,
        sql: impl Into<String>,
        params: impl Into<Vec<Value>>,
    ) -> RawSqlResult<Query<'_, T>> {
        self.ensure_open()?;
        let fingerprint = Fingerprint::new(sql, params)?;
        if self.database.config().sensitive_data_logging {
            debug!(
                scope_id = %self.id,
                entity = T::ENTITY_NAME,
                sql = fingerprint.sql(),
                params = ?fingerprint.params(),
                "raw query created"
            );
        } else {
            debug!(
                scope_id = %self.id,
                entity = T::ENTITY_NAME,
                fingerprint = %fingerprint,
                "raw query created"
            );
        }
        Ok(Query::new(self, fingerprint))
    }

    /// Start a query over the whole entity set.
    pub fn set<T: Entity>(&mut self) -> RawSqlResult<Query<'_, T>> {
        self.from_sql(format!("SELECT * FROM \"{}\"", T::TABLE), Vec::new())
    }

    /// Attach an entity to the change tracker. Returns the tracked instance,
    /// which is the earlier one when the identity is already tracked.
    pub fn track<T: Entity>(&mut self, entity: T) -> RawSqlResult<T> {
        self.ensure_open()?;
        self.tracker.track(entity)
    }

    /// Tracked entity of type `T` with the given primary key.
    pub fn find<T: Entity>(&self, key: impl Into<Value>) -> RawSqlResult<Option<T>> {
        self.ensure_open()?;
        Ok(self.tracker.find(key))
    }

    /// Number of distinct tracked entities; 0 once closed.
    pub fn entry_count(&self) -> usize {
        match self.state {
            ScopeState::Open => self.tracker.entry_count(),
            ScopeState::Closed => 0,
        }
    }

    /// Number of tracked entities of type `T`.
    pub fn entry_count_of<T: Entity>(&self) -> usize {
        match self.state {
            ScopeState::Open => self.tracker.entries_of::<T>(),
            ScopeState::Closed => 0,
        }
    }

    pub fn entries(&self) -> Vec<EntryInfo> {
        match self.state {
            ScopeState::Open => self.tracker.entries(),
            ScopeState::Closed => Vec::new(),
        }
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Close the session, dropping every tracked entry. Idempotent; returns
    /// how many entries the call dropped.
    pub fn close(&mut self) -> usize {
        if self.state == ScopeState::Closed {
            return 0;
        }
        let dropped = self.tracker.clear();
        self.state = ScopeState::Closed;
        self.closed_at = Some(Utc::now());
        info!(scope_id = %self.id, dropped, "session closed");
        dropped
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("entry_count", &self.entry_count())
            .finish()
    }
}
