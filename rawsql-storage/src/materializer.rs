//! Entity materialization.
//!
//! Turns a result set into entities, runs the client-side operator pipeline,
//! loads included navigations and, for tracking queries, resolves every
//! entity against the session's change tracker. Tracking is staged and only
//! committed once every load has succeeded; a failed query leaves the
//! tracker as it was.

use async_trait::async_trait;
use rawsql_core::{
    ClientOperator, Entity, MaterializationError, Navigation, RawSqlResult, RowSet, SqlCommand,
    Value,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::cache::CompiledShape;
use crate::executor::SqlExecutor;
use crate::tracker::{ChangeTracker, PendingTracking};

/// Loads one include path onto a batch of principals.
#[async_trait]
pub trait IncludeLoader<P: Entity>: Send + Sync {
    /// Include path this loader serves.
    fn path(&self) -> &str;

    /// Load dependents and assign them to `roots`. Dependents are staged for
    /// tracking when a batch is supplied.
    async fn load(
        &self,
        roots: &mut [P],
        executor: &dyn SqlExecutor,
        pending: Option<&mut PendingTracking<'_>>,
    ) -> RawSqlResult<()>;
}

#[async_trait]
impl<P: Entity, C: Entity> IncludeLoader<P> for Navigation<P, C> {
    fn path(&self) -> &str {
        Navigation::path(self)
    }

    async fn load(
        &self,
        roots: &mut [P],
        executor: &dyn SqlExecutor,
        mut pending: Option<&mut PendingTracking<'_>>,
    ) -> RawSqlResult<()> {
        let rows = executor.execute(&SqlCommand::text(self.load_sql())).await?;
        debug!(
            path = Navigation::path(self),
            principal = P::ENTITY_NAME,
            dependent = C::ENTITY_NAME,
            rows = rows.len(),
            "loading navigation"
        );

        // Dependents of principals the pipeline dropped are neither tracked
        // nor assigned.
        let principals: HashSet<Value> = roots.iter().map(Entity::primary_key).collect();
        let mut grouped: HashMap<Value, Vec<C>> = HashMap::new();
        for row in rows.rows() {
            let mut child = C::from_row(row)?;
            let fk = self.foreign_key_of(&child);
            if fk.is_null() || !principals.contains(&fk) {
                continue;
            }
            if let Some(pending) = pending.as_deref_mut() {
                child = pending.stage(child)?;
            }
            grouped.entry(fk).or_default().push(child);
        }

        for root in roots.iter_mut() {
            let children = grouped.get(&root.primary_key()).cloned().unwrap_or_default();
            self.assign(root, children);
        }
        Ok(())
    }
}

/// Apply the client-side pipeline in composition order.
pub fn apply_operators<T: Entity>(
    mut items: Vec<T>,
    operators: &[ClientOperator],
) -> RawSqlResult<Vec<T>> {
    for op in operators {
        items = op.apply(items)?;
    }
    Ok(items)
}

/// Materialize a result set according to a compiled shape.
///
/// `tracker` must be `Some` exactly when the shape is a tracking query; the
/// caller decides, so a no-tracking query never touches the tracker.
pub async fn materialize<T: Entity>(
    rows: &RowSet,
    shape: &CompiledShape,
    loaders: &[&dyn IncludeLoader<T>],
    executor: &dyn SqlExecutor,
    tracker: Option<&mut ChangeTracker>,
) -> RawSqlResult<Vec<T>> {
    let entities = rows
        .rows()
        .iter()
        .map(T::from_row)
        .collect::<RawSqlResult<Vec<T>>>()?;
    let mut entities = apply_operators(entities, shape.operators())?;

    let mut pending = tracker.as_deref().map(PendingTracking::new);
    if let Some(pending) = pending.as_mut() {
        entities = entities
            .into_iter()
            .map(|entity| pending.stage(entity))
            .collect::<RawSqlResult<Vec<T>>>()?;
    }

    for path in shape.includes() {
        let loader = loaders
            .iter()
            .find(|loader| loader.path() == path.as_str())
            .ok_or_else(|| MaterializationError::UnknownNavigation {
                entity: T::ENTITY_NAME.to_string(),
                path: path.clone(),
            })?;
        loader.load(&mut entities, executor, pending.as_mut()).await?;
    }

    let Some(mut pending) = pending else {
        return Ok(entities);
    };
    if !shape.includes().is_empty() {
        for entity in &entities {
            pending.update(entity);
        }
    }
    let staged = pending.into_staged();
    if let Some(tracker) = tracker {
        let added = tracker.commit(staged);
        debug!(entity = T::ENTITY_NAME, added, "tracked query results");
    }
    Ok(entities)
}
