//! Composable raw SQL queries.
//!
//! A [`Query`] is the raw SQL source plus an ordered list of composition
//! nodes. Every builder call appends one node; the terminal operators build a
//! shape key from the whole list, fetch or compile the shape, run the command
//! once and walk the nodes over the materialized rows.

use rawsql_core::{
    ClientOperator, Entity, Fingerprint, Navigation, Predicate, QueryNode, RawSqlResult,
    SortDirection, TrackingBehavior,
};
use rawsql_storage::{materialize, CompiledShape, IncludeLoader, ShapeKey};
use std::sync::Arc;
use tracing::debug;

use crate::session::Session;

/// A raw SQL query over entity type `T`, bound to the session that runs it.
pub struct Query<'s, T: Entity> {
    session: &'s mut Session,
    fingerprint: Fingerprint,
    nodes: Vec<QueryNode>,
    loaders: Vec<Arc<dyn IncludeLoader<T>>>,
}

impl<'s, T: Entity> Query<'s, T> {
    pub(crate) fn new(session: &'s mut Session, fingerprint: Fingerprint) -> Self {
        Self {
            session,
            fingerprint,
            nodes: Vec::new(),
            loaders: Vec::new(),
        }
    }

    fn push(mut self, node: QueryNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Keep only entities matching `predicate`.
    pub fn filter(self, predicate: Predicate) -> Self {
        self.push(QueryNode::Operator(ClientOperator::Filter(predicate)))
    }

    pub fn order_by(self, field: impl Into<String>) -> Self {
        self.push(QueryNode::Operator(ClientOperator::OrderBy {
            field: field.into(),
            direction: SortDirection::Ascending,
        }))
    }

    pub fn order_by_descending(self, field: impl Into<String>) -> Self {
        self.push(QueryNode::Operator(ClientOperator::OrderBy {
            field: field.into(),
            direction: SortDirection::Descending,
        }))
    }

    pub fn skip(self, count: usize) -> Self {
        self.push(QueryNode::Operator(ClientOperator::Skip(count)))
    }

    pub fn take(self, count: usize) -> Self {
        self.push(QueryNode::Operator(ClientOperator::Take(count)))
    }

    /// Eagerly load a collection navigation of `T`.
    pub fn include<C: Entity>(mut self, navigation: Navigation<T, C>) -> Self {
        self.nodes
            .push(QueryNode::Include(navigation.path().to_string()));
        self.loaders.push(Arc::new(navigation));
        self
    }

    /// Bypass the change tracker for this query, roots and includes alike.
    /// Wins over any `as_tracking` in the same chain.
    pub fn as_no_tracking(self) -> Self {
        self.push(QueryNode::Tracking(TrackingBehavior::NoTracking))
    }

    /// Track results even when the database defaults to no-tracking.
    pub fn as_tracking(self) -> Self {
        self.push(QueryNode::Tracking(TrackingBehavior::TrackAll))
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn nodes(&self) -> &[QueryNode] {
        &self.nodes
    }

    /// Tracking mode this query runs with.
    pub fn tracking(&self) -> TrackingBehavior {
        let mut requested = None;
        for node in &self.nodes {
            match node {
                QueryNode::Tracking(TrackingBehavior::NoTracking) => {
                    return TrackingBehavior::NoTracking
                }
                QueryNode::Tracking(TrackingBehavior::TrackAll) => {
                    requested = Some(TrackingBehavior::TrackAll)
                }
                _ => {}
            }
        }
        requested.unwrap_or(self.session.database().config().default_tracking)
    }

    /// Cache key of this query's compiled shape.
    pub fn shape_key(&self) -> ShapeKey {
        ShapeKey::new(
            self.fingerprint.clone(),
            T::ENTITY_NAME,
            self.nodes.clone(),
            self.tracking(),
        )
    }

    /// Execute and materialize every result.
    #[tracing::instrument(
        level = "debug",
        skip(self),
        fields(scope_id = %self.session.id(), entity = T::ENTITY_NAME)
    )]
    pub async fn to_list(self) -> RawSqlResult<Vec<T>> {
        self.session.ensure_open()?;
        let key = self.shape_key();
        let database = self.session.database().clone();

        let shape = database
            .shape_cache()
            .get_or_compute(&key, || CompiledShape::compile(&key))
            .await?;
        let rows = database.executor().execute(shape.command()).await?;
        debug!(
            fingerprint = %key.fingerprint(),
            rows = rows.len(),
            tracking = ?key.tracking(),
            includes = shape.includes().len(),
            "raw query executed"
        );

        let loaders: Vec<&dyn IncludeLoader<T>> =
            self.loaders.iter().map(|loader| loader.as_ref()).collect();
        let tracker = if key.tracking().is_tracking() {
            Some(self.session.tracker_mut())
        } else {
            None
        };
        materialize(&rows, &shape, &loaders, database.executor(), tracker).await
    }

    /// First result, if any.
    pub async fn first(self) -> RawSqlResult<Option<T>> {
        Ok(self.take(1).to_list().await?.into_iter().next())
    }

    /// Number of results. Never tracks and skips includes.
    pub async fn count(mut self) -> RawSqlResult<usize> {
        self.nodes
            .retain(|node| !matches!(node, QueryNode::Include(_)));
        self.loaders.clear();
        Ok(self.as_no_tracking().to_list().await?.len())
    }
}

impl<T: Entity> std::fmt::Debug for Query<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("entity", &T::ENTITY_NAME)
            .field("fingerprint", &self.fingerprint)
            .field("nodes", &self.nodes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use rawsql_core::{params, RawSqlConfig, Row, RowReader, RowSet, Value};
    use rawsql_test_utils::ScriptedExecutor;

    const ALL: &str = "SELECT * FROM \"Regions\"";

    #[derive(Debug, Clone, PartialEq)]
    struct Region {
        id: i64,
        description: String,
    }

    impl Entity for Region {
        const ENTITY_NAME: &'static str = "Region";
        const TABLE: &'static str = "Regions";

        fn primary_key(&self) -> Value {
            Value::Int(self.id)
        }

        fn from_row(row: &Row) -> RawSqlResult<Self> {
            let r = RowReader::new(row, Self::ENTITY_NAME);
            Ok(Self {
                id: r.int("RegionID")?,
                description: r.text("RegionDescription")?,
            })
        }

        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "RegionID" => Some(Value::Int(self.id)),
                "RegionDescription" => Some(Value::from(self.description.clone())),
                _ => None,
            }
        }
    }

    fn database(config: RawSqlConfig) -> (Database, ScriptedExecutor) {
        let executor = ScriptedExecutor::new();
        executor
            .register(ALL, |_| {
                let mut rows = RowSet::new(["RegionID", "RegionDescription"]);
                for (id, name) in [(1, "Eastern"), (2, "Western"), (3, "Northern"), (4, "Southern")] {
                    rows.push(params![id as i64, name])?;
                }
                Ok(rows)
            })
            .unwrap();
        let db = Database::new(Arc::new(executor.clone()), config).unwrap();
        (db, executor)
    }

    #[test]
    fn test_no_tracking_wins_over_tracking() {
        let (db, _) = database(RawSqlConfig::default());
        let mut session = db.open_session();
        let query = session
            .from_sql::<Region>(ALL, params![])
            .unwrap()
            .as_no_tracking()
            .as_tracking();
        assert_eq!(query.tracking(), TrackingBehavior::NoTracking);
    }

    #[test]
    fn test_as_tracking_overrides_no_tracking_default() {
        let (db, _) = database(
            RawSqlConfig::default().with_default_tracking(TrackingBehavior::NoTracking),
        );
        let mut session = db.open_session();
        assert_eq!(
            session.set::<Region>().unwrap().tracking(),
            TrackingBehavior::NoTracking
        );
        assert_eq!(
            session.set::<Region>().unwrap().as_tracking().tracking(),
            TrackingBehavior::TrackAll
        );
    }

    #[test]
    fn test_each_builder_call_appends_one_node() {
        let (db, _) = database(RawSqlConfig::default());
        let mut session = db.open_session();
        let query = session
            .set::<Region>()
            .unwrap()
            .filter(Predicate::ne("RegionID", 2i64))
            .order_by_descending("RegionDescription")
            .skip(1)
            .take(2);

        assert_eq!(query.nodes().len(), 4);
        assert_eq!(query.fingerprint().sql(), ALL);
    }

    #[tokio::test]
    async fn test_ordering_and_paging_run_client_side() {
        let (db, executor) = database(RawSqlConfig::default());
        let mut session = db.open_session();

        let regions = session
            .set::<Region>()
            .unwrap()
            .order_by("RegionDescription")
            .skip(1)
            .take(2)
            .to_list()
            .await
            .unwrap();

        let names: Vec<&str> = regions.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(names, vec!["Northern", "Southern"]);
        assert_eq!(session.entry_count(), 2);
        assert_eq!(executor.execution_count(), 1);
    }

    #[tokio::test]
    async fn test_first_and_count() {
        let (db, _) = database(RawSqlConfig::default());
        let mut session = db.open_session();

        let last = session
            .set::<Region>()
            .unwrap()
            .order_by_descending("RegionID")
            .first()
            .await
            .unwrap();
        assert_eq!(last.map(|r| r.id), Some(4));
        assert_eq!(session.entry_count(), 1);

        let count = session.set::<Region>().unwrap().count().await.unwrap();
        assert_eq!(count, 4);
        assert_eq!(session.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_result_first_is_none() {
        let (db, _) = database(RawSqlConfig::default());
        let mut session = db.open_session();
        let none = session
            .set::<Region>()
            .unwrap()
            .filter(Predicate::gt("RegionID", 10i64))
            .first()
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
