//! Shape keys and compiled query shapes.

use chrono::Utc;
use rawsql_core::{
    ClientOperator, Fingerprint, QueryNode, RawSqlResult, SqlCommand, Timestamp,
    TrackingBehavior,
};
use std::sync::Arc;

/// Key of a compiled shape.
///
/// The fingerprint identifies the raw SQL and its parameters; the entity
/// type and the composed nodes identify what is done with the rows. Two
/// queries over the same SQL that compose different operators never share a
/// shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    fingerprint: Fingerprint,
    entity: &'static str,
    composition: Arc<[QueryNode]>,
    tracking: TrackingBehavior,
}

impl ShapeKey {
    pub fn new(
        fingerprint: Fingerprint,
        entity: &'static str,
        composition: impl Into<Arc<[QueryNode]>>,
        tracking: TrackingBehavior,
    ) -> Self {
        Self {
            fingerprint,
            entity,
            composition: composition.into(),
            tracking,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn composition(&self) -> &[QueryNode] {
        &self.composition
    }

    pub fn tracking(&self) -> TrackingBehavior {
        self.tracking
    }
}

/// Translated form of a composed raw SQL query.
#[derive(Debug, Clone)]
pub struct CompiledShape {
    key: ShapeKey,
    command: SqlCommand,
    operators: Vec<ClientOperator>,
    includes: Vec<String>,
    compiled_at: Timestamp,
}

impl CompiledShape {
    /// Translate a shape key: rewrite placeholders into named parameters and
    /// split the composition into the client pipeline and include paths.
    ///
    /// Repeated include paths load once, in first-mention order.
    pub fn compile(key: &ShapeKey) -> RawSqlResult<Self> {
        let command = key.fingerprint.to_command()?;
        let mut operators = Vec::new();
        let mut includes: Vec<String> = Vec::new();

        for node in key.composition.iter() {
            match node {
                QueryNode::Operator(op) => operators.push(op.clone()),
                QueryNode::Include(path) => {
                    if !includes.iter().any(|p| p == path) {
                        includes.push(path.clone());
                    }
                }
                QueryNode::Tracking(_) => {}
            }
        }

        Ok(Self {
            key: key.clone(),
            command,
            operators,
            includes,
            compiled_at: Utc::now(),
        })
    }

    pub fn key(&self) -> &ShapeKey {
        &self.key
    }

    pub fn command(&self) -> &SqlCommand {
        &self.command
    }

    pub fn operators(&self) -> &[ClientOperator] {
        &self.operators
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn tracking(&self) -> TrackingBehavior {
        self.key.tracking
    }

    pub fn compiled_at(&self) -> Timestamp {
        self.compiled_at
    }
}
