//! Scripted in-memory SQL executor.

use async_trait::async_trait;
use rawsql_core::{
    ExecutionError, Fingerprint, RawSqlError, RawSqlResult, RowSet, SqlCommand, Value,
};
use rawsql_storage::SqlExecutor;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::northwind::{self, sql};

/// Produces the result set of one registered statement from its bound
/// parameter values.
pub type StatementHandler = Arc<dyn Fn(&[Value]) -> RawSqlResult<RowSet> + Send + Sync>;

/// Executor that answers registered statements by exact command text and
/// records every command it receives.
///
/// Clones share the statement table and the execution log, so a test can
/// hand one clone to a database and inspect the log through another.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    statements: Arc<RwLock<HashMap<String, StatementHandler>>>,
    log: Arc<RwLock<Vec<SqlCommand>>>,
}

fn poisoned(what: &str) -> RawSqlError {
    ExecutionError::ExecutorFailed {
        reason: format!("{} lock poisoned", what),
    }
    .into()
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an exact command text.
    pub fn register<F>(&self, text: impl Into<String>, handler: F) -> RawSqlResult<()>
    where
        F: Fn(&[Value]) -> RawSqlResult<RowSet> + Send + Sync + 'static,
    {
        let mut statements = self.statements.write().map_err(|_| poisoned("statement"))?;
        statements.insert(text.into(), Arc::new(handler));
        Ok(())
    }

    /// Register a handler for a `{n}` template, keyed by its translated
    /// command text.
    pub fn register_template<F>(&self, template: &str, arity: usize, handler: F) -> RawSqlResult<()>
    where
        F: Fn(&[Value]) -> RawSqlResult<RowSet> + Send + Sync + 'static,
    {
        let text = Fingerprint::new(template, vec![Value::Null; arity])?
            .to_command()?
            .text;
        self.register(text, handler)
    }

    /// Every command executed so far, oldest first.
    pub fn executed(&self) -> Vec<SqlCommand> {
        self.log.read().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn execution_count(&self) -> usize {
        self.log.read().map(|log| log.len()).unwrap_or(0)
    }

    /// How many times a command with exactly this text ran.
    pub fn executions_of(&self, text: &str) -> usize {
        self.log
            .read()
            .map(|log| log.iter().filter(|c| c.text == text).count())
            .unwrap_or(0)
    }

    pub fn clear_log(&self) {
        if let Ok(mut log) = self.log.write() {
            log.clear();
        }
    }
}

#[async_trait]
impl SqlExecutor for ScriptedExecutor {
    async fn execute(&self, command: &SqlCommand) -> RawSqlResult<RowSet> {
        let handler = {
            let statements = self.statements.read().map_err(|_| poisoned("statement"))?;
            statements.get(&command.text).cloned()
        };
        self.log
            .write()
            .map_err(|_| poisoned("log"))?
            .push(command.clone());

        let handler = handler.ok_or_else(|| ExecutionError::UnknownStatement {
            sql: command.text.clone(),
        })?;
        let rows = handler(&command.values())?;
        debug!(sql = %command.text, rows = rows.len(), "scripted statement executed");
        Ok(rows)
    }
}

fn text_param(params: &[Value], index: usize) -> Option<&str> {
    params.get(index).and_then(Value::as_str)
}

/// Executor answering the Northwind statements in [`sql`].
pub fn northwind_executor() -> RawSqlResult<ScriptedExecutor> {
    let executor = ScriptedExecutor::new();

    executor.register(sql::CUSTOMERS, |_| northwind::customer_rows(|_| true))?;
    executor.register(sql::CUSTOMERS_CONTACT_Z, |_| {
        northwind::customer_rows(|c| c.contact_name.as_deref().is_some_and(|n| n.contains('z')))
    })?;
    executor.register(sql::CUSTOMERS_COLUMNS_OUT_OF_ORDER, |_| {
        northwind::customer_rows_out_of_order()
    })?;
    executor.register(sql::CUSTOMERS_IN_LONDON, |_| {
        northwind::customer_rows(|c| c.city.as_deref() == Some("London"))
    })?;
    executor.register(sql::CUSTOMERS_IN_SEATTLE, |_| {
        northwind::customer_rows(|c| c.city.as_deref() == Some("Seattle"))
    })?;
    executor.register_template(sql::CUSTOMERS_BY_CITY, 1, |params| {
        let city = text_param(params, 0);
        northwind::customer_rows(|c| city.is_some() && c.city.as_deref() == city)
    })?;
    executor.register_template(sql::CUSTOMERS_BY_CITY_AND_TITLE, 2, |params| {
        let (city, title) = (text_param(params, 0), text_param(params, 1));
        northwind::customer_rows(|c| {
            city.is_some()
                && title.is_some()
                && c.city.as_deref() == city
                && c.contact_title.as_deref() == title
        })
    })?;
    executor.register(sql::EMPLOYEES, |_| northwind::employee_rows(|_| true))?;
    executor.register_template(sql::EMPLOYEES_BY_MANAGER, 1, |params| {
        let manager = params.first().cloned().unwrap_or(Value::Null);
        northwind::employee_rows(|e| Value::from(e.reports_to) == manager)
    })?;
    executor.register(sql::ORDERS, |_| northwind::order_rows())?;

    Ok(executor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawsql_core::params;

    fn command(template: &str, params: Vec<Value>) -> SqlCommand {
        Fingerprint::new(template, params).unwrap().to_command().unwrap()
    }

    #[tokio::test]
    async fn test_registered_statements_answer_and_log() {
        let executor = northwind_executor().unwrap();

        let all = executor.execute(&command(sql::CUSTOMERS, params![])).await.unwrap();
        let london = executor
            .execute(&command(
                sql::CUSTOMERS_BY_CITY_AND_TITLE,
                params!["London", "Sales Representative"],
            ))
            .await
            .unwrap();

        assert_eq!(all.len(), 91);
        assert_eq!(london.len(), 3);
        assert_eq!(executor.execution_count(), 2);
        assert_eq!(executor.executions_of(sql::CUSTOMERS), 1);
    }

    #[tokio::test]
    async fn test_null_manager_parameter_matches_top_of_hierarchy() {
        let executor = northwind_executor().unwrap();
        let top = executor
            .execute(&command(sql::EMPLOYEES_BY_MANAGER, params![None::<i64>]))
            .await
            .unwrap();
        let reports = executor
            .execute(&command(sql::EMPLOYEES_BY_MANAGER, params![5i64]))
            .await
            .unwrap();

        assert_eq!(top.len(), 1);
        assert_eq!(reports.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_statement_is_logged_and_rejected() {
        let executor = ScriptedExecutor::new();
        let err = executor
            .execute(&SqlCommand::text("SELECT * FROM \"Shippers\""))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RawSqlError::Execution(ExecutionError::UnknownStatement { .. })
        ));
        assert_eq!(executor.execution_count(), 1);
        executor.clear_log();
        assert!(executor.executed().is_empty());
    }
}
