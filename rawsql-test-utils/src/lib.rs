//! RAWSQL Test Utilities
//!
//! Centralized test infrastructure for the RAWSQL workspace:
//! - Northwind reference data and entities
//! - A scripted in-memory SQL executor
//! - Proptest generators for values and fingerprints
//! - Test fixtures for common scenarios
//! - Custom assertions for RAWSQL-specific validation

pub mod executor;
pub mod northwind;

pub use executor::{northwind_executor, ScriptedExecutor, StatementHandler};
pub use northwind::{sql, Customer, Employee, Order};

// Re-export core types for convenience
pub use rawsql_core::{
    params, ClientOperator, Entity, EntityKey, ExecutionError, Fingerprint, MaterializationError,
    Predicate, QueryError, QueryNode, RawSqlConfig, RawSqlError, RawSqlResult, RowSet, ScopeError,
    ScopeId, SqlCommand, Timestamp, TrackingBehavior, Value,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to warnings only. Later calls are no-ops.
pub fn init_test_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for values, parameter lists and SQL templates.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    /// Generate a Timestamp (DateTime<Utc>).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // Generate timestamps within a reasonable range (1990-2030)
        (631152000i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate any scalar value.
    pub fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<f64>().prop_map(Value::Float),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::Text),
            arb_timestamp().prop_map(Value::Timestamp),
        ]
    }

    /// Generate a parameter list of up to `max` values.
    pub fn arb_params(max: usize) -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec(arb_value(), 0..=max)
    }

    /// Generate a SQL template that references each of `arity` parameters.
    pub fn arb_sql_template(arity: usize) -> impl Strategy<Value = String> {
        ("[A-Za-z]{1,8}", "[A-Za-z]{1,8}").prop_map(move |(table, column)| {
            let mut sql = format!("SELECT * FROM \"{}\"", table);
            for i in 0..arity {
                let keyword = if i == 0 { "WHERE" } else { "AND" };
                sql.push_str(&format!(" {} \"{}{}\" = {{{}}}", keyword, column, i, i));
            }
            sql
        })
    }

    /// Generate a valid fingerprint with up to four parameters.
    pub fn arb_fingerprint() -> impl Strategy<Value = Fingerprint> {
        (0usize..=4)
            .prop_flat_map(|arity| (arb_sql_template(arity), prop::collection::vec(arb_value(), arity)))
            .prop_filter_map("valid binding", |(sql, params)| Fingerprint::new(sql, params).ok())
    }

    /// Generate a customer without orders.
    pub fn arb_customer() -> impl Strategy<Value = Customer> {
        (
            "[A-Z]{5}",
            "[A-Za-z ]{1,20}",
            proptest::option::of("[A-Za-z ]{1,20}"),
            proptest::option::of("[A-Za-z]{1,12}"),
        )
            .prop_map(|(id, company, contact, city)| Customer {
                customer_id: id,
                company_name: company,
                contact_name: contact,
                contact_title: None,
                city,
                region: None,
                postal_code: None,
                country: None,
                orders: Vec::new(),
            })
    }

    /// Generate a client-side filter over customer text columns.
    pub fn arb_customer_predicate() -> impl Strategy<Value = Predicate> {
        let column = prop_oneof![
            Just("ContactName"),
            Just("CompanyName"),
            Just("City"),
            Just("Country"),
        ];
        (column, "[a-zA-Z]{1,2}", any::<bool>()).prop_map(|(column, needle, prefix)| {
            if prefix {
                Predicate::starts_with(column, needle)
            } else {
                Predicate::contains(column, needle)
            }
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use rawsql_session::Database;
    use std::sync::Arc;

    /// Minimal valid configuration for tests.
    pub fn minimal_config() -> RawSqlConfig {
        RawSqlConfig::default()
            .with_shape_cache_capacity(64)
            .with_sensitive_data_logging(true)
    }

    /// Database over the Northwind executor. The returned executor shares
    /// its log with the one inside the database.
    pub fn northwind_database() -> RawSqlResult<(Database, ScriptedExecutor)> {
        northwind_database_with(minimal_config())
    }

    pub fn northwind_database_with(
        config: RawSqlConfig,
    ) -> RawSqlResult<(Database, ScriptedExecutor)> {
        let executor = northwind_executor()?;
        let database = Database::new(Arc::new(executor.clone()), config)?;
        Ok((database, executor))
    }

    /// Reference customers whose contact name contains a lowercase `z`.
    pub fn customers_with_z_contact() -> RawSqlResult<Vec<Customer>> {
        Ok(northwind::customers()?
            .into_iter()
            .filter(|c| c.contact_name.as_deref().is_some_and(|n| n.contains('z')))
            .collect())
    }

    /// Reference customers in a city.
    pub fn customers_in(city: &str) -> RawSqlResult<Vec<Customer>> {
        Ok(northwind::customers()?
            .into_iter()
            .filter(|c| c.city.as_deref() == Some(city))
            .collect())
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for RAWSQL-specific validation.

    use super::*;

    /// Assert that a RawSqlResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &RawSqlResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a RawSqlResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &RawSqlResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    #[track_caller]
    pub fn assert_invalid_fingerprint<T: std::fmt::Debug>(result: &RawSqlResult<T>) {
        match result {
            Err(RawSqlError::Query(QueryError::InvalidFingerprint { .. })) => {}
            other => panic!("Expected InvalidFingerprint error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_scope_closed<T: std::fmt::Debug>(result: &RawSqlResult<T>, scope_id: ScopeId) {
        match result {
            Err(RawSqlError::Scope(ScopeError::ScopeClosed { scope_id: id })) => {
                assert_eq!(*id, scope_id, "Wrong scope in ScopeClosed error");
            }
            other => panic!("Expected ScopeClosed error for {}, got: {:?}", scope_id, other),
        }
    }

    #[track_caller]
    pub fn assert_unknown_statement<T: std::fmt::Debug>(result: &RawSqlResult<T>) {
        match result {
            Err(RawSqlError::Execution(ExecutionError::UnknownStatement { .. })) => {}
            other => panic!("Expected UnknownStatement error, got: {:?}", other),
        }
    }

    /// Assert two entity lists hold the same identities, in any order.
    #[track_caller]
    pub fn assert_same_entities<T: Entity>(actual: &[T], expected: &[T]) {
        let mut actual_keys: Vec<String> = actual.iter().map(|e| e.entity_key().to_string()).collect();
        let mut expected_keys: Vec<String> =
            expected.iter().map(|e| e.entity_key().to_string()).collect();
        actual_keys.sort();
        expected_keys.sort();
        assert_eq!(actual_keys, expected_keys, "Entity identities differ");
    }

    /// Assert the entity keys of `actual`, in order.
    #[track_caller]
    pub fn assert_keys_in_order<T: Entity>(actual: &[T], expected: &[Value]) {
        let keys: Vec<Value> = actual.iter().map(Entity::primary_key).collect();
        assert_eq!(keys, expected, "Entity keys differ or are out of order");
    }
}
