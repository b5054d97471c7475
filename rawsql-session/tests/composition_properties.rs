//! Property tests: composing after raw SQL behaves like filtering the
//! reference set directly.

use proptest::prelude::*;
use rawsql_core::params;
use rawsql_test_utils::assertions::assert_same_entities;
use rawsql_test_utils::fixtures::northwind_database;
use rawsql_test_utils::generators::arb_customer_predicate;
use rawsql_test_utils::{northwind, sql, Customer};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_composed_filter_equals_reference_filter(predicate in arb_customer_predicate()) {
        let (db, executor) = northwind_database().unwrap();
        let mut session = db.open_session();

        let composed = runtime().block_on(
            session
                .from_sql::<Customer>(sql::CUSTOMERS, params![])
                .unwrap()
                .filter(predicate.clone())
                .to_list(),
        ).unwrap();

        let expected: Vec<Customer> = northwind::customers()
            .unwrap()
            .into_iter()
            .filter(|c| predicate.evaluate(c).unwrap())
            .collect();

        assert_same_entities(&composed, &expected);
        prop_assert_eq!(session.entry_count(), expected.len());
        prop_assert_eq!(executor.execution_count(), 1);
    }

    #[test]
    fn prop_no_tracking_never_adds_entries(predicate in arb_customer_predicate()) {
        let (db, _) = northwind_database().unwrap();
        let mut session = db.open_session();

        runtime().block_on(
            session
                .from_sql::<Customer>(sql::CUSTOMERS, params![])
                .unwrap()
                .filter(predicate)
                .as_no_tracking()
                .to_list(),
        ).unwrap();

        prop_assert_eq!(session.entry_count(), 0);
    }
}
