//! Fuzz test for SQL template binding
//!
//! Feeds arbitrary SQL text and a small parameter list to the fingerprint
//! builder. Binding must either fail with `InvalidFingerprint` or produce a
//! command with one named parameter per bound value.
//!
//! Run with: cargo +nightly fuzz run fingerprint_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use rawsql_core::{Fingerprint, QueryError, RawSqlError, Value};

fuzz_target!(|data: &[u8]| {
    let Some((&count, rest)) = data.split_first() else {
        return;
    };
    let Ok(sql) = std::str::from_utf8(rest) else {
        return;
    };
    let params: Vec<Value> = (0..(count % 8) as i64).map(Value::Int).collect();
    let bound = params.len();

    match Fingerprint::new(sql, params) {
        Ok(fp) => {
            let command = fp.to_command().expect("validated fingerprint must translate");
            assert_eq!(command.parameters.len(), bound);
            for (i, param) in command.parameters.iter().enumerate() {
                assert_eq!(param.name, format!("@p{}", i));
            }
            assert!(fp.to_string().starts_with("fp_"));
        }
        Err(RawSqlError::Query(QueryError::InvalidFingerprint { .. })) => {}
        Err(other) => panic!("unexpected error kind: {:?}", other),
    }
});
