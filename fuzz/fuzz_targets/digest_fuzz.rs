//! Fuzz test for fingerprint digests
//!
//! Two fingerprints built from different inputs must not compare equal, and
//! equal fingerprints must share a digest.
//!
//! Run with: cargo +nightly fuzz run digest_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use rawsql_core::{Fingerprint, Value};

fuzz_target!(|data: &[u8]| {
    let (left, right) = data.split_at(data.len() / 2);
    let left = String::from_utf8_lossy(left).into_owned();
    let right = String::from_utf8_lossy(right).into_owned();

    let a = Fingerprint::new("SELECT {0}", vec![Value::from(left.as_str())]).unwrap();
    let b = Fingerprint::new("SELECT {0}", vec![Value::from(right.as_str())]).unwrap();
    let a_again = Fingerprint::new("SELECT {0}", vec![Value::from(left.as_str())]).unwrap();

    assert_eq!(a, a_again);
    assert_eq!(a.digest(), a_again.digest());
    if left != right {
        assert_ne!(a, b);
        assert_ne!(a.digest(), b.digest());
    }
});
