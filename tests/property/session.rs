use loadcheck::session::INTERNAL_PREFIX;
use loadcheck::{Session, Value};
use proptest::prelude::*;

fn key() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn set_then_get(k in key(), v in any::<i64>()) {
        let before = Session::new("scn", 1);
        let after = before.set(k.as_str(), v);
        prop_assert_eq!(after.get_long(&k), Ok(v));
        prop_assert!(!before.contains(&k));
    }

    #[test]
    fn remove_is_idempotent(keys in proptest::collection::vec(key(), 0..8), k in key()) {
        let s = Session::new("scn", 1).set_all(keys.iter().map(|k| (k.as_str(), 1)));
        let once = s.remove(&k);
        prop_assert_eq!(once.remove(&k), once.clone());
        prop_assert!(!once.contains(&k));
    }

    #[test]
    fn reset_keeps_only_internal_keys(user in proptest::collection::vec(key(), 0..8), internal in proptest::collection::vec(key(), 0..8)) {
        let s = Session::new("scn", 1)
            .set_all(user.iter().map(|k| (k.clone(), Value::from(1))))
            .set_all(internal.iter().map(|k| (format!("{}{}", INTERNAL_PREFIX, k), Value::from(2))))
            .reset();
        prop_assert!(s.attributes().keys().all(|k| k.starts_with(INTERNAL_PREFIX)));
        prop_assert_eq!(s.attributes().len(), internal.iter().collect::<std::collections::BTreeSet<_>>().len());
    }

    #[test]
    fn int_strings_coerce(n in any::<i32>()) {
        let s = Session::new("scn", 1).set("n", n.to_string());
        prop_assert_eq!(s.get_int("n"), Ok(n));
        prop_assert_eq!(s.get_double("n"), Ok(f64::from(n)));
    }

    #[test]
    fn groups_balance(names in proptest::collection::vec(key(), 0..6)) {
        let mut s = Session::new("scn", 1);
        for name in &names {
            s = s.enter_group(name.as_str());
        }
        prop_assert_eq!(s.groups(), names.as_slice());
        for _ in &names {
            s = s.exit_group();
        }
        prop_assert!(s.groups().is_empty());
    }
}
