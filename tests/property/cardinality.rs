use loadcheck::cardinality::{count, nth, random_n};
use loadcheck::extract::substring_offsets;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn nth_matches_indexing(values in proptest::collection::vec(any::<i32>(), 0..20), k in 0usize..25) {
        prop_assert_eq!(nth(values.clone(), k), values.get(k).copied());
    }

    #[test]
    fn count_is_length(values in proptest::collection::vec(any::<u8>(), 0..100)) {
        prop_assert_eq!(count(&values) as usize, values.len());
    }

    #[test]
    fn random_n_is_an_ordered_subsequence(len in 0usize..40, n in 0usize..50) {
        let values: Vec<usize> = (0..len).collect();
        let picked = random_n(values, n, false).unwrap();
        prop_assert_eq!(picked.len(), n.min(len));
        prop_assert!(picked.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(picked.iter().all(|&i| i < len));
    }

    #[test]
    fn random_n_strict_fails_only_when_short(len in 0usize..20, n in 0usize..25) {
        let values: Vec<usize> = (0..len).collect();
        prop_assert_eq!(random_n(values, n, true).is_err(), len < n);
    }

    #[test]
    fn substring_offsets_point_at_matches(text in "[ab é]{0,30}", pattern in "[ab]{1,2}") {
        let chars: Vec<char> = text.chars().collect();
        let needle: Vec<char> = pattern.chars().collect();
        for offset in substring_offsets(&text, &pattern) {
            let start = offset as usize;
            prop_assert_eq!(&chars[start..start + needle.len()], needle.as_slice());
        }
    }
}
