use loadcheck::{Expression, Session};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn literal_templates_are_constant(text in "[a-z0-9 .]{0,20}") {
        let expr: Expression<String> = Expression::el(&text);
        prop_assert_eq!(expr.as_constant(), Some(&text));
        prop_assert_eq!(expr.resolve(&Session::new("scn", 1)), Ok(text));
    }

    #[test]
    fn placeholder_interpolates(prefix in "[a-z ]{0,8}", value in "[a-z0-9]{0,8}") {
        let session = Session::new("scn", 1).set("v", value.as_str());
        let hash: Expression<String> = Expression::el(&format!("{}#{{v}}!", prefix));
        let dollar: Expression<String> = Expression::el(&format!("{}${{v}}!", prefix));
        let expected = format!("{}{}!", prefix, value);
        prop_assert_eq!(hash.resolve(&session), Ok(expected.clone()));
        prop_assert_eq!(dollar.resolve(&session), Ok(expected));
    }

    #[test]
    fn single_placeholder_keeps_type(n in any::<i32>()) {
        let session = Session::new("scn", 1).set("n", n);
        let expr: Expression<i32> = Expression::el("#{n}");
        prop_assert_eq!(expr.resolve(&session), Ok(n));
    }
}
