#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use loadcheck::{Expression, Session};

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);

    let template = match String::arbitrary(&mut u) {
        Ok(t) => t,
        Err(_) => return,
    };
    let key = String::arbitrary(&mut u).unwrap_or_default();
    let value = String::arbitrary(&mut u).unwrap_or_default();
    let session = Session::new("fuzz", 1).set(key, value);

    let text: Expression<String> = Expression::el(&template);
    let resolved = text.resolve(&session);

    // A constant must resolve to itself regardless of the session.
    if let Some(constant) = text.as_constant() {
        assert_eq!(resolved.as_ref(), Ok(constant));
    }

    let _ = Expression::<i32>::el(&template).resolve(&session);
    let _ = Expression::<bool>::el(&template).resolve(&session);
});
