#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use loadcheck::prelude::*;

/// Builds a request body and a batch of checks whose patterns come from
/// the fuzzer.
fn arbitrary_checks(u: &mut Unstructured<'_>) -> arbitrary::Result<(String, Vec<Check>)> {
    let body = String::arbitrary(u)?;
    let pattern = String::arbitrary(u)?;
    let n = u.int_in_range(0..=10)?;
    let fail_if_fewer = bool::arbitrary(u)?;

    let checks = vec![
        regex(pattern.as_str()).find_all().optional(),
        regex(pattern.as_str()).find_random_n(n, fail_if_fewer).optional(),
        json_path(pattern.as_str()).of_object().find_all().optional(),
        jmes_path(pattern.as_str()).find().optional(),
        css(pattern.as_str()).find().optional(),
        xpath(pattern.as_str()).find().optional(),
        substring(pattern.as_str()).count().gte(0),
        header(pattern.as_str()).find().optional(),
    ];
    Ok((body, checks))
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);

    let (body, checks) = match arbitrary_checks(&mut u) {
        Ok(b) => b,
        Err(_) => return,
    };

    let response = Response::builder()
        .header("X-Fuzz", body.clone())
        .body(body)
        .build();
    let session = Session::new("fuzz", 1).set("pattern", "x");

    let _ = run_checks(&checks, &response, session);
});
