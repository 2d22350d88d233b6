#![no_main]

use libfuzzer_sys::fuzz_target;
use loadcheck::prelude::*;

fuzz_target!(|data: &[u8]| {
    let response = Response::builder().body(data.to_vec()).build();
    let session = Session::new("fuzz", 1);

    let checks: Vec<Check> = vec![
        json_path("$..*").count().gte(0),
        jmes_path("@").find().optional(),
        jsonp_json_path("$.*").find().optional(),
        css("*").count().gte(0),
        form("form").find_all().optional(),
        xpath("//*").count().gte(0),
        substring("a").find_all().optional(),
        regex(r"(\w+)=(\w*)").capture2().find_all().optional(),
        md5().find().exists(),
        body_length().find().gte(0),
    ];

    // Malformed bodies fail checks; they never panic.
    let _ = run_checks(&checks, &response, session);
});
