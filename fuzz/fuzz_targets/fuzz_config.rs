#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);

    let config = match loadcheck::parse(&s) {
        Ok(c) => c,
        Err(_) => return,
    };

    // Anything parse accepted must name a charset the decoder knows.
    if loadcheck::Charset::from_label(&config.charset).is_none() {
        panic!("parse accepted unsupported charset {:?}", config.charset);
    }
});
