use loadcheck::{Charset, ConfigErrorKind, CoreConfig, Response, parse};

#[test]
fn charset_defaults_to_utf8() {
    let config = parse("{}").unwrap();
    assert_eq!(config, CoreConfig::default());
    assert_eq!(config.default_charset(), Charset::utf8());
}

#[test]
fn explicit_charset() {
    let config = parse("charset: ISO-8859-1\n").unwrap();
    assert_eq!(config.charset, "ISO-8859-1");
    assert_eq!(config.default_charset().name(), "windows-1252");
}

#[test]
fn legacy_charset_labels_are_accepted() {
    let config = parse("charset: windows-1252\n").unwrap();
    assert_eq!(config.default_charset().name(), "windows-1252");

    let config = parse("charset: Shift_JIS\n").unwrap();
    let response = Response::builder_with(&config)
        .body(vec![0x83, 0x65, 0x83, 0x58, 0x83, 0x67])
        .build();
    assert_eq!(response.text(), "テスト");
}

#[test]
fn empty_input_is_syntax_error() {
    let err = parse("   \n").unwrap_err();
    assert_eq!(err.kind, ConfigErrorKind::Syntax);
}

#[test]
fn non_mapping_root_is_type_mismatch() {
    let err = parse("- utf-8\n").unwrap_err();
    assert_eq!(err.kind, ConfigErrorKind::TypeMismatch);
}

#[test]
fn unknown_key_is_rejected() {
    let err = parse("charset: utf-8\nretries: 3\n").unwrap_err();
    assert_eq!(err.kind, ConfigErrorKind::TypeMismatch);
    assert!(err.message.contains("retries"), "{}", err.message);
}

#[test]
fn unsupported_charset_is_rejected() {
    let err = parse("charset: klingon\n").unwrap_err();
    assert_eq!(err.kind, ConfigErrorKind::TypeMismatch);
    assert_eq!(err.message, "unsupported charset: klingon");
}

#[test]
fn configured_charset_decodes_bodies() {
    let config = parse("charset: latin1\n").unwrap();
    let response = Response::builder_with(&config)
        .body(vec![0x63, 0x61, 0x66, 0xE9])
        .build();
    assert_eq!(response.text(), "café");

    let declared = Response::builder_with(&config)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body("café")
        .build();
    assert_eq!(declared.charset(), Charset::utf8());
    assert_eq!(declared.text(), "café");
}
