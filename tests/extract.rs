use loadcheck::prelude::*;
use loadcheck::{Charset, CheckErrorKind};
use serde_json::json;

fn session() -> Session {
    Session::new("scn", 1)
}

fn json_body() -> Response {
    Response::builder()
        .header("Content-Type", "application/json")
        .body(
            r#"{"a": {"n": 1, "s": "x", "num": "12", "b": true, "d": 1.5,
                "arr": [1, 2], "nul": null, "big": 9000000000}}"#,
        )
        .build()
}

const PAGE: &str = r#"<html><body>
<p class="msg">Hello</p><p class="msg">World</p>
<a href="/x" id="l">link</a>
<form id="f">
  <input name="user" value="joe">
  <input type="checkbox" name="opt" value="a" checked>
  <input type="checkbox" name="opt" value="b" checked>
  <input type="checkbox" name="off" value="z">
  <select name="color"><option value="r">Red</option><option value="g" selected>Green</option></select>
  <textarea name="note">hi</textarea>
  <input type="submit" name="go" value="Go">
</form>
</body></html>"#;

fn html() -> Response {
    Response::builder()
        .header("Content-Type", "text/html; charset=utf-8")
        .body(PAGE)
        .build()
}

const DOC: &str = r#"<root xmlns:a="urn:a"><item id="1">x</item><item id="2">y</item><a:thing>z</a:thing></root>"#;

fn xml() -> Response {
    Response::builder().body(DOC).build()
}

fn passes(check: impl Into<Check>, response: &Response) {
    let check = check.into();
    if let Err(e) = check.check(response, &session()) {
        panic!("{} failed: {}", check.description(), e);
    }
}

// ─── JSON path ──────────────────────────────────────────────────────────────

#[test]
fn json_path_narrows_scalars() {
    let r = json_body();
    passes(json_path("$.a.n").of_int().find().is(1), &r);
    passes(json_path("$.a.num").of_int().find().is(12), &r);
    passes(json_path("$.a.big").of_long().find().is(9_000_000_000), &r);
    passes(json_path("$.a.d").of_double().find().is(1.5), &r);
    passes(json_path("$.a.b").of_boolean().find().is(true), &r);
    passes(json_path("$.a.s").of_string().find().is("x".to_string()), &r);
}

#[test]
fn json_path_drops_nodes_that_do_not_narrow() {
    let r = json_body();
    passes(json_path("$.a.s").of_int().find().not_exists(), &r);
    passes(json_path("$.a.big").of_int().count().is(0), &r);
}

#[test]
fn json_path_null_only_survives_as_object() {
    let r = json_body();
    passes(json_path("$.a.nul").find().not_exists(), &r);
    passes(json_path("$.a.nul").of_object().find().is_null(), &r);
    passes(json_path("$.a.n").of_object().find().not_null(), &r);
}

#[test]
fn json_path_containers() {
    let r = json_body();
    passes(json_path("$.a.arr").of_list().find().is(vec![json!(1), json!(2)]), &r);
    passes(json_path("$.a.arr").find().is("[1,2]".to_string()), &r);
    passes(json_path("$.a.arr[*]").of_int().find_all().is(vec![1, 2]), &r);
    passes(json_path("$.a.arr[*]").count().is(2), &r);

    let outcome = json_path("$.a").of_map().find().exists().check(&r, &session()).unwrap();
    let Some(Value::Json(node)) = outcome.value else {
        panic!("expected a JSON object");
    };
    assert_eq!(node["n"], json!(1));
}

#[test]
fn json_path_description() {
    let check = json_path("$.a.n").of_int().find().is(1);
    assert_eq!(check.description(), "jsonPath($.a.n).find.is(1)");
}

#[test]
fn invalid_json_path_is_extraction_error() {
    let err = json_path("$[").find().exists().check(&json_body(), &session()).unwrap_err();
    assert_eq!(err.kind, CheckErrorKind::Extraction);
}

#[test]
fn malformed_json_body_is_extraction_error() {
    let response = Response::builder().body("not json").build();
    let err = json_path("$.x").find().exists().check(&response, &session()).unwrap_err();
    assert_eq!(err.kind, CheckErrorKind::Extraction);
    assert!(err.message.starts_with("Could not parse response into a JSON"));
}

#[test]
fn json_body_with_byte_order_mark() {
    let r = Response::builder().body("\u{FEFF}{\"id\": 1}").build();
    passes(json_path("$.id").of_int().find().is(1), &r);
    passes(jmes_path("id").of_int().find().is(1), &r);
}

// ─── JMES path ──────────────────────────────────────────────────────────────

#[test]
fn jmes_path_yields_single_node() {
    let r = json_body();
    passes(jmes_path("a.n").of_int().find().is(1), &r);
    passes(jmes_path("a.missing").find().not_exists(), &r);
    passes(jmes_path("a.arr[*]").count().is(1), &r);
    passes(jmes_path("a.arr[*]").of_list().find().is(vec![json!(1), json!(2)]), &r);
}

// ─── JSONP ──────────────────────────────────────────────────────────────────

#[test]
fn jsonp_unwraps_callback() {
    let r = Response::builder().body(r#"callback({"x": 3, "y": "z"});"#).build();
    passes(jsonp_json_path("$.x").of_int().find().is(3), &r);
    passes(jsonp_jmes_path("y").find().is("z".to_string()), &r);
}

#[test]
fn jsonp_rejects_trailing_statements() {
    let r = Response::builder().body("cb({\"x\": 1}); steal(document.cookie)").build();
    let err = jsonp_json_path("$.x").find().exists().check(&r, &session()).unwrap_err();
    assert_eq!(err.kind, CheckErrorKind::Extraction);

    let nested = Response::builder().body(r#"cb({"x": ")"});"#).build();
    passes(jsonp_json_path("$.x").find().is(")".to_string()), &nested);
}

#[test]
fn jsonp_rejects_plain_json() {
    let err = jsonp_json_path("$.a")
        .find()
        .exists()
        .check(&json_body(), &session())
        .unwrap_err();
    assert_eq!(err.kind, CheckErrorKind::Extraction);
}

// ─── CSS ────────────────────────────────────────────────────────────────────

#[test]
fn css_text_and_attributes() {
    let r = html();
    passes(
        css("p.msg").find_all().is(vec!["Hello".to_string(), "World".to_string()]),
        &r,
    );
    passes(css_attribute("a", "href").find().is("/x".to_string()), &r);
    passes(css_attribute("p", "href").find().not_exists(), &r);
    passes(css("p.msg").count().is(2), &r);
}

#[test]
fn css_attribute_description() {
    assert_eq!(
        Check::from(css_attribute("a", "href")).description(),
        "css(a, href).find.exists"
    );
}

#[test]
fn css_node_snapshot() {
    let check = css("a#l")
        .of_node()
        .find()
        .transform(|node| format!("{}:{}:{}", node.name, node.attr("href").unwrap_or(""), node.text))
        .is("a:/x:link".to_string());
    passes(check, &html());
}

#[test]
fn invalid_selector_is_extraction_error() {
    let err = css("p[").find().exists().check(&html(), &session()).unwrap_err();
    assert_eq!(err.kind, CheckErrorKind::Extraction);
}

#[test]
fn static_queries_are_reused_across_responses() {
    let check: Check = css("p.msg").count().is(2);
    let other = Response::builder()
        .body("<p class=\"msg\">a</p><p class=\"msg\">b</p>")
        .build();
    passes(check.clone(), &html());
    passes(check, &other);

    let broken: Check = jmes_path("a.[").find().exists();
    for r in [json_body(), json_body()] {
        let err = broken.check(&r, &session()).unwrap_err();
        assert_eq!(err.kind, CheckErrorKind::Extraction);
        assert!(err.message.contains("invalid JMES path 'a.['"), "{}", err.message);
    }
}

#[test]
fn late_bound_selector_follows_the_session() {
    let check: Check = css("#{sel}").count().is(2);
    let s = session().set("sel", "p.msg");
    assert!(check.check(&html(), &s).is_ok());
    let s = session().set("sel", "a");
    assert!(check.check(&html(), &s).is_err());
}

#[test]
fn form_collects_submitted_values() {
    let outcome = form("#f").find().exists().check(&html(), &session()).unwrap();
    let expected = Value::map([
        ("color", Value::from("g")),
        ("note", Value::from("hi")),
        ("opt", Value::list(["a", "b"])),
        ("user", Value::from("joe")),
    ]);
    assert_eq!(outcome.value, Some(expected));
}

// ─── XPath ──────────────────────────────────────────────────────────────────

#[test]
fn xpath_selects_text_and_attributes() {
    let r = xml();
    passes(
        xpath("//item").find_all().is(vec!["x".to_string(), "y".to_string()]),
        &r,
    );
    passes(xpath("//item/@id").find_nth(1).is("2".to_string()), &r);
    passes(xpath("count(//item)").find().is("2".to_string()), &r);
}

#[test]
fn xpath_namespaces() {
    passes(
        xpath_with_namespaces("//n:thing", &[("n", "urn:a")])
            .find()
            .is("z".to_string()),
        &xml(),
    );
}

#[test]
fn xml_body_with_byte_order_mark() {
    let r = Response::builder().body("\u{FEFF}<r><i>1</i></r>").build();
    passes(xpath("//i").find().is("1".to_string()), &r);
}

#[test]
fn malformed_xml_is_extraction_error() {
    let response = Response::builder().body("<root>").build();
    let err = xpath("//root").find().exists().check(&response, &session()).unwrap_err();
    assert_eq!(err.kind, CheckErrorKind::Extraction);
}

// ─── Body ───────────────────────────────────────────────────────────────────

#[test]
fn substring_offsets_are_in_chars() {
    let ascii = Response::builder().body("abcabc").build();
    passes(substring("bc").find_all().is(vec![1, 4]), &ascii);
    passes(substring("zz").find().not_exists(), &ascii);
    passes(substring("").count().is(0), &ascii);

    let accented = Response::builder().body("éa éa").build();
    passes(substring("a").find_all().is(vec![1, 4]), &accented);
}

#[test]
fn body_digests() {
    let r = Response::builder().body("hello").build();
    passes(md5().find().is("5d41402abc4b2a76b9719d911017c592".to_string()), &r);
    passes(
        sha1().find().is("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d".to_string()),
        &r,
    );
}

#[test]
fn body_views() {
    let r = Response::builder().body("héllo").build();
    passes(body_string().find().is("héllo".to_string()), &r);
    passes(body_bytes().find().is("héllo".as_bytes().to_vec()), &r);
    passes(body_length().find().is(6), &r);
}

#[test]
fn body_string_honours_charset() {
    let r = Response::builder()
        .body(vec![0x63, 0x61, 0x66, 0xE9])
        .charset(Charset::from_label("latin1").unwrap())
        .build();
    passes(body_string().find().is("café".to_string()), &r);
}

#[test]
fn utf16_body_decodes_from_declared_charset() {
    let mut body = vec![0xFF, 0xFE];
    body.extend("<p>id=17</p>".encode_utf16().flat_map(u16::to_le_bytes));
    let r = Response::builder()
        .header("Content-Type", "text/plain; charset=UTF-16")
        .body(body)
        .build();
    passes(regex(r"id=(\d+)").find().is("17".to_string()), &r);
    passes(body_length().find().is(26), &r);
}

#[test]
fn multi_valued_header() {
    let r = Response::builder()
        .header("Set-Cookie", "a=1")
        .header("set-cookie", "b=2")
        .build();
    passes(
        header("Set-Cookie")
            .find_all()
            .is(vec!["a=1".to_string(), "b=2".to_string()]),
        &r,
    );
    passes(header("X-Missing").find().not_exists(), &r);
}
