//! Integration-level tests against the public [`crate::Parser`] API.
//!
//! `lexer.rs` already exercises the state machine directly against its
//! internal S-expression renderer; these tests instead go through
//! [`parse_str`] and the read-only [`VcmRef`] walking API, the way an
//! external caller would.

use crate::{parse_str, ErrorKind, Extra, Parser, VcmPayload, VcmRef, VcmTag};

fn children(node: VcmRef<'_>) -> Vec<VcmRef<'_>> {
    node.children().collect()
}

#[test]
fn parses_a_plain_json_object() {
    let tree = parse_str(r#"{"name": "Tom", "age": 30}"#).unwrap();
    let root = tree.root();
    assert_eq!(root.tag(), VcmTag::Object);
    let kids = children(root);
    assert_eq!(kids.len(), 4);
    assert_eq!(kids[0].tag(), VcmTag::String);
    assert_eq!(kids[1].tag(), VcmTag::String);
    assert_eq!(kids[2].tag(), VcmTag::String);
    assert_eq!(kids[3].tag(), VcmTag::Number);
}

#[test]
fn parses_nested_arrays_and_objects() {
    let tree = parse_str(r#"{"items": [1, 2, {"ok": true}]}"#).unwrap();
    let root = tree.root();
    assert_eq!(root.tag(), VcmTag::Object);
    let kids = children(root);
    let items = kids[1];
    assert_eq!(items.tag(), VcmTag::Array);
    assert_eq!(items.children_count(), 3);
}

#[test]
fn dynamic_variable_reference_round_trips_through_the_tree() {
    let tree = parse_str("$SYSTEM.locale").unwrap();
    let root = tree.root();
    assert_eq!(root.tag(), VcmTag::GetElement);
    let kids = children(root);
    assert_eq!(kids[0].tag(), VcmTag::GetVariable);
    match kids[1].payload() {
        VcmPayload::String(bytes) => assert_eq!(bytes, b"locale"),
        other => panic!("expected STRING, got {other:?}"),
    }
}

#[test]
fn protected_form_is_flagged_as_sugar() {
    let plain = parse_str("$name").unwrap();
    assert!(!plain.root().extra().contains(Extra::PROTECT));

    let protected = parse_str("${name}").unwrap();
    let root = protected.root();
    assert_eq!(root.tag(), VcmTag::GetVariable);
    assert!(root.extra().contains(Extra::PROTECT));
    assert!(root.extra().contains(Extra::SUGAR));
}

#[test]
fn getter_and_setter_calls_nest_off_a_variable() {
    let tree = parse_str("$DATA(! 42)").unwrap();
    let root = tree.root();
    assert_eq!(root.tag(), VcmTag::CallSetter);
    let kids = children(root);
    assert_eq!(kids[0].tag(), VcmTag::GetVariable);
    match kids[1].payload() {
        VcmPayload::Number(n) => assert_eq!(n.0, 42.0),
        other => panic!("expected NUMBER, got {other:?}"),
    }
}

#[test]
fn getter_call_accepts_multiple_arguments() {
    let tree = parse_str("$f(1, 2)").unwrap();
    let root = tree.root();
    assert_eq!(root.tag(), VcmTag::CallGetter);
    let kids = children(root);
    assert_eq!(kids[0].tag(), VcmTag::GetVariable);
    match (kids[1].payload(), kids[2].payload()) {
        (VcmPayload::Number(a), VcmPayload::Number(b)) => {
            assert_eq!(a.0, 1.0);
            assert_eq!(b.0, 2.0);
        }
        other => panic!("expected two NUMBER args, got {other:?}"),
    }
}

#[test]
fn unquoted_object_keys_support_multiple_pairs() {
    let tree = parse_str("{x:1, y:2}").unwrap();
    let root = tree.root();
    assert_eq!(root.tag(), VcmTag::Object);
    let kids = children(root);
    assert_eq!(kids.len(), 4);
    match kids[0].payload() {
        VcmPayload::String(bytes) => assert_eq!(bytes, b"x"),
        other => panic!("expected STRING, got {other:?}"),
    }
    match kids[2].payload() {
        VcmPayload::String(bytes) => assert_eq!(bytes, b"y"),
        other => panic!("expected STRING, got {other:?}"),
    }
}

#[test]
fn string_interpolation_builds_a_concat_string() {
    let tree = parse_str(r#""Hello, $name!""#).unwrap();
    let root = tree.root();
    assert_eq!(root.tag(), VcmTag::ConcatString);
    let kids = children(root);
    assert_eq!(kids.len(), 3);
    assert_eq!(kids[0].tag(), VcmTag::String);
    assert_eq!(kids[1].tag(), VcmTag::GetVariable);
    assert_eq!(kids[2].tag(), VcmTag::String);
}

#[test]
fn triple_quoted_strings_are_not_interpolated() {
    // A raw triple-quoted string never enters the `$`-interpolation
    // grammar at all, so a literal `$name` stays one STRING node.
    let tree = parse_str(r#""""price: $5""""#).unwrap();
    let root = tree.root();
    assert_eq!(root.tag(), VcmTag::String);
    match root.payload() {
        VcmPayload::String(bytes) => assert_eq!(bytes, b"price: $5"),
        other => panic!("expected STRING, got {other:?}"),
    }
}

#[test]
fn byte_sequence_literals_decode_to_raw_bytes() {
    let tree = parse_str("bx010203").unwrap();
    match tree.root().payload() {
        VcmPayload::ByteSequence(bytes) => assert_eq!(bytes, &[0x01, 0x02, 0x03]),
        other => panic!("expected BYTE_SEQUENCE, got {other:?}"),
    }
}

#[test]
fn integer_suffixes_select_long_vs_unsigned_payloads() {
    assert_eq!(parse_str("7L").unwrap().root().tag(), VcmTag::LongInt);
    assert_eq!(parse_str("7UL").unwrap().root().tag(), VcmTag::ULongInt);
    assert_eq!(parse_str("7").unwrap().root().tag(), VcmTag::Number);
}

#[test]
fn whitespace_around_a_value_is_insignificant() {
    let a = parse_str("  42  ").unwrap();
    let b = parse_str("42").unwrap();
    assert_eq!(format!("{:?}", a.root()), format!("{:?}", b.root()));
}

#[test]
fn trailing_garbage_after_a_complete_value_is_an_error() {
    let err = parse_str("1 2").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnexpectedCharacter);
}

#[test]
fn unterminated_object_is_an_error_with_a_location() {
    let err = parse_str(r#"{"a": 1"#).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnexpectedEof);
    assert!(err.line >= 1);
}

#[test]
fn depth_ceiling_is_configurable_per_parser() {
    let nested: String = "[".repeat(5) + "1" + &"]".repeat(5);
    assert!(Parser::with_max_depth(2).parse_str(&nested).is_err());
    assert!(Parser::with_max_depth(10).parse_str(&nested).is_ok());
}

#[test]
fn invalid_utf8_surfaces_as_bad_encoding() {
    let err = Parser::new().parse(&b"\xFF\xFE"[..]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadEncoding);
}

#[test]
fn a_parser_instance_is_reusable_across_independent_inputs() {
    let mut p = Parser::new();
    assert_eq!(p.parse_str("1").unwrap().root().tag(), VcmTag::Number);
    assert_eq!(p.parse_str("\"x\"").unwrap().root().tag(), VcmTag::String);
    assert_eq!(p.parse_str("null").unwrap().root().tag(), VcmTag::Null);
}
