// Copyright 2021 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
////////////////////////////////////////////////////////////////////////////////

use super::*;
use crate::util::{b64_encode, expect_err};
use serde_json::json;

#[test]
fn test_set_parameter() {
    let mut header = Header::default();
    assert!(header.is_empty());

    header.set_parameter("alg", json!("HS256")).unwrap();
    header.set_parameter("kid", json!("key-1")).unwrap();
    header.set_parameter("crit", json!(["b64"])).unwrap();
    header.set_parameter("b64", json!(false)).unwrap();
    assert!(!header.is_empty());

    assert_eq!(header.alg.as_deref(), Some("HS256"));
    assert_eq!(header.crit, vec!["b64"]);
    assert_eq!(header.rest["b64"], json!(false));
    for name in ["alg", "kid", "crit", "b64"] {
        assert!(header.contains(name));
    }
    assert!(!header.contains("enc"));

    expect_err(header.set_parameter("alg", json!(42)), "expected string");
    expect_err(header.set_parameter("crit", json!("b64")), "expected array");
    expect_err(header.set_parameter("crit", json!([])), "non-empty array");
    expect_err(header.set_parameter("crit", json!([1])), "expected string");
}

#[test]
fn test_to_map_ordering() {
    let header = HeaderBuilder::new()
        .typ("JWT".to_owned())
        .alg("HS256".to_owned())
        .value("custom", json!(1))
        .kid("key-1".to_owned())
        .build();

    // Registered parameters come first in a fixed order, extras follow in
    // insertion order.
    let map = header.to_map();
    let names: Vec<&String> = map.keys().collect();
    assert_eq!(names, ["alg", "kid", "typ", "custom"]);
}

#[test]
fn test_merge_disjoint() {
    let protected = HeaderBuilder::new().alg("HS256".to_owned()).build();
    let unprotected = HeaderBuilder::new().kid("key-1".to_owned()).build();

    let merged = Header::merge_disjoint(&[&protected, &unprotected]).unwrap();
    assert_eq!(merged["alg"], json!("HS256"));
    assert_eq!(merged["kid"], json!("key-1"));

    let clashing = HeaderBuilder::new().alg("HS512".to_owned()).build();
    expect_err(
        Header::merge_disjoint(&[&protected, &clashing]).map(|_| ()),
        "DuplicateHeaderParameter",
    );
}

#[test]
fn test_protected_header_retains_wire_form() {
    // Non-canonical whitespace survives a parse/re-encode cycle.
    let original = b64_encode(r#"{"alg": "HS256"}"#);
    let protected = ProtectedHeader::from_encoded(&original).unwrap();
    assert_eq!(protected.header.alg.as_deref(), Some("HS256"));
    assert_eq!(protected.encoded().unwrap(), original);

    // A freshly built header serializes once and stays stable.
    let built =
        ProtectedHeader::from_header(HeaderBuilder::new().alg("HS256".to_owned()).build())
            .unwrap();
    assert_eq!(built.encoded().unwrap(), b64_encode(r#"{"alg":"HS256"}"#));

    // The empty segment denotes an absent protected header.
    let absent = ProtectedHeader::from_encoded("").unwrap();
    assert!(absent.is_empty());
    assert_eq!(absent.encoded().unwrap(), "");

    expect_err(
        ProtectedHeader::from_encoded("!*").map(|_| ()),
        "invalid base64url",
    );
    expect_err(
        ProtectedHeader::from_encoded(&b64_encode("not json")).map(|_| ()),
        "invalid JSON",
    );
}

#[test]
fn test_serde_round_trip() {
    let header = HeaderBuilder::new()
        .alg("A128KW".to_owned())
        .enc("A128CBC-HS256".to_owned())
        .zip("DEF".to_owned())
        .cty("JWT".to_owned())
        .add_critical("b64")
        .value("b64", json!(false))
        .build();

    let text = serde_json::to_string(&header).unwrap();
    let parsed: Header = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, header);
}

#[test]
#[should_panic]
fn test_builder_rejects_registered_name() {
    let _ = HeaderBuilder::new().value("alg", json!("HS256"));
}
