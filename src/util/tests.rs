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
use serde_json::json;

#[test]
fn test_b64_round_trip() {
    // RFC 7515 appendix C examples.
    assert_eq!(b64_encode([3, 236, 255, 224, 193]), "A-z_4ME");
    assert_eq!(b64_decode("A-z_4ME", "test").unwrap(), vec![3, 236, 255, 224, 193]);
    assert_eq!(b64_encode(b""), "");
    assert_eq!(b64_decode("", "test").unwrap(), Vec::<u8>::new());
}

#[test]
fn test_b64_decode_rejects_malformed() {
    for bad in ["!!!", "A-z_4ME=", "a b"] {
        let err = b64_decode(bad, "some segment").unwrap_err();
        expect_err(Err::<(), _>(err), "some segment");
    }
}

#[test]
fn test_random_bytes() {
    let a = random_bytes(32);
    let b = random_bytes(32);
    assert_eq!(a.len(), 32);
    assert_ne!(a, b);
    assert!(random_bytes(0).is_empty());
}

#[test]
fn test_value_try_as() {
    assert_eq!(json!("text").try_as_str("seg").unwrap(), "text");
    expect_err(json!(42).try_as_str("seg"), "expected string");

    assert_eq!(json!([1, 2]).try_as_array("seg").unwrap().len(), 2);
    expect_err(json!("nope").try_as_array("seg"), "expected array");

    assert!(json!({"a": 1}).try_as_object("seg").unwrap().contains_key("a"));
    expect_err(json!([1]).try_as_object("seg"), "expected object");

    assert_eq!(json!("aGk").try_as_b64_bytes("seg").unwrap(), b"hi");
    expect_err(json!("!*").try_as_b64_bytes("seg"), "invalid base64url");
    expect_err(json!(42).try_as_b64_bytes("seg"), "expected string");
}
