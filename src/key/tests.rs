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
use crate::util::expect_err;
use serde_json::json;

fn oct_key(kid: &str, params: &[(&str, Value)]) -> Jwk {
    let mut builder = JwkBuilder::generate_symmetric_key(16).key_id(kid);
    for (name, value) in params {
        builder = builder.param(*name, value.clone());
    }
    builder.build()
}

#[test]
fn test_jwk_construction() {
    let key = Jwk::from_params(
        json!({"kty": "oct", "k": "aGk"})
            .as_object()
            .unwrap()
            .clone(),
    )
    .unwrap();
    assert_eq!(key.kty(), "oct");
    assert_eq!(key.bytes_param("k").unwrap(), b"hi");

    expect_err(
        Jwk::from_params(json!({"use": "sig"}).as_object().unwrap().clone()).map(|_| ()),
        "KeyNotFound",
    );
    expect_err(
        Jwk::from_params(json!({"kty": 42}).as_object().unwrap().clone()).map(|_| ()),
        "expected string",
    );
}

#[test]
fn test_jwk_accessors() {
    let key = oct_key("key-1", &[("alg", json!("HS256")), ("use", json!("sig"))]);
    assert_eq!(key.kid(), Some("key-1"));
    assert_eq!(key.alg(), Some("HS256"));
    assert_eq!(key.use_str(), Some("sig"));
    assert!(key.has("k"));
    assert!(!key.has("d"));
    expect_err(key.get("d").map(|_| ()), "KeyNotFound");

    let bad_b64 = key.clone().with_parameter("k", json!("!*")).unwrap();
    expect_err(bad_b64.bytes_param("k"), "invalid base64url");
    let non_string = key.clone().with_parameter("x5c", json!([1])).unwrap();
    expect_err(non_string.bytes_param("x5c"), "base64url string");
}

#[test]
fn test_jwk_immutable_kty() {
    let key = oct_key("key-1", &[]);
    let renamed = key.with_parameter("kid", json!("key-2")).unwrap();
    assert_eq!(renamed.kid(), Some("key-2"));

    expect_err(
        renamed.with_parameter("kty", json!("EC")).map(|_| ()),
        "cannot be changed",
    );
}

#[test]
fn test_key_set_indexing() {
    let set = JwkSet::default()
        .add_key(oct_key("a", &[]))
        .add_key(oct_key("b", &[]));
    assert_eq!(set.len(), 2);
    assert!(!set.is_empty());
    assert_eq!(set.key(0).unwrap().kid(), Some("a"));
    assert_eq!(set.key(1).unwrap().kid(), Some("b"));
    expect_err(set.key(2).map(|_| ()), "IndexOutOfRange");

    let kids: Vec<_> = set.iter().map(|k| k.kid().unwrap()).collect();
    assert_eq!(kids, ["a", "b"]);

    let set = set.remove_key(0).unwrap();
    assert_eq!(set.key(0).unwrap().kid(), Some("b"));
    expect_err(set.clone().remove_key(1).map(|_| ()), "IndexOutOfRange");
}

#[test]
fn test_key_set_json_round_trip() {
    use crate::JsonSerializable;

    let set = JwkSet::default().add_key(oct_key("a", &[]));
    let text = set.clone().to_json_string().unwrap();
    assert!(text.starts_with(r#"{"keys":["#));
    assert_eq!(JwkSet::from_json_str(&text).unwrap(), set);

    expect_err(JwkSet::from_json_str("{}").map(|_| ()), "keys");
}

#[test]
fn test_select_key_single_matching() {
    let key = oct_key("only", &[("use", json!("sig"))]);
    let set = JwkSet::default().add_key(key.clone());
    let selected = set.select_key(KeyUse::Signature, None, &[]).unwrap();
    assert_eq!(selected, Some(&key));

    // A sig-only key is not an encryption candidate.
    assert_eq!(set.select_key(KeyUse::Encryption, None, &[]).unwrap(), None);
}

#[test]
fn test_select_key_scoring() {
    let unmarked = oct_key("unmarked", &[]);
    let sig_only = oct_key("sig-only", &[("use", json!("sig"))]);
    let sig_and_alg = oct_key(
        "sig-and-alg",
        &[("use", json!("sig")), ("alg", json!("HS256"))],
    );
    let set = JwkSet::default()
        .add_key(unmarked)
        .add_key(sig_only)
        .add_key(sig_and_alg);

    // Best score wins: use match + alg match beats use match alone.
    let selected = set
        .select_key(KeyUse::Signature, Some("HS256"), &[])
        .unwrap()
        .unwrap();
    assert_eq!(selected.kid(), Some("sig-and-alg"));

    // With a different algorithm the alg-bound key is excluded entirely.
    let selected = set
        .select_key(KeyUse::Signature, Some("HS512"), &[])
        .unwrap()
        .unwrap();
    assert_eq!(selected.kid(), Some("sig-only"));
}

#[test]
fn test_select_key_tie_break_first_occurrence() {
    let first = oct_key("first", &[("use", json!("sig"))]);
    let second = oct_key("second", &[("use", json!("sig"))]);
    let set = JwkSet::default().add_key(first).add_key(second);

    let selected = set.select_key(KeyUse::Signature, None, &[]).unwrap().unwrap();
    assert_eq!(selected.kid(), Some("first"));
}

#[test]
fn test_select_key_key_ops() {
    let verify_key = oct_key("v", &[("key_ops", json!(["verify"]))]);
    let wrap_key = oct_key("w", &[("key_ops", json!(["wrapKey", "unwrapKey"]))]);
    let set = JwkSet::default().add_key(verify_key).add_key(wrap_key);

    assert_eq!(
        set.select_key(KeyUse::Signature, None, &[]).unwrap().unwrap().kid(),
        Some("v")
    );
    assert_eq!(
        set.select_key(KeyUse::Encryption, None, &[]).unwrap().unwrap().kid(),
        Some("w")
    );

    let bogus = oct_key("x", &[("key_ops", json!(["deriveBits"]))]);
    let set = JwkSet::default().add_key(bogus);
    expect_err(
        set.select_key(KeyUse::Signature, None, &[]).map(|_| ()),
        "UnsupportedKeyOperation",
    );
}

#[test]
fn test_select_key_restrictions() {
    let a = oct_key("a", &[("use", json!("enc"))]);
    let b = oct_key("b", &[("use", json!("enc"))]);
    let set = JwkSet::default().add_key(a).add_key(b);

    let selected = set
        .select_key(KeyUse::Encryption, None, &[("kid", json!("b"))])
        .unwrap()
        .unwrap();
    assert_eq!(selected.kid(), Some("b"));

    assert_eq!(
        set.select_key(KeyUse::Encryption, None, &[("kid", json!("c"))])
            .unwrap(),
        None
    );
}

#[test]
fn test_generate_okp_keys() {
    for curve in OKP_CURVES {
        let key = JwkBuilder::generate_okp_key(curve).unwrap().build();
        assert_eq!(key.kty(), "OKP");
        assert_eq!(key.get("crv").unwrap(), &json!(*curve));
        assert_eq!(key.bytes_param("x").unwrap().len(), 32);
        assert_eq!(key.bytes_param("d").unwrap().len(), 32);
    }
    expect_err(
        JwkBuilder::generate_okp_key("P-256").map(|_| ()),
        "UnsupportedCurve",
    );
}

#[test]
fn test_generate_ec_key() {
    let key = JwkBuilder::generate_ec_key("P-256").unwrap().build();
    assert_eq!(key.kty(), "EC");
    assert_eq!(key.bytes_param("x").unwrap().len(), 32);
    assert_eq!(key.bytes_param("y").unwrap().len(), 32);
    assert_eq!(key.bytes_param("d").unwrap().len(), 32);

    expect_err(
        JwkBuilder::generate_ec_key("secp256k1").map(|_| ()),
        "UnsupportedCurve",
    );
}

#[test]
fn test_builder_key_ops_and_use() {
    let key = JwkBuilder::generate_symmetric_key(32)
        .key_use(KeyUse::Signature)
        .add_key_op("sign")
        .add_key_op("verify")
        .build();
    assert_eq!(key.use_str(), Some("sig"));
    assert_eq!(key.get("key_ops").unwrap(), &json!(["sign", "verify"]));
}

#[test]
#[should_panic]
fn test_builder_rejects_kty_param() {
    let _ = JwkBuilder::generate_symmetric_key(16).param("kty", json!("EC"));
}
