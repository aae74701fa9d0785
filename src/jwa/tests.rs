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
use crate::{
    util::{b64_decode, expect_err},
    Header, JwkBuilder,
};

#[test]
fn test_manager_first_registration_wins() {
    struct Named(&'static str, &'static str);
    impl Algorithm for Named {
        fn name(&self) -> &str {
            self.0
        }
    }
    impl SignatureAlgorithm for Named {
        fn sign(&self, _key: &Jwk, _data: &[u8]) -> Result<Vec<u8>> {
            Ok(self.1.as_bytes().to_vec())
        }
        fn verify(&self, _key: &Jwk, _data: &[u8], _signature: &[u8]) -> Result<bool> {
            Ok(false)
        }
    }

    let mut manager: AlgorithmManager<dyn SignatureAlgorithm> = AlgorithmManager::new();
    manager.add(Arc::new(Named("X1", "first")));
    manager.add(Arc::new(Named("X1", "second")));
    manager.add(Arc::new(Named("X2", "other")));

    assert_eq!(manager.names(), vec!["X1", "X2"]);
    let key = JwkBuilder::new_none_key().build();
    let got = manager.get("X1").unwrap().sign(&key, b"").unwrap();
    assert_eq!(got, b"first");

    manager.remove("X1");
    assert!(!manager.has("X1"));
    assert!(manager.has("X2"));
    assert!(manager.get("X1").is_none());
    expect_err(manager.require("X1").map(|_| ()), "AlgorithmNotFound");
}

#[test]
fn test_factory_create_scoped_manager() {
    let factory = signature_algorithm_factory();
    let manager = factory.create(&["HS256", "EdDSA"]).unwrap();
    assert_eq!(manager.names(), vec!["HS256", "EdDSA"]);
    assert!(!manager.has("HS512"));

    expect_err(
        factory.create(&["HS256", "RS256"]).map(|_| ()),
        "UnknownAlgorithm",
    );
}

#[test]
fn test_builtin_catalogs() {
    assert_eq!(
        signature_algorithm_factory().names(),
        vec!["none", "HS256", "HS384", "HS512", "EdDSA", "ES256"]
    );
    assert_eq!(
        key_management_algorithm_factory().names(),
        vec!["dir", "A128KW", "A192KW", "A256KW", "ECDH-ES"]
    );
    assert_eq!(
        content_encryption_algorithm_factory().names(),
        vec!["A128CBC-HS256", "A256CBC-HS512", "A128GCM", "A256GCM"]
    );
    assert_eq!(compression_algorithm_factory().names(), vec!["DEF"]);
}

#[test]
fn test_hs256_rfc7515_vector() {
    // RFC 7515 appendix A.1.
    let key = JwkBuilder::new_symmetric_key(
        &b64_decode(
            "AyM1SysPpbyDfgZld3umj1qzKObwVMkoqQ-EstJQLr_T-1qS0gZH75aKtMN3Yj0iPS4hcgUuTwjAzZr1Z9CAow",
            "test",
        )
        .unwrap(),
    )
    .build();
    let signing_input = concat!(
        "eyJ0eXAiOiJKV1QiLA0KICJhbGciOiJIUzI1NiJ9",
        ".",
        "eyJpc3MiOiJqb2UiLA0KICJleHAiOjEzMDA4MTkzODAsDQogImh0dHA6Ly9leGFt",
        "cGxlLmNvbS9pc19yb290Ijp0cnVlfQ"
    );

    let signature = Hs256.sign(&key, signing_input.as_bytes()).unwrap();
    assert_eq!(
        crate::util::b64_encode(&signature),
        "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"
    );
    assert!(Hs256
        .verify(&key, signing_input.as_bytes(), &signature)
        .unwrap());
    assert!(!Hs256
        .verify(&key, b"something else", &signature)
        .unwrap());
}

#[test]
fn test_hmac_key_requirements() {
    let short = JwkBuilder::generate_symmetric_key(16).build();
    expect_err(Hs256.sign(&short, b"data"), "too short");

    let wrong_type = JwkBuilder::new_none_key().build();
    expect_err(Hs256.sign(&wrong_type, b"data"), "expected a key of type");

    let key = JwkBuilder::generate_symmetric_key(64).build();
    let sig = Hs512.sign(&key, b"data").unwrap();
    assert!(Hs512.verify(&key, b"data", &sig).unwrap());
    assert!(!Hs512.verify(&key, b"data", &sig[..sig.len() - 1]).unwrap());
}

#[test]
fn test_none_algorithm() {
    let key = JwkBuilder::new_none_key().build();
    let sig = NoneAlgorithm.sign(&key, b"payload").unwrap();
    assert!(sig.is_empty());
    assert!(NoneAlgorithm.verify(&key, b"payload", &sig).unwrap());
    assert!(!NoneAlgorithm.verify(&key, b"payload", b"junk").unwrap());

    let real_key = JwkBuilder::generate_symmetric_key(32).build();
    expect_err(
        NoneAlgorithm.sign(&real_key, b"payload"),
        "expected a key of type",
    );
}

#[test]
fn test_ed25519_round_trip() {
    let key = JwkBuilder::generate_okp_key("Ed25519").unwrap().build();
    let sig = Ed25519.sign(&key, b"message").unwrap();
    assert_eq!(sig.len(), 64);
    assert!(Ed25519.verify(&key, b"message", &sig).unwrap());
    assert!(!Ed25519.verify(&key, b"other message", &sig).unwrap());
    assert!(!Ed25519.verify(&key, b"message", &sig[..60]).unwrap());

    let x25519 = JwkBuilder::generate_okp_key("X25519").unwrap().build();
    expect_err(Ed25519.sign(&x25519, b"message"), "Ed25519");
}

#[test]
fn test_es256_round_trip() {
    let key = JwkBuilder::generate_ec_key("P-256").unwrap().build();
    let sig = Es256.sign(&key, b"message").unwrap();
    assert_eq!(sig.len(), 64);
    assert!(Es256.verify(&key, b"message", &sig).unwrap());
    assert!(!Es256.verify(&key, b"other message", &sig).unwrap());

    let other = JwkBuilder::generate_ec_key("P-256").unwrap().build();
    assert!(!Es256.verify(&other, b"message", &sig).unwrap());
}

#[test]
fn test_dir_uses_key_as_cek() {
    let key = JwkBuilder::generate_symmetric_key(16).build();
    let mut header = Header::default();
    let cek = Dir.derive_cek(&key, &A128Gcm, &mut header).unwrap();
    assert_eq!(cek, key.bytes_param("k").unwrap());

    let unwrapped = Dir.unwrap_cek(&key, b"", &A128Gcm, &header.to_map()).unwrap();
    assert_eq!(unwrapped, cek);

    expect_err(
        Dir.unwrap_cek(&key, b"bogus", &A128Gcm, &header.to_map()),
        "no encrypted key",
    );
    // A 16-byte key cannot serve a 32-byte CEK.
    expect_err(
        Dir.derive_cek(&key, &A128CbcHs256, &mut header),
        "wrong key size",
    );
}

#[test]
fn test_a128kw_rfc3394_vector() {
    // RFC 3394 section 4.1.
    let kek = JwkBuilder::new_symmetric_key(
        &hex::decode("000102030405060708090a0b0c0d0e0f").unwrap(),
    )
    .build();
    let cek = hex::decode("00112233445566778899aabbccddeeff").unwrap();

    let mut header = Header::default();
    let wrapped = A128Kw.wrap_cek(&kek, &cek, &mut header).unwrap();
    assert_eq!(
        hex::encode(&wrapped),
        "1fa68b0a8112b447aef34bd8fb5a7b829d3e862371d2cfe5"
    );

    let unwrapped = A128Kw
        .unwrap_cek(&kek, &wrapped, &A128Gcm, &header.to_map())
        .unwrap();
    assert_eq!(unwrapped, cek);

    let mut tampered = wrapped;
    tampered[0] ^= 0x01;
    expect_err(
        A128Kw.unwrap_cek(&kek, &tampered, &A128Gcm, &header.to_map()),
        "unwrap failed",
    );
}

#[test]
fn test_aes_kw_key_size() {
    let kek = JwkBuilder::generate_symmetric_key(16).build();
    expect_err(
        A256Kw.wrap_cek(&kek, &[0u8; 32], &mut Header::default()),
        "wrong key size",
    );
}

#[test]
fn test_concat_kdf_rfc7518_vector() {
    // RFC 7518 appendix C.
    let z = [
        158, 86, 217, 29, 129, 113, 53, 211, 114, 131, 66, 131, 191, 132, 38, 156, 251, 49, 110,
        163, 218, 128, 106, 72, 246, 218, 167, 121, 140, 254, 144, 196,
    ];
    let derived = keymgmt::concat_kdf(&z, "A128GCM", b"Alice", b"Bob", 16);
    assert_eq!(crate::util::b64_encode(&derived), "VqqN6vgjbSBcIijNcacQGg");
}

#[test]
fn test_ecdh_es_agreement_round_trip() {
    let key = JwkBuilder::generate_okp_key("X25519").unwrap().build();

    let mut header = Header::default();
    header
        .set_parameter("apu", serde_json::json!("QWxpY2U"))
        .unwrap();
    let cek = EcdhEs.derive_cek(&key, &A256Gcm, &mut header).unwrap();
    assert_eq!(cek.len(), 32);
    assert!(header.rest.contains_key("epk"));

    let unwrapped = EcdhEs
        .unwrap_cek(&key, b"", &A256Gcm, &header.to_map())
        .unwrap();
    assert_eq!(unwrapped, cek);

    // Missing epk makes the agreement impossible.
    expect_err(
        EcdhEs.unwrap_cek(&key, b"", &A256Gcm, &Map::new()),
        "epk",
    );
    expect_err(
        EcdhEs.unwrap_cek(&key, b"bogus", &A256Gcm, &header.to_map()),
        "no encrypted key",
    );
}

#[test]
fn test_cbc_hmac_round_trip_and_tamper() {
    for enc in [
        &A128CbcHs256 as &dyn ContentEncryptionAlgorithm,
        &A256CbcHs512,
    ] {
        let cek = crate::util::random_bytes(enc.cek_size());
        let iv = crate::util::random_bytes(enc.iv_size());
        let (ciphertext, tag) = enc.encrypt(&cek, &iv, b"aad", b"hello world").unwrap();

        let plaintext = enc.decrypt(&cek, &iv, b"aad", &ciphertext, &tag).unwrap();
        assert_eq!(plaintext, b"hello world");

        expect_err(
            enc.decrypt(&cek, &iv, b"other aad", &ciphertext, &tag),
            "DecryptionFailed",
        );
        let mut bad = ciphertext.clone();
        bad[0] ^= 0x01;
        expect_err(enc.decrypt(&cek, &iv, b"aad", &bad, &tag), "DecryptionFailed");
        expect_err(
            enc.decrypt(&cek[1..], &iv, b"aad", &ciphertext, &tag),
            "wrong CEK size",
        );
    }
}

#[test]
fn test_gcm_round_trip_and_tamper() {
    for enc in [&A128Gcm as &dyn ContentEncryptionAlgorithm, &A256Gcm] {
        let cek = crate::util::random_bytes(enc.cek_size());
        let iv = crate::util::random_bytes(enc.iv_size());
        let (ciphertext, tag) = enc.encrypt(&cek, &iv, b"aad", b"hello world").unwrap();
        assert_eq!(tag.len(), 16);

        let plaintext = enc.decrypt(&cek, &iv, b"aad", &ciphertext, &tag).unwrap();
        assert_eq!(plaintext, b"hello world");

        let mut bad = tag.clone();
        bad[0] ^= 0x01;
        expect_err(
            enc.decrypt(&cek, &iv, b"aad", &ciphertext, &bad),
            "DecryptionFailed",
        );
    }
}

#[test]
fn test_deflate_round_trip() {
    let data = b"to be compressed, to be compressed, to be compressed".repeat(10);
    let compressed = Deflate.compress(&data).unwrap();
    assert!(compressed.len() < data.len());
    assert_eq!(Deflate.decompress(&compressed).unwrap(), data);

    expect_err(Deflate.decompress(&[0xff; 4]), "CompressionFailed");
}
