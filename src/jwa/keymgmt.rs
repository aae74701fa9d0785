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

//! Built-in key management algorithms (RFC 7518 section 4).

use super::{Algorithm, ContentEncryptionAlgorithm, KeyManagementAlgorithm, KeyManagementMode};
use crate::{
    util::{b64_decode, b64_encode, ValueTryAs},
    Header, Jwk, JoseError, Result,
};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

/// Decode the `k` parameter of an `oct` key, enforcing the exact size the
/// algorithm requires.
fn symmetric_key(key: &Jwk, len: usize) -> Result<Vec<u8>> {
    if key.kty() != "oct" {
        return Err(JoseError::InvalidKey("expected a key of type \"oct\""));
    }
    let k = key.bytes_param("k")?;
    if k.len() != len {
        return Err(JoseError::InvalidKey("wrong key size for algorithm"));
    }
    Ok(k)
}

/// Direct use of a shared symmetric key as the CEK (`dir`).
pub struct Dir;

impl Algorithm for Dir {
    fn name(&self) -> &str {
        "dir"
    }
}

impl KeyManagementAlgorithm for Dir {
    fn mode(&self) -> KeyManagementMode {
        KeyManagementMode::Direct
    }

    fn derive_cek(
        &self,
        key: &Jwk,
        enc: &dyn ContentEncryptionAlgorithm,
        _header: &mut Header,
    ) -> Result<Vec<u8>> {
        symmetric_key(key, enc.cek_size())
    }

    fn unwrap_cek(
        &self,
        key: &Jwk,
        encrypted_key: &[u8],
        enc: &dyn ContentEncryptionAlgorithm,
        _header: &Map<String, Value>,
    ) -> Result<Vec<u8>> {
        if !encrypted_key.is_empty() {
            return Err(JoseError::CryptoFailure(
                "direct encryption carries no encrypted key",
            ));
        }
        symmetric_key(key, enc.cek_size())
    }
}

macro_rules! aes_key_wrap {
    ($(#[$attr:meta])* $alg:ident, $name:literal, $kek:ty, $key_len:expr) => {
        $(#[$attr])*
        pub struct $alg;

        impl Algorithm for $alg {
            fn name(&self) -> &str {
                $name
            }
        }

        impl $alg {
            fn kek(key: &Jwk) -> Result<$kek> {
                let k: [u8; $key_len] = symmetric_key(key, $key_len)?
                    .try_into()
                    .map_err(|_| JoseError::InvalidKey("wrong key size for algorithm"))?;
                Ok(<$kek>::from(k))
            }
        }

        impl KeyManagementAlgorithm for $alg {
            fn mode(&self) -> KeyManagementMode {
                KeyManagementMode::Wrap
            }

            fn wrap_cek(&self, key: &Jwk, cek: &[u8], _header: &mut Header) -> Result<Vec<u8>> {
                Self::kek(key)?
                    .wrap_vec(cek)
                    .map_err(|_| JoseError::CryptoFailure("AES key wrap failed"))
            }

            fn unwrap_cek(
                &self,
                key: &Jwk,
                encrypted_key: &[u8],
                _enc: &dyn ContentEncryptionAlgorithm,
                _header: &Map<String, Value>,
            ) -> Result<Vec<u8>> {
                Self::kek(key)?
                    .unwrap_vec(encrypted_key)
                    .map_err(|_| JoseError::CryptoFailure("AES key unwrap failed"))
            }
        }
    };
}

aes_key_wrap! {
    /// AES-128 key wrap (`A128KW`).
    A128Kw, "A128KW", aes_kw::KekAes128, 16
}
aes_key_wrap! {
    /// AES-192 key wrap (`A192KW`).
    A192Kw, "A192KW", aes_kw::KekAes192, 24
}
aes_key_wrap! {
    /// AES-256 key wrap (`A256KW`).
    A256Kw, "A256KW", aes_kw::KekAes256, 32
}

/// The Concat KDF (NIST SP 800-56A section 5.8.1) with SHA-256, as profiled
/// for direct key agreement: AlgorithmID is the content encryption algorithm
/// name, and SuppPubInfo is the derived key size in bits.
pub(super) fn concat_kdf(
    z: &[u8],
    enc_name: &str,
    apu: &[u8],
    apv: &[u8],
    key_len: usize,
) -> Vec<u8> {
    let mut other_info = Vec::new();
    for field in [enc_name.as_bytes(), apu, apv] {
        other_info.extend_from_slice(&(field.len() as u32).to_be_bytes());
        other_info.extend_from_slice(field);
    }
    other_info.extend_from_slice(&((key_len * 8) as u32).to_be_bytes());

    let mut derived = Vec::with_capacity(key_len);
    let mut counter: u32 = 1;
    while derived.len() < key_len {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_be_bytes());
        hasher.update(z);
        hasher.update(&other_info);
        derived.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    derived.truncate(key_len);
    derived
}

/// Decode an `apu`/`apv` agreement parameter from a merged header map.
fn agreement_info(header: &Map<String, Value>, name: &str) -> Result<Vec<u8>> {
    match header.get(name) {
        Some(value) => value.try_as_b64_bytes(&format!("header parameter \"{name}\"")),
        None => Ok(Vec::new()),
    }
}

/// ECDH-ES direct key agreement over X25519 (`ECDH-ES`).
///
/// The producing side generates an ephemeral key pair, publishes the public
/// half as the `epk` header parameter, and both sides run the shared secret
/// through the Concat KDF to obtain the CEK.
pub struct EcdhEs;

impl EcdhEs {
    fn check_key(key: &Jwk) -> Result<()> {
        if key.kty() != "OKP" {
            return Err(JoseError::InvalidKey("expected a key of type \"OKP\""));
        }
        match key.get("crv")?.as_str() {
            Some("X25519") => Ok(()),
            _ => Err(JoseError::InvalidKey("expected an X25519 key")),
        }
    }

    fn key_32(bytes: Vec<u8>) -> Result<[u8; 32]> {
        bytes
            .try_into()
            .map_err(|_| JoseError::InvalidKey("invalid X25519 key size"))
    }
}

impl Algorithm for EcdhEs {
    fn name(&self) -> &str {
        "ECDH-ES"
    }
}

impl KeyManagementAlgorithm for EcdhEs {
    fn mode(&self) -> KeyManagementMode {
        KeyManagementMode::Agreement
    }

    fn derive_cek(
        &self,
        key: &Jwk,
        enc: &dyn ContentEncryptionAlgorithm,
        header: &mut Header,
    ) -> Result<Vec<u8>> {
        Self::check_key(key)?;
        let public = x25519_dalek::PublicKey::from(Self::key_32(key.bytes_param("x")?)?);

        let ephemeral = x25519_dalek::EphemeralSecret::random_from_rng(rand::rngs::OsRng);
        let epk_x = x25519_dalek::PublicKey::from(&ephemeral);
        header.set_parameter(
            "epk",
            json!({
                "kty": "OKP",
                "crv": "X25519",
                "x": b64_encode(epk_x.as_bytes()),
            }),
        )?;

        let apu = agreement_info(&header.rest, "apu")?;
        let apv = agreement_info(&header.rest, "apv")?;

        let z = ephemeral.diffie_hellman(&public);
        Ok(concat_kdf(
            z.as_bytes(),
            enc.name(),
            &apu,
            &apv,
            enc.cek_size(),
        ))
    }

    fn unwrap_cek(
        &self,
        key: &Jwk,
        encrypted_key: &[u8],
        enc: &dyn ContentEncryptionAlgorithm,
        header: &Map<String, Value>,
    ) -> Result<Vec<u8>> {
        Self::check_key(key)?;
        if !encrypted_key.is_empty() {
            return Err(JoseError::CryptoFailure(
                "direct key agreement carries no encrypted key",
            ));
        }
        let secret =
            x25519_dalek::StaticSecret::from(Self::key_32(key.bytes_param("d")?)?);

        let epk = header
            .get("epk")
            .ok_or(JoseError::MissingHeaderParameter("epk"))?
            .try_as_object("header parameter \"epk\"")?;
        match epk.get("crv").and_then(Value::as_str) {
            Some("X25519") => {}
            _ => return Err(JoseError::InvalidKey("expected an X25519 ephemeral key")),
        }
        let epk_x = epk
            .get("x")
            .ok_or(JoseError::MissingHeaderParameter("epk"))?
            .try_as_str("header parameter \"epk\"")?;
        let public =
            x25519_dalek::PublicKey::from(Self::key_32(b64_decode(epk_x, "header parameter \"epk\"")?)?);

        let apu = agreement_info(header, "apu")?;
        let apv = agreement_info(header, "apv")?;

        let z = secret.diffie_hellman(&public);
        Ok(concat_kdf(
            z.as_bytes(),
            enc.name(),
            &apu,
            &apv,
            enc.cek_size(),
        ))
    }
}
