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

//! Built-in signature algorithms (RFC 7518 section 3).

use super::{Algorithm, SignatureAlgorithm};
use crate::{Jwk, JoseError, Result};
use ed25519_dalek::Verifier as _;
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::{Signer as _, Verifier as _};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

/// The `none` algorithm: an empty signature over the usual signing input,
/// used for unsecured JWS. Only usable with a `kty: none` key, so that a
/// real key can never silently produce an unsecured object.
pub struct NoneAlgorithm;

impl Algorithm for NoneAlgorithm {
    fn name(&self) -> &str {
        "none"
    }
}

impl SignatureAlgorithm for NoneAlgorithm {
    fn sign(&self, key: &Jwk, _data: &[u8]) -> Result<Vec<u8>> {
        if key.kty() != "none" {
            return Err(JoseError::InvalidKey("expected a key of type \"none\""));
        }
        Ok(Vec::new())
    }

    fn verify(&self, key: &Jwk, _data: &[u8], signature: &[u8]) -> Result<bool> {
        if key.kty() != "none" {
            return Err(JoseError::InvalidKey("expected a key of type \"none\""));
        }
        Ok(signature.is_empty())
    }
}

/// Decode the `k` parameter of an `oct` key, enforcing the minimum size the
/// algorithm requires.
fn symmetric_key(key: &Jwk, min_len: usize) -> Result<Vec<u8>> {
    if key.kty() != "oct" {
        return Err(JoseError::InvalidKey("expected a key of type \"oct\""));
    }
    let k = key.bytes_param("k")?;
    if k.len() < min_len {
        return Err(JoseError::InvalidKey("key material is too short"));
    }
    Ok(k)
}

macro_rules! hmac_signature {
    ($(#[$attr:meta])* $alg:ident, $name:literal, $digest:ty, $min_len:expr) => {
        $(#[$attr])*
        pub struct $alg;

        impl Algorithm for $alg {
            fn name(&self) -> &str {
                $name
            }
        }

        impl SignatureAlgorithm for $alg {
            fn sign(&self, key: &Jwk, data: &[u8]) -> Result<Vec<u8>> {
                let k = symmetric_key(key, $min_len)?;
                let mut mac = Hmac::<$digest>::new_from_slice(&k)
                    .map_err(|_| JoseError::InvalidKey("invalid HMAC key"))?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }

            fn verify(&self, key: &Jwk, data: &[u8], signature: &[u8]) -> Result<bool> {
                let expected = self.sign(key, data)?;
                Ok(expected.as_slice().ct_eq(signature).into())
            }
        }
    };
}

hmac_signature! {
    /// HMAC using SHA-256 (`HS256`).
    Hs256, "HS256", Sha256, 32
}
hmac_signature! {
    /// HMAC using SHA-384 (`HS384`).
    Hs384, "HS384", Sha384, 48
}
hmac_signature! {
    /// HMAC using SHA-512 (`HS512`).
    Hs512, "HS512", Sha512, 64
}

/// EdDSA over the Ed25519 curve (`EdDSA`).
pub struct Ed25519;

impl Ed25519 {
    fn check_key(key: &Jwk) -> Result<()> {
        if key.kty() != "OKP" {
            return Err(JoseError::InvalidKey("expected a key of type \"OKP\""));
        }
        match key.get("crv")?.as_str() {
            Some("Ed25519") => Ok(()),
            _ => Err(JoseError::InvalidKey("expected an Ed25519 key")),
        }
    }
}

impl Algorithm for Ed25519 {
    fn name(&self) -> &str {
        "EdDSA"
    }
}

impl SignatureAlgorithm for Ed25519 {
    fn sign(&self, key: &Jwk, data: &[u8]) -> Result<Vec<u8>> {
        Self::check_key(key)?;
        let d: [u8; 32] = key
            .bytes_param("d")?
            .try_into()
            .map_err(|_| JoseError::InvalidKey("invalid Ed25519 secret key size"))?;
        let secret = ed25519_dalek::SigningKey::from_bytes(&d);
        Ok(ed25519_dalek::Signer::sign(&secret, data).to_bytes().to_vec())
    }

    fn verify(&self, key: &Jwk, data: &[u8], signature: &[u8]) -> Result<bool> {
        Self::check_key(key)?;
        let x: [u8; 32] = key
            .bytes_param("x")?
            .try_into()
            .map_err(|_| JoseError::InvalidKey("invalid Ed25519 public key size"))?;
        let public = ed25519_dalek::VerifyingKey::from_bytes(&x)
            .map_err(|_| JoseError::InvalidKey("invalid Ed25519 public key"))?;
        let signature = match ed25519_dalek::Signature::from_slice(signature) {
            Ok(s) => s,
            Err(_) => return Ok(false),
        };
        Ok(public.verify(data, &signature).is_ok())
    }
}

/// ECDSA using P-256 and SHA-256 (`ES256`), with the fixed 64-byte `r || s`
/// signature form mandated by RFC 7518.
pub struct Es256;

impl Es256 {
    fn check_key(key: &Jwk) -> Result<()> {
        if key.kty() != "EC" {
            return Err(JoseError::InvalidKey("expected a key of type \"EC\""));
        }
        match key.get("crv")?.as_str() {
            Some("P-256") => Ok(()),
            _ => Err(JoseError::InvalidKey("expected a P-256 key")),
        }
    }
}

impl Algorithm for Es256 {
    fn name(&self) -> &str {
        "ES256"
    }
}

impl SignatureAlgorithm for Es256 {
    fn sign(&self, key: &Jwk, data: &[u8]) -> Result<Vec<u8>> {
        Self::check_key(key)?;
        let d = key.bytes_param("d")?;
        let secret = p256::ecdsa::SigningKey::from_slice(&d)
            .map_err(|_| JoseError::InvalidKey("invalid P-256 secret key"))?;
        let signature: p256::ecdsa::Signature = secret.sign(data);
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(&self, key: &Jwk, data: &[u8], signature: &[u8]) -> Result<bool> {
        Self::check_key(key)?;
        let x = key.bytes_param("x")?;
        let y = key.bytes_param("y")?;
        // SEC1 uncompressed point.
        let mut sec1 = Vec::with_capacity(1 + x.len() + y.len());
        sec1.push(0x04);
        sec1.extend_from_slice(&x);
        sec1.extend_from_slice(&y);
        let public = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
            .map_err(|_| JoseError::InvalidKey("invalid P-256 public key"))?;
        let signature = match p256::ecdsa::Signature::from_slice(signature) {
            Ok(s) => s,
            Err(_) => return Ok(false),
        };
        Ok(public.verify(data, &signature).is_ok())
    }
}
