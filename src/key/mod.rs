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

//! JWK and JWKSet functionality (RFC 7517).

use crate::{
    common::AsJsonValue,
    util::{b64_decode, b64_encode, random_bytes, ValueTryAs},
    JoseError, Result,
};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde_json::{Map, Value};

#[cfg(test)]
mod tests;

const KTY: &str = "kty";
const USE: &str = "use";
const KEY_OPS: &str = "key_ops";
const ALG: &str = "alg";
const KID: &str = "kid";

/// Curves accepted by the OKP key factory.
pub const OKP_CURVES: &[&str] = &["Ed25519", "X25519"];

/// Curves accepted by the EC key factory.
pub const EC_CURVES: &[&str] = &["P-256"];

/// The purpose a key is selected for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyUse {
    /// Signing and verification (`sig`).
    Signature,
    /// Encryption and decryption (`enc`).
    Encryption,
}

impl KeyUse {
    /// The wire value of the `use` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyUse::Signature => "sig",
            KeyUse::Encryption => "enc",
        }
    }
}

/// Map a `key_ops` value onto the `use` it implies.
fn key_op_use(op: &str) -> Result<KeyUse> {
    match op {
        "sign" | "verify" => Ok(KeyUse::Signature),
        "encrypt" | "decrypt" | "wrapKey" | "unwrapKey" => Ok(KeyUse::Encryption),
        op => Err(JoseError::UnsupportedKeyOperation(op.to_owned())),
    }
}

/// Structure representing a cryptographic key (RFC 7517 section 4): an
/// immutable parameter mapping with a mandatory `kty`.
///
/// Values are opaque to the key model; type-specific validity (presence of
/// EC coordinates, key sizes and so on) is checked by the algorithm
/// consuming the key.
#[derive(Clone, Debug, PartialEq)]
pub struct Jwk {
    params: Map<String, Value>,
}

impl Jwk {
    /// Construct a key from a parameter mapping. `kty` must be present and
    /// be a string.
    pub fn from_params(params: Map<String, Value>) -> Result<Self> {
        match params.get(KTY) {
            Some(Value::String(_)) => Ok(Jwk { params }),
            Some(_) => Err(JoseError::Parse {
                segment: "key parameter \"kty\"".to_owned(),
                reason: "expected string",
            }),
            None => Err(JoseError::KeyNotFound(KTY.to_owned())),
        }
    }

    /// The key type.
    pub fn kty(&self) -> &str {
        // Invariant: `kty` is checked at construction.
        self.params[KTY].as_str().unwrap_or_default()
    }

    /// Get the parameter `name`, failing if it is absent.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.params
            .get(name)
            .ok_or_else(|| JoseError::KeyNotFound(name.to_owned()))
    }

    /// Indicate whether the parameter `name` is present. Never fails.
    pub fn has(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// The `use` parameter, if present and a string.
    pub fn use_str(&self) -> Option<&str> {
        self.params.get(USE).and_then(Value::as_str)
    }

    /// The `alg` parameter, if present and a string.
    pub fn alg(&self) -> Option<&str> {
        self.params.get(ALG).and_then(Value::as_str)
    }

    /// The `kid` parameter, if present and a string.
    pub fn kid(&self) -> Option<&str> {
        self.params.get(KID).and_then(Value::as_str)
    }

    /// Produce a new key with one parameter added or replaced. `kty` is
    /// immutable after construction.
    pub fn with_parameter(self, name: impl Into<String>, value: Value) -> Result<Self> {
        let name = name.into();
        if name == KTY {
            return Err(JoseError::InvalidKey("the key type cannot be changed"));
        }
        let mut params = self.params;
        params.insert(name, value);
        Ok(Jwk { params })
    }

    /// Decode a base64url-encoded byte parameter, such as `k`, `x` or `d`.
    pub fn bytes_param(&self, name: &str) -> Result<Vec<u8>> {
        let value = self.get(name)?;
        let text = value
            .as_str()
            .ok_or(JoseError::InvalidKey("expected base64url string parameter"))?;
        b64_decode(text, "key parameter")
    }
}

impl AsJsonValue for Jwk {
    fn from_json_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(m) => Jwk::from_params(m),
            _ => Err(JoseError::Parse {
                segment: "JWK".to_owned(),
                reason: "expected object",
            }),
        }
    }

    fn to_json_value(self) -> Result<Value> {
        Ok(Value::Object(self.params))
    }
}

impl crate::JsonSerializable for Jwk {}

json_serialize!(Jwk);

/// An ordered collection of [`Jwk`] objects. Uniqueness is not required;
/// iteration order equals insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JwkSet {
    keys: Vec<Jwk>,
}

impl JwkSet {
    /// Construct a set from keys in order.
    pub fn new(keys: Vec<Jwk>) -> Self {
        JwkSet { keys }
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Indicate whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Get the key at `index`, failing if it is out of range.
    pub fn key(&self, index: usize) -> Result<&Jwk> {
        self.keys.get(index).ok_or(JoseError::IndexOutOfRange(index))
    }

    /// Iterate over the keys in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Jwk> {
        self.keys.iter()
    }

    /// Produce a new set with `key` appended.
    #[must_use]
    pub fn add_key(self, key: Jwk) -> Self {
        let mut keys = self.keys;
        keys.push(key);
        JwkSet { keys }
    }

    /// Produce a new set with the key at `index` removed.
    pub fn remove_key(self, index: usize) -> Result<Self> {
        if index >= self.keys.len() {
            return Err(JoseError::IndexOutOfRange(index));
        }
        let mut keys = self.keys;
        keys.remove(index);
        Ok(JwkSet { keys })
    }

    /// Select the most trustworthy key usable for `usage`.
    ///
    /// Keys are filtered on usage (from `use`, or inferred from `key_ops`),
    /// on `alg` when `algorithm` is requested, and on exact-match
    /// `restrictions` pairs. Surviving keys score +1 for a present matching
    /// usage and +1 for a present matching `alg`; keys without those
    /// parameters still pass with score 0. The highest score wins, ties
    /// broken by first occurrence.
    ///
    /// A `key_ops` value with no defined usage mapping is a usage error.
    pub fn select_key(
        &self,
        usage: KeyUse,
        algorithm: Option<&str>,
        restrictions: &[(&str, Value)],
    ) -> Result<Option<&Jwk>> {
        let mut best: Option<(u32, &Jwk)> = None;
        for key in &self.keys {
            let mut score = 0;

            if let Some(u) = key.use_str() {
                if u != usage.as_str() {
                    continue;
                }
                score += 1;
            } else if let Some(ops) = key.params.get(KEY_OPS) {
                let ops = ops.try_as_array("key parameter \"key_ops\"")?;
                let mut matched = false;
                for op in ops {
                    let op = op.try_as_str("key parameter \"key_ops\"")?;
                    if key_op_use(op)? == usage {
                        matched = true;
                    }
                }
                if !matched {
                    continue;
                }
                score += 1;
            }

            if let Some(algorithm) = algorithm {
                match key.alg() {
                    Some(a) if a == algorithm => score += 1,
                    Some(_) => continue,
                    None => {}
                }
            }

            if !restrictions
                .iter()
                .all(|(name, value)| key.params.get(*name) == Some(value))
            {
                continue;
            }

            match best {
                Some((s, _)) if s >= score => {}
                _ => best = Some((score, key)),
            }
        }
        Ok(best.map(|(_, key)| key))
    }
}

impl AsJsonValue for JwkSet {
    fn from_json_value(value: Value) -> Result<Self> {
        let map = value.try_as_object("JWKSet")?;
        let keys = map
            .get("keys")
            .ok_or(JoseError::Parse {
                segment: "JWKSet".to_owned(),
                reason: "missing \"keys\" member",
            })?
            .try_as_array("JWKSet \"keys\"")?;
        Ok(JwkSet {
            keys: keys
                .iter()
                .map(|k| Jwk::from_json_value(k.clone()))
                .collect::<Result<_>>()?,
        })
    }

    fn to_json_value(self) -> Result<Value> {
        let keys = self
            .keys
            .into_iter()
            .map(Jwk::to_json_value)
            .collect::<Result<_>>()?;
        let mut map = Map::new();
        map.insert("keys".to_owned(), Value::Array(keys));
        Ok(Value::Object(map))
    }
}

impl crate::JsonSerializable for JwkSet {}

json_serialize!(JwkSet);

/// Builder for [`Jwk`] objects. Constructors create the type-specific
/// parameters; generated key material is sized by the external primitive.
#[derive(Debug)]
pub struct JwkBuilder(Jwk);

impl JwkBuilder {
    fn with_params(params: Map<String, Value>) -> Self {
        JwkBuilder(Jwk { params })
    }

    fn param_map(kty: &str, rest: &[(&str, String)]) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert(KTY.to_owned(), Value::String(kty.to_owned()));
        for (name, value) in rest {
            params.insert((*name).to_owned(), Value::String(value.clone()));
        }
        params
    }

    /// Constructor for a symmetric (`oct`) key specified by `k`.
    pub fn new_symmetric_key(k: &[u8]) -> Self {
        Self::with_params(Self::param_map("oct", &[("k", b64_encode(k))]))
    }

    /// Constructor for a fresh random symmetric (`oct`) key of `len` bytes.
    pub fn generate_symmetric_key(len: usize) -> Self {
        Self::new_symmetric_key(&random_bytes(len))
    }

    /// Constructor for the `none` key used with unsecured objects.
    pub fn new_none_key() -> Self {
        Self::with_params(Self::param_map("none", &[]))
    }

    /// Constructor for a fresh octet key pair on `curve`, failing if the
    /// curve is outside [`OKP_CURVES`].
    pub fn generate_okp_key(curve: &str) -> Result<Self> {
        let (x, d) = match curve {
            "Ed25519" => {
                let secret = ed25519_dalek::SigningKey::generate(&mut OsRng);
                (
                    secret.verifying_key().to_bytes().to_vec(),
                    secret.to_bytes().to_vec(),
                )
            }
            "X25519" => {
                let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
                (
                    x25519_dalek::PublicKey::from(&secret).to_bytes().to_vec(),
                    secret.to_bytes().to_vec(),
                )
            }
            curve => return Err(JoseError::UnsupportedCurve(curve.to_owned())),
        };
        Ok(Self::with_params(Self::param_map(
            "OKP",
            &[
                ("crv", curve.to_owned()),
                ("x", b64_encode(x)),
                ("d", b64_encode(d)),
            ],
        )))
    }

    /// Constructor for a fresh elliptic curve key on `curve`, failing if the
    /// curve is outside [`EC_CURVES`].
    pub fn generate_ec_key(curve: &str) -> Result<Self> {
        if curve != "P-256" {
            return Err(JoseError::UnsupportedCurve(curve.to_owned()));
        }
        let secret = p256::ecdsa::SigningKey::random(&mut OsRng);
        let point = secret.verifying_key().to_encoded_point(false);
        let x = point
            .x()
            .ok_or(JoseError::CryptoFailure("EC public point has no coordinates"))?;
        let y = point
            .y()
            .ok_or(JoseError::CryptoFailure("EC public point has no coordinates"))?;
        Ok(Self::with_params(Self::param_map(
            "EC",
            &[
                ("crv", curve.to_owned()),
                ("x", b64_encode(x)),
                ("y", b64_encode(y)),
                ("d", b64_encode(secret.to_bytes())),
            ],
        )))
    }

    /// Set the key identifier.
    #[must_use]
    pub fn key_id(mut self, kid: impl Into<String>) -> Self {
        self.0.params.insert(KID.to_owned(), Value::String(kid.into()));
        self
    }

    /// Set the bound algorithm.
    #[must_use]
    pub fn algorithm(mut self, alg: impl Into<String>) -> Self {
        self.0.params.insert(ALG.to_owned(), Value::String(alg.into()));
        self
    }

    /// Set the key use.
    #[must_use]
    pub fn key_use(mut self, key_use: KeyUse) -> Self {
        self.0
            .params
            .insert(USE.to_owned(), Value::String(key_use.as_str().to_owned()));
        self
    }

    /// Add a key operation.
    #[must_use]
    pub fn add_key_op(mut self, op: impl Into<String>) -> Self {
        match self.0.params.get_mut(KEY_OPS) {
            Some(Value::Array(ops)) => ops.push(Value::String(op.into())),
            _ => {
                self.0.params.insert(
                    KEY_OPS.to_owned(),
                    Value::Array(vec![Value::String(op.into())]),
                );
            }
        }
        self
    }

    /// Set a parameter value.
    ///
    /// # Panics
    ///
    /// This function will panic if used to set `kty`.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        if name == KTY {
            panic!("param() method used to set kty"); // safe: invalid input
        }
        self.0.params.insert(name, value);
        self
    }

    /// Build the [`Jwk`] instance.
    pub fn build(self) -> Jwk {
        self.0
    }
}
