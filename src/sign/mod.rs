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

//! JWS functionality (RFC 7515): building, verifying and (de)serializing
//! signed objects.

use crate::{
    jwa::{AlgorithmManager, SignatureAlgorithm},
    util::{b64_decode, b64_encode, ValueTryAs},
    AsJsonValue, Header, Jwk, JwkSet, JoseError, ProtectedHeader, Result,
};
use serde_json::{Map, Value};


/// One signature over a [`Jws`] payload: the headers it was produced under
/// and the raw signature bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Signature {
    /// Integrity-protected headers, bound into the signing input.
    pub protected: ProtectedHeader,
    /// Headers carried alongside but not signed.
    pub unprotected: Header,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

/// A signed object: a payload and one or more signatures over it
/// (RFC 7515 section 7.2).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Jws {
    /// The raw payload bytes.
    pub payload: Vec<u8>,
    /// Signatures over the payload, in the order they were added.
    pub signatures: Vec<Signature>,
}

/// The byte sequence a JWS signature is computed over:
/// `BASE64URL(protected) "." BASE64URL(payload)`.
fn signing_input(protected: &ProtectedHeader, payload: &[u8]) -> Result<Vec<u8>> {
    Ok(format!("{}.{}", protected.encoded()?, b64_encode(payload)).into_bytes())
}

impl Jws {
    /// Get the signature entry at `index`.
    pub fn signature(&self, index: usize) -> Result<&Signature> {
        self.signatures
            .get(index)
            .ok_or(JoseError::SignatureNotFound(index))
    }

    /// Interpret the payload as a JSON claims object.
    pub fn claims(&self) -> Result<Map<String, Value>> {
        let value: Value =
            serde_json::from_slice(&self.payload).map_err(|_| JoseError::Parse {
                segment: "payload".to_owned(),
                reason: "invalid JSON",
            })?;
        Ok(value.try_as_object("payload")?.clone())
    }

    /// Render in compact serialization. Only objects with exactly one
    /// signature and no unprotected headers have a compact form.
    pub fn to_compact(&self) -> Result<String> {
        if self.signatures.len() != 1 {
            return Err(JoseError::UnsupportedSerialization {
                form: "compact",
                entry: "signature",
                count: self.signatures.len(),
            });
        }
        let signature = &self.signatures[0];
        if !signature.unprotected.is_empty() {
            return Err(JoseError::UnprotectedHeaderNotAllowed("compact"));
        }
        Ok(format!(
            "{}.{}.{}",
            signature.protected.encoded()?,
            b64_encode(&self.payload),
            b64_encode(&signature.signature)
        ))
    }

    /// Parse the compact serialization.
    pub fn from_compact(data: &str) -> Result<Self> {
        let segments: Vec<&str> = data.split('.').collect();
        let [protected, payload, signature] = segments[..] else {
            return Err(JoseError::Parse {
                segment: "compact JWS".to_owned(),
                reason: "expected three dot-separated segments",
            });
        };
        Ok(Jws {
            payload: b64_decode(payload, "payload")?,
            signatures: vec![Signature {
                protected: ProtectedHeader::from_encoded(protected)?,
                unprotected: Header::default(),
                signature: b64_decode(signature, "signature")?,
            }],
        })
    }

    /// Render in flattened JSON serialization. Only objects with exactly one
    /// signature have a flattened form.
    pub fn to_flattened(&self) -> Result<Value> {
        if self.signatures.len() != 1 {
            return Err(JoseError::UnsupportedSerialization {
                form: "flattened",
                entry: "signature",
                count: self.signatures.len(),
            });
        }
        let mut map = Map::new();
        map.insert("payload".to_owned(), Value::String(b64_encode(&self.payload)));
        for (name, value) in signature_members(&self.signatures[0])? {
            map.insert(name, value);
        }
        Ok(Value::Object(map))
    }

    /// Parse the flattened JSON serialization.
    pub fn from_flattened(value: Value) -> Result<Self> {
        let map = value.try_as_object("flattened JWS")?;
        Ok(Jws {
            payload: payload_member(map)?,
            signatures: vec![signature_entry(map, "flattened JWS")?],
        })
    }

    /// Render in general JSON serialization, valid for any signature count.
    pub fn to_general(&self) -> Result<Value> {
        let mut signatures = Vec::with_capacity(self.signatures.len());
        for signature in &self.signatures {
            signatures.push(Value::Object(
                signature_members(signature)?.into_iter().collect(),
            ));
        }
        let mut map = Map::new();
        map.insert("payload".to_owned(), Value::String(b64_encode(&self.payload)));
        map.insert("signatures".to_owned(), Value::Array(signatures));
        Ok(Value::Object(map))
    }

    /// Parse the general JSON serialization.
    pub fn from_general(value: Value) -> Result<Self> {
        let map = value.try_as_object("general JWS")?;
        let entries = map
            .get("signatures")
            .ok_or(JoseError::Parse {
                segment: "general JWS".to_owned(),
                reason: "missing \"signatures\" member",
            })?
            .try_as_array("general JWS \"signatures\"")?;
        let mut signatures = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let segment = format!("signatures[{i}]");
            signatures.push(signature_entry(
                entry.try_as_object(&segment)?,
                &segment,
            )?);
        }
        Ok(Jws {
            payload: payload_member(map)?,
            signatures,
        })
    }
}

/// The JSON members of one signature entry, shared between the flattened and
/// general forms.
fn signature_members(signature: &Signature) -> Result<Vec<(String, Value)>> {
    let mut members = Vec::new();
    let protected = signature.protected.encoded()?;
    if !protected.is_empty() {
        members.push(("protected".to_owned(), Value::String(protected)));
    }
    if !signature.unprotected.is_empty() {
        members.push((
            "header".to_owned(),
            Value::Object(signature.unprotected.to_map()),
        ));
    }
    members.push((
        "signature".to_owned(),
        Value::String(b64_encode(&signature.signature)),
    ));
    Ok(members)
}

fn payload_member(map: &Map<String, Value>) -> Result<Vec<u8>> {
    map.get("payload")
        .ok_or(JoseError::Parse {
            segment: "JWS".to_owned(),
            reason: "missing \"payload\" member",
        })?
        .try_as_b64_bytes("payload")
}

/// Parse one signature entry from its JSON members, naming `segment` in
/// errors.
fn signature_entry(map: &Map<String, Value>, segment: &str) -> Result<Signature> {
    let protected = match map.get("protected") {
        Some(value) => ProtectedHeader::from_encoded(value.try_as_str(segment)?)?,
        None => ProtectedHeader::default(),
    };
    let unprotected = match map.get("header") {
        Some(value) => Header::from_json_value(value.clone())?,
        None => Header::default(),
    };
    let signature = map
        .get("signature")
        .ok_or_else(|| JoseError::Parse {
            segment: segment.to_owned(),
            reason: "missing \"signature\" member",
        })?
        .try_as_b64_bytes(segment)?;
    Ok(Signature {
        protected,
        unprotected,
        signature,
    })
}

/// Resolve the `alg` governing one signature from its headers and the key's
/// bound algorithm. A key bound to a different algorithm than the headers
/// name is rejected.
fn resolve_alg(header_alg: Option<&str>, key: &Jwk) -> Result<String> {
    match (header_alg, key.alg()) {
        (Some(h), Some(k)) if h != k => Err(JoseError::InvalidKey(
            "key is bound to a different algorithm",
        )),
        (Some(h), _) => Ok(h.to_owned()),
        (None, Some(k)) => Ok(k.to_owned()),
        (None, None) => Err(JoseError::MissingHeaderParameter("alg")),
    }
}

/// Incremental builder for [`Jws`] objects. Each
/// [`add_signature`](Self::add_signature) consumes the builder and returns a
/// new one with one more signature appended; earlier signatures are never
/// altered.
pub struct JwsBuilder<'a> {
    algorithms: &'a AlgorithmManager<dyn SignatureAlgorithm>,
    payload: Vec<u8>,
    signatures: Vec<Signature>,
}

impl<'a> JwsBuilder<'a> {
    /// Constructor, scoped to the signature algorithms in `algorithms`.
    pub fn new(algorithms: &'a AlgorithmManager<dyn SignatureAlgorithm>) -> Self {
        JwsBuilder {
            algorithms,
            payload: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Set the payload.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Sign the payload with `key` under the given header fragments and
    /// append the resulting signature.
    ///
    /// The governing algorithm is taken from the headers' `alg`, or from the
    /// key's bound `alg` when the headers carry none, in which case it is
    /// recorded in the protected header. Header fragments must be disjoint.
    pub fn add_signature(
        mut self,
        key: &Jwk,
        mut protected: Header,
        unprotected: Header,
    ) -> Result<Self> {
        let header_alg = protected.alg.as_deref().or(unprotected.alg.as_deref());
        let alg = resolve_alg(header_alg, key)?;
        if header_alg.is_none() {
            protected.alg = Some(alg.clone());
        }
        Header::merge_disjoint(&[&protected, &unprotected])?;

        let algorithm = self.algorithms.require(&alg)?;
        tracing::debug!(alg = %alg, "adding signature");

        let protected = ProtectedHeader::from_header(protected)?;
        let signature = algorithm.sign(key, &signing_input(&protected, &self.payload)?)?;
        self.signatures.push(Signature {
            protected,
            unprotected,
            signature,
        });
        Ok(self)
    }

    /// Build the completed object.
    pub fn build(self) -> Jws {
        Jws {
            payload: self.payload,
            signatures: self.signatures,
        }
    }
}

/// Verifier for [`Jws`] objects.
pub struct JwsVerifier<'a> {
    algorithms: &'a AlgorithmManager<dyn SignatureAlgorithm>,
}

impl<'a> JwsVerifier<'a> {
    /// Constructor, scoped to the signature algorithms in `algorithms`.
    pub fn new(algorithms: &'a AlgorithmManager<dyn SignatureAlgorithm>) -> Self {
        JwsVerifier { algorithms }
    }

    /// Verify the signature at `index` with `key`.
    pub fn verify(&self, jws: &Jws, key: &Jwk, index: usize) -> Result<()> {
        let entry = jws.signature(index)?;
        let merged = Header::merge_disjoint(&[&entry.protected.header, &entry.unprotected])?;
        let alg = resolve_alg(merged.get("alg").and_then(Value::as_str), key)?;
        let algorithm = self.algorithms.require(&alg)?;
        tracing::debug!(alg = %alg, index, "verifying signature");

        let input = signing_input(&entry.protected, &jws.payload)?;
        if algorithm.verify(key, &input, &entry.signature)? {
            Ok(())
        } else {
            Err(JoseError::VerificationFailed)
        }
    }

    /// Verify the signature at `index` against every plausible key in
    /// `keys`, in set order, succeeding on the first key that verifies.
    ///
    /// Keys whose `kid` contradicts the signature's headers are skipped; a
    /// key that fails (wrong type, wrong signature) moves the trial to the
    /// next key. The error never identifies which keys were tried.
    pub fn verify_with_key_set(&self, jws: &Jws, keys: &JwkSet, index: usize) -> Result<()> {
        let entry = jws.signature(index)?;
        let merged = Header::merge_disjoint(&[&entry.protected.header, &entry.unprotected])?;
        let kid = merged.get("kid").and_then(Value::as_str);

        for key in keys.iter() {
            if let (Some(header_kid), Some(key_kid)) = (kid, key.kid()) {
                if header_kid != key_kid {
                    continue;
                }
            }
            match self.verify(jws, key, index) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::trace!(error = %e, "key trial failed"),
            }
        }
        Err(JoseError::VerificationFailed)
    }
}
