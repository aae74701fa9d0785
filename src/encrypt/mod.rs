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

//! JWE functionality (RFC 7516): building, decrypting and (de)serializing
//! encrypted objects.

use crate::{
    jwa::{
        AlgorithmManager, CompressionAlgorithm, ContentEncryptionAlgorithm,
        KeyManagementAlgorithm, KeyManagementMode,
    },
    util::{b64_decode, b64_encode, random_bytes, ValueTryAs},
    AsJsonValue, Header, Jwk, JwkSet, JoseError, ProtectedHeader, Result,
};
use serde_json::{Map, Value};


/// One recipient of a [`Jwe`]: its specific headers and its encrypted copy
/// of the shared CEK (empty for direct and agreement modes).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recipient {
    /// Recipient-specific headers, not integrity protected.
    pub header: Header,
    /// The CEK wrapped for this recipient.
    pub encrypted_key: Vec<u8>,
}

/// An encrypted object: one ciphertext under one CEK, wrapped or agreed
/// independently for each recipient (RFC 7516 section 7.2).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Jwe {
    /// Integrity-protected headers, shared by all recipients.
    pub protected: ProtectedHeader,
    /// Shared headers carried alongside but not protected.
    pub unprotected: Header,
    /// Per-recipient entries, in the order they were added.
    pub recipients: Vec<Recipient>,
    /// Initialization vector for the content encryption.
    pub iv: Vec<u8>,
    /// The encrypted payload.
    pub ciphertext: Vec<u8>,
    /// Authentication tag over ciphertext and AAD.
    pub tag: Vec<u8>,
    /// Caller-supplied additional authenticated data, if any.
    pub aad: Option<Vec<u8>>,
}

/// The byte sequence authenticated by the content encryption:
/// `ASCII(BASE64URL(protected))`, extended with `"." BASE64URL(aad)` when
/// external AAD is present.
fn aad_bytes(protected: &ProtectedHeader, aad: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut bytes = protected.encoded()?.into_bytes();
    if let Some(aad) = aad {
        bytes.push(b'.');
        bytes.extend_from_slice(b64_encode(aad).as_bytes());
    }
    Ok(bytes)
}

impl Jwe {
    /// Render in compact serialization. Only objects with exactly one
    /// recipient, no unprotected headers and no external AAD have a compact
    /// form.
    pub fn to_compact(&self) -> Result<String> {
        if self.recipients.len() != 1 {
            return Err(JoseError::UnsupportedSerialization {
                form: "compact",
                entry: "recipient",
                count: self.recipients.len(),
            });
        }
        let recipient = &self.recipients[0];
        if !self.unprotected.is_empty() || !recipient.header.is_empty() {
            return Err(JoseError::UnprotectedHeaderNotAllowed("compact"));
        }
        if self.aad.is_some() {
            return Err(JoseError::AadNotAllowed("compact"));
        }
        Ok(format!(
            "{}.{}.{}.{}.{}",
            self.protected.encoded()?,
            b64_encode(&recipient.encrypted_key),
            b64_encode(&self.iv),
            b64_encode(&self.ciphertext),
            b64_encode(&self.tag)
        ))
    }

    /// Parse the compact serialization.
    pub fn from_compact(data: &str) -> Result<Self> {
        let segments: Vec<&str> = data.split('.').collect();
        let [protected, encrypted_key, iv, ciphertext, tag] = segments[..] else {
            return Err(JoseError::Parse {
                segment: "compact JWE".to_owned(),
                reason: "expected five dot-separated segments",
            });
        };
        Ok(Jwe {
            protected: ProtectedHeader::from_encoded(protected)?,
            unprotected: Header::default(),
            recipients: vec![Recipient {
                header: Header::default(),
                encrypted_key: b64_decode(encrypted_key, "encrypted key")?,
            }],
            iv: b64_decode(iv, "initialization vector")?,
            ciphertext: b64_decode(ciphertext, "ciphertext")?,
            tag: b64_decode(tag, "authentication tag")?,
            aad: None,
        })
    }

    /// Render in flattened JSON serialization. Only objects with exactly one
    /// recipient have a flattened form.
    pub fn to_flattened(&self) -> Result<Value> {
        if self.recipients.len() != 1 {
            return Err(JoseError::UnsupportedSerialization {
                form: "flattened",
                entry: "recipient",
                count: self.recipients.len(),
            });
        }
        let recipient = &self.recipients[0];
        let mut map = self.shared_members()?;
        if !recipient.header.is_empty() {
            map.insert(
                "header".to_owned(),
                Value::Object(recipient.header.to_map()),
            );
        }
        if !recipient.encrypted_key.is_empty() {
            map.insert(
                "encrypted_key".to_owned(),
                Value::String(b64_encode(&recipient.encrypted_key)),
            );
        }
        Ok(Value::Object(map))
    }

    /// Parse the flattened JSON serialization.
    pub fn from_flattened(value: Value) -> Result<Self> {
        let map = value.try_as_object("flattened JWE")?;
        let mut jwe = Self::from_shared_members(map)?;
        jwe.recipients = vec![recipient_entry(map, "flattened JWE")?];
        Ok(jwe)
    }

    /// Render in general JSON serialization, valid for any recipient count.
    pub fn to_general(&self) -> Result<Value> {
        let mut recipients = Vec::with_capacity(self.recipients.len());
        for recipient in &self.recipients {
            let mut entry = Map::new();
            if !recipient.header.is_empty() {
                entry.insert(
                    "header".to_owned(),
                    Value::Object(recipient.header.to_map()),
                );
            }
            if !recipient.encrypted_key.is_empty() {
                entry.insert(
                    "encrypted_key".to_owned(),
                    Value::String(b64_encode(&recipient.encrypted_key)),
                );
            }
            recipients.push(Value::Object(entry));
        }
        let mut map = self.shared_members()?;
        map.insert("recipients".to_owned(), Value::Array(recipients));
        Ok(Value::Object(map))
    }

    /// Parse the general JSON serialization.
    pub fn from_general(value: Value) -> Result<Self> {
        let map = value.try_as_object("general JWE")?;
        let entries = map
            .get("recipients")
            .ok_or(JoseError::Parse {
                segment: "general JWE".to_owned(),
                reason: "missing \"recipients\" member",
            })?
            .try_as_array("general JWE \"recipients\"")?;
        let mut jwe = Self::from_shared_members(map)?;
        jwe.recipients = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let segment = format!("recipients[{i}]");
                recipient_entry(entry.try_as_object(&segment)?, &segment)
            })
            .collect::<Result<_>>()?;
        Ok(jwe)
    }

    /// The JSON members shared between the flattened and general forms.
    fn shared_members(&self) -> Result<Map<String, Value>> {
        let mut map = Map::new();
        let protected = self.protected.encoded()?;
        if !protected.is_empty() {
            map.insert("protected".to_owned(), Value::String(protected));
        }
        if !self.unprotected.is_empty() {
            map.insert(
                "unprotected".to_owned(),
                Value::Object(self.unprotected.to_map()),
            );
        }
        if !self.iv.is_empty() {
            map.insert("iv".to_owned(), Value::String(b64_encode(&self.iv)));
        }
        map.insert(
            "ciphertext".to_owned(),
            Value::String(b64_encode(&self.ciphertext)),
        );
        if !self.tag.is_empty() {
            map.insert("tag".to_owned(), Value::String(b64_encode(&self.tag)));
        }
        if let Some(aad) = &self.aad {
            map.insert("aad".to_owned(), Value::String(b64_encode(aad)));
        }
        Ok(map)
    }

    fn from_shared_members(map: &Map<String, Value>) -> Result<Self> {
        let b64_member = |name: &str| -> Result<Vec<u8>> {
            match map.get(name) {
                Some(value) => value.try_as_b64_bytes(&format!("JWE \"{name}\"")),
                None => Ok(Vec::new()),
            }
        };
        Ok(Jwe {
            protected: match map.get("protected") {
                Some(value) => ProtectedHeader::from_encoded(value.try_as_str("protected header")?)?,
                None => ProtectedHeader::default(),
            },
            unprotected: match map.get("unprotected") {
                Some(value) => Header::from_json_value(value.clone())?,
                None => Header::default(),
            },
            recipients: Vec::new(),
            iv: b64_member("iv")?,
            ciphertext: map
                .get("ciphertext")
                .ok_or(JoseError::Parse {
                    segment: "JWE".to_owned(),
                    reason: "missing \"ciphertext\" member",
                })?
                .try_as_b64_bytes("ciphertext")?,
            tag: b64_member("tag")?,
            aad: match map.get("aad") {
                Some(value) => Some(value.try_as_b64_bytes("JWE \"aad\"")?),
                None => None,
            },
        })
    }
}

/// Parse one recipient entry from its JSON members, naming `segment` in
/// errors.
fn recipient_entry(map: &Map<String, Value>, segment: &str) -> Result<Recipient> {
    Ok(Recipient {
        header: match map.get("header") {
            Some(value) => Header::from_json_value(value.clone())?,
            None => Header::default(),
        },
        encrypted_key: match map.get("encrypted_key") {
            Some(value) => value.try_as_b64_bytes(segment)?,
            None => Vec::new(),
        },
    })
}

/// Resolve the `alg` governing one recipient from the header parts and the
/// key's bound algorithm.
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

/// Builder for [`Jwe`] objects: one payload encrypted once, wrapped for any
/// number of recipients.
pub struct JweBuilder<'a> {
    key_management: &'a AlgorithmManager<dyn KeyManagementAlgorithm>,
    content_encryption: &'a AlgorithmManager<dyn ContentEncryptionAlgorithm>,
    compression: &'a AlgorithmManager<dyn CompressionAlgorithm>,
    payload: Vec<u8>,
    protected: Header,
    unprotected: Header,
    aad: Option<Vec<u8>>,
    recipients: Vec<(Jwk, Header)>,
}

impl<'a> JweBuilder<'a> {
    /// Constructor, scoped to the algorithms in the given managers.
    pub fn new(
        key_management: &'a AlgorithmManager<dyn KeyManagementAlgorithm>,
        content_encryption: &'a AlgorithmManager<dyn ContentEncryptionAlgorithm>,
        compression: &'a AlgorithmManager<dyn CompressionAlgorithm>,
    ) -> Self {
        JweBuilder {
            key_management,
            content_encryption,
            compression,
            payload: Vec::new(),
            protected: Header::default(),
            unprotected: Header::default(),
            aad: None,
            recipients: Vec::new(),
        }
    }

    /// Set the payload.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Set the shared protected header.
    #[must_use]
    pub fn protected(mut self, header: Header) -> Self {
        self.protected = header;
        self
    }

    /// Set the shared unprotected header.
    #[must_use]
    pub fn unprotected(mut self, header: Header) -> Self {
        self.unprotected = header;
        self
    }

    /// Set external additional authenticated data.
    #[must_use]
    pub fn aad(mut self, aad: impl Into<Vec<u8>>) -> Self {
        self.aad = Some(aad.into());
        self
    }

    /// Add a recipient: the key the CEK will be wrapped or agreed under,
    /// plus recipient-specific headers.
    #[must_use]
    pub fn add_recipient(mut self, key: &Jwk, header: Header) -> Self {
        self.recipients.push((key.clone(), header));
        self
    }

    /// Encrypt the payload once and wrap the CEK for every recipient.
    pub fn build(mut self) -> Result<Jwe> {
        let shared = Header::merge_disjoint(&[&self.protected, &self.unprotected])?;
        // RFC 7516 section 4.1.3: "zip" is only meaningful when integrity
        // protected.
        if self.unprotected.zip.is_some()
            || self.recipients.iter().any(|(_, h)| h.zip.is_some())
        {
            return Err(JoseError::CryptoFailure(
                "the zip header must be integrity protected",
            ));
        }
        let enc_name = shared
            .get("enc")
            .and_then(Value::as_str)
            .ok_or(JoseError::MissingHeaderParameter("enc"))?
            .to_owned();
        let enc = self.content_encryption.require(&enc_name)?.clone();
        if self.recipients.is_empty() {
            return Err(JoseError::CryptoFailure("no recipients"));
        }

        // Resolve each recipient's algorithm before sealing the headers.
        let shared_alg = shared.get("alg").and_then(Value::as_str).map(str::to_owned);
        let mut resolved = Vec::with_capacity(self.recipients.len());
        for (key, header) in &mut self.recipients {
            let header_alg = header
                .alg
                .clone()
                .or_else(|| shared_alg.clone());
            let alg = resolve_alg(header_alg.as_deref(), key)?;
            if header_alg.is_none() {
                header.alg = Some(alg.clone());
            }
            let algorithm = self.key_management.require(&alg)?.clone();
            tracing::debug!(alg = %alg, enc = %enc_name, "adding recipient");
            resolved.push(algorithm);
        }

        // Direct and agreement modes determine the CEK from a single key.
        let single_mode = resolved
            .iter()
            .any(|a| a.mode() != KeyManagementMode::Wrap);
        if single_mode && self.recipients.len() != 1 {
            return Err(JoseError::CryptoFailure(
                "direct modes support a single recipient",
            ));
        }

        let cek = if single_mode {
            // Agreement parameters land in the protected header so the
            // result stays representable in compact form.
            resolved[0].derive_cek(&self.recipients[0].0, enc.as_ref(), &mut self.protected)?
        } else {
            random_bytes(enc.cek_size())
        };

        let mut recipients = Vec::with_capacity(self.recipients.len());
        for ((key, mut header), algorithm) in self.recipients.into_iter().zip(resolved) {
            let encrypted_key = match algorithm.mode() {
                KeyManagementMode::Wrap => algorithm.wrap_cek(&key, &cek, &mut header)?,
                KeyManagementMode::Direct | KeyManagementMode::Agreement => Vec::new(),
            };
            recipients.push(Recipient {
                header,
                encrypted_key,
            });
        }

        let mut payload = self.payload;
        if let Some(zip) = &self.protected.zip {
            payload = self.compression.require(zip)?.compress(&payload)?;
        }

        let protected = ProtectedHeader::from_header(self.protected)?;
        let aad = aad_bytes(&protected, self.aad.as_deref())?;
        let iv = random_bytes(enc.iv_size());
        let (ciphertext, tag) = enc.encrypt(&cek, &iv, &aad, &payload)?;

        Ok(Jwe {
            protected,
            unprotected: self.unprotected,
            recipients,
            iv,
            ciphertext,
            tag,
            aad: self.aad,
        })
    }
}

/// Decrypter for [`Jwe`] objects.
pub struct JweDecrypter<'a> {
    key_management: &'a AlgorithmManager<dyn KeyManagementAlgorithm>,
    content_encryption: &'a AlgorithmManager<dyn ContentEncryptionAlgorithm>,
    compression: &'a AlgorithmManager<dyn CompressionAlgorithm>,
}

impl<'a> JweDecrypter<'a> {
    /// Constructor, scoped to the algorithms in the given managers.
    pub fn new(
        key_management: &'a AlgorithmManager<dyn KeyManagementAlgorithm>,
        content_encryption: &'a AlgorithmManager<dyn ContentEncryptionAlgorithm>,
        compression: &'a AlgorithmManager<dyn CompressionAlgorithm>,
    ) -> Self {
        JweDecrypter {
            key_management,
            content_encryption,
            compression,
        }
    }

    /// Attempt one recipient × key combination.
    fn try_recipient(&self, jwe: &Jwe, recipient: &Recipient, key: &Jwk) -> Result<Vec<u8>> {
        let merged = Header::merge_disjoint(&[
            &jwe.protected.header,
            &jwe.unprotected,
            &recipient.header,
        ])?;
        let alg = resolve_alg(merged.get("alg").and_then(Value::as_str), key)?;
        let enc_name = merged
            .get("enc")
            .and_then(Value::as_str)
            .ok_or(JoseError::MissingHeaderParameter("enc"))?;
        let algorithm = self.key_management.require(&alg)?;
        let enc = self.content_encryption.require(enc_name)?;

        let cek = algorithm.unwrap_cek(key, &recipient.encrypted_key, enc.as_ref(), &merged)?;
        let aad = aad_bytes(&jwe.protected, jwe.aad.as_deref())?;
        let mut payload = enc.decrypt(&cek, &jwe.iv, &aad, &jwe.ciphertext, &jwe.tag)?;

        if merged.contains_key("zip") && jwe.protected.header.zip.is_none() {
            return Err(JoseError::CryptoFailure(
                "the zip header must be integrity protected",
            ));
        }
        if let Some(zip) = &jwe.protected.header.zip {
            payload = self.compression.require(zip)?.decompress(&payload)?;
        }
        Ok(payload)
    }

    /// Decrypt with a single key, trying each recipient in order and
    /// stopping at the first success.
    ///
    /// Fails with an opaque [`JoseError::DecryptionFailed`] only after every
    /// recipient trial fails; the error never identifies which trial failed
    /// or why.
    pub fn decrypt(&self, jwe: &Jwe, key: &Jwk) -> Result<Vec<u8>> {
        for recipient in &jwe.recipients {
            match self.try_recipient(jwe, recipient, key) {
                Ok(payload) => return Ok(payload),
                Err(e) => tracing::trace!(error = %e, "recipient trial failed"),
            }
        }
        Err(JoseError::DecryptionFailed)
    }

    /// Decrypt with a key set, trying every recipient × key combination in
    /// order. Keys whose `kid` contradicts the recipient's headers are
    /// skipped.
    pub fn decrypt_with_key_set(&self, jwe: &Jwe, keys: &JwkSet) -> Result<Vec<u8>> {
        for recipient in &jwe.recipients {
            let kid = recipient
                .header
                .kid
                .as_deref()
                .or(jwe.protected.header.kid.as_deref())
                .or(jwe.unprotected.kid.as_deref());
            for key in keys.iter() {
                if let (Some(header_kid), Some(key_kid)) = (kid, key.kid()) {
                    if header_kid != key_kid {
                        continue;
                    }
                }
                match self.try_recipient(jwe, recipient, key) {
                    Ok(payload) => return Ok(payload),
                    Err(e) => tracing::trace!(error = %e, "key trial failed"),
                }
            }
        }
        Err(JoseError::DecryptionFailed)
    }
}
