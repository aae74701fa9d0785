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

//! JOSE header functionality.

use crate::{
    common::AsJsonValue,
    util::{b64_decode, b64_encode, ValueTryAs},
    JoseError, Result,
};
use serde_json::{Map, Value};

#[cfg(test)]
mod tests;

const ALG: &str = "alg";
const ENC: &str = "enc";
const ZIP: &str = "zip";
const KID: &str = "kid";
const TYP: &str = "typ";
const CTY: &str = "cty";
const CRIT: &str = "crit";

/// Structure representing a JOSE header map (RFC 7515 section 4, RFC 7516
/// section 4): the registered string-valued parameters as typed fields, and
/// every other parameter in `rest`, which preserves insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    /// Cryptographic algorithm (`alg`).
    pub alg: Option<String>,
    /// Content encryption algorithm (`enc`), JWE only.
    pub enc: Option<String>,
    /// Compression algorithm (`zip`), JWE only.
    pub zip: Option<String>,
    /// Key identifier (`kid`).
    pub kid: Option<String>,
    /// Media type of the complete object (`typ`).
    pub typ: Option<String>,
    /// Media type of the secured content (`cty`).
    pub cty: Option<String>,
    /// Critical headers to be understood (`crit`).
    pub crit: Vec<String>,
    /// Any additional header parameters.
    pub rest: Map<String, Value>,
}

impl Header {
    /// Indicate whether the `Header` is empty.
    pub fn is_empty(&self) -> bool {
        self.alg.is_none()
            && self.enc.is_none()
            && self.zip.is_none()
            && self.kid.is_none()
            && self.typ.is_none()
            && self.cty.is_none()
            && self.crit.is_empty()
            && self.rest.is_empty()
    }

    /// Indicate whether the parameter `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        match name {
            ALG => self.alg.is_some(),
            ENC => self.enc.is_some(),
            ZIP => self.zip.is_some(),
            KID => self.kid.is_some(),
            TYP => self.typ.is_some(),
            CTY => self.cty.is_some(),
            CRIT => !self.crit.is_empty(),
            name => self.rest.contains_key(name),
        }
    }

    /// Set the parameter `name`, validating the types of the registered
    /// string-valued parameters and of `crit`.
    pub fn set_parameter(&mut self, name: &str, value: Value) -> Result<()> {
        let expect_str = |value: Value| -> Result<String> {
            match value {
                Value::String(s) => Ok(s),
                _ => Err(JoseError::Parse {
                    segment: format!("header parameter \"{name}\""),
                    reason: "expected string",
                }),
            }
        };
        match name {
            ALG => self.alg = Some(expect_str(value)?),
            ENC => self.enc = Some(expect_str(value)?),
            ZIP => self.zip = Some(expect_str(value)?),
            KID => self.kid = Some(expect_str(value)?),
            TYP => self.typ = Some(expect_str(value)?),
            CTY => self.cty = Some(expect_str(value)?),
            CRIT => {
                let names = value.try_as_array("header parameter \"crit\"")?;
                if names.is_empty() {
                    return Err(JoseError::Parse {
                        segment: "header parameter \"crit\"".to_owned(),
                        reason: "expected non-empty array",
                    });
                }
                self.crit = names
                    .iter()
                    .map(|v| v.try_as_str("header parameter \"crit\"").map(str::to_owned))
                    .collect::<Result<_>>()?;
            }
            name => {
                self.rest.insert(name.to_owned(), value);
            }
        }
        Ok(())
    }

    /// Render the header as a parameter map, typed fields first, `rest` in
    /// insertion order.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (name, value) in [
            (ALG, &self.alg),
            (ENC, &self.enc),
            (ZIP, &self.zip),
            (KID, &self.kid),
            (TYP, &self.typ),
            (CTY, &self.cty),
        ] {
            if let Some(v) = value {
                map.insert(name.to_owned(), Value::String(v.clone()));
            }
        }
        if !self.crit.is_empty() {
            map.insert(
                CRIT.to_owned(),
                Value::Array(self.crit.iter().cloned().map(Value::String).collect()),
            );
        }
        for (name, value) in &self.rest {
            map.insert(name.clone(), value.clone());
        }
        map
    }

    /// Merge header parts into a single parameter map, failing with
    /// [`JoseError::DuplicateHeaderParameter`] if any parameter appears in
    /// more than one part.
    pub fn merge_disjoint(parts: &[&Header]) -> Result<Map<String, Value>> {
        let mut merged = Map::new();
        for part in parts {
            for (name, value) in part.to_map() {
                if merged.contains_key(&name) {
                    return Err(JoseError::DuplicateHeaderParameter(name));
                }
                merged.insert(name, value);
            }
        }
        Ok(merged)
    }
}

impl AsJsonValue for Header {
    fn from_json_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(m) => m,
            _ => {
                return Err(JoseError::Parse {
                    segment: "header".to_owned(),
                    reason: "expected object",
                })
            }
        };
        let mut header = Self::default();
        for (name, value) in map {
            header.set_parameter(&name, value)?;
        }
        Ok(header)
    }

    fn to_json_value(self) -> Result<Value> {
        Ok(Value::Object(self.to_map()))
    }
}

json_serialize!(Header);

/// A [`Header`] which is integrity protected.
///
/// The base64url text actually seen on the wire is retained alongside the
/// parsed form, because signing inputs and AAD values are computed over
/// those exact bytes, not over a re-serialization.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProtectedHeader {
    /// The base64url segment as received or as first serialized.
    pub original: Option<String>,
    /// Parsed header.
    pub header: Header,
}

impl ProtectedHeader {
    /// Wrap a header, serializing it once so later [`encoded`](Self::encoded)
    /// calls are stable.
    pub fn from_header(header: Header) -> Result<Self> {
        let mut protected = ProtectedHeader {
            original: None,
            header,
        };
        protected.original = Some(protected.encoded()?);
        Ok(protected)
    }

    /// Parse a base64url protected-header segment, retaining the wire form.
    /// An empty segment denotes an absent protected header.
    pub fn from_encoded(segment: &str) -> Result<Self> {
        if segment.is_empty() {
            return Ok(ProtectedHeader::default());
        }
        let json = b64_decode(segment, "protected header")?;
        let value: Value = serde_json::from_slice(&json).map_err(|_| JoseError::Parse {
            segment: "protected header".to_owned(),
            reason: "invalid JSON",
        })?;
        Ok(ProtectedHeader {
            original: Some(segment.to_owned()),
            header: Header::from_json_value(value)?,
        })
    }

    /// The base64url segment for this header: the retained wire form if any,
    /// otherwise a fresh serialization. Empty headers encode as the empty
    /// string.
    pub fn encoded(&self) -> Result<String> {
        if let Some(original) = &self.original {
            return Ok(original.clone());
        }
        if self.header.is_empty() {
            return Ok(String::new());
        }
        let json = serde_json::to_vec(&Value::Object(self.header.to_map())).map_err(|_| {
            JoseError::Parse {
                segment: "protected header".to_owned(),
                reason: "unserializable value",
            }
        })?;
        Ok(b64_encode(json))
    }

    /// Indicate whether the protected header is absent.
    pub fn is_empty(&self) -> bool {
        self.original.is_none() && self.header.is_empty()
    }
}

/// Builder for [`Header`] objects.
#[derive(Default)]
pub struct HeaderBuilder(Header);

impl HeaderBuilder {
    builder! {Header}
    builder_set_optional! {alg: String}
    builder_set_optional! {enc: String}
    builder_set_optional! {zip: String}
    builder_set_optional! {kid: String}
    builder_set_optional! {typ: String}
    builder_set_optional! {cty: String}

    /// Add a critical header name.
    #[must_use]
    pub fn add_critical(mut self, name: impl Into<String>) -> Self {
        self.0.crit.push(name.into());
        self
    }

    /// Set a header parameter by name.
    ///
    /// # Panics
    ///
    /// This function will panic if used to set one of the registered
    /// parameters that have a typed field.
    #[must_use]
    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        if matches!(name.as_str(), ALG | ENC | ZIP | KID | TYP | CTY | CRIT) {
            panic!("value() method used to set registered header parameter"); // safe: invalid input
        }
        self.0.rest.insert(name, value);
        self
    }
}
