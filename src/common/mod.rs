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

//! Common types.

use serde_json::Value;
use thiserror::Error;


/// Error type for failures in building, parsing or transforming JOSE objects.
///
/// Variants fall into five groups: configuration (unknown algorithm names,
/// unsupported curves), validation (malformed keys/headers, bad indices),
/// serialization (wire-form restrictions and parse failures), cryptographic
/// failures, and claim/header check failures.
///
/// [`VerificationFailed`](JoseError::VerificationFailed) and
/// [`DecryptionFailed`](JoseError::DecryptionFailed) are deliberately opaque:
/// they never reveal which key or which recipient failed, nor whether the
/// input was tampered with or merely encrypted under a different key.
#[derive(Debug, Error)]
pub enum JoseError {
    /// Algorithm name not present in the catalog used to build a manager.
    #[error("algorithm \"{0}\" is not supported")]
    UnknownAlgorithm(String),
    /// Curve name outside the supported set for the requested key type.
    #[error("curve \"{0}\" is not supported")]
    UnsupportedCurve(String),

    /// Requested JWK parameter is absent.
    #[error("the key parameter \"{0}\" does not exist")]
    KeyNotFound(String),
    /// Key material does not satisfy the algorithm's requirements.
    #[error("invalid key: {0}")]
    InvalidKey(&'static str),
    /// A `key_ops` value with no defined `use` mapping.
    #[error("unsupported key operation \"{0}\"")]
    UnsupportedKeyOperation(String),
    /// Header parameter present in both the protected and unprotected set.
    #[error("header parameter \"{0}\" is present in both protected and unprotected headers")]
    DuplicateHeaderParameter(String),
    /// A mandatory header parameter is missing.
    #[error("missing header parameter \"{0}\"")]
    MissingHeaderParameter(&'static str),
    /// Requested signature index does not exist.
    #[error("the signature at index {0} does not exist")]
    SignatureNotFound(usize),
    /// Requested key index does not exist.
    #[error("the key at index {0} does not exist")]
    IndexOutOfRange(usize),

    /// The object cannot be represented in the requested wire form.
    #[error("{form} serialization supports exactly one {entry}, object has {count}")]
    UnsupportedSerialization {
        form: &'static str,
        entry: &'static str,
        count: usize,
    },
    /// Compact serialization has no slot for unprotected headers.
    #[error("unprotected headers cannot be represented in {0} serialization")]
    UnprotectedHeaderNotAllowed(&'static str),
    /// Compact serialization has no slot for external AAD.
    #[error("external AAD cannot be represented in {0} serialization")]
    AadNotAllowed(&'static str),
    /// Malformed wire data, identifying the offending segment or index.
    #[error("malformed {segment}: {reason}")]
    Parse { segment: String, reason: &'static str },

    /// Algorithm named by a header is absent or not registered in the
    /// manager driving the pipeline.
    #[error("the algorithm \"{0}\" is not registered")]
    AlgorithmNotFound(String),
    /// Signature did not verify. Deliberately message-free beyond this.
    #[error("signature verification failed")]
    VerificationFailed,
    /// No recipient/key combination decrypted the object.
    #[error("decryption failed")]
    DecryptionFailed,
    /// A primitive rejected its inputs.
    #[error("cryptographic operation failed: {0}")]
    CryptoFailure(&'static str),
    /// Payload (de)compression failed.
    #[error("compression failed")]
    CompressionFailed,

    /// A claim or header checker rejected a value.
    #[error("invalid {kind} \"{name}\": {reason}")]
    CheckFailed {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },
    /// A name listed in `crit` is not covered by any registered checker.
    #[error("the critical header \"{0}\" is not understood by any checker")]
    UncoveredCriticalHeader(String),
    /// A claim required by the caller is absent.
    #[error("the mandatory claim \"{0}\" is missing")]
    MissingMandatoryClaim(String),
}

impl JoseError {
    /// Constructor for a claim check failure.
    pub fn claim_check(name: &str, reason: &'static str) -> Self {
        JoseError::CheckFailed {
            kind: "claim",
            name: name.to_owned(),
            reason,
        }
    }

    /// Constructor for a header check failure.
    pub fn header_check(name: &str, reason: &'static str) -> Self {
        JoseError::CheckFailed {
            kind: "header",
            name: name.to_owned(),
            reason,
        }
    }
}

/// Crate-specific Result type
pub type Result<T, E = JoseError> = core::result::Result<T, E>;

/// Trait for types that can be converted to/from a [`Value`].
pub trait AsJsonValue: Sized {
    /// Convert a [`Value`] into an instance of the type.
    fn from_json_value(value: Value) -> Result<Self>;
    /// Convert the object into a [`Value`], consuming it along the way.
    fn to_json_value(self) -> Result<Value>;
}

/// Extension trait that adds serialization/deserialization methods.
pub trait JsonSerializable: AsJsonValue {
    /// Create an object instance from a JSON text.
    fn from_json_str(data: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(data).map_err(|_| JoseError::Parse {
            segment: "JSON document".to_owned(),
            reason: "invalid JSON",
        })?;
        Self::from_json_value(value)
    }

    /// Serialize this object to a JSON text, consuming it along the way.
    fn to_json_string(self) -> Result<String> {
        let value = self.to_json_value()?;
        serde_json::to_string(&value).map_err(|_| JoseError::Parse {
            segment: "JSON document".to_owned(),
            reason: "unserializable value",
        })
    }
}
