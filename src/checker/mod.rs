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

//! Claim and header validation, run over the claims and headers recovered
//! from a verified or decrypted object.

use crate::{util::ValueTryAs, JoseError, Result};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};


/// A stateless predicate over one claim value.
pub trait ClaimChecker {
    /// The claim this checker covers.
    fn supported_claim(&self) -> &str;

    /// Check the claim value, failing with a [`JoseError::CheckFailed`]
    /// naming the claim on violation.
    fn check_claim(&self, value: &Value) -> Result<()>;
}

/// A stateless predicate over one header parameter value.
pub trait HeaderChecker {
    /// The header parameter this checker covers.
    fn supported_header(&self) -> &str;

    /// Check the header value, failing with a [`JoseError::CheckFailed`]
    /// naming the header on violation.
    fn check_header(&self, value: &Value) -> Result<()>;
}

/// Seconds since the epoch, saturating at zero on a misconfigured clock.
fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Interpret a claim value as a NumericDate (RFC 7519 section 2).
///
/// Fractional seconds truncate toward zero and negative dates clamp to the
/// epoch; non-numeric values are a check failure.
fn numeric_date(value: &Value, claim: &str) -> Result<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|f| f as u64))
        .ok_or_else(|| JoseError::claim_check(claim, "expected numeric date"))
}

/// Checker for the `exp` claim: the object must not have expired, allowing
/// for clock drift.
pub struct ExpirationTimeChecker {
    allowed_drift: u64,
}

impl ExpirationTimeChecker {
    /// Constructor, tolerating `allowed_drift` seconds of clock skew.
    pub fn new(allowed_drift: u64) -> Self {
        ExpirationTimeChecker { allowed_drift }
    }
}

impl ClaimChecker for ExpirationTimeChecker {
    fn supported_claim(&self) -> &str {
        "exp"
    }

    fn check_claim(&self, value: &Value) -> Result<()> {
        let exp = numeric_date(value, "exp")?;
        if exp.saturating_add(self.allowed_drift) < now() {
            return Err(JoseError::claim_check("exp", "expired"));
        }
        Ok(())
    }
}

/// Checker for the `nbf` claim: the object must already be valid, allowing
/// for clock drift.
pub struct NotBeforeChecker {
    allowed_drift: u64,
}

impl NotBeforeChecker {
    /// Constructor, tolerating `allowed_drift` seconds of clock skew.
    pub fn new(allowed_drift: u64) -> Self {
        NotBeforeChecker { allowed_drift }
    }
}

impl ClaimChecker for NotBeforeChecker {
    fn supported_claim(&self) -> &str {
        "nbf"
    }

    fn check_claim(&self, value: &Value) -> Result<()> {
        let nbf = numeric_date(value, "nbf")?;
        if nbf > now().saturating_add(self.allowed_drift) {
            return Err(JoseError::claim_check("nbf", "not yet valid"));
        }
        Ok(())
    }
}

/// Checker for the `iat` claim: the object must not claim to have been
/// issued in the future, allowing for clock drift.
pub struct IssuedAtChecker {
    allowed_drift: u64,
}

impl IssuedAtChecker {
    /// Constructor, tolerating `allowed_drift` seconds of clock skew.
    pub fn new(allowed_drift: u64) -> Self {
        IssuedAtChecker { allowed_drift }
    }
}

impl ClaimChecker for IssuedAtChecker {
    fn supported_claim(&self) -> &str {
        "iat"
    }

    fn check_claim(&self, value: &Value) -> Result<()> {
        let iat = numeric_date(value, "iat")?;
        if iat > now().saturating_add(self.allowed_drift) {
            return Err(JoseError::claim_check("iat", "issued in the future"));
        }
        Ok(())
    }
}

/// Checker for the `aud` claim: the configured audience must equal the
/// claim value, or be listed when the claim is an array.
pub struct AudienceChecker {
    audience: String,
}

impl AudienceChecker {
    /// Constructor for the expected `audience`.
    pub fn new(audience: impl Into<String>) -> Self {
        AudienceChecker {
            audience: audience.into(),
        }
    }
}

impl ClaimChecker for AudienceChecker {
    fn supported_claim(&self) -> &str {
        "aud"
    }

    fn check_claim(&self, value: &Value) -> Result<()> {
        let matched = match value {
            Value::String(s) => *s == self.audience,
            Value::Array(entries) => entries
                .iter()
                .any(|v| v.as_str() == Some(self.audience.as_str())),
            _ => false,
        };
        if !matched {
            return Err(JoseError::claim_check("aud", "audience mismatch"));
        }
        Ok(())
    }
}

/// An ordered chain of header and claim checkers.
///
/// Header checkers run first, starting with the built-in critical-header
/// coverage check; claim checkers follow. The first violation aborts the
/// whole check.
#[derive(Default)]
pub struct CheckerManager {
    claim_checkers: Vec<Box<dyn ClaimChecker>>,
    header_checkers: Vec<Box<dyn HeaderChecker>>,
}

impl CheckerManager {
    /// Create an empty manager. An empty manager still enforces `crit`
    /// coverage: any critical header name fails it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a claim checker to the chain.
    pub fn add_claim_checker(&mut self, checker: impl ClaimChecker + 'static) {
        self.claim_checkers.push(Box::new(checker));
    }

    /// Append a header checker to the chain.
    pub fn add_header_checker(&mut self, checker: impl HeaderChecker + 'static) {
        self.header_checkers.push(Box::new(checker));
    }

    /// Run the header checkers over a merged header map.
    ///
    /// Every name listed in `crit` must be covered by a registered header
    /// checker; uncovered names fail with
    /// [`JoseError::UncoveredCriticalHeader`].
    pub fn check_headers(&self, headers: &Map<String, Value>) -> Result<()> {
        if let Some(crit) = headers.get("crit") {
            for name in crit.try_as_array("header parameter \"crit\"")? {
                let name = name.try_as_str("header parameter \"crit\"")?;
                if !self
                    .header_checkers
                    .iter()
                    .any(|c| c.supported_header() == name)
                {
                    tracing::debug!(header = name, "critical header not understood");
                    return Err(JoseError::UncoveredCriticalHeader(name.to_owned()));
                }
            }
        }
        for checker in &self.header_checkers {
            if let Some(value) = headers.get(checker.supported_header()) {
                if let Err(e) = checker.check_header(value) {
                    tracing::debug!(header = checker.supported_header(), "header check failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Run the claim checkers over a decoded claims map, additionally
    /// requiring every claim in `mandatory` to be present.
    pub fn check_claims(&self, claims: &Map<String, Value>, mandatory: &[&str]) -> Result<()> {
        for claim in mandatory {
            if !claims.contains_key(*claim) {
                return Err(JoseError::MissingMandatoryClaim((*claim).to_owned()));
            }
        }
        for checker in &self.claim_checkers {
            if let Some(value) = claims.get(checker.supported_claim()) {
                if let Err(e) = checker.check_claim(value) {
                    tracing::debug!(claim = checker.supported_claim(), "claim check failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Run the full chain: headers first, then claims.
    pub fn check(
        &self,
        headers: &Map<String, Value>,
        claims: &Map<String, Value>,
        mandatory: &[&str],
    ) -> Result<()> {
        self.check_headers(headers)?;
        self.check_claims(claims, mandatory)
    }
}
