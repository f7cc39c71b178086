//! Decentralized identifier format checks.
//!
//! Accepted shape: `did:<method>:<id>`.

use crate::error::{Error, TrustResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did {
    method: String,
    id: String,
}

impl Did {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "did:{}:{}", self.method, self.id)
    }
}

impl FromStr for Did {
    type Err = Error;

    fn from_str(s: &str) -> TrustResult<Self> {
        let mut parts = s.splitn(3, ':');

        if parts.next() != Some("did") {
            return Err(invalid(s, "must start with 'did:'"));
        }

        let method = parts.next().unwrap_or_default();
        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(invalid(s, "method must be lowercase alphanumeric"));
        }

        let id = parts.next().unwrap_or_default();
        if id.is_empty() || id.ends_with(':') {
            return Err(invalid(s, "method-specific id is empty"));
        }
        if !id.chars().all(is_id_char) {
            return Err(invalid(s, "method-specific id has invalid characters"));
        }

        Ok(Self {
            method: method.to_string(),
            id: id.to_string(),
        })
    }
}

impl TryFrom<String> for Did {
    type Error = Error;

    fn try_from(value: String) -> TrustResult<Self> {
        value.parse()
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.to_string()
    }
}

pub fn validate(did: &str) -> TrustResult<()> {
    did.parse::<Did>().map(|_| ())
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '%' | '-')
}

fn invalid(did: &str, reason: &str) -> Error {
    Error::ValidationFailed(format!("invalid DID '{}': {}", did, reason))
}
