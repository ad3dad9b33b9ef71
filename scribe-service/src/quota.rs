use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ScribeError, ScribeResult};

/// Token allowance as stored by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Total tokens available (facility-wide quota)
    #[serde(default)]
    pub tokens: u64,
    /// Tokens each user of the facility may spend
    #[serde(default)]
    pub tokens_per_user: u64,
    #[serde(default)]
    pub used: u64,
    /// Hash of the terms the user accepted
    #[serde(default)]
    pub tnc_hash: Option<String>,
}

/// Quota state for one request.
///
/// Omitted for benchmark runs, which bypass the pre-flight entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaContext {
    pub user: Option<QuotaSnapshot>,
    pub facility: Option<QuotaSnapshot>,
    /// Current terms and conditions text
    #[serde(default)]
    pub terms: String,
}

/// SHA-256 of the terms text, lowercase hex.
pub fn terms_hash(terms: &str) -> String {
    Sha256::digest(terms.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

impl QuotaContext {
    pub fn new(user: QuotaSnapshot, facility: QuotaSnapshot, terms: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            facility: Some(facility),
            terms: terms.into(),
        }
    }

    /// Fails when the user or facility may not use the scribe.
    ///
    /// When several rules are violated, the later one in this list is
    /// reported: facility quota missing, user quota missing, stale terms,
    /// facility exhausted, user exhausted.
    pub fn check(&self) -> ScribeResult<()> {
        let (facility, user) = match (&self.facility, &self.user) {
            (_, None) => return Err(ScribeError::Quota("User does not have a scribe quota.".into())),
            (None, Some(_)) => {
                return Err(ScribeError::Quota("Facility does not have a scribe quota.".into()))
            }
            (Some(facility), Some(user)) => (facility, user),
        };

        if user.used >= facility.tokens_per_user {
            return Err(ScribeError::Quota("User has exceeded their scribe quota.".into()));
        }
        if facility.used >= facility.tokens {
            return Err(ScribeError::Quota("Facility has exceeded its scribe quota.".into()));
        }
        if user.tnc_hash.as_deref() != Some(terms_hash(&self.terms).as_str()) {
            return Err(ScribeError::Quota(
                "User has not accepted the latest terms and conditions.".into(),
            ));
        }
        Ok(())
    }
}
