//! Source verification
//!
//! Before a run starts, the public egress address is looked up at two
//! independent endpoints. Agreement is recorded in the report header as
//! `VERIFIED`, anything else as `MISMATCH`. A failed lookup never blocks the
//! run; it is recorded as the literal value `ERROR`.

use crate::config::NetworkConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Value recorded for an endpoint that could not be queried
pub const LOOKUP_ERROR: &str = "ERROR";

/// Value recorded when verification is disabled
const NOT_QUERIED: &str = "N/A";

/// Outcome of comparing the two endpoint answers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// Both endpoints answered with the same address
    Verified,
    /// The answers differ, or at least one lookup failed
    Mismatch,
    /// Verification was disabled for this run
    Skipped,
}

impl VerificationStatus {
    /// Tag written into the report header
    pub fn tag(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "VERIFIED",
            VerificationStatus::Mismatch => "MISMATCH",
            VerificationStatus::Skipped => "SKIPPED",
        }
    }
}

/// Recorded egress addresses and their comparison
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceVerification {
    /// Endpoint URLs, in query order
    pub endpoints: [String; 2],
    /// Address reported by each endpoint, or [`LOOKUP_ERROR`]
    pub addresses: [String; 2],
    /// Comparison result
    pub status: VerificationStatus,
}

impl SourceVerification {
    /// Compare two lookup results
    pub fn from_addresses(endpoints: [String; 2], addresses: [String; 2]) -> Self {
        let status = if addresses[0] == addresses[1] && addresses[0] != LOOKUP_ERROR {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Mismatch
        };
        Self {
            endpoints,
            addresses,
            status,
        }
    }

    /// Record that no lookup was performed
    pub fn skipped(endpoints: [String; 2]) -> Self {
        Self {
            endpoints,
            addresses: [NOT_QUERIED.to_string(), NOT_QUERIED.to_string()],
            status: VerificationStatus::Skipped,
        }
    }

    /// `(endpoint, address)` pairs in query order
    pub fn pairs(&self) -> [(&str, &str); 2] {
        [
            (self.endpoints[0].as_str(), self.addresses[0].as_str()),
            (self.endpoints[1].as_str(), self.addresses[1].as_str()),
        ]
    }
}

/// Query both endpoints concurrently and compare their answers
pub async fn verify_source(config: &NetworkConfig) -> SourceVerification {
    let endpoints = config.ip_endpoints.clone();
    if !config.verify_source {
        tracing::debug!("source verification disabled");
        return SourceVerification::skipped(endpoints);
    }

    let client = match build_client(config.ip_timeout) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "failed to build HTTP client for source verification");
            return SourceVerification::from_addresses(
                endpoints,
                [LOOKUP_ERROR.to_string(), LOOKUP_ERROR.to_string()],
            );
        }
    };

    let (first, second) = tokio::join!(
        lookup(&client, &endpoints[0]),
        lookup(&client, &endpoints[1])
    );

    let result = SourceVerification::from_addresses(endpoints, [first, second]);
    match result.status {
        VerificationStatus::Verified => {
            tracing::info!(address = %result.addresses[0], "source address verified");
        }
        _ => {
            tracing::warn!(
                first = %result.addresses[0],
                second = %result.addresses[1],
                "source address could not be verified"
            );
        }
    }
    result
}

fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Query one endpoint, mapping every failure to [`LOOKUP_ERROR`]
async fn lookup(client: &reqwest::Client, endpoint: &str) -> String {
    match query(client, endpoint).await {
        Ok(address) if !address.is_empty() => address,
        Ok(_) => {
            tracing::warn!(endpoint = %endpoint, "IP endpoint returned an empty body");
            LOOKUP_ERROR.to_string()
        }
        Err(e) => {
            tracing::warn!(endpoint = %endpoint, error = %e, "IP lookup failed");
            LOOKUP_ERROR.to_string()
        }
    }
}

async fn query(client: &reqwest::Client, endpoint: &str) -> reqwest::Result<String> {
    let body = client
        .get(endpoint)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body.trim().to_string())
}
