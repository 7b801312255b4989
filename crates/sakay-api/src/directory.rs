//! # HTTP Candidate Directory
//!
//! Calls an external ranking service. The service receives the
//! [`CandidateQuery`] as JSON and answers with fulfiller ids, best first:
//!
//! ```text
//! POST {base_url}/candidates
//! {"request_id": "...", "request_type": "ride", "vehicle_class": "car", ...}
//! -> ["driver-17", "driver-4"]
//! ```

use std::time::Duration;

use async_trait::async_trait;

use sakay_core::FulfillerId;
use sakay_dispatch::{CandidateDirectory, CandidateQuery, DirectoryError};

/// Upper bound on one ranking call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`CandidateDirectory`] backed by a ranking service.
#[derive(Debug, Clone)]
pub struct HttpCandidateDirectory {
    http: reqwest::Client,
    url: String,
}

impl HttpCandidateDirectory {
    /// A client for the service at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DirectoryError::Unavailable(format!("client init: {e}")))?;
        Ok(Self {
            http,
            url: format!("{}/candidates", base_url.trim_end_matches('/')),
        })
    }

    /// The endpoint this client posts to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CandidateDirectory for HttpCandidateDirectory {
    async fn candidates(&self, query: &CandidateQuery) -> Result<Vec<FulfillerId>, DirectoryError> {
        let resp = self
            .http
            .post(&self.url)
            .json(query)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("POST {}: {e}", self.url)))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DirectoryError::Unavailable(format!(
                "POST {} returned {status}: {body}",
                self.url
            )));
        }

        resp.json()
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("decoding candidate list: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        let directory = HttpCandidateDirectory::new("http://ranker.internal/").unwrap();
        assert_eq!(directory.url(), "http://ranker.internal/candidates");
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let directory = HttpCandidateDirectory::new("http://127.0.0.1:9").unwrap();
        let query = CandidateQuery {
            request_id: sakay_core::RequestId::new(),
            request_type: sakay_core::RequestType::Food,
            vehicle_class: sakay_core::VehicleClass::Motorcycle,
            pickup: None,
            dropoff: sakay_core::Place::address("Ayala Triangle"),
        };
        let err = directory.candidates(&query).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
    }
}
