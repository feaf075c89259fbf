use std::time::Duration;

use url::Url;

use crate::error::SpeccatError;

/// Fetches remote documents named by `http(s)` references.
pub trait ReferenceFetcher: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<String, SpeccatError>;
}

/// Default HTTP fetcher backed by `ureq`.
///
/// Each request is bounded by `timeout` so a stalled host cannot hold a
/// resolution past its own deadline for long.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl ReferenceFetcher for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<String, SpeccatError> {
        let response = self.agent.get(url.as_str()).call().map_err(|err| {
            SpeccatError::Reference(format!("failed to fetch {url}: {err}"))
        })?;
        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(SpeccatError::Reference(format!(
                "received {status} from {url}"
            )));
        }
        response.into_string().map_err(|err| {
            SpeccatError::Reference(format!("failed reading body from {url}: {err}"))
        })
    }
}

/// Rejects every remote reference; used when remote fetching is disabled.
#[derive(Default)]
pub struct OfflineFetcher;

impl ReferenceFetcher for OfflineFetcher {
    fn fetch(&self, url: &Url) -> Result<String, SpeccatError> {
        Err(SpeccatError::Reference(format!(
            "remote reference {url} not fetched: remote references are disabled"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_fetcher_rejects_remote_urls() {
        let url = Url::parse("https://example.invalid/pets.yaml").unwrap();
        let err = OfflineFetcher.fetch(&url).unwrap_err();
        assert!(matches!(err, SpeccatError::Reference(_)));
        assert!(err.to_string().contains("disabled"));
    }
}
