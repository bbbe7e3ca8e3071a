use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

type SdkResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A failure to report against a circuit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub request_id: String,
    /// RFC 3339 timestamp. The service stamps arrival time when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_time: Option<String>,
    pub instance_id: String,
    pub resource_id: String,
}

/// The service's answer to any circuit operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitReport {
    pub circuit_key: String,
    /// One of `recorded`, `duplicate`, `opened`, `rejected_open`,
    /// `transitioned`, `unchanged`, `inspected`.
    pub outcome: String,
    pub accepted: bool,
    /// `Closed` or `Open`.
    pub state: String,
    pub window_count: usize,
    pub failure_threshold: u32,
    #[serde(default)]
    pub execution_id: Option<String>,
}

impl CircuitReport {
    pub fn is_open(&self) -> bool {
        self.state == "Open"
    }
}

pub struct BreakerClient {
    client: Client,
    base_url: String,
}

impl BreakerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Report one failure. Reporting the same `request_id` twice is harmless.
    pub async fn report_failure(&self, circuit: &str, report: &FailureReport) -> SdkResult<CircuitReport> {
        let resp = self.client
            .post(self.circuit_url(circuit, Some("add-failure"))?)
            .json(report)
            .send()
            .await?;
        Self::decode(resp).await
    }

    pub async fn open_circuit(&self, circuit: &str) -> SdkResult<CircuitReport> {
        let resp = self.client.put(self.circuit_url(circuit, Some("open"))?).send().await?;
        Self::decode(resp).await
    }

    pub async fn close_circuit(&self, circuit: &str) -> SdkResult<CircuitReport> {
        let resp = self.client.put(self.circuit_url(circuit, Some("close"))?).send().await?;
        Self::decode(resp).await
    }

    pub async fn circuit(&self, circuit: &str) -> SdkResult<CircuitReport> {
        let resp = self.client.get(self.circuit_url(circuit, None)?).send().await?;
        Self::decode(resp).await
    }

    fn circuit_url(&self, circuit: &str, action: Option<&str>) -> SdkResult<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| format!("{} cannot be a base URL", self.base_url))?
            .pop_if_empty()
            .push("circuit-breaker")
            .push(circuit)
            .extend(action);
        Ok(url)
    }

    async fn decode(resp: reqwest::Response) -> SdkResult<CircuitReport> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(format!("Breaker returned error status {}: {}", status, text).into());
        }
        Ok(serde_json::from_str(&text)?)
    }
}
