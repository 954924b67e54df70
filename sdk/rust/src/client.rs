use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

pub type SdkError = Box<dyn std::error::Error + Send + Sync>;

/// One journaled attempt as served by `GET /api/events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub t: String,
    pub ip: String,
    pub user: String,
    pub event: String,
    pub ua: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_fail: Option<usize>,
}

/// Result of `POST /login`: the status code plus the JSON body.
#[derive(Debug)]
pub struct LoginResult {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl LoginResult {
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }
}

#[derive(Debug, Deserialize)]
pub struct SimulateResponse {
    pub ok: bool,
    pub generated: usize,
}

pub struct GateClient {
    client: Client,
    gate_url: String,
    user_agent: Option<String>,
    forwarded_for: Option<String>,
}

impl GateClient {
    pub fn new(gate_url: &str) -> Self {
        Self {
            client: Client::new(),
            gate_url: gate_url.trim_end_matches('/').to_string(),
            user_agent: None,
            forwarded_for: None,
        }
    }

    /// Send this User-Agent with every login.
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    /// Claim this source address via X-Forwarded-For on every login.
    pub fn with_forwarded_for(mut self, source: &str) -> Self {
        self.forwarded_for = Some(source.to_string());
        self
    }

    /// Attempt a login. Non-200 outcomes are returned, not raised.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, SdkError> {
        let mut req = self
            .client
            .post(format!("{}/login", self.gate_url))
            .form(&[("username", username), ("password", password)]);
        if let Some(ua) = &self.user_agent {
            req = req.header("User-Agent", ua);
        }
        if let Some(source) = &self.forwarded_for {
            req = req.header("X-Forwarded-For", source);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.json().await?;
        Ok(LoginResult { status, body })
    }

    /// Fetch the journal, oldest first, optionally only the newest `limit`.
    pub async fn events(&self, limit: Option<usize>) -> Result<Vec<Event>, SdkError> {
        let mut req = self.client.get(format!("{}/api/events", self.gate_url));
        if let Some(limit) = limit {
            req = req.query(&[("limit", limit)]);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(format!("Gate returned error status {}: {}", status, text).into());
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// Seed `count` synthetic failures for `ip`.
    pub async fn simulate(
        &self,
        secret: &str,
        ip: &str,
        count: usize,
    ) -> Result<SimulateResponse, SdkError> {
        let resp = self
            .client
            .post(format!("{}/simulate", self.gate_url))
            .header("X-Demo-Secret", secret)
            .query(&[("ip", ip.to_string()), ("count", count.to_string())])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(format!("Gate returned error status {}: {}", status, text).into());
        }

        Ok(serde_json::from_str(&text)?)
    }

    pub async fn status(&self, secret: &str) -> Result<serde_json::Value, SdkError> {
        let resp = self
            .client
            .get(format!("{}/admin/status", self.gate_url))
            .header("X-Demo-Secret", secret)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(format!("Gate returned error status {}: {}", status, text).into());
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_without_failure_count() {
        let event: Event = serde_json::from_str(
            r#"{"t":"2024-01-01T00:00:00Z","ip":"1.2.3.4","user":"alice","event":"login_success","ua":"-"}"#,
        )
        .unwrap();
        assert_eq!(event.n_fail, None);
        assert_eq!(event.event, "login_success");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = GateClient::new("http://localhost:5000/");
        assert_eq!(client.gate_url, "http://localhost:5000");
    }
}
