//! Async HTTP client wrapping the launchpad JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use launchpad_core::{
  artifact::PresignedUrl,
  distribution::{Distribution, DistributionView},
  platform::Platform,
  signal::StoreStatusSignal,
  submission::{Submission, SubmissionDetails},
};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use uuid::Uuid;

/// Connection settings for the launchpad API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// Filters for `GET /distributions`.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status:    Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tenant_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit:     Option<usize>,
}

/// Async HTTP client for the launchpad JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  async fn call<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
    let resp = self.auth(req).send().await.with_context(|| format!("{what} failed"))?;
    let status = resp.status();
    let body: Value = resp
      .json()
      .await
      .with_context(|| format!("{what} → {status}: response was not JSON"))?;
    let data = unwrap_envelope(status, body).with_context(|| what.to_string())?;
    serde_json::from_value(data).with_context(|| format!("deserialising {what} response"))
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    self.client.request(method, self.url(path))
  }

  // ── Distributions ─────────────────────────────────────────────────────────

  /// `GET /api/distributions`
  pub async fn list_distributions(&self, filter: &ListFilter) -> Result<Vec<Distribution>> {
    let req = self.request(Method::GET, "/distributions").query(filter);
    self.call(req, "GET /distributions").await
  }

  /// `GET /api/distributions/:id`
  pub async fn get_distribution(&self, id: Uuid) -> Result<DistributionView> {
    let req = self.request(Method::GET, &format!("/distributions/{id}"));
    self.call(req, "GET /distributions/:id").await
  }

  /// `POST /api/distributions/:id/submissions` with a JSON body.
  pub async fn resubmit(&self, distribution_id: Uuid, body: Value) -> Result<Submission> {
    let req = self
      .request(Method::POST, &format!("/distributions/{distribution_id}/submissions"))
      .json(&body);
    self.call(req, "POST /distributions/:id/submissions").await
  }

  // ── Submissions ───────────────────────────────────────────────────────────

  /// `GET /api/submissions/:id`
  pub async fn get_submission(&self, id: Uuid) -> Result<SubmissionDetails> {
    let req = self.request(Method::GET, &format!("/submissions/{id}"));
    self.call(req, "GET /submissions/:id").await
  }

  /// `GET /api/submissions/:id/artifact`
  pub async fn artifact_url(&self, id: Uuid, platform: Platform, tenant_id: &str) -> Result<PresignedUrl> {
    let req = self
      .request(Method::GET, &format!("/submissions/{id}/artifact"))
      .query(&[("platform", platform.to_string()), ("tenantId", tenant_id.to_string())]);
    self.call(req, "GET /submissions/:id/artifact").await
  }

  /// `PUT /api/submissions/:id/submit`
  pub async fn submit(&self, id: Uuid, platform: Platform, body: Value) -> Result<Submission> {
    self.mutate(Method::PUT, id, "/submit", platform, Some(body)).await
  }

  /// `PATCH /api/submissions/:id/release`
  pub async fn release(&self, id: Uuid, platform: Platform, percent: Option<f64>) -> Result<Submission> {
    let body = json!({ "rolloutPercentage": percent });
    self.mutate(Method::PATCH, id, "/release", platform, Some(body)).await
  }

  /// `PATCH /api/submissions/:id/rollout`
  pub async fn update_rollout(&self, id: Uuid, platform: Platform, percent: f64) -> Result<Submission> {
    let body = json!({ "rolloutPercentage": percent });
    self.mutate(Method::PATCH, id, "/rollout", platform, Some(body)).await
  }

  /// `PATCH /api/submissions/:id/rollout/pause`
  pub async fn pause(&self, id: Uuid, platform: Platform, reason: &str) -> Result<Submission> {
    let body = json!({ "reason": reason });
    self.mutate(Method::PATCH, id, "/rollout/pause", platform, Some(body)).await
  }

  /// `PATCH /api/submissions/:id/rollout/halt`
  pub async fn halt(&self, id: Uuid, platform: Platform, reason: &str) -> Result<Submission> {
    let body = json!({ "reason": reason });
    self.mutate(Method::PATCH, id, "/rollout/halt", platform, Some(body)).await
  }

  /// `PATCH /api/submissions/:id/rollout/resume`
  pub async fn resume(&self, id: Uuid, platform: Platform) -> Result<Submission> {
    self.mutate(Method::PATCH, id, "/rollout/resume", platform, None).await
  }

  /// `PATCH /api/submissions/:id/cancel`
  pub async fn cancel(&self, id: Uuid, platform: Platform, reason: &str) -> Result<Submission> {
    let body = json!({ "reason": reason });
    self.mutate(Method::PATCH, id, "/cancel", platform, Some(body)).await
  }

  /// `POST /api/submissions/:id/status`
  pub async fn report_status(
    &self,
    id: Uuid,
    platform: Platform,
    signal: &StoreStatusSignal,
  ) -> Result<Submission> {
    let body = serde_json::to_value(signal).context("encoding store status")?;
    self.mutate(Method::POST, id, "/status", platform, Some(body)).await
  }

  async fn mutate(
    &self,
    method: Method,
    id: Uuid,
    suffix: &str,
    platform: Platform,
    body: Option<Value>,
  ) -> Result<Submission> {
    let what = format!("{method} /submissions/:id{suffix}");
    let mut req = self
      .request(method, &format!("/submissions/{id}{suffix}"))
      .query(&[("platform", platform.to_string())]);
    if let Some(body) = body {
      req = req.json(&body);
    }
    self.call(req, &what).await
  }
}

/// Extract `data` from a `{success, data}` envelope, turning an error
/// envelope into a readable message.
pub fn unwrap_envelope(status: StatusCode, body: Value) -> Result<Value> {
  if status.is_success() && body["success"] == true {
    return Ok(body.get("data").cloned().unwrap_or(Value::Null));
  }
  let error = &body["error"];
  let code = error["code"].as_str().unwrap_or("UNKNOWN");
  let message = error["message"].as_str().unwrap_or("no message");
  match error["details"]["field"].as_str() {
    Some(field) => Err(anyhow!("{status} {code} ({field}): {message}")),
    None => Err(anyhow!("{status} {code}: {message}")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn success_envelope_yields_data() {
    let data = unwrap_envelope(StatusCode::OK, json!({ "success": true, "data": [1, 2] })).unwrap();
    assert_eq!(data, json!([1, 2]));
  }

  #[test]
  fn error_envelope_names_code_and_field() {
    let body = json!({
      "success": false,
      "error": { "message": "must be between 0 and 100", "code": "VALIDATION_ERROR", "details": { "field": "rolloutPercentage" } }
    });
    let err = unwrap_envelope(StatusCode::BAD_REQUEST, body).unwrap_err().to_string();
    assert!(err.contains("VALIDATION_ERROR"), "{err}");
    assert!(err.contains("rolloutPercentage"), "{err}");
  }

  #[test]
  fn non_envelope_failure_is_still_an_error() {
    let err = unwrap_envelope(StatusCode::BAD_GATEWAY, json!("upstream down")).unwrap_err();
    assert!(err.to_string().contains("502"));
  }

  #[test]
  fn list_filter_skips_unset_fields() {
    let filter = ListFilter { tenant_id: Some("acme".into()), ..Default::default() };
    assert_eq!(serde_json::to_value(&filter).unwrap(), json!({ "tenantId": "acme" }));
  }
}
