//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::{collections::HashMap, convert::Infallible, sync::{Arc, Mutex}};

use axum::{
  Extension, Router,
  body::{Body, to_bytes},
  http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use launchpad_core::{
  artifact::{ArtifactMetadata, ArtifactStore, ArtifactUpload, PresignedUrl},
  service::SubmissionService,
};
use launchpad_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{Actor, DEFAULT_MAX_UPLOAD_BYTES, api_router};

#[derive(Default)]
struct MemoryArtifacts {
  files: Mutex<HashMap<String, ArtifactMetadata>>,
}

impl ArtifactStore for MemoryArtifacts {
  type Error = Infallible;

  async fn upload_artifact(&self, upload: ArtifactUpload) -> Result<ArtifactMetadata, Infallible> {
    let path = format!("{}/{}/{}", upload.tenant_id, upload.distribution_id, upload.file_name);
    let meta = ArtifactMetadata {
      path:         path.clone(),
      file_name:    upload.file_name,
      size_bytes:   upload.bytes.len() as u64,
      content_hash: String::new(),
    };
    self.files.lock().unwrap().insert(path, meta.clone());
    Ok(meta)
  }

  async fn artifact_metadata(&self, path: String) -> Result<Option<ArtifactMetadata>, Infallible> {
    Ok(self.files.lock().unwrap().get(&path).cloned())
  }

  async fn presigned_download_url(&self, path: String) -> Result<PresignedUrl, Infallible> {
    Ok(PresignedUrl {
      url:        format!("https://downloads.test/{path}"),
      expires_at: Utc::now() + Duration::minutes(5),
    })
  }
}

/// An API router with every request authenticated as `alice`.
async fn app() -> Router { app_with_upload_limit(DEFAULT_MAX_UPLOAD_BYTES).await }

async fn app_with_upload_limit(max_upload_bytes: usize) -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let service = SubmissionService::new(Arc::new(store), Arc::new(MemoryArtifacts::default()));
  api_router(service, max_upload_bytes).layer(Extension(Actor("alice".into())))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      req = req.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
  let status = res.status();
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, value)
}

async fn create_distribution(app: &Router, platforms: &[&str]) -> Value {
  let targets: Vec<Value> = platforms
    .iter()
    .map(|p| json!({ "platform": p, "version": "2.0.0", "versionCode": 200, "testflightNumber": "51" }))
    .collect();
  let (status, body) = send(
    app,
    Method::POST,
    "/distributions",
    Some(json!({
      "releaseId": "6f1c2a8e-8d8f-4a55-9d1e-0c6c4a9d2f10",
      "tenantId": "acme",
      "targets": targets,
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["data"].clone()
}

fn submission_id(view: &Value, platform: &str) -> String {
  view["submissions"]
    .as_array()
    .unwrap()
    .iter()
    .find(|s| s["platform"] == platform)
    .map(|s| s["submissionId"].as_str().unwrap().to_owned())
    .unwrap()
}

fn android_submit() -> Value {
  json!({
    "artifactPath": "acme/app.aab",
    "releaseNotes": "Faster startup",
    "rolloutPercent": 10,
    "inAppPriority": 1
  })
}

#[tokio::test]
async fn create_and_fetch_distribution() {
  let app = app().await;
  let view = create_distribution(&app, &["ANDROID", "IOS"]).await;
  assert_eq!(view["distribution"]["status"], "PENDING");
  assert_eq!(view["submissions"].as_array().unwrap().len(), 2);

  let id = view["distribution"]["distributionId"].as_str().unwrap();
  let (status, body) = send(&app, Method::GET, &format!("/distributions/{id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], true);
  assert_eq!(body["data"]["distribution"]["tenantId"], "acme");

  let (status, body) = send(&app, Method::GET, "/distributions?tenantId=acme", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn submit_approve_release_and_roll_out() {
  let app = app().await;
  let view = create_distribution(&app, &["ANDROID"]).await;
  let id = submission_id(&view, "ANDROID");

  let (status, body) = send(
    &app,
    Method::PUT,
    &format!("/submissions/{id}/submit?platform=ANDROID"),
    Some(android_submit()),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["status"], "IN_REVIEW");

  let (status, _) = send(
    &app,
    Method::POST,
    &format!("/submissions/{id}/status?platform=ANDROID"),
    Some(json!({ "storeStatus": "APPROVED" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) = send(
    &app,
    Method::PATCH,
    &format!("/submissions/{id}/release?platform=ANDROID"),
    Some(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["status"], "LIVE");
  assert_eq!(body["data"]["rolloutPercentage"], 10.0);

  let (status, body) = send(
    &app,
    Method::PATCH,
    &format!("/submissions/{id}/rollout?platform=ANDROID"),
    Some(json!({ "rolloutPercentage": 25 })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["rolloutPercentage"], 25.0);

  let (status, body) = send(
    &app,
    Method::PATCH,
    &format!("/submissions/{id}/rollout/halt?platform=ANDROID"),
    Some(json!({ "reason": "ANR spike" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["status"], "HALTED");

  let (status, body) = send(
    &app,
    Method::PATCH,
    &format!("/submissions/{id}/rollout/resume?platform=ANDROID"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["status"], "LIVE");

  let (_, body) = send(&app, Method::GET, &format!("/submissions/{id}"), None).await;
  let actions: Vec<&str> = body["data"]["history"]
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["action"].as_str().unwrap())
    .collect();
  assert_eq!(actions, [
    "SUBMITTED",
    "APPROVED",
    "RELEASED",
    "ROLLOUT_UPDATED",
    "HALTED",
    "RESUMED"
  ]);
  assert!(body["data"]["history"].as_array().unwrap().iter().all(|e| e["actor"] == "alice"));
}

#[tokio::test]
async fn validation_errors_carry_the_field() {
  let app = app().await;
  let view = create_distribution(&app, &["ANDROID"]).await;
  let id = submission_id(&view, "ANDROID");

  let (status, body) = send(
    &app,
    Method::PUT,
    &format!("/submissions/{id}/submit?platform=ANDROID"),
    Some(json!({ "releaseNotes": "x", "rolloutPercent": 10 })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["success"], false);
  assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
  assert_eq!(body["error"]["details"]["field"], "artifactPath");

  let (status, body) = send(
    &app,
    Method::PUT,
    &format!("/submissions/{id}/submit?platform=IOS"),
    Some(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"]["details"]["field"], "platform");
}

#[tokio::test]
async fn invalid_transition_is_a_conflict() {
  let app = app().await;
  let view = create_distribution(&app, &["IOS"]).await;
  let id = submission_id(&view, "IOS");

  let (status, body) = send(
    &app,
    Method::PATCH,
    &format!("/submissions/{id}/rollout/pause?platform=IOS"),
    Some(json!({ "reason": "bug" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn unknown_ids_and_bad_paths() {
  let app = app().await;
  let (status, body) = send(
    &app,
    Method::GET,
    "/submissions/00000000-0000-0000-0000-000000000000",
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"]["code"], "NOT_FOUND");

  let (status, body) = send(&app, Method::GET, "/submissions/not-a-uuid", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"]["details"]["field"], "path");
}

#[tokio::test]
async fn mutations_require_an_actor() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let service = SubmissionService::new(Arc::new(store), Arc::new(MemoryArtifacts::default()));
  let anonymous = api_router(service, DEFAULT_MAX_UPLOAD_BYTES);

  let (status, body) = send(
    &anonymous,
    Method::POST,
    "/distributions",
    Some(json!({ "releaseId": "6f1c2a8e-8d8f-4a55-9d1e-0c6c4a9d2f10", "tenantId": "acme", "targets": [] })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn multipart_resubmission_uploads_the_artifact() {
  let app = app().await;
  let view = create_distribution(&app, &["ANDROID"]).await;
  let dist_id = view["distribution"]["distributionId"].as_str().unwrap().to_owned();
  let id = submission_id(&view, "ANDROID");

  send(&app, Method::PUT, &format!("/submissions/{id}/submit?platform=ANDROID"), Some(android_submit())).await;
  let (status, _) = send(
    &app,
    Method::POST,
    &format!("/submissions/{id}/status?platform=ANDROID"),
    Some(json!({ "storeStatus": "REJECTED", "reason": "Policy violation" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let boundary = "launchpad-boundary";
  let payload = json!({
    "platform": "ANDROID",
    "version": "2.0.1",
    "releaseNotes": "Policy fix",
    "rolloutPercent": 5
  });
  let body = format!(
    "--{boundary}\r\n\
     Content-Disposition: form-data; name=\"payload\"\r\n\r\n\
     {payload}\r\n\
     --{boundary}\r\n\
     Content-Disposition: form-data; name=\"artifact\"; filename=\"app.aab\"\r\n\
     Content-Type: application/octet-stream\r\n\r\n\
     AAB-BYTES\r\n\
     --{boundary}--\r\n"
  );
  let req = Request::builder()
    .method(Method::POST)
    .uri(format!("/distributions/{dist_id}/submissions"))
    .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
    .body(Body::from(body))
    .unwrap();
  let res = app.clone().oneshot(req).await.unwrap();
  let status = res.status();
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert_eq!(body["data"]["status"], "IN_REVIEW");
  assert_eq!(body["data"]["version"], "2.0.1");
  assert_eq!(body["data"]["artifactPath"], format!("acme/{dist_id}/app.aab"));

  let new_id = body["data"]["submissionId"].as_str().unwrap();
  let (_, details) = send(&app, Method::GET, &format!("/submissions/{new_id}"), None).await;
  assert_eq!(details["data"]["artifact"]["sizeBytes"], 9);

  let (_, rows) = send(
    &app,
    Method::GET,
    &format!("/distributions/{dist_id}/submissions?platform=ANDROID"),
    None,
  )
  .await;
  assert_eq!(rows["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn oversized_resubmission_is_payload_too_large() {
  let app = app_with_upload_limit(1024).await;
  let view = create_distribution(&app, &["ANDROID"]).await;
  let dist_id = view["distribution"]["distributionId"].as_str().unwrap().to_owned();

  let boundary = "launchpad-boundary";
  let artifact = "A".repeat(4096);
  let body = format!(
    "--{boundary}\r\n\
     Content-Disposition: form-data; name=\"payload\"\r\n\r\n\
     {{\"platform\":\"ANDROID\",\"version\":\"2.0.1\",\"rolloutPercent\":5}}\r\n\
     --{boundary}\r\n\
     Content-Disposition: form-data; name=\"artifact\"; filename=\"app.aab\"\r\n\
     Content-Type: application/octet-stream\r\n\r\n\
     {artifact}\r\n\
     --{boundary}--\r\n"
  );
  let req = Request::builder()
    .method(Method::POST)
    .uri(format!("/distributions/{dist_id}/submissions"))
    .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
    .body(Body::from(body))
    .unwrap();
  let res = app.clone().oneshot(req).await.unwrap();
  let status = res.status();
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{body}");
  assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");

  let (status, body) = send(
    &app,
    Method::POST,
    &format!("/distributions/{dist_id}/submissions"),
    Some(json!({ "platform": "ANDROID", "version": "2.0.1", "releaseNotes": "A".repeat(4096) })),
  )
  .await;
  assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{body}");

  // Other routes keep their own limit.
  let (status, _) = send(&app, Method::GET, &format!("/distributions/{dist_id}"), None).await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn artifact_url_is_tenant_scoped() {
  let app = app().await;
  let view = create_distribution(&app, &["ANDROID"]).await;
  let id = submission_id(&view, "ANDROID");
  send(&app, Method::PUT, &format!("/submissions/{id}/submit?platform=ANDROID"), Some(android_submit())).await;

  let (status, body) = send(
    &app,
    Method::GET,
    &format!("/submissions/{id}/artifact?platform=ANDROID&tenantId=acme"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["url"], "https://downloads.test/acme/app.aab");

  let (status, _) = send(
    &app,
    Method::GET,
    &format!("/submissions/{id}/artifact?platform=ANDROID&tenantId=globex"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
