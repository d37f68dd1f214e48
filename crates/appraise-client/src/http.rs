//! HTTP backend against the evaluation REST service.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use appraise_core::comparison::ComparisonReport;
use appraise_core::error::ApiError;
use appraise_core::instance::Instance;
use appraise_core::model::{Answer, Template};
use appraise_core::traits::EvaluationApi;

use crate::config::AppraiseConfig;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// REST client for the evaluation service.
///
/// Carries a bearer access token and, when a refresh token is present,
/// transparently renews an expired session: on a 401 the token refresh
/// endpoint is called once and the original request retried once.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    access_token: Mutex<String>,
    refresh_token: Option<String>,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct MeetingBody {
    fecha_reunion: NaiveDate,
}

#[derive(Serialize)]
struct FeedbackBody<'a> {
    retroalimentacion: &'a str,
}

#[derive(Serialize)]
struct ObservationBody<'a> {
    motivo_denegacion: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(alias = "detail", alias = "error")]
    message: String,
}

impl HttpBackend {
    pub fn new(config: &AppraiseConfig) -> anyhow::Result<Self> {
        let timeout = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            access_token: Mutex::new(config.access_token.clone().unwrap_or_default()),
            refresh_token: config.refresh_token.clone(),
            timeout_secs: timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> String {
        self.access_token.lock().unwrap().clone()
    }

    /// Type a transport failure, reporting the configured timeout.
    fn map_transport(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout_secs)
        } else {
            ApiError::NetworkError(e.to_string())
        }
    }

    async fn refresh_access_token(&self) -> Result<(), ApiError> {
        let refresh = self.refresh_token.as_deref().ok_or_else(|| {
            ApiError::AuthenticationFailed("no refresh token configured".into())
        })?;

        let response = self
            .client
            .post(self.url("/api/token/refresh/"))
            .json(&RefreshBody { refresh })
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::AuthenticationFailed(body));
        }
        let renewed: RefreshResponse = response.json().await.map_err(|e| ApiError::ApiError {
            status: 0,
            message: format!("failed to parse token refresh response: {e}"),
        })?;
        *self.access_token.lock().unwrap() = renewed.access;
        Ok(())
    }

    /// Send a request, renewing the session once on a 401.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut refreshed = false;
        loop {
            let mut request = self
                .client
                .request(method.clone(), self.url(path))
                .bearer_auth(self.bearer());
            if let Some(json) = &body {
                request = request.json(json);
            }
            let response = request.send().await.map_err(|e| self.map_transport(e))?;

            if response.status() == StatusCode::UNAUTHORIZED && !refreshed {
                self.refresh_access_token().await?;
                refreshed = true;
                continue;
            }
            return check_status(response).await;
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let response = self.send(Method::GET, path, None).await?;
        Ok(parse_json(response).await?)
    }

    async fn post_instance(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> anyhow::Result<Instance> {
        let response = self.send(Method::POST, path, body).await?;
        Ok(parse_json(response).await?)
    }
}


async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);

    Err(match code {
        401 => ApiError::AuthenticationFailed(message),
        404 => ApiError::NotFound(message),
        // The service reports rejected transitions as 409 or, in older
        // deployments, as 400 with a detail message.
        400 | 409 => ApiError::Conflict(message),
        _ => ApiError::ApiError {
            status: code,
            message,
        },
    })
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    response.json().await.map_err(|e| ApiError::ApiError {
        status: 0,
        message: format!("failed to parse response: {e}"),
    })
}

#[async_trait]
impl EvaluationApi for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_template(&self, template_id: u64) -> anyhow::Result<Template> {
        self.get_json(&format!("/api/tipos-evaluacion/{template_id}/"))
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_instance(&self, instance_id: u64) -> anyhow::Result<Instance> {
        self.get_json(&format!("/api/evaluaciones/{instance_id}/"))
            .await
    }

    #[instrument(skip(self, answers), fields(count = answers.len()))]
    async fn save_answers(&self, instance_id: u64, answers: &[Answer]) -> anyhow::Result<Instance> {
        let body = serde_json::json!({ "respuestas": answers });
        let response = self
            .send(
                Method::PATCH,
                &format!("/api/evaluaciones/{instance_id}/"),
                Some(body),
            )
            .await?;
        Ok(parse_json(response).await?)
    }

    #[instrument(skip(self, instance), fields(instance_id = instance.id))]
    async fn replace_instance(&self, instance: &Instance) -> anyhow::Result<Instance> {
        let response = self
            .send(
                Method::PUT,
                &format!("/api/evaluaciones/{}/", instance.id),
                Some(serde_json::to_value(instance)?),
            )
            .await?;
        Ok(parse_json(response).await?)
    }

    #[instrument(skip(self))]
    async fn mark_meeting_held(
        &self,
        instance_id: u64,
        meeting_date: NaiveDate,
    ) -> anyhow::Result<Instance> {
        self.post_instance(
            &format!("/api/evaluaciones/{instance_id}/marcar_reunion_realizada/"),
            Some(serde_json::to_value(MeetingBody {
                fecha_reunion: meeting_date,
            })?),
        )
        .await
    }

    #[instrument(skip(self, text))]
    async fn complete_feedback(&self, instance_id: u64, text: &str) -> anyhow::Result<Instance> {
        self.post_instance(
            &format!("/api/evaluaciones/{instance_id}/completar_retroalimentacion/"),
            Some(serde_json::to_value(FeedbackBody {
                retroalimentacion: text,
            })?),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn close_for_signature(&self, instance_id: u64) -> anyhow::Result<Instance> {
        self.post_instance(
            &format!("/api/evaluaciones/{instance_id}/cerrar_para_firma/"),
            None,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn sign(&self, instance_id: u64) -> anyhow::Result<Instance> {
        self.post_instance(&format!("/api/evaluaciones/{instance_id}/firmar/"), None)
            .await
    }

    #[instrument(skip(self, reason))]
    async fn sign_with_observation(
        &self,
        instance_id: u64,
        reason: &str,
    ) -> anyhow::Result<Instance> {
        self.post_instance(
            &format!("/api/evaluaciones/{instance_id}/firmar_obs/"),
            Some(serde_json::to_value(ObservationBody {
                motivo_denegacion: reason,
            })?),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_comparison(&self, detail_id: u64) -> anyhow::Result<ComparisonReport> {
        self.get_json(&format!("/api/evaluacion-mixta/{detail_id}/"))
            .await
    }

    #[instrument(skip(self))]
    async fn export_document(&self, instance_id: u64) -> anyhow::Result<Vec<u8>> {
        let response = self
            .send(
                Method::GET,
                &format!("/api/evaluaciones/{instance_id}/generar_pdf/"),
                None,
            )
            .await?;
        let bytes = response.bytes().await.map_err(|e| ApiError::ApiError {
            status: 0,
            message: format!("failed to read document body: {e}"),
        })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appraise_core::model::PersonRef;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(&AppraiseConfig {
            base_url: server.uri(),
            access_token: Some("tok-1".into()),
            refresh_token: Some("ref-1".into()),
            timeout_secs: Some(5),
        })
        .unwrap()
    }

    fn instance_json(id: u64) -> serde_json::Value {
        serde_json::to_value(Instance::new(
            id,
            "06-2026",
            PersonRef {
                id: 1,
                first_name: "Ana".into(),
                last_name: "Rojas".into(),
                email: None,
            },
            &Template {
                id: 1,
                name: "Anual".into(),
                areas: vec![],
            },
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/evaluaciones/7/"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_json(7)))
            .expect(1)
            .mount(&server)
            .await;

        let fetched = backend(&server).fetch_instance(7).await.unwrap();
        assert_eq!(fetched.id, 7);
    }

    #[tokio::test]
    async fn meeting_date_sent_with_wire_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/evaluaciones/7/marcar_reunion_realizada/"))
            .and(body_json(serde_json::json!({ "fecha_reunion": "2026-06-15" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_json(7)))
            .expect(1)
            .mount(&server)
            .await;

        let date = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        backend(&server).mark_meeting_held(7, date).await.unwrap();
    }

    #[tokio::test]
    async fn refreshes_once_on_401_and_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/evaluaciones/7/"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .and(body_json(serde_json::json!({ "refresh": "ref-1" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access": "tok-2" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/evaluaciones/7/"))
            .and(header("authorization", "Bearer tok-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_json(7)))
            .expect(1)
            .mount(&server)
            .await;

        let fetched = backend(&server).fetch_instance(7).await.unwrap();
        assert_eq!(fetched.id, 7);
    }

    #[tokio::test]
    async fn second_401_fails_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/evaluaciones/7/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token/refresh/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access": "tok-2" })),
            )
            .mount(&server)
            .await;

        let err = backend(&server).fetch_instance(7).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn rejected_transition_maps_to_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/evaluaciones/7/cerrar_para_firma/"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "detail": "la evaluacion ya esta cerrada para firma"
            })))
            .mount(&server)
            .await;

        let err = backend(&server).close_for_signature(7).await.unwrap_err();
        let api = err.downcast_ref::<ApiError>().unwrap();
        assert!(api.is_conflict());
    }

    #[tokio::test]
    async fn not_found_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/evaluaciones/999/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = backend(&server).fetch_instance(999).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn observation_reason_sent_with_wire_name() {
        let server = MockServer::start().await;
        let reason = "x".repeat(50);
        Mock::given(method("POST"))
            .and(path("/api/evaluaciones/7/firmar_obs/"))
            .and(body_json(
                serde_json::json!({ "motivo_denegacion": reason }),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_json(7)))
            .expect(1)
            .mount(&server)
            .await;

        backend(&server)
            .sign_with_observation(7, &reason)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn timeout_reports_the_configured_seconds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/evaluaciones/7/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(instance_json(7))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&AppraiseConfig {
            base_url: server.uri(),
            access_token: Some("tok-1".into()),
            refresh_token: None,
            timeout_secs: Some(1),
        })
        .unwrap();

        let err = backend.fetch_instance(7).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::Timeout(1))
        ));
    }

    #[tokio::test]
    async fn export_returns_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/evaluaciones/7/generar_pdf/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 fake".to_vec()),
            )
            .mount(&server)
            .await;

        let bytes = backend(&server).export_document(7).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
