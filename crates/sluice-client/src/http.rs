use async_trait::async_trait;
use reqwest::{
    StatusCode, Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, de::DeserializeOwned};
use sluice_core::{ControlPlane, ControlPlaneError};
use sluice_model::{ExportStatusRecord, ImportJobRecord, SubmitAck, SubmitRequest, TaskId};
use tracing::{debug, trace};

use crate::{config::ClientConfig, errors::ClientError};

/// [`ControlPlane`] over the JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: reqwest::Client,
    base: Url,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ImportListing {
    #[serde(default)]
    jobs: Vec<ImportJobRecord>,
}

#[derive(Deserialize)]
struct LogLocation {
    url: String,
}

impl HttpControlPlane {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.endpoint).map_err(|e| ClientError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                reason: "not a base url".into(),
            });
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ClientError::InvalidHeader(name.to_string()))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidEndpoint {
                endpoint: self.base.to_string(),
                reason: "not a base url".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<(StatusCode, String), ClientError> {
        trace!(%url, "GET");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, ControlPlaneError> {
        let url = self.url(&["v1", "jobs"])?;
        debug!(kind = request.kind.as_str(), "submitting job");

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(ClientError::from)?;
        let status = response.status();
        let body = response.text().await.map_err(ClientError::from)?;

        decode_submit(status, &body)
    }

    async fn export_status(
        &self,
        task_id: &TaskId,
    ) -> Result<Option<ExportStatusRecord>, ControlPlaneError> {
        let url = self.url(&["v1", "exports", task_id.as_str()])?;
        let (status, body) = self.get(url).await?;
        decode_optional(status, &body)
    }

    async fn recent_imports(
        &self,
        namespace: &str,
        repository: &str,
        limit: usize,
    ) -> Result<Vec<ImportJobRecord>, ControlPlaneError> {
        let mut url = self.url(&["v1", "imports", namespace, repository, "jobs"])?;
        url.set_query(Some(&format!("limit={limit}")));

        let (status, body) = self.get(url).await?;
        let listing: Option<ImportListing> = decode_optional(status, &body)?;
        Ok(listing.map(|l| l.jobs).unwrap_or_default())
    }

    async fn import_log(
        &self,
        namespace: &str,
        repository: &str,
        task_id: &TaskId,
    ) -> Result<Option<String>, ControlPlaneError> {
        let url = self.url(&[
            "v1",
            "imports",
            namespace,
            repository,
            "jobs",
            task_id.as_str(),
            "log",
        ])?;
        let (status, body) = self.get(url).await?;
        let location: Option<LogLocation> = decode_optional(status, &body)?;
        Ok(location.map(|l| l.url))
    }
}

fn decode_submit(status: StatusCode, body: &str) -> Result<SubmitAck, ControlPlaneError> {
    if !status.is_success() {
        return Err(remote_error(status, body));
    }

    let raw: serde_json::Value = parse(body)?;
    let response: SubmitResponse = serde_json::from_value(raw.clone()).map_err(|e| {
        ControlPlaneError::from(ClientError::Decode {
            source: e,
            body: body.to_string(),
        })
    })?;

    match (response.task_id, response.error) {
        (_, Some(error)) => Err(ControlPlaneError::remote(status.as_u16(), error)),
        (Some(task_id), None) if !task_id.trim().is_empty() => Ok(SubmitAck {
            task_id: TaskId::new(task_id),
            raw,
        }),
        _ => Err(ControlPlaneError::InvalidResponse(format!(
            "submission acknowledged without a task id: {body}"
        ))),
    }
}

/// 404 means the control plane has no such record.
fn decode_optional<T>(status: StatusCode, body: &str) -> Result<Option<T>, ControlPlaneError>
where
    T: DeserializeOwned,
{
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(remote_error(status, body));
    }
    parse(body).map(Some)
}

fn parse<T>(body: &str) -> Result<T, ControlPlaneError>
where
    T: DeserializeOwned,
{
    serde_json::from_str(body).map_err(|e| {
        ClientError::Decode {
            source: e,
            body: body.to_string(),
        }
        .into()
    })
}

fn remote_error(status: StatusCode, body: &str) -> ControlPlaneError {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(alias = "message")]
        error: String,
    }

    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };
    ControlPlaneError::remote(status.as_u16(), message)
}
