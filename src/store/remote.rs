use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    FetchResponse, GetResponse, MutationResponse, Query, RecordClient, RecordInput, StoreError,
};

/// Header carrying the project's public API key
pub const PUBLIC_KEY_HEADER: &str = "X-Apper-Public-Key";

/// Connection settings for the hosted record API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// Bearer token of the signed-in session, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_table() -> String {
    "tasks".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            project_id: String::new(),
            public_key: String::new(),
            table: default_table(),
            session_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.endpoint.trim().is_empty() {
            return Err(StoreError::Config("remote endpoint is not set".to_string()));
        }
        if self.project_id.trim().is_empty() {
            return Err(StoreError::Config("remote project_id is not set".to_string()));
        }
        Ok(())
    }

    pub fn has_session(&self) -> bool {
        self.session_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

/// Record client talking JSON over HTTP to the hosted tabular-data API
pub struct RemoteStore {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Self::with_client(config, client)
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(config: RemoteConfig, client: reqwest::Client) -> Result<Self, StoreError> {
        config.validate()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// `{endpoint}/api/v1/projects/{project}/tables/{table}/records/{extra..}`
    /// with every segment percent-encoded
    fn records_url(&self, table: &str, extra: &[&str]) -> Result<reqwest::Url, StoreError> {
        let mut url = reqwest::Url::parse(self.config.endpoint.trim())
            .map_err(|e| StoreError::Config(format!("invalid remote endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Config("remote endpoint cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "projects", self.config.project_id.as_str(), "tables", table, "records"])
            .extend(extra);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: reqwest::Url) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(PUBLIC_KEY_HEADER, &self.config.public_key);
        match self.config.session_token.as_deref() {
            Some(token) if !token.trim().is_empty() => builder.bearer_auth(token),
            _ => builder,
        }
    }

    pub fn fetch_request(&self, table: &str, query: &Query) -> Result<reqwest::Request, StoreError> {
        let url = self.records_url(table, &["query"])?;
        Ok(self.request(reqwest::Method::POST, url).json(query).build()?)
    }

    pub fn get_request(
        &self,
        table: &str,
        id: &str,
        fields: &[String],
    ) -> Result<reqwest::Request, StoreError> {
        let mut url = self.records_url(table, &[id])?;
        if !fields.is_empty() {
            url.query_pairs_mut().append_pair("fields", &fields.join(","));
        }
        Ok(self.request(reqwest::Method::GET, url).build()?)
    }

    /// POST creates, PUT updates, DELETE removes by id
    pub fn mutation_request(
        &self,
        method: reqwest::Method,
        table: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Request, StoreError> {
        let url = self.records_url(table, &[])?;
        Ok(self.request(method, url).json(body).build()?)
    }

    async fn execute(&self, req: reqwest::Request) -> Result<reqwest::Response, StoreError> {
        tracing::debug!(method = %req.method(), url = %req.url(), "remote request");
        Ok(self.client.execute(req).await?)
    }

    async fn send_mutation(
        &self,
        method: reqwest::Method,
        table: &str,
        body: serde_json::Value,
    ) -> Result<MutationResponse, StoreError> {
        let req = self.mutation_request(method, table, &body)?;
        let resp = check_response(self.execute(req).await?).await?;
        Ok(resp.json::<MutationResponse>().await?)
    }
}

/// Map HTTP failures onto store errors, passing successful responses through
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(StoreError::Unauthorized(resp.text().await.unwrap_or_default()));
    }
    if !status.is_success() {
        return Err(StoreError::Api {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

/// A 404 on a single-record read means the record is gone
pub async fn read_get_response(resp: reqwest::Response) -> Result<GetResponse, StoreError> {
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(GetResponse {
            success: true,
            data: None,
            message: None,
        });
    }
    let resp = check_response(resp).await?;
    Ok(resp.json::<GetResponse>().await?)
}

#[async_trait]
impl RecordClient for RemoteStore {
    async fn fetch_records(&self, table: &str, query: &Query) -> Result<FetchResponse, StoreError> {
        let req = self.fetch_request(table, query)?;
        let resp = check_response(self.execute(req).await?).await?;
        Ok(resp.json::<FetchResponse>().await?)
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: &str,
        fields: &[String],
    ) -> Result<GetResponse, StoreError> {
        let req = self.get_request(table, id, fields)?;
        read_get_response(self.execute(req).await?).await
    }

    async fn create_records(
        &self,
        table: &str,
        records: Vec<RecordInput>,
    ) -> Result<MutationResponse, StoreError> {
        self.send_mutation(reqwest::Method::POST, table, serde_json::json!({ "records": records }))
            .await
    }

    async fn update_records(
        &self,
        table: &str,
        records: Vec<RecordInput>,
    ) -> Result<MutationResponse, StoreError> {
        self.send_mutation(reqwest::Method::PUT, table, serde_json::json!({ "records": records }))
            .await
    }

    async fn delete_records(
        &self,
        table: &str,
        ids: Vec<String>,
    ) -> Result<MutationResponse, StoreError> {
        self.send_mutation(reqwest::Method::DELETE, table, serde_json::json!({ "RecordIds": ids }))
            .await
    }

    fn describe(&self) -> String {
        format!("remote ({})", self.config.project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_response(status: u16, body: &'static str) -> reqwest::Response {
        reqwest::Response::from(
            ::http::Response::builder()
                .status(status)
                .body(body)
                .unwrap(),
        )
    }

    fn config() -> RemoteConfig {
        RemoteConfig {
            endpoint: "https://api.example.test/".to_string(),
            project_id: "proj-1".to_string(),
            public_key: "pk".to_string(),
            ..RemoteConfig::default()
        }
    }

    fn body_json(req: &reqwest::Request) -> serde_json::Value {
        let bytes = req.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn records_url_joins_endpoint_without_double_slash() {
        let store = RemoteStore::new(config()).unwrap();
        assert_eq!(
            store.records_url("tasks", &[]).unwrap().as_str(),
            "https://api.example.test/api/v1/projects/proj-1/tables/tasks/records"
        );
    }

    #[test]
    fn url_segments_are_percent_encoded() {
        let store = RemoteStore::new(config()).unwrap();
        let req = store.get_request("my tasks", "1/../2", &[]).unwrap();
        assert_eq!(
            req.url().as_str(),
            "https://api.example.test/api/v1/projects/proj-1/tables/my%20tasks/records/1%2F..%2F2"
        );

        let fields = vec!["title".to_string(), "status".to_string()];
        let req = store.get_request("tasks", "1?x", &fields).unwrap();
        assert_eq!(req.url().path(), "/api/v1/projects/proj-1/tables/tasks/records/1%3Fx");
        assert_eq!(req.url().query(), Some("fields=title%2Cstatus"));
    }

    #[test]
    fn requests_carry_key_and_session() {
        let mut cfg = config();
        cfg.session_token = Some("tok".to_string());
        let store = RemoteStore::new(cfg).unwrap();
        let req = store.fetch_request("tasks", &Query::default()).unwrap();
        assert_eq!(req.method(), &reqwest::Method::POST);
        assert!(req.url().as_str().ends_with("/tables/tasks/records/query"));
        assert_eq!(req.headers()[PUBLIC_KEY_HEADER], "pk");
        assert_eq!(req.headers()[reqwest::header::AUTHORIZATION], "Bearer tok");

        let anonymous = RemoteStore::new(config()).unwrap();
        let req = anonymous.get_request("tasks", "7", &[]).unwrap();
        assert!(req.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[test]
    fn mutation_bodies_match_the_record_api() {
        let store = RemoteStore::new(config()).unwrap();
        let update = RecordInput {
            id: Some("7".to_string()),
            title: "Ship".to_string(),
            ..RecordInput::default()
        };
        let body = serde_json::json!({ "records": vec![update] });
        let req = store.mutation_request(reqwest::Method::PUT, "tasks", &body).unwrap();
        assert_eq!(req.method(), &reqwest::Method::PUT);
        assert!(req.url().as_str().ends_with("/tables/tasks/records"));
        let sent = body_json(&req);
        assert_eq!(sent["records"][0]["Id"], "7");
        assert_eq!(sent["records"][0]["title"], "Ship");

        let body = serde_json::json!({ "RecordIds": ["7"] });
        let req = store.mutation_request(reqwest::Method::DELETE, "tasks", &body).unwrap();
        assert_eq!(req.method(), &reqwest::Method::DELETE);
        assert_eq!(body_json(&req), serde_json::json!({ "RecordIds": ["7"] }));
    }

    #[test]
    fn unparseable_endpoint_is_a_config_error() {
        let mut cfg = config();
        cfg.endpoint = "not a url".to_string();
        let store = RemoteStore::new(cfg).unwrap();
        let err = store.fetch_request("tasks", &Query::default()).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[tokio::test]
    async fn missing_record_reads_as_empty() {
        let got = read_get_response(mock_response(404, "not found")).await.unwrap();
        assert!(got.success);
        assert!(got.data.is_none());

        let got = read_get_response(mock_response(200, r#"{"success": true, "data": {"Id": "7", "title": "Ship"}}"#))
            .await
            .unwrap();
        assert_eq!(got.data.unwrap().id, "7");

        let err = read_get_response(mock_response(401, "")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }

    #[test]
    fn new_requires_endpoint_and_project() {
        let err = RemoteStore::new(RemoteConfig::default()).err().unwrap();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn session_presence_ignores_blank_tokens() {
        let mut cfg = config();
        assert!(!cfg.has_session());
        cfg.session_token = Some("  ".to_string());
        assert!(!cfg.has_session());
        cfg.session_token = Some("abc".to_string());
        assert!(cfg.has_session());
    }

    #[tokio::test]
    async fn check_response_maps_auth_failures() {
        let err = check_response(mock_response(401, "expired")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(ref m) if m == "expired"));
        let err = check_response(mock_response(403, "")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn check_response_api_error_keeps_body() {
        let err = check_response(mock_response(500, "boom")).await.unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 500, ref message } if message == "boom"));
    }

    #[tokio::test]
    async fn check_response_success_passes_through() {
        let resp = check_response(mock_response(200, r#"{"data": []}"#)).await.unwrap();
        let parsed: FetchResponse = resp.json().await.unwrap();
        assert_eq!(parsed.data, Some(vec![]));
    }
}
