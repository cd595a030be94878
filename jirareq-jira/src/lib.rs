use std::{collections::HashMap, sync::OnceLock, time::Duration};

use anyhow::{anyhow, bail, Context};
use jirareq_config::JiraSettings;
use reqwest::{
    blocking::{Client, RequestBuilder, Response},
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const SEARCH_PAGE_SIZE: usize = 200;
const ZEPHYR_REST_API: &str = "rest/zephyr/1.0";
const BASE_FIELDS: [&str; 5] = ["summary", "issuetype", "labels", "fixVersions", "description"];

#[derive(Debug, Error)]
pub enum JiraError {
    #[error("jira request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("jira rejected the credentials: status={status}")]
    Authentication { status: u16 },
    #[error("jira resource not found: status={status} body={body}")]
    NotFound { status: u16, body: String },
    #[error("jira configuration error: {0}")]
    Configuration(String),
    #[error("malformed jira response: {0}")]
    Query(String),
}

impl JiraError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Failures that the `fail_on_jira_error` switch may suppress.
    pub fn is_connection_problem(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Configuration(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomFieldValue {
    pub value: String,
    pub rendered: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IssueSummary {
    pub id: u64,
    pub key: String,
    pub summary: String,
    pub issue_type: String,
    pub labels: Vec<String>,
    pub fix_versions: Vec<String>,
    /// Keyed by field name, not field id.
    pub custom_fields: HashMap<String, CustomFieldValue>,
    pub rendered_description: String,
}

impl IssueSummary {
    pub fn custom_field(&self, name: &str) -> Option<&CustomFieldValue> {
        self.custom_fields.get(name)
    }
}

pub trait IssueClient {
    fn find_by_query(&self, jql: &str) -> Result<Vec<IssueSummary>, JiraError>;
    fn find_by_key(&self, key: &str) -> Result<Option<IssueSummary>, JiraError>;
}

impl<T: IssueClient + ?Sized> IssueClient for &T {
    fn find_by_query(&self, jql: &str) -> Result<Vec<IssueSummary>, JiraError> {
        (**self).find_by_query(jql)
    }

    fn find_by_key(&self, key: &str) -> Result<Option<IssueSummary>, JiraError> {
        (**self).find_by_key(key)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ZephyrStep {
    #[serde(rename = "htmlStep")]
    pub html_step: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ZephyrExecution {
    #[serde(rename = "executionStatus")]
    pub execution_status: String,
    #[serde(rename = "executedOn", default)]
    pub executed_on: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ZephyrStatus {
    pub name: String,
}

/// Executions are ordered most recent first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ZephyrSchedule {
    pub schedules: Vec<ZephyrExecution>,
    pub status: HashMap<String, ZephyrStatus>,
}

pub trait ZephyrSource {
    fn test_steps(&self, issue_id: u64) -> Result<Vec<ZephyrStep>, JiraError>;
    fn test_schedule(&self, issue_id: u64) -> Result<ZephyrSchedule, JiraError>;
}

impl<T: ZephyrSource + ?Sized> ZephyrSource for &T {
    fn test_steps(&self, issue_id: u64) -> Result<Vec<ZephyrStep>, JiraError> {
        (**self).test_steps(issue_id)
    }

    fn test_schedule(&self, issue_id: u64) -> Result<ZephyrSchedule, JiraError> {
        (**self).test_schedule(issue_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum AuthMode {
    Basic { user: String, password: String },
    Bearer { token: String },
    Anonymous,
}

pub struct JiraClient {
    server_url: String,
    api_url: String,
    http: Client,
    auth_mode: AuthMode,
    custom_fields: Vec<String>,
    field_ids: OnceLock<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct SearchPayload {
    #[serde(default)]
    issues: Vec<IssuePayload>,
    #[serde(default)]
    total: usize,
}

#[derive(Deserialize)]
struct IssuePayload {
    #[serde(default)]
    id: Option<String>,
    key: String,
    #[serde(default)]
    fields: IssueFields,
    #[serde(rename = "renderedFields", default)]
    rendered_fields: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct IssueFields {
    summary: Option<String>,
    issuetype: Option<NameLike>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(rename = "fixVersions", default)]
    fix_versions: Vec<NameLike>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct NameLike {
    name: Option<String>,
}

#[derive(Deserialize)]
struct FieldPayload {
    id: String,
    name: String,
}

impl JiraClient {
    pub fn from_settings(settings: &JiraSettings) -> anyhow::Result<Self> {
        let server = settings
            .jira_url
            .as_deref()
            .ok_or_else(|| anyhow!("jira url not configured"))?;
        let auth_mode = parse_auth_mode(settings)?;

        let http = Client::builder()
            .danger_accept_invalid_certs(settings.insecure)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .with_context(|| "failed to build Jira HTTP client")?;

        debug!(url = server, project = ?settings.project, user = ?settings.jira_user, "jira connection");

        Ok(Self {
            server_url: server.to_string(),
            api_url: format!("{server}/rest/api/2"),
            http,
            auth_mode,
            custom_fields: settings.requested_custom_fields(),
            field_ids: OnceLock::new(),
        })
    }

    fn search_page(&self, jql: &str, start_at: usize) -> Result<SearchPayload, JiraError> {
        let endpoint = format!("{}/search", self.api_url);
        let response = self
            .with_auth(self.http.get(endpoint))
            .query(&[
                ("jql", jql.to_string()),
                ("startAt", start_at.to_string()),
                ("maxResults", SEARCH_PAGE_SIZE.to_string()),
                ("fields", self.field_list()?),
                ("expand", "renderedFields".to_string()),
            ])
            .send()?;

        decode(check_status(response, Endpoint::Search)?)
    }

    fn field_list(&self) -> Result<String, JiraError> {
        let ids = self.field_ids()?;
        let mut fields = BASE_FIELDS.iter().map(|field| field.to_string()).collect::<Vec<_>>();
        fields.extend(ids.values().cloned());
        Ok(fields.join(","))
    }

    /// Resolves configured custom field names to JIRA field ids, once.
    fn field_ids(&self) -> Result<&HashMap<String, String>, JiraError> {
        if let Some(ids) = self.field_ids.get() {
            return Ok(ids);
        }

        let ids = if self.custom_fields.is_empty() {
            HashMap::new()
        } else {
            let endpoint = format!("{}/field", self.api_url);
            let response = self.with_auth(self.http.get(endpoint)).send()?;
            let fields: Vec<FieldPayload> = decode(check_status(response, Endpoint::Fields)?)?;
            resolve_field_ids(&self.custom_fields, fields)
        };
        Ok(self.field_ids.get_or_init(|| ids))
    }

    fn zephyr_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, JiraError> {
        let endpoint = format!("{}/{}/{}", self.server_url, ZEPHYR_REST_API, path);
        let response = self
            .with_auth(self.http.get(endpoint))
            .query(query)
            .send()?;
        decode(check_status(response, Endpoint::Zephyr)?)
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_mode {
            AuthMode::Basic { user, password } => request.basic_auth(user, Some(password)),
            AuthMode::Bearer { token } => request.bearer_auth(token),
            AuthMode::Anonymous => request,
        }
    }
}

impl IssueClient for JiraClient {
    fn find_by_query(&self, jql: &str) -> Result<Vec<IssueSummary>, JiraError> {
        debug!(jql, "jira search");
        let mut issues = Vec::new();
        let mut start_at = 0usize;

        loop {
            let page = self.search_page(jql, start_at)?;
            let page_len = page.issues.len();
            let total = page.total;
            let ids = self.field_ids()?;
            issues.extend(
                page.issues
                    .into_iter()
                    .map(|payload| into_issue_summary(payload, ids)),
            );

            match next_page_start(start_at, page_len, total) {
                Some(next) => start_at = next,
                None => break,
            }
        }

        Ok(issues)
    }

    fn find_by_key(&self, key: &str) -> Result<Option<IssueSummary>, JiraError> {
        debug!(key, "jira issue lookup");
        let endpoint = format!("{}/issue/{}", self.api_url, key);
        let response = self
            .with_auth(self.http.get(endpoint))
            .query(&[
                ("fields", self.field_list()?),
                ("expand", "renderedFields".to_string()),
            ])
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let payload: IssuePayload = decode(check_status(response, Endpoint::Issue)?)?;
        Ok(Some(into_issue_summary(payload, self.field_ids()?)))
    }
}

impl ZephyrSource for JiraClient {
    fn test_steps(&self, issue_id: u64) -> Result<Vec<ZephyrStep>, JiraError> {
        self.zephyr_get(&format!("teststep/{issue_id}"), &[])
    }

    fn test_schedule(&self, issue_id: u64) -> Result<ZephyrSchedule, JiraError> {
        self.zephyr_get("schedule", &[("issueId", issue_id.to_string())])
    }
}

/// Issue client that can swallow authentication and configuration failures.
///
/// With `fail_on_jira_error` unset those failures are logged and reported as
/// an empty search or a missing issue.
pub struct ConfigurableClient<C> {
    inner: C,
    fail_on_error: bool,
}

impl<C: IssueClient> ConfigurableClient<C> {
    pub fn new(inner: C, settings: &JiraSettings) -> Self {
        Self {
            inner,
            fail_on_error: settings.fail_on_jira_error,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn suppress<T>(&self, result: Result<T, JiraError>, fallback: T) -> Result<T, JiraError> {
        match result {
            Err(err) if err.is_connection_problem() && !self.fail_on_error => {
                error!(error = %err, "could not connect to JIRA");
                Ok(fallback)
            }
            other => other,
        }
    }
}

impl<C: IssueClient> IssueClient for ConfigurableClient<C> {
    fn find_by_query(&self, jql: &str) -> Result<Vec<IssueSummary>, JiraError> {
        self.suppress(self.inner.find_by_query(jql), Vec::new())
    }

    fn find_by_key(&self, key: &str) -> Result<Option<IssueSummary>, JiraError> {
        self.suppress(self.inner.find_by_key(key), None)
    }
}

/// The server may cap `maxResults` below the requested page size, so the
/// next page starts after what was actually returned.
fn next_page_start(start_at: usize, page_len: usize, total: usize) -> Option<usize> {
    let next = start_at + page_len;
    if page_len == 0 || next >= total {
        None
    } else {
        Some(next)
    }
}

fn parse_auth_mode(settings: &JiraSettings) -> anyhow::Result<AuthMode> {
    let Some(secret) = settings.jira_password.as_deref() else {
        return Ok(AuthMode::Anonymous);
    };

    match settings.auth_method() {
        "basic" => {
            let user = settings
                .jira_user
                .as_deref()
                .ok_or_else(|| anyhow!("jira user not configured for basic auth"))?;
            Ok(AuthMode::Basic {
                user: user.to_string(),
                password: secret.to_string(),
            })
        }
        "bearer" => Ok(AuthMode::Bearer {
            token: secret.to_string(),
        }),
        other => bail!("unsupported auth method '{}'", other),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Endpoint {
    Search,
    Issue,
    Fields,
    Zephyr,
}

impl Endpoint {
    fn label(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Issue => "issue",
            Self::Fields => "field list",
            Self::Zephyr => "zephyr",
        }
    }

    /// 400/404 on issue lookups mean the issue itself is unknown.
    fn reports_missing_issues(self) -> bool {
        matches!(self, Self::Search | Self::Issue)
    }
}

fn check_status(response: Response, endpoint: Endpoint) -> Result<Response, JiraError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(classify_status(status, endpoint, body))
}

fn classify_status(status: StatusCode, endpoint: Endpoint, body: String) -> JiraError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => JiraError::Authentication {
            status: status.as_u16(),
        },
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND if endpoint.reports_missing_issues() => {
            JiraError::NotFound {
                status: status.as_u16(),
                body,
            }
        }
        _ => JiraError::Configuration(format!(
            "{} request failed: status={} body={}",
            endpoint.label(),
            status,
            body
        )),
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T, JiraError> {
    let body = response.text()?;
    serde_json::from_str(&body).map_err(|err| JiraError::Query(err.to_string()))
}

fn resolve_field_ids(requested: &[String], fields: Vec<FieldPayload>) -> HashMap<String, String> {
    let mut ids = HashMap::new();
    for name in requested {
        match fields.iter().find(|field| &field.name == name) {
            Some(field) => {
                ids.insert(name.clone(), field.id.clone());
            }
            None => warn!(field = name.as_str(), "custom field not defined in JIRA"),
        }
    }
    ids
}

fn into_issue_summary(payload: IssuePayload, field_ids: &HashMap<String, String>) -> IssueSummary {
    let IssuePayload {
        id,
        key,
        fields,
        rendered_fields,
    } = payload;

    let custom_fields = field_ids
        .iter()
        .filter_map(|(name, id)| {
            let value = fields.extra.get(id).and_then(value_text)?;
            let rendered = rendered_fields.get(id).and_then(value_text);
            Some((name.clone(), CustomFieldValue { value, rendered }))
        })
        .collect();

    IssueSummary {
        id: id.and_then(|value| value.parse().ok()).unwrap_or_default(),
        key,
        summary: fields.summary.unwrap_or_default(),
        issue_type: fields.issuetype.and_then(|kind| kind.name).unwrap_or_default(),
        labels: fields.labels,
        fix_versions: fields
            .fix_versions
            .into_iter()
            .filter_map(|version| version.name)
            .collect(),
        custom_fields,
        rendered_description: rendered_fields
            .get("description")
            .and_then(value_text)
            .unwrap_or_default(),
    }
}

/// Plain text of a field value: strings as-is, select options by `value`,
/// arrays joined with commas.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => {
            let parts = items.iter().filter_map(value_text).collect::<Vec<_>>();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.get("name"))
            .and_then(value_text),
    }
}
