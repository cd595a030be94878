use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
};

use jirareq_config::JiraSettings;
use jirareq_jira::{CustomFieldValue, IssueClient, IssueSummary, JiraError};

/// In-memory JIRA answering a fixed set of JQL queries.
#[derive(Default)]
pub struct FakeJira {
    issues: HashMap<String, IssueSummary>,
    results: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    queries: RefCell<Vec<String>>,
}

impl FakeJira {
    pub fn with_issue(mut self, issue: IssueSummary) -> Self {
        self.issues.insert(issue.key.clone(), issue);
        self
    }

    pub fn answering(mut self, jql: &str, keys: &[&str]) -> Self {
        self.results
            .insert(jql.to_string(), keys.iter().map(|key| key.to_string()).collect());
        self
    }

    pub fn failing(mut self, jql_or_key: &str) -> Self {
        self.failing.insert(jql_or_key.to_string());
        self
    }

    pub fn query_count(&self, jql: &str) -> usize {
        self.queries
            .borrow()
            .iter()
            .filter(|query| query.as_str() == jql)
            .count()
    }
}

impl IssueClient for FakeJira {
    fn find_by_query(&self, jql: &str) -> Result<Vec<IssueSummary>, JiraError> {
        self.queries.borrow_mut().push(jql.to_string());
        if self.failing.contains(jql) {
            return Err(JiraError::Query(format!("unexpected payload for {jql}")));
        }
        Ok(self
            .results
            .get(jql)
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| self.issues.get(key).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find_by_key(&self, key: &str) -> Result<Option<IssueSummary>, JiraError> {
        if self.failing.contains(key) {
            return Err(JiraError::Query(format!("unexpected payload for {key}")));
        }
        Ok(self.issues.get(key).cloned())
    }
}

pub fn issue(key: &str, summary: &str, issue_type: &str) -> IssueSummary {
    IssueSummary {
        key: key.to_string(),
        summary: summary.to_string(),
        issue_type: issue_type.to_string(),
        rendered_description: format!("<p>{summary}</p>"),
        ..IssueSummary::default()
    }
}

pub fn with_custom_field(
    mut issue: IssueSummary,
    name: &str,
    value: &str,
    rendered: Option<&str>,
) -> IssueSummary {
    issue.custom_fields.insert(
        name.to_string(),
        CustomFieldValue {
            value: value.to_string(),
            rendered: rendered.map(str::to_string),
        },
    );
    issue
}

pub fn settings() -> JiraSettings {
    JiraSettings {
        jira_url: Some("https://jira.example.com".to_string()),
        project: Some("PROJ".to_string()),
        ..JiraSettings::default()
    }
}
