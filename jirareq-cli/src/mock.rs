use std::collections::HashMap;

use jirareq_config::JiraSettings;
use jirareq_jira::{
    IssueClient, IssueSummary, JiraError, ZephyrExecution, ZephyrSchedule, ZephyrSource,
    ZephyrStatus, ZephyrStep,
};

const MOCK_PROJECT: &str = "DEMO";

/// Demo project served from memory: one epic, two stories and a manual test.
pub struct MockJira {
    issues: Vec<IssueSummary>,
}

impl MockJira {
    pub fn new() -> Self {
        Self {
            issues: vec![
                issue(1, "DEMO-1", "Checkout", "Epic", &[], &["1.0"]),
                issue(2, "DEMO-2", "Pay by card", "Story", &[], &["1.0"]),
                issue(3, "DEMO-3", "Pay by voucher", "Story", &[], &["1.1"]),
                issue(10, "DEMO-10", "Pay with an expired card", "Test", &["DEMO-2"], &[]),
            ],
        }
    }

    fn by_key(&self, key: &str) -> Option<&IssueSummary> {
        self.issues.iter().find(|issue| issue.key == key)
    }
}

impl Default for MockJira {
    fn default() -> Self {
        Self::new()
    }
}

pub fn mock_settings() -> JiraSettings {
    JiraSettings {
        jira_url: Some("https://jira.example.com".to_string()),
        project: Some(MOCK_PROJECT.to_string()),
        ..JiraSettings::default()
    }
}

impl IssueClient for MockJira {
    fn find_by_query(&self, jql: &str) -> Result<Vec<IssueSummary>, JiraError> {
        let keys: Vec<&str> = match jql {
            "issuetype = epic and project=DEMO" => vec!["DEMO-1"],
            "'Epic Link' = DEMO-1" => vec!["DEMO-2", "DEMO-3"],
            "type=Test and project=DEMO" => vec!["DEMO-10"],
            other => other.strip_prefix("key=").into_iter().collect(),
        };
        Ok(keys
            .into_iter()
            .filter_map(|key| self.by_key(key).cloned())
            .collect())
    }

    fn find_by_key(&self, key: &str) -> Result<Option<IssueSummary>, JiraError> {
        Ok(self.by_key(key).cloned())
    }
}

impl ZephyrSource for MockJira {
    fn test_steps(&self, issue_id: u64) -> Result<Vec<ZephyrStep>, JiraError> {
        if issue_id != 10 {
            return Ok(Vec::new());
        }
        Ok(["<p>Open the checkout</p>", "<p>Enter an expired card</p>"]
            .into_iter()
            .map(|step| ZephyrStep {
                html_step: step.to_string(),
            })
            .collect())
    }

    fn test_schedule(&self, _issue_id: u64) -> Result<ZephyrSchedule, JiraError> {
        Ok(ZephyrSchedule {
            schedules: vec![ZephyrExecution {
                execution_status: "1".to_string(),
                executed_on: Some("Yesterday 04:45 PM".to_string()),
            }],
            status: HashMap::from([
                ("1".to_string(), ZephyrStatus { name: "PASS".to_string() }),
                ("2".to_string(), ZephyrStatus { name: "FAIL".to_string() }),
            ]),
        })
    }
}

fn issue(
    id: u64,
    key: &str,
    summary: &str,
    issue_type: &str,
    labels: &[&str],
    fix_versions: &[&str],
) -> IssueSummary {
    IssueSummary {
        id,
        key: key.to_string(),
        summary: summary.to_string(),
        issue_type: issue_type.to_string(),
        labels: labels.iter().map(|label| label.to_string()).collect(),
        fix_versions: fix_versions.iter().map(|version| version.to_string()).collect(),
        custom_fields: HashMap::new(),
        rendered_description: format!("<p>{summary}</p>"),
    }
}
