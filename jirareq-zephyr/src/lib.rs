//! Manual test results read from the Zephyr add-on for JIRA.

mod date;

use anyhow::{Context, Result};
use jirareq_config::JiraSettings;
use jirareq_domain::{Story, TestOutcome, TestRecord, TestResult, DEFAULT_STORY_NAME};
use jirareq_jira::{IssueClient, IssueSummary, ZephyrSchedule, ZephyrSource};
use tracing::debug;

pub use date::ZephyrDateParser;

const TEST_STATUS_MAP: [(&str, TestResult); 5] = [
    ("PASS", TestResult::Success),
    ("FAIL", TestResult::Failure),
    ("WIP", TestResult::Pending),
    ("BLOCKED", TestResult::Skipped),
    ("UNEXECUTED", TestResult::Ignored),
];

/// Zephyr status names outside the fixed table count as pending.
pub fn test_result_from(status_name: &str) -> TestResult {
    TEST_STATUS_MAP
        .iter()
        .find(|(name, _)| *name == status_name)
        .map(|(_, result)| *result)
        .unwrap_or(TestResult::Pending)
}

pub struct ZephyrAdaptor<C> {
    client: C,
    project_key: String,
    parser: ZephyrDateParser,
}

impl<C: IssueClient + ZephyrSource> ZephyrAdaptor<C> {
    pub fn new(client: C, settings: &JiraSettings) -> Result<Self> {
        Ok(Self {
            client,
            project_key: settings.project_key()?.to_string(),
            parser: ZephyrDateParser::today(),
        })
    }

    pub fn with_date_parser(mut self, parser: ZephyrDateParser) -> Self {
        self.parser = parser;
        self
    }

    /// One manual outcome per `Test` issue of the project.
    pub fn load_outcomes(&self) -> Result<Vec<TestOutcome>> {
        let jql = format!("type=Test and project={}", self.project_key);
        let manual_tests = self
            .client
            .find_by_query(&jql)
            .with_context(|| format!("failed to load manual tests for {}", self.project_key))?;
        debug!(count = manual_tests.len(), "zephyr manual tests found");

        manual_tests
            .iter()
            .map(|issue| {
                self.outcome_from(issue)
                    .with_context(|| format!("failed to read zephyr results for {}", issue.key))
            })
            .collect()
    }

    fn outcome_from(&self, issue: &IssueSummary) -> Result<TestOutcome> {
        let associated = self.issues_matching_labels(issue)?;
        let mut outcome = TestOutcome::for_test_in_story(&issue.summary, story_from(&associated))
            .with_issues(associated.iter().map(|linked| linked.key.clone()));
        self.add_test_steps(&mut outcome, issue.id)?;
        Ok(outcome.as_manual_test())
    }

    /// Test issues reference the issues they cover through labels holding issue keys.
    fn issues_matching_labels(&self, issue: &IssueSummary) -> Result<Vec<IssueSummary>> {
        let mut matching = Vec::new();
        for label in &issue.labels {
            match self.client.find_by_query(&format!("key={label}")) {
                Ok(issues) => matching.extend(issues),
                Err(err) if err.is_not_found() => {
                    debug!(label = label.as_str(), "label is not an issue key");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(matching)
    }

    fn add_test_steps(&self, outcome: &mut TestOutcome, issue_id: u64) -> Result<()> {
        let steps = self.client.test_steps(issue_id)?;

        outcome.clear_start_time();
        for step in steps {
            let record = self.test_record_for(issue_id)?;
            outcome.record_step(step.html_step, record.result);
            outcome.set_start_time(record.execution_date);
        }
        Ok(())
    }

    fn test_record_for(&self, issue_id: u64) -> Result<TestRecord> {
        let schedule = self.client.test_schedule(issue_id)?;
        latest_record(&schedule, &self.parser)
    }
}

fn latest_record(schedule: &ZephyrSchedule, parser: &ZephyrDateParser) -> Result<TestRecord> {
    let Some(latest) = schedule.schedules.first() else {
        return Ok(TestRecord {
            result: TestResult::Pending,
            execution_date: None,
        });
    };

    let result = schedule
        .status
        .get(&latest.execution_status)
        .map(|status| test_result_from(&status.name))
        .unwrap_or(TestResult::Pending);
    let execution_date = match latest.executed_on.as_deref().map(str::trim) {
        Some(date) if !date.is_empty() => Some(parser.parse(date)?),
        _ => None,
    };

    Ok(TestRecord {
        result,
        execution_date,
    })
}

fn story_from(associated: &[IssueSummary]) -> Story {
    associated
        .first()
        .map(|issue| Story::called(&issue.summary))
        .unwrap_or_else(|| Story::called(DEFAULT_STORY_NAME))
}
