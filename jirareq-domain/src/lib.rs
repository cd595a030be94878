use chrono::NaiveDateTime;
use serde::Serialize;

pub const VERSION_TAG_TYPE: &str = "Version";
pub const DEFAULT_STORY_NAME: &str = "Manual tests";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CustomField {
    pub name: String,
    pub value: String,
    pub rendered_value: String,
}

/// One node of the requirements hierarchy, usually backed by a JIRA issue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub name: String,
    /// Issue key; `None` for synthetic root containers.
    pub card_number: Option<String>,
    #[serde(rename = "type")]
    pub requirement_type: String,
    pub narrative: String,
    pub release_versions: Vec<String>,
    pub custom_fields: Vec<CustomField>,
    pub children: Vec<Requirement>,
}

impl Requirement {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_card_number(mut self, card_number: impl Into<String>) -> Self {
        self.card_number = Some(card_number.into());
        self
    }

    pub fn with_type(mut self, requirement_type: impl Into<String>) -> Self {
        self.requirement_type = requirement_type.into();
        self
    }

    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = narrative.into();
        self
    }

    pub fn with_release_versions(mut self, versions: Vec<String>) -> Self {
        self.release_versions = versions;
        self
    }

    pub fn with_custom_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        rendered_value: impl Into<String>,
    ) -> Self {
        self.custom_fields.push(CustomField {
            name: name.into(),
            value: value.into(),
            rendered_value: rendered_value.into(),
        });
        self
    }

    pub fn with_children(mut self, children: Vec<Requirement>) -> Self {
        self.children = children;
        self
    }

    pub fn custom_field(&self, name: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|field| field.name == name)
    }

    pub fn matches_tag(&self, tag: &TestTag) -> bool {
        self.requirement_type == tag.tag_type && self.name == tag.name
    }

    pub fn as_tag(&self) -> TestTag {
        TestTag::new(self.name.clone(), self.requirement_type.clone())
    }
}

/// Depth-first pre-order: each requirement precedes its children.
pub fn flatten(requirements: &[Requirement]) -> Vec<Requirement> {
    let mut flattened = Vec::new();
    push_flattened(requirements, &mut flattened);
    flattened
}

fn push_flattened(requirements: &[Requirement], out: &mut Vec<Requirement>) {
    for requirement in requirements {
        out.push(requirement.clone());
        push_flattened(&requirement.children, out);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TestTag {
    pub name: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

impl TestTag {
    pub fn new(name: impl Into<String>, tag_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_type: tag_type.into(),
        }
    }

    pub fn version(name: impl Into<String>) -> Self {
        Self::new(name, VERSION_TAG_TYPE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestResult {
    Success,
    Failure,
    Pending,
    Skipped,
    Ignored,
}

impl TestResult {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Pending => "PENDING",
            Self::Skipped => "SKIPPED",
            Self::Ignored => "IGNORED",
        }
    }
}

/// Result and execution date of the latest run of a manual test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestRecord {
    pub result: TestResult,
    pub execution_date: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TestStep {
    pub description: String,
    pub result: TestResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Story {
    pub name: String,
}

impl Story {
    pub fn called(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub title: String,
    pub story: Story,
    pub issue_keys: Vec<String>,
    pub steps: Vec<TestStep>,
    pub start_time: Option<NaiveDateTime>,
    pub manual: bool,
}

impl TestOutcome {
    pub fn for_test_in_story(title: impl Into<String>, story: Story) -> Self {
        Self {
            title: title.into(),
            story,
            issue_keys: Vec::new(),
            steps: Vec::new(),
            start_time: None,
            manual: false,
        }
    }

    pub fn with_issues<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_issues(keys);
        self
    }

    pub fn add_issues<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            let key = key.into();
            if !self.issue_keys.contains(&key) {
                self.issue_keys.push(key);
            }
        }
    }

    pub fn record_step(&mut self, description: impl Into<String>, result: TestResult) {
        self.steps.push(TestStep {
            description: description.into(),
            result,
        });
    }

    pub fn set_start_time(&mut self, start_time: Option<NaiveDateTime>) {
        self.start_time = start_time;
    }

    pub fn clear_start_time(&mut self) {
        self.start_time = None;
    }

    pub fn as_manual_test(mut self) -> Self {
        self.manual = true;
        self
    }

    /// Overall result: failures dominate, then pending, skipped and ignored steps.
    pub fn result(&self) -> TestResult {
        if self.steps.is_empty() {
            return TestResult::Pending;
        }
        let has = |wanted: TestResult| self.steps.iter().any(|step| step.result == wanted);
        [
            TestResult::Failure,
            TestResult::Pending,
            TestResult::Skipped,
            TestResult::Ignored,
        ]
        .into_iter()
        .find(|candidate| has(*candidate))
        .unwrap_or(TestResult::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::{flatten, Requirement, Story, TestOutcome, TestResult, TestTag};

    fn node(key: &str) -> Requirement {
        Requirement::named(format!("{key} name"))
            .with_card_number(key)
            .with_type("story")
    }

    #[test]
    fn flattens_in_pre_order() {
        let tree = vec![node("R").with_children(vec![
            node("A").with_children(vec![node("C")]),
            node("B"),
        ])];

        let keys = flatten(&tree)
            .into_iter()
            .filter_map(|requirement| requirement.card_number)
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["R", "A", "C", "B"]);
    }

    #[test]
    fn flattening_empty_tree_is_empty() {
        assert!(flatten(&[]).is_empty());
    }

    #[test]
    fn requirement_matches_tag_on_type_and_name() {
        let requirement = Requirement::named("Checkout").with_type("epic");
        assert!(requirement.matches_tag(&TestTag::new("Checkout", "epic")));
        assert!(!requirement.matches_tag(&TestTag::new("Checkout", "story")));
        assert_eq!(requirement.as_tag(), TestTag::new("Checkout", "epic"));
    }

    #[test]
    fn root_container_has_no_card_number() {
        let root = Requirement::named("All");
        assert!(root.card_number.is_none());
    }

    #[test]
    fn outcome_collapses_duplicate_issue_keys() {
        let outcome = TestOutcome::for_test_in_story("login", Story::called("Manual tests"))
            .with_issues(["PROJ-1", "PROJ-2", "PROJ-1"]);
        assert_eq!(outcome.issue_keys, vec!["PROJ-1", "PROJ-2"]);
    }

    #[test]
    fn outcome_result_aggregates_steps() {
        let mut outcome = TestOutcome::for_test_in_story("login", Story::called("Login"));
        assert_eq!(outcome.result(), TestResult::Pending);

        outcome.record_step("open page", TestResult::Success);
        assert_eq!(outcome.result(), TestResult::Success);

        outcome.record_step("submit", TestResult::Ignored);
        assert_eq!(outcome.result(), TestResult::Ignored);

        outcome.record_step("check", TestResult::Failure);
        assert_eq!(outcome.result(), TestResult::Failure);
    }

    #[test]
    fn marks_outcome_as_manual() {
        let outcome =
            TestOutcome::for_test_in_story("login", Story::called("Login")).as_manual_test();
        assert!(outcome.manual);
    }
}
