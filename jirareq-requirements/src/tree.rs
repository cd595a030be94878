use jirareq_config::JiraSettings;
use jirareq_domain::Requirement;
use jirareq_jira::{IssueClient, IssueSummary};
use tracing::{debug, warn};

use crate::keys::{child_issues_jql, root_requirements_jql};

/// Fetches the epics of the configured project and their descendants.
///
/// Children of a root are the issues whose first link field points at it.
/// With more than one link field configured, every child walks the chain
/// again from the first link. Query failures leave the affected requirement
/// without children; a failing root query yields an empty tree.
pub fn build_tree<C: IssueClient>(client: &C, settings: &JiraSettings) -> Vec<Requirement> {
    let Some(project_key) = settings.project.as_deref() else {
        warn!("no jira project configured, requirements tree is empty");
        return Vec::new();
    };

    let roots = match client.find_by_query(&root_requirements_jql(project_key)) {
        Ok(roots) => roots,
        Err(err) => {
            warn!(project = project_key, error = %err, "no root requirements found");
            return Vec::new();
        }
    };

    roots
        .iter()
        .filter(|issue| !is_excluded(issue, settings))
        .map(|issue| {
            let mut path = vec![issue.key.clone()];
            let children = children_of(client, settings, &issue.key, 0, &mut path);
            requirement_from(issue, settings).with_children(children)
        })
        .collect()
}

/// Maps one issue to a requirement, without children.
pub fn requirement_from(issue: &IssueSummary, settings: &JiraSettings) -> Requirement {
    let mut requirement = Requirement::named(&issue.summary)
        .with_card_number(&issue.key)
        .with_type(&issue.issue_type)
        .with_narrative(narrative_text(issue, settings))
        .with_release_versions(issue.fix_versions.clone());

    for name in &settings.custom_fields {
        if let Some(field) = issue.custom_field(name) {
            let rendered = field.rendered.as_deref().unwrap_or(&field.value);
            requirement = requirement.with_custom_field(name, &field.value, rendered);
        }
    }
    requirement
}

fn narrative_text(issue: &IssueSummary, settings: &JiraSettings) -> String {
    settings
        .custom_narrative_field
        .as_deref()
        .and_then(|name| issue.custom_field(name))
        .map(|field| field.value.clone())
        .unwrap_or_else(|| issue.rendered_description.clone())
}

/// `path` holds the keys from the root down to `parent_key`.
fn children_of<C: IssueClient>(
    client: &C,
    settings: &JiraSettings,
    parent_key: &str,
    level: usize,
    path: &mut Vec<String>,
) -> Vec<Requirement> {
    let Some(link) = settings.requirement_links.get(level) else {
        return Vec::new();
    };
    if path.len() > settings.max_requirement_depth {
        warn!(parent = parent_key, depth = path.len(), "requirement nesting too deep, children skipped");
        return Vec::new();
    }

    let jql = child_issues_jql(link, parent_key);
    debug!(jql = jql.as_str(), "fetching child requirements");
    let issues = match client.find_by_query(&jql) {
        Ok(issues) => issues,
        Err(err) => {
            warn!(parent = parent_key, error = %err, "no children found for requirement");
            return Vec::new();
        }
    };

    let has_next_level = level + 1 < settings.requirement_links.len();
    let mut children = Vec::with_capacity(issues.len());
    for issue in &issues {
        if is_excluded(issue, settings) {
            continue;
        }
        if path.contains(&issue.key) {
            warn!(parent = parent_key, child = issue.key.as_str(), "requirement cycle ignored");
            continue;
        }

        let mut child = requirement_from(issue, settings);
        if has_next_level {
            path.push(issue.key.clone());
            child = child.with_children(children_of(client, settings, &issue.key, 0, path));
            path.pop();
        }
        children.push(child);
    }
    children
}

fn is_excluded(issue: &IssueSummary, settings: &JiraSettings) -> bool {
    settings
        .exclude_requirement_label
        .as_deref()
        .is_some_and(|label| issue.labels.iter().any(|candidate| candidate == label))
}

#[cfg(test)]
mod tests {
    use jirareq_config::JiraSettings;

    use super::{build_tree, requirement_from};
    use crate::fixtures::{issue, settings, with_custom_field, FakeJira};

    const ROOTS: &str = "issuetype = epic and project=PROJ";

    #[test]
    fn builds_epic_with_linked_story() {
        let jira = FakeJira::default()
            .with_issue(issue("E1", "Checkout", "Epic"))
            .with_issue(issue("S1", "Pay by card", "Story"))
            .answering(ROOTS, &["E1"])
            .answering("'Epic Link' = E1", &["S1"]);

        let tree = build_tree(&jira, &settings());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].card_number.as_deref(), Some("E1"));
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].card_number.as_deref(), Some("S1"));
        assert!(tree[0].children[0].children.is_empty());
        // A single link field never queries below the first level.
        assert_eq!(jira.query_count("'Epic Link' = S1"), 0);
    }

    #[test]
    fn restarts_link_chain_for_every_child() {
        let jira = FakeJira::default()
            .with_issue(issue("E1", "Checkout", "Epic"))
            .with_issue(issue("S1", "Pay by card", "Story"))
            .with_issue(issue("T1", "Validate card", "Task"))
            .answering(ROOTS, &["E1"])
            .answering("'Epic Link' = E1", &["S1"])
            .answering("'Parent Link' = S1", &["T1"]);
        let settings = JiraSettings {
            requirement_links: vec!["Epic Link".to_string(), "Parent Link".to_string()],
            ..settings()
        };

        let tree = build_tree(&jira, &settings);
        let story = &tree[0].children[0];
        assert!(story.children.is_empty());
        assert_eq!(jira.query_count("'Epic Link' = S1"), 1);
        assert_eq!(jira.query_count("'Parent Link' = S1"), 0);
    }

    #[test]
    fn nests_through_the_first_link_field_again() {
        let jira = FakeJira::default()
            .with_issue(issue("E1", "Checkout", "Epic"))
            .with_issue(issue("S1", "Pay by card", "Story"))
            .with_issue(issue("T1", "Validate card", "Task"))
            .answering(ROOTS, &["E1"])
            .answering("'Epic Link' = E1", &["S1"])
            .answering("'Epic Link' = S1", &["T1"]);
        let settings = JiraSettings {
            requirement_links: vec!["Epic Link".to_string(), "Parent Link".to_string()],
            ..settings()
        };

        let tree = build_tree(&jira, &settings);
        let story = &tree[0].children[0];
        assert_eq!(story.children.len(), 1);
        assert_eq!(story.children[0].card_number.as_deref(), Some("T1"));
        assert_eq!(jira.query_count("'Epic Link' = T1"), 1);
    }

    #[test]
    fn failing_child_query_leaves_requirement_childless() {
        let jira = FakeJira::default()
            .with_issue(issue("E1", "Checkout", "Epic"))
            .with_issue(issue("E2", "Search", "Epic"))
            .with_issue(issue("S2", "Search by name", "Story"))
            .answering(ROOTS, &["E1", "E2"])
            .failing("'Epic Link' = E1")
            .answering("'Epic Link' = E2", &["S2"]);

        let tree = build_tree(&jira, &settings());
        assert_eq!(tree.len(), 2);
        assert!(tree[0].children.is_empty());
        assert_eq!(tree[1].children.len(), 1);
    }

    #[test]
    fn failing_root_query_yields_empty_tree() {
        let jira = FakeJira::default().failing(ROOTS);
        assert!(build_tree(&jira, &settings()).is_empty());
    }

    #[test]
    fn skips_cycles_and_excluded_issues() {
        let mut obsolete = issue("S9", "Old flow", "Story");
        obsolete.labels.push("obsolete".to_string());
        let jira = FakeJira::default()
            .with_issue(issue("E1", "Checkout", "Epic"))
            .with_issue(issue("S1", "Pay by card", "Story"))
            .with_issue(obsolete)
            .answering(ROOTS, &["E1"])
            .answering("'Epic Link' = E1", &["S1", "S9"])
            .answering("'Epic Link' = S1", &["E1"]);
        let settings = JiraSettings {
            requirement_links: vec!["Epic Link".to_string(), "Parent Link".to_string()],
            exclude_requirement_label: Some("obsolete".to_string()),
            ..settings()
        };

        let tree = build_tree(&jira, &settings);
        assert_eq!(tree[0].children.len(), 1);
        assert!(tree[0].children[0].children.is_empty());
    }

    #[test]
    fn stops_at_maximum_depth() {
        let jira = FakeJira::default()
            .with_issue(issue("E1", "Checkout", "Epic"))
            .with_issue(issue("S1", "Pay by card", "Story"))
            .answering(ROOTS, &["E1"])
            .answering("'Epic Link' = E1", &["S1"]);
        let settings = JiraSettings {
            max_requirement_depth: 0,
            ..settings()
        };

        let tree = build_tree(&jira, &settings);
        assert!(tree[0].children.is_empty());
        assert_eq!(jira.query_count("'Epic Link' = E1"), 0);
    }

    #[test]
    fn maps_narrative_and_custom_fields() {
        let source = with_custom_field(
            with_custom_field(
                issue("S1", "Pay by card", "Story"),
                "User Story",
                "As a buyer I pay by card",
                Some("<p>As a buyer I pay by card</p>"),
            ),
            "Risk",
            "High",
            None,
        );
        let settings = JiraSettings {
            custom_narrative_field: Some("User Story".to_string()),
            custom_fields: vec!["Risk".to_string(), "Missing".to_string()],
            ..settings()
        };

        let requirement = requirement_from(&source, &settings);
        assert_eq!(requirement.narrative, "As a buyer I pay by card");
        assert_eq!(requirement.custom_fields.len(), 1);
        let risk = requirement.custom_field("Risk").expect("risk");
        assert_eq!(risk.value, "High");
        assert_eq!(risk.rendered_value, "High");
    }

    #[test]
    fn narrative_falls_back_to_rendered_description() {
        let mut source = issue("S1", "Pay by card", "Story");
        source.fix_versions = vec!["1.0".to_string()];
        let settings = JiraSettings {
            custom_narrative_field: Some("User Story".to_string()),
            ..settings()
        };

        let requirement = requirement_from(&source, &settings);
        assert_eq!(requirement.narrative, "<p>Pay by card</p>");
        assert_eq!(requirement.release_versions, vec!["1.0"]);
        assert_eq!(requirement.requirement_type, "Story");
    }
}
