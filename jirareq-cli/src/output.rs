use std::{collections::BTreeSet, fmt::Write};

use jirareq_domain::{Requirement, TestOutcome, TestTag};

pub fn render_tree(requirements: &[Requirement]) -> String {
    let mut out = String::new();
    push_tree(requirements, 0, &mut out);
    out
}

fn push_tree(requirements: &[Requirement], depth: usize, out: &mut String) {
    for requirement in requirements {
        let _ = writeln!(
            out,
            "{}{} [{}] {}{}",
            "  ".repeat(depth),
            requirement.card_number.as_deref().unwrap_or("-"),
            requirement.requirement_type,
            requirement.name,
            versions_suffix(&requirement.release_versions),
        );
        push_tree(&requirement.children, depth + 1, out);
    }
}

pub fn render_requirement(requirement: Option<&Requirement>) -> String {
    match requirement {
        Some(requirement) => render_tree(std::slice::from_ref(requirement)),
        None => "no matching requirement\n".to_string(),
    }
}

pub fn render_tags(tags: &BTreeSet<TestTag>) -> String {
    if tags.is_empty() {
        return "no tags\n".to_string();
    }
    tags.iter()
        .map(|tag| format!("{}: {}\n", tag.tag_type, tag.name))
        .collect()
}

pub fn render_outcomes(outcomes: &[TestOutcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        let started = outcome
            .start_time
            .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{} [{}] story={} issues={} started={}",
            outcome.title,
            outcome.result().as_str(),
            outcome.story.name,
            join_or_dash(&outcome.issue_keys),
            started,
        );
        for step in &outcome.steps {
            let _ = writeln!(out, "  {} {}", step.result.as_str(), step.description);
        }
    }
    out
}

fn versions_suffix(versions: &[String]) -> String {
    if versions.is_empty() {
        return String::new();
    }
    format!(" ({})", versions.join(", "))
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        return "-".to_string();
    }
    values.join(",")
}
