//! Requirements hierarchy and tag resolution backed by JIRA issues.

mod keys;
mod provider;
mod tags;
mod tree;

pub use keys::{child_issues_jql, decode_issue_key, root_requirements_jql};
pub use provider::RequirementsProvider;
pub use tags::{IssueTagReader, RequirementIndex, MAX_ANCESTOR_DEPTH};
pub use tree::{build_tree, requirement_from};

#[cfg(test)]
pub(crate) mod fixtures;
