use std::collections::{BTreeSet, HashMap, HashSet};

use jirareq_domain::{flatten, Requirement, TestTag};
use jirareq_jira::{IssueClient, IssueSummary};
use tracing::warn;

use crate::keys::decode_issue_key;

/// Upper bound on parent hops when collecting requirement tags.
pub const MAX_ANCESTOR_DEPTH: usize = 64;

/// Flattened requirements plus a child key -> parent position index.
#[derive(Clone, Debug, Default)]
pub struct RequirementIndex {
    flattened: Vec<Requirement>,
    parents: HashMap<String, usize>,
}

impl RequirementIndex {
    pub fn new(tree: &[Requirement]) -> Self {
        let flattened = flatten(tree);
        let mut parents = HashMap::new();
        for (position, requirement) in flattened.iter().enumerate() {
            for card_number in requirement
                .children
                .iter()
                .filter_map(|child| child.card_number.as_ref())
            {
                // First parent in pre-order wins when a key appears twice.
                parents.entry(card_number.clone()).or_insert(position);
            }
        }
        Self { flattened, parents }
    }

    pub fn flattened(&self) -> &[Requirement] {
        &self.flattened
    }

    pub fn parent_of(&self, key: &str) -> Option<&Requirement> {
        self.parents
            .get(key)
            .and_then(|position| self.flattened.get(*position))
    }

    /// Closest parent first.
    pub fn ancestors_of(&self, key: &str) -> Vec<&Requirement> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::from([key.to_string()]);
        let mut current = key.to_string();

        while ancestors.len() < MAX_ANCESTOR_DEPTH {
            let Some(parent) = self.parent_of(&current) else {
                break;
            };
            let Some(card_number) = parent.card_number.as_deref() else {
                ancestors.push(parent);
                break;
            };
            if !visited.insert(card_number.to_string()) {
                break;
            }
            ancestors.push(parent);
            current = card_number.to_string();
        }
        ancestors
    }

    pub fn find_by_tag(&self, tag: &TestTag) -> Option<&Requirement> {
        self.flattened
            .iter()
            .find(|requirement| requirement.matches_tag(tag))
    }
}

/// Resolves the tags of one issue: its own tag, one per ancestor
/// requirement and one per fix version.
pub struct IssueTagReader<'a, C> {
    client: &'a C,
    index: &'a RequirementIndex,
    project_key: &'a str,
}

impl<'a, C: IssueClient> IssueTagReader<'a, C> {
    pub fn new(client: &'a C, index: &'a RequirementIndex, project_key: &'a str) -> Self {
        Self {
            client,
            index,
            project_key,
        }
    }

    pub fn tags_for_issue(&self, issue_key: &str) -> BTreeSet<TestTag> {
        let key = decode_issue_key(issue_key, self.project_key);
        let mut tags = BTreeSet::new();

        if let Some(issue) = self.lookup(&key) {
            tags.insert(TestTag::new(issue.summary.clone(), issue.issue_type.clone()));
            tags.extend(issue.fix_versions.iter().map(TestTag::version));
        }
        tags.extend(
            self.index
                .ancestors_of(&key)
                .into_iter()
                .map(Requirement::as_tag),
        );
        tags
    }

    fn lookup(&self, key: &str) -> Option<IssueSummary> {
        match self.client.find_by_key(key) {
            Ok(Some(issue)) => Some(issue),
            Ok(None) => {
                warn!(key, "issue not found, no issue tags");
                None
            }
            Err(err) => {
                warn!(key, error = %err, "could not read tags for issue");
                None
            }
        }
    }
}
