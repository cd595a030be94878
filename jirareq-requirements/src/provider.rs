use std::{collections::BTreeSet, sync::OnceLock};

use anyhow::{Context, Result};
use jirareq_config::JiraSettings;
use jirareq_domain::{Requirement, TestOutcome, TestTag};
use jirareq_jira::{ConfigurableClient, IssueClient};
use tracing::debug;

use crate::{
    keys::decode_issue_key,
    tags::{IssueTagReader, RequirementIndex},
    tree::{build_tree, requirement_from},
};

struct RequirementTree {
    roots: Vec<Requirement>,
    index: RequirementIndex,
}

/// Requirements and tags for test outcomes, read from a JIRA project.
///
/// The tree is fetched on first use and then kept for the lifetime of the
/// provider.
pub struct RequirementsProvider<C> {
    client: ConfigurableClient<C>,
    settings: JiraSettings,
    project_key: String,
    tree: OnceLock<RequirementTree>,
}

impl<C: IssueClient> RequirementsProvider<C> {
    pub fn new(client: C, settings: JiraSettings) -> Result<Self> {
        let project_key = settings.project_key()?.to_string();
        debug!(
            url = ?settings.jira_url,
            project = project_key.as_str(),
            user = ?settings.jira_user,
            "jira requirements provider"
        );

        Ok(Self {
            client: ConfigurableClient::new(client, &settings),
            settings,
            project_key,
            tree: OnceLock::new(),
        })
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.tree().roots
    }

    pub fn flattened_requirements(&self) -> &[Requirement] {
        self.tree().index.flattened()
    }

    pub fn requirement_for(&self, tag: &TestTag) -> Option<&Requirement> {
        self.tree().index.find_by_tag(tag)
    }

    /// Requirement for the first issue of the outcome, without children.
    ///
    /// Unknown issues give `Ok(None)`; any other lookup failure is an error.
    pub fn parent_requirement_of(&self, outcome: &TestOutcome) -> Result<Option<Requirement>> {
        let Some(first_key) = outcome.issue_keys.first() else {
            return Ok(None);
        };

        let key = decode_issue_key(first_key, &self.project_key);
        match self.client.find_by_key(&key) {
            Ok(issue) => Ok(issue.map(|issue| requirement_from(&issue, &self.settings))),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to look up issue {key}")),
        }
    }

    pub fn tags_for(&self, outcome: &TestOutcome) -> BTreeSet<TestTag> {
        let reader = IssueTagReader::new(&self.client, &self.tree().index, &self.project_key);
        outcome
            .issue_keys
            .iter()
            .flat_map(|key| reader.tags_for_issue(key))
            .collect()
    }

    fn tree(&self) -> &RequirementTree {
        self.tree.get_or_init(|| {
            let roots = build_tree(&self.client, &self.settings);
            let index = RequirementIndex::new(&roots);
            debug!(
                roots = roots.len(),
                total = index.flattened().len(),
                "requirements tree loaded"
            );
            RequirementTree { roots, index }
        })
    }
}
