use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

pub const DEFAULT_REQUIREMENT_LINK: &str = "Epic Link";
pub const DEFAULT_MAX_REQUIREMENT_DEPTH: usize = 10;

const PROP_URL: &str = "jira.url";
const PROP_USER: &str = "jira.username";
const PROP_PASSWORD: &str = "jira.password";
const PROP_PROJECT: &str = "jira.project";
const PROP_NARRATIVE_FIELD: &str = "jira.custom.narrative.field";
const PROP_CUSTOM_FIELD: &str = "jira.custom.field";
const PROP_EXCLUDE_LABEL: &str = "jira.exclude.requirement.label";
const PROP_REQUIREMENT_LINKS: &str = "jira.requirement.links";
const PROP_FAIL_ON_ERROR: &str = "thucydides.fail.on.jira.error";

/// Connection and requirements settings shared by every component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JiraSettings {
    pub jira_url: Option<String>,
    pub jira_user: Option<String>,
    pub jira_password: Option<String>,
    pub auth_method: Option<String>,
    pub insecure: bool,
    pub project: Option<String>,
    /// Link fields walked from a root issue downwards, one per nesting level.
    pub requirement_links: Vec<String>,
    pub custom_narrative_field: Option<String>,
    pub custom_fields: Vec<String>,
    pub exclude_requirement_label: Option<String>,
    pub fail_on_jira_error: bool,
    pub max_requirement_depth: usize,
}

impl Default for JiraSettings {
    fn default() -> Self {
        Self {
            jira_url: None,
            jira_user: None,
            jira_password: None,
            auth_method: None,
            insecure: false,
            project: None,
            requirement_links: vec![DEFAULT_REQUIREMENT_LINK.to_string()],
            custom_narrative_field: None,
            custom_fields: Vec::new(),
            exclude_requirement_label: None,
            fail_on_jira_error: false,
            max_requirement_depth: DEFAULT_MAX_REQUIREMENT_DEPTH,
        }
    }
}

#[derive(Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    jira: RawJira,
    #[serde(flatten)]
    top: RawJira,
}

#[derive(Default, Deserialize)]
struct RawJira {
    jira_url: Option<String>,
    jira_user: Option<String>,
    jira_password: Option<String>,
    auth_method: Option<String>,
    insecure: Option<bool>,
    project: Option<String>,
    requirement_links: Option<Vec<String>>,
    custom_narrative_field: Option<String>,
    custom_fields: Option<Vec<String>>,
    exclude_requirement_label: Option<String>,
    fail_on_jira_error: Option<bool>,
    max_requirement_depth: Option<usize>,
}

impl JiraSettings {
    /// Loads the default config file (when present) and applies environment overrides.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        let mut settings = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            Self::default()
        };
        settings.apply_environment();
        Ok(settings)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let payload = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_yaml(&payload)
    }

    pub fn from_yaml(payload: &str) -> Result<Self> {
        let raw: RawConfig =
            serde_yaml::from_str(payload).with_context(|| "invalid YAML config format")?;
        Ok(Self::from_raw(raw))
    }

    pub fn auth_method(&self) -> &str {
        match self.auth_method.as_deref().map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("bearer") => "bearer",
            _ => "basic",
        }
    }

    pub fn project_key(&self) -> Result<&str> {
        self.project
            .as_deref()
            .ok_or_else(|| anyhow!("jira project not configured"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.jira_url.is_none() {
            bail!("jira url not configured");
        }
        self.project_key()?;
        if self.requirement_links.is_empty() {
            bail!("at least one requirement link field is required");
        }
        Ok(())
    }

    /// Narrative field first, then the numbered custom fields, without duplicates.
    pub fn requested_custom_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        for name in self
            .custom_narrative_field
            .iter()
            .chain(self.custom_fields.iter())
        {
            if !fields.contains(name) {
                fields.push(name.clone());
            }
        }
        fields
    }

    /// Overrides settings from `jira.*` style properties.
    ///
    /// Numbered custom fields are read from `jira.custom.field.1` upwards and
    /// stop at the first missing index.
    pub fn apply_properties<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).and_then(non_empty);

        if let Some(url) = lookup(PROP_URL).and_then(normalize_jira_url) {
            self.jira_url = Some(url);
        }
        if let Some(user) = get(PROP_USER) {
            self.jira_user = Some(user);
        }
        if let Some(password) = get(PROP_PASSWORD) {
            self.jira_password = Some(password);
        }
        if let Some(project) = get(PROP_PROJECT) {
            self.project = Some(project);
        }
        if let Some(field) = get(PROP_NARRATIVE_FIELD) {
            self.custom_narrative_field = Some(field);
        }
        if let Some(label) = get(PROP_EXCLUDE_LABEL) {
            self.exclude_requirement_label = Some(label);
        }
        if let Some(links) = get(PROP_REQUIREMENT_LINKS) {
            let links = split_list(&links);
            if !links.is_empty() {
                self.requirement_links = links;
            }
        }
        if let Some(flag) = get(PROP_FAIL_ON_ERROR) {
            self.fail_on_jira_error = parse_bool_flag(&flag);
        }

        let numbered = (1..)
            .map(|index| get(&format!("{PROP_CUSTOM_FIELD}.{index}")))
            .take_while(Option::is_some)
            .flatten()
            .collect::<Vec<_>>();
        if !numbered.is_empty() {
            self.custom_fields = numbered;
        }
    }

    pub fn apply_environment(&mut self) {
        self.apply_properties(|name| env::var(property_env_name(name)).ok());
    }

    fn from_raw(raw: RawConfig) -> Self {
        let RawConfig { jira, top } = raw;
        let defaults = Self::default();

        let requirement_links = jira
            .requirement_links
            .or(top.requirement_links)
            .map(clean_list)
            .filter(|links| !links.is_empty())
            .unwrap_or(defaults.requirement_links);

        Self {
            jira_url: jira.jira_url.or(top.jira_url).and_then(normalize_jira_url),
            jira_user: jira.jira_user.or(top.jira_user).and_then(non_empty),
            jira_password: jira.jira_password.or(top.jira_password).and_then(non_empty),
            auth_method: jira.auth_method.or(top.auth_method).and_then(non_empty),
            insecure: jira.insecure.or(top.insecure).unwrap_or(false),
            project: jira.project.or(top.project).and_then(non_empty),
            requirement_links,
            custom_narrative_field: jira
                .custom_narrative_field
                .or(top.custom_narrative_field)
                .and_then(non_empty),
            custom_fields: jira
                .custom_fields
                .or(top.custom_fields)
                .map(clean_list)
                .unwrap_or_default(),
            exclude_requirement_label: jira
                .exclude_requirement_label
                .or(top.exclude_requirement_label)
                .and_then(non_empty),
            fail_on_jira_error: jira
                .fail_on_jira_error
                .or(top.fail_on_jira_error)
                .unwrap_or(false),
            max_requirement_depth: jira
                .max_requirement_depth
                .or(top.max_requirement_depth)
                .filter(|depth| *depth > 0)
                .unwrap_or(DEFAULT_MAX_REQUIREMENT_DEPTH),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(override_path) = env::var_os("JIRAREQ_CONFIG_FILE") {
        return PathBuf::from(override_path);
    }

    let mut base = env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.push(".config");
    base.push("jirareq");
    base.push("config.yaml");
    base
}

/// `jira.custom.field.1` -> `JIRA_CUSTOM_FIELD_1`
pub fn property_env_name(property: &str) -> String {
    property.replace('.', "_").to_ascii_uppercase()
}

pub fn parse_bool_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values.into_iter().filter_map(non_empty).collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|item| non_empty(item.to_string()))
        .collect()
}

fn normalize_jira_url(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Some(trimmed.trim_end_matches('/').to_string())
    } else {
        Some(format!("https://{}", trimmed.trim_end_matches('/')))
    }
}
