/// Strips a leading `#` and qualifies bare issue numbers with the project key.
pub fn decode_issue_key(issue_key: &str, project_key: &str) -> String {
    let key = issue_key.strip_prefix('#').unwrap_or(issue_key);
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
        return format!("{project_key}-{key}");
    }
    key.to_string()
}

pub fn root_requirements_jql(project_key: &str) -> String {
    format!("issuetype = epic and project={project_key}")
}

pub fn child_issues_jql(link_field: &str, parent_key: &str) -> String {
    format!("'{}' = {}", link_field.replace('\'', "\\'"), parent_key)
}
