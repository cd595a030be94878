mod cli_args;
mod mock;
mod output;
mod telemetry;

use std::path::Path;

use anyhow::{Context, Result};
use jirareq_config::JiraSettings;
use jirareq_domain::{Story, TestOutcome, TestTag, DEFAULT_STORY_NAME};
use jirareq_jira::{IssueClient, JiraClient, ZephyrSource};
use jirareq_requirements::RequirementsProvider;
use jirareq_zephyr::ZephyrAdaptor;
use serde::Serialize;

use crate::{
    cli_args::{parse_cli_action, print_help, CliAction, Command},
    mock::{mock_settings, MockJira},
    telemetry::{init_logging, timed},
};

fn main() -> Result<()> {
    init_logging();

    let options = match parse_cli_action()? {
        CliAction::Help => {
            print_help();
            return Ok(());
        }
        CliAction::Run(options) => options,
    };

    let rendered = if options.mock {
        execute(&options.command, options.json, MockJira::new(), mock_settings())?
    } else {
        let settings = load_settings(options.config.as_deref())?;
        settings.validate()?;
        let client = JiraClient::from_settings(&settings)?;
        execute(&options.command, options.json, client, settings)?
    };

    print!("{rendered}");
    Ok(())
}

fn load_settings(config: Option<&Path>) -> Result<JiraSettings> {
    let Some(path) = config else {
        return JiraSettings::load_default();
    };
    let mut settings = JiraSettings::load_from_path(path)?;
    settings.apply_environment();
    Ok(settings)
}

fn execute<C>(command: &Command, json: bool, client: C, settings: JiraSettings) -> Result<String>
where
    C: IssueClient + ZephyrSource,
{
    match command {
        Command::Outcomes => {
            let adaptor = ZephyrAdaptor::new(client, &settings)?;
            let outcomes = timed("load_outcomes", || adaptor.load_outcomes())?;
            render(json, &outcomes, |outcomes| output::render_outcomes(outcomes))
        }
        Command::Requirements => {
            let provider = RequirementsProvider::new(client, settings)?;
            let requirements = timed("load_requirements", || {
                Ok::<_, anyhow::Error>(provider.requirements())
            })?;
            render(json, requirements, |roots| output::render_tree(roots))
        }
        Command::Tags(keys) => {
            let provider = RequirementsProvider::new(client, settings)?;
            let outcome = outcome_for(keys);
            let tags = timed("tags_for", || Ok::<_, anyhow::Error>(provider.tags_for(&outcome)))?;
            render(json, &tags, output::render_tags)
        }
        Command::Requirement { tag_type, name } => {
            let provider = RequirementsProvider::new(client, settings)?;
            let requirement = provider.requirement_for(&TestTag::new(name.clone(), tag_type.clone()));
            render(json, &requirement, |found| output::render_requirement(*found))
        }
        Command::Parent(keys) => {
            let provider = RequirementsProvider::new(client, settings)?;
            let outcome = outcome_for(keys);
            let parent = timed("parent_requirement_of", || {
                provider.parent_requirement_of(&outcome)
            })
            .with_context(|| format!("failed to resolve parent requirement of {}", keys.join(",")))?;
            render(json, &parent, |found| output::render_requirement(found.as_ref()))
        }
    }
}

fn outcome_for(keys: &[String]) -> TestOutcome {
    TestOutcome::for_test_in_story("command line", Story::called(DEFAULT_STORY_NAME))
        .with_issues(keys.iter().cloned())
}

fn render<T, F>(json: bool, value: &T, text: F) -> Result<String>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    if json {
        let mut payload =
            serde_json::to_string_pretty(value).with_context(|| "failed to encode JSON output")?;
        payload.push('\n');
        return Ok(payload);
    }
    Ok(text(value))
}
