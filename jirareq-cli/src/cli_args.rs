use std::{env, path::PathBuf};

use anyhow::{anyhow, Result};

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Requirements,
    Tags(Vec<String>),
    Requirement { tag_type: String, name: String },
    Parent(Vec<String>),
    Outcomes,
}

#[derive(Debug, PartialEq, Eq)]
pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub mock: bool,
    pub json: bool,
    pub command: Command,
}

#[derive(Debug)]
pub enum CliAction {
    Run(CliOptions),
    Help,
}

pub fn parse_cli_action() -> Result<CliAction> {
    parse_args(env::args().skip(1))
}

pub fn print_help() {
    println!("jirareq - JIRA requirements and Zephyr manual test results");
    println!("Usage:");
    println!("  jirareq [--config <path>] [--mock] [--json] <command>");
    println!("Commands:");
    println!("  requirements                    Print the requirements tree");
    println!("  tags <KEY>...                   Tags of an outcome linked to these issues");
    println!("  requirement --type <T> --name <N>");
    println!("                                  Requirement matching a tag");
    println!("  parent <KEY>...                 Parent requirement of an outcome");
    println!("  outcomes                        Manual test outcomes from Zephyr");
    println!("Options:");
    println!("  --config <path>  Read settings from this YAML file");
    println!("  --mock           Use a built-in demo project instead of a JIRA server");
    println!("  --json           Print JSON instead of text");
}

fn parse_args<I>(args: I) -> Result<CliAction>
where
    I: IntoIterator<Item = String>,
{
    let mut config = None;
    let mut mock = false;
    let mut json = false;
    let mut command_name = None;
    let mut keys = Vec::new();
    let mut tag_type = None;
    let mut name = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config = Some(PathBuf::from(
                    args.next()
                        .ok_or_else(|| anyhow!("--config requires a value"))?,
                ));
            }
            "--type" => {
                tag_type = Some(
                    args.next()
                        .ok_or_else(|| anyhow!("--type requires a value"))?,
                );
            }
            "--name" => {
                name = Some(
                    args.next()
                        .ok_or_else(|| anyhow!("--name requires a value"))?,
                );
            }
            "--mock" => mock = true,
            "--json" => json = true,
            "--help" | "-h" => return Ok(CliAction::Help),
            other if other.starts_with('-') => {
                return Err(anyhow!("Unknown argument: {other}"));
            }
            other if command_name.is_none() => command_name = Some(other.to_string()),
            other => keys.push(other.to_string()),
        }
    }

    let command = match command_name.as_deref() {
        None => return Ok(CliAction::Help),
        Some("requirements") => Command::Requirements,
        Some("outcomes") => Command::Outcomes,
        Some("tags") => Command::Tags(require_keys("tags", keys)?),
        Some("parent") => Command::Parent(require_keys("parent", keys)?),
        Some("requirement") => Command::Requirement {
            tag_type: tag_type.ok_or_else(|| anyhow!("requirement needs --type"))?,
            name: name.ok_or_else(|| anyhow!("requirement needs --name"))?,
        },
        Some(other) => return Err(anyhow!("Unknown command: {other}")),
    };

    Ok(CliAction::Run(CliOptions {
        config,
        mock,
        json,
        command,
    }))
}

fn require_keys(command: &str, keys: Vec<String>) -> Result<Vec<String>> {
    if keys.is_empty() {
        return Err(anyhow!("{command} needs at least one issue key"));
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{parse_args, CliAction, Command};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn shows_help_without_command() {
        assert!(matches!(
            parse_args(Vec::<String>::new()).expect("action"),
            CliAction::Help
        ));
        assert!(matches!(
            parse_args(args(&["outcomes", "--help"])).expect("action"),
            CliAction::Help
        ));
    }

    #[test]
    fn parses_tags_with_keys_and_flags() {
        let action = parse_args(args(&["--mock", "tags", "PROJ-1", "#2", "--json"])).expect("action");
        let CliAction::Run(options) = action else {
            panic!("expected run action");
        };

        assert!(options.mock);
        assert!(options.json);
        assert_eq!(
            options.command,
            Command::Tags(vec!["PROJ-1".to_string(), "#2".to_string()])
        );
    }

    #[test]
    fn parses_requirement_lookup_and_config() {
        let action = parse_args(args(&[
            "--config",
            "/tmp/jirareq.yaml",
            "requirement",
            "--type",
            "Epic",
            "--name",
            "Checkout",
        ]))
        .expect("action");
        let CliAction::Run(options) = action else {
            panic!("expected run action");
        };

        assert_eq!(options.config, Some(PathBuf::from("/tmp/jirareq.yaml")));
        assert_eq!(
            options.command,
            Command::Requirement {
                tag_type: "Epic".to_string(),
                name: "Checkout".to_string(),
            }
        );
    }

    #[test]
    fn rejects_missing_keys_and_unknown_input() {
        let error = parse_args(args(&["parent"])).expect_err("missing keys");
        assert!(error.to_string().contains("at least one issue key"));

        let error = parse_args(args(&["requirement", "--name", "x"])).expect_err("missing type");
        assert!(error.to_string().contains("--type"));

        assert!(parse_args(args(&["explode"])).is_err());
        assert!(parse_args(args(&["--verbose"])).is_err());
    }
}
