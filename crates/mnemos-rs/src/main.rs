//! `mnemos` command-line client for ingesting memory and filling prompts.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::{debug, info};
use mnemos_rs::memory::{ListFilter, MemoryRecordInput};
use mnemos_rs::{Mnemos, MnemosConfig, RunRequest};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Command-line options for the Mnemos client.
#[derive(Parser, Debug)]
#[command(name = "mnemos", version)]
struct Cli {
    /// Optional path to a mnemos.json5 config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Ingest a JSON array of memory records
    Ingest { file: PathBuf },
    /// Fill a prompt template for an agent run
    Fill {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        user: Option<String>,
        /// Session name; omit for an anonymous session
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        run_id: Option<String>,
        template: PathBuf,
    },
    /// Resolve a session name to its id
    Session { name: Option<String> },
    /// List memory records
    List {
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    /// Delete a memory record by id
    Delete { id: Uuid },
}

#[derive(Serialize)]
struct SessionOutput {
    session_name: Option<String>,
    session_id: Uuid,
}

/// Entry point for the Mnemos CLI.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mnemos_rs::init_logging();

    let cli = Cli::parse();
    info!("starting mnemos (config_set={})", cli.config.is_some());
    let config = load_config(cli.config.as_deref())?;
    let mnemos = Mnemos::new(config).context("failed to initialize stores")?;
    run(&mnemos, cli.command).await
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MnemosConfig> {
    if let Some(path) = path {
        info!("loading config from path: {}", path.display());
        return MnemosConfig::load_from_path(path).context("failed to load config");
    }
    let cwd = std::env::current_dir().context("failed to resolve cwd")?;
    info!("loading layered config from cwd: {}", cwd.display());
    let layered = MnemosConfig::load_layered(&cwd).context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

async fn run(mnemos: &Mnemos, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Ingest { file } => {
            let inputs = read_inputs(&file)?;
            let report = mnemos.ingest(inputs).await;
            print_json(&report)?;
            if report.failed_count() > 0 {
                bail!(
                    "{} of {} records failed to ingest",
                    report.failed_count(),
                    report.outcomes.len()
                );
            }
        }
        Command::Fill {
            agent,
            user,
            session,
            run_id,
            template,
        } => {
            let template = std::fs::read_to_string(&template)
                .with_context(|| format!("failed to read template {}", template.display()))?;
            let prepared = mnemos
                .prepare_run(RunRequest {
                    agent_id: agent,
                    user_id: user,
                    session_name: session,
                    template,
                    run_id,
                })
                .await
                .context("failed to fill prompt")?;
            info!(
                "prompt filled (run_id={}, session_id={})",
                prepared.run_id, prepared.session_id
            );
            println!("{}", prepared.system_prompt);
        }
        Command::Session { name } => {
            let session_id = mnemos
                .resolve_session(name.as_deref())
                .await
                .context("failed to resolve session")?;
            let session_name = mnemos
                .session_name(session_id)
                .await
                .context("failed to look up session name")?;
            print_json(&SessionOutput {
                session_name,
                session_id,
            })?;
        }
        Command::List { agent, user } => {
            let filter = ListFilter {
                agent_id: agent,
                user_id: user,
                ..ListFilter::default()
            };
            let records = mnemos
                .list_memory(&filter)
                .await
                .context("failed to list memory")?;
            print_json(&records)?;
        }
        Command::Delete { id } => {
            if !mnemos
                .delete_memory(id)
                .await
                .context("failed to delete memory")?
            {
                bail!("memory record not found: {id}");
            }
            info!("deleted memory record (id={id})");
        }
    }
    Ok(())
}

fn read_inputs(path: &Path) -> anyhow::Result<Vec<MemoryRecordInput>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("expected a JSON array of memory records in {}", path.display()))
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, read_inputs};
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn parses_fill_with_global_config() {
        let cli = Cli::try_parse_from([
            "mnemos",
            "fill",
            "--agent",
            "tutor",
            "--session",
            "daily",
            "prompt.txt",
            "--config",
            "custom.json5",
        ])
        .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("custom.json5")));
        assert_eq!(
            cli.command,
            Command::Fill {
                agent: "tutor".to_string(),
                user: None,
                session: Some("daily".to_string()),
                run_id: None,
                template: PathBuf::from("prompt.txt"),
            }
        );
    }

    #[test]
    fn fill_requires_agent() {
        assert!(Cli::try_parse_from(["mnemos", "fill", "prompt.txt"]).is_err());
    }

    #[test]
    fn delete_requires_uuid() {
        assert!(Cli::try_parse_from(["mnemos", "delete", "not-a-uuid"]).is_err());
    }

    #[test]
    fn reads_ingest_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("records.json");
        std::fs::write(
            &path,
            r#"[{"name": "persona", "content": "calm", "agent_id": "tutor", "read_mode": "tool_call"}]"#,
        )
        .expect("write");
        let inputs = read_inputs(&path).expect("inputs");
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].scope.agent_id.as_deref(), Some("tutor"));

        std::fs::write(&path, r#"{"name": "persona"}"#).expect("write");
        assert!(read_inputs(&path).is_err());
    }
}
