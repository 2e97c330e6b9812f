use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tool_agent::{
    default_registry, Agent, AgentError, AppConfig, OpenAIClient, Result, RetryPolicy, Session,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "tool-agent", version, about = "Ask an LLM that can look things up")]
struct Cli {
    /// TOML configuration file. Defaults to `agent.toml` when it exists.
    #[arg(long, global = true, env = "AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Model identifier, overriding the configuration.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer a single question and exit.
    Ask {
        /// The question to ask the agent
        question: String,
    },
    /// Interactive chat; `/history` prints the transcript, `/quit` exits.
    Chat,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tool_agent=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err @ AgentError::Configuration(_)) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let path = cli
        .config
        .or_else(|| Some(PathBuf::from("agent.toml")).filter(|p| p.exists()));
    let mut cfg = AppConfig::from_env_or_file(path.as_deref())?;
    if let Some(model) = cli.model {
        cfg.model.model = model;
    }
    cfg.require_api_key()?;

    let model = Arc::new(OpenAIClient::from_config(&cfg.model)?);
    tracing::info!(model = model.model(), "starting agent");
    let agent = Agent::new(model)
        .with_tools(default_registry(&cfg.tools)?)
        .with_prompts(cfg.prompts.clone())
        .with_retry_policy(RetryPolicy::from_config(&cfg.model));

    match cli.command {
        Command::Ask { question } => {
            let outcome = agent.respond(&mut Session::new(), question).await;
            println!("{}", outcome.text());
            Ok(if outcome.is_failure() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Chat => {
            chat(&agent).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn chat(agent: &Agent<OpenAIClient>) -> Result<()> {
    let mut session = Session::new();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"Input: ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => {
                stdout
                    .write_all(format!("{}\n\n", session.render()).as_bytes())
                    .await?;
                continue;
            }
            _ => {}
        }

        agent.respond(&mut session, input).await;
        let start = session.len().saturating_sub(2);
        for turn in &session.turns()[start..] {
            stdout.write_all(format!("{turn}\n\n").as_bytes()).await?;
        }
    }
    Ok(())
}
