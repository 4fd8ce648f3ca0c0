use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cigate::config::{AppConfig, Overrides};
use cigate::exec::ConsoleRunner;
use cigate::platform::gitlab::GitLabPlatform;
use cigate::workflow::types::Action;
use cigate::workflow::{Orchestrator, RunConfig};

#[derive(Parser)]
#[command(name = "cigate", about = "GitLab CI helper for gated terraform runs")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Terraform helpers
    #[command(subcommand)]
    Tf(TfCommand),
}

#[derive(Subcommand)]
enum TfCommand {
    /// Launch terraform init and report a failure as MR comment
    Init(ToolArgs),
    /// Launch terraform plan and send its summary as MR comment
    Plan(ToolArgs),
    /// Launch terraform apply behind merge request gates and send its summary as MR comment
    Apply(ApplyArgs),
}

#[derive(Args)]
struct GitLabArgs {
    /// GitLab API url (default: CI_API_V4_URL)
    #[arg(long, env = "CIGATE_GITLAB_URL")]
    gitlab_url: Option<String>,

    /// GitLab API token
    #[arg(long, env = "CIGATE_GITLAB_TOKEN", hide_env_values = true)]
    gitlab_token: Option<String>,

    /// Tool binary to run (default: terraform)
    #[arg(long)]
    tool: Option<String>,
}

#[derive(Args)]
struct ToolArgs {
    #[command(flatten)]
    gitlab: GitLabArgs,

    /// Extra arguments passed to the tool
    #[arg(last = true)]
    args: Vec<String>,
}

#[derive(Args)]
struct ApplyArgs {
    #[command(flatten)]
    gitlab: GitLabArgs,

    /// Execute apply only when the merge request is approved
    #[arg(long, env = "CIGATE_APPROVED")]
    approved: Option<bool>,

    /// Execute apply only when no older merge request is open
    #[arg(long, env = "CIGATE_OLDEST")]
    oldest: Option<bool>,

    /// Extra arguments passed to the tool
    #[arg(last = true)]
    args: Vec<String>,
}

impl GitLabArgs {
    fn into_overrides(self) -> Overrides {
        Overrides {
            gitlab_url: self.gitlab_url,
            gitlab_token: self.gitlab_token,
            binary: self.tool,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the tool's stdout stays clean
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let Command::Tf(tf) = cli.command;
    let (action, overrides, args) = match tf {
        TfCommand::Init(a) => (Action::Init, a.gitlab.into_overrides(), a.args),
        TfCommand::Plan(a) => (Action::Plan, a.gitlab.into_overrides(), a.args),
        TfCommand::Apply(a) => {
            let overrides = Overrides {
                approved: a.approved,
                oldest: a.oldest,
                ..a.gitlab.into_overrides()
            };
            (Action::Apply, overrides, a.args)
        }
    };

    let config = AppConfig::load(cli.config.as_deref())?
        .apply_overrides(overrides)
        .finalize()?;

    tracing::info!(
        gitlab = %config.gitlab.url,
        tool = %config.tool.binary,
        approved = config.gates.approved,
        oldest = config.gates.oldest,
        "Loaded configuration"
    );

    let platform = GitLabPlatform::new(&config.gitlab)?;
    let work_dir = std::env::current_dir()?;
    let orchestrator = Orchestrator::new(
        RunConfig::from_app(&config, work_dir),
        platform,
        ConsoleRunner,
    );

    let report = orchestrator.run(action, &args).await?;
    tracing::info!(
        action = %report.action,
        stage = %report.stage,
        summary = %report.summary,
        "Finished"
    );

    Ok(())
}
