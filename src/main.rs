use std::io::BufRead as _;
use std::sync::Arc;

use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use gitbot::App;
use gitbot::CLI_CHANNEL;
use gitbot::Config;
use gitbot::clients::github_http::RealGithub;
use gitbot::commands::DEFAULT_HISTORY_LIMIT;
use gitbot::confirm::ConfirmationFlow;
use gitbot::confirm::Signal;
use gitbot::context::ContextDefaults;
use gitbot::context::ContextStore;
use gitbot::context::UserId;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Parser)]
#[command(name = "gitbot")]
#[command(about = "Manage files, branches and repositories on GitHub from short commands", long_about = None)]
pub struct Cli {
    /// Chat user the command runs as
    #[arg(short, long)]
    pub user: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the current repository, or switch to one (creating it on confirmation)
    Repo {
        name: Option<String>,
        /// Create the repository as public
        #[arg(long)]
        public: bool,
    },
    /// Create a new file on the current branch
    Create { filename: String, content: String },
    /// Replace the content of an existing file
    Edit { filename: String, content: String },
    /// Delete a file (asks for confirmation)
    Delete { filename: String },
    /// Show a file from the current branch
    View { filename: String },
    /// List files at the repository root
    List,
    /// List branches
    Branches,
    /// Switch to a branch, creating it on confirmation
    Branch { name: String },
    /// Show or set the commit message template
    Message { template: Option<String> },
    /// Show or set the command prefix
    Prefix { value: Option<String> },
    /// Show recent repository activity
    History {
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },
    /// Show command statistics
    Stats,
    /// Show the stored context
    Current,
}

fn setup_logging() -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}

/// Feed stdin lines to the confirmation flow as replies from `user_id`.
///
/// Runs on a plain thread: a blocking stdin read must not hold the runtime
/// open at exit.
fn spawn_reply_reader(confirm: Arc<ConfirmationFlow>, user_id: UserId) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(input) = line else {
                break;
            };
            confirm.signal(&Signal {
                user_id,
                channel_id: CLI_CHANNEL,
                prompt_id: None,
                input,
            });
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();
    let config = Config::load()?;

    let mut store = ContextStore::new(ContextDefaults::from_config(&config));
    if !store.initialize(&config).await {
        bail!("No settings store could be opened");
    }
    let gh = RealGithub::new(&config.github_api_url, &config.github_token)?;
    let mut app = App::new(config, store, gh);

    let user_id = UserId(cli.user);
    spawn_reply_reader(app.confirm.clone(), user_id);

    let stdout = &mut std::io::stdout();
    let result = match cli.command {
        Commands::Repo { name, public } => {
            app.cmd_repo(user_id, name.as_deref(), !public, stdout)
                .await
        }
        Commands::Create { filename, content } => {
            app.cmd_create(user_id, &filename, &content, stdout).await
        }
        Commands::Edit { filename, content } => {
            app.cmd_edit(user_id, &filename, &content, stdout).await
        }
        Commands::Delete { filename } => app.cmd_delete(user_id, &filename, stdout).await,
        Commands::View { filename } => app.cmd_view(user_id, &filename, stdout).await,
        Commands::List => app.cmd_list(user_id, stdout).await,
        Commands::Branches => app.cmd_branches(user_id, stdout).await,
        Commands::Branch { name } => app.cmd_branch(user_id, &name, stdout).await,
        Commands::Message { template } => {
            app.cmd_message(user_id, template.as_deref(), stdout).await
        }
        Commands::Prefix { value } => app.cmd_prefix(user_id, value.as_deref(), stdout).await,
        Commands::History { limit } => app.cmd_history(user_id, limit, stdout).await,
        Commands::Stats => app.cmd_stats(user_id, stdout).await,
        Commands::Current => app.cmd_current(user_id, stdout).await,
    };

    app.ctx.close();
    result
}
