use anyhow::Result;
use clap::{Parser, Subcommand};
use knot::areas::repository::Repository;
use knot::artifacts::core::observer::TracingObserver;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const LOG_ENV: &str = "KNOT_LOG";

#[derive(Parser)]
#[command(
    name = "knot",
    version = "0.1.0",
    about = "A small content-addressed version control system",
    long_about = "knot tracks snapshots of a directory as content-addressed objects, \
    records them as a linear history and synchronizes that history with a remote store.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "This command initializes a new repository in the current directory \
        or at the specified path."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<PathBuf>,
        #[arg(long, help = "Directory of the remote store to push to and pull from")]
        remote: Option<PathBuf>,
    },
    #[command(
        name = "add",
        about = "Stage files for the next commit",
        long_about = "This command stores the content of the given files (directories are \
        expanded) and records them in the index. Deleted files that are tracked get unstaged."
    )]
    Add {
        #[arg(index = 1, required = true, help = "Files or directories to stage")]
        paths: Vec<PathBuf>,
    },
    #[command(
        name = "commit",
        about = "Record the staged snapshot as a new commit",
        long_about = "This command creates a new commit from the index on top of HEAD."
    )]
    Commit {
        #[arg(index = 1, help = "The commit message")]
        message: Option<String>,
        #[arg(short = 'm', long = "message", help = "The commit message")]
        flag_message: Option<String>,
    },
    #[command(
        name = "push",
        about = "Upload history to the remote store",
        long_about = "This command uploads every object reachable from HEAD that the remote \
        lacks, then moves the remote ref. The remote head must be an ancestor of HEAD unless \
        --force is given."
    )]
    Push {
        #[arg(short, long, help = "Overwrite the remote ref even if it is not an ancestor")]
        force: bool,
    },
    #[command(
        name = "pull",
        about = "Fast-forward to the remote history",
        long_about = "This command downloads the remote history, fast-forwards HEAD and rebuilds \
        the working directory. It fails if the histories have diverged."
    )]
    Pull,
    #[command(
        name = "revert",
        about = "Restore the working directory to an earlier commit",
        long_about = "This command makes the working directory and index match the given \
        commit. HEAD is detached at the commit unless --reset is given, which moves the current \
        branch instead."
    )]
    Revert {
        #[arg(
            index = 1,
            help = "The commit to restore (digest, prefix, ref, <rev>^ or <rev>~<n>)"
        )]
        revision: String,
        #[arg(long, help = "Move the current branch instead of detaching HEAD")]
        reset: bool,
    },
    #[command(name = "log", about = "Show commit history")]
    Log {
        #[arg(long, help = "Show each commit on a single line")]
        oneline: bool,
    },
    #[command(name = "status", about = "Show staged and unstaged changes")]
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    let pwd = std::env::current_dir()?;

    match command {
        Commands::Init { path, remote } => {
            let path = match path {
                Some(path) => path,
                None => pwd,
            };
            let mut repository = Repository::new(&path, Box::new(std::io::stdout()))?;
            if remote.is_some() {
                repository.config_mut().remote = remote;
            }

            repository.init().await?
        }
        Commands::Add { paths } => open(&pwd)?.add(&paths).await?,
        Commands::Commit {
            message,
            flag_message,
        } => {
            let message = flag_message.or(message).unwrap_or_default();
            open(&pwd)?.commit(&message).await.map(|_| ())?
        }
        Commands::Push { force } => open(&pwd)?.push(force).await.map(|_| ())?,
        Commands::Pull => open(&pwd)?.pull().await.map(|_| ())?,
        Commands::Revert { revision, reset } => {
            open(&pwd)?.revert(&revision, reset).await.map(|_| ())?
        }
        Commands::Log { oneline } => open(&pwd)?.log(oneline).await?,
        Commands::Status => open(&pwd)?.status().await?,
    }

    Ok(())
}

fn open(path: &std::path::Path) -> Result<Repository> {
    Ok(Repository::open(path, Box::new(std::io::stdout()))?
        .with_observer(Arc::new(TracingObserver)))
}
