use std::{process::ExitCode, time::Duration};

use anyhow::{Context as _, Result};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use fabcomp::{
    commands::{self, Context},
    config::{Config, ExtractorKind},
    fabricator::{self, Fabricator, Version},
};

#[derive(Parser)]
#[command(name = "fabcomp")]
#[command(about = "Installs bash-completion and the kubectl fabric completion hook", long_about = None)]
struct Cli {
    /// Log tool output and other details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install bash-completion from a downloaded tarball
    Install {
        /// Directory holding bash-completion.tar.xz
        #[arg(short, long)]
        work_dir: Utf8PathBuf,
        #[command(flatten)]
        target: Target,
        /// Fabricator object (TOML) to read the bash-completion version from
        #[arg(long)]
        fabricator: Option<Utf8PathBuf>,
        /// Version to install, overrides --fabricator
        #[arg(long)]
        bash_completion_version: Option<String>,
        /// Expected tarball checksum, e.g. sha256:<hex>
        #[arg(long)]
        checksum: Option<String>,
        /// Extract in-process instead of running tar
        #[arg(long)]
        builtin_extract: bool,
        /// Abort after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Only write the kubectl fabric completion and hook scripts
    Hook {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args)]
struct Target {
    /// Install under this prefix instead of /
    #[arg(long)]
    root: Option<Utf8PathBuf>,
    /// Installer config (TOML)
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,
}

impl Target {
    fn load(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(root) = &self.root {
            config.layout = config.layout.rebase(root)?;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let result = match cli.command {
        Commands::Install {
            work_dir,
            target,
            fabricator: fabricator_path,
            bash_completion_version,
            checksum,
            builtin_extract,
            timeout,
        } => {
            if let Some(secs) = timeout {
                cancel_after(cancel.clone(), Duration::from_secs(secs));
            }

            let installed = async {
                let mut config = target.load()?;
                if checksum.is_some() {
                    config.checksum = checksum;
                }
                if builtin_extract {
                    config.extractor = ExtractorKind::Builtin;
                }

                let version = match (bash_completion_version, fabricator_path) {
                    (Some(version), _) => Version::new(version),
                    (None, Some(path)) => fabricator::version(&Fabricator::load(path)?).clone(),
                    (None, None) => Version::default(),
                };

                let ctx = Context::new(config, version, cancel)?;
                commands::install(&ctx, &work_dir).await?;
                Ok::<_, anyhow::Error>(())
            };

            installed.await.context("installing bash-completion")
        }
        Commands::Hook { target } => {
            let hooked = async {
                let config = target.load()?;
                commands::install_kubectl_fabric_completion(&config.layout).await?;
                Ok::<_, anyhow::Error>(())
            };

            hooked.await.context("installing kubectl-fabric completion")
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });
}

fn cancel_after(cancel: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!("Timed out after {timeout:?}, cancelling");
        cancel.cancel();
    });
}
