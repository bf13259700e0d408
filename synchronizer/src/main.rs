//! tracesync - edit the tracing configuration held in a JSON store.
//!
//! Every mutating command applies its edit locally, submits it and prints
//! the state the synchronizer settles in.

use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracesync_engine::{
    feature_options, ChangeFeature, ConfigurationAction, Feature, FeatureTag, Pid,
    DEFAULT_DURATION_THRESHOLD,
};
use tracesync_synchronizer::{logging, FileRemote, Synchronizer, SynchronizerConfig};

#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// JSON store file, overrides TRACESYNC_STORE_PATH
    #[clap(long)]
    store: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the current state
    Show,
    /// Print which features are enabled for the given PIDs
    Options { pids: Vec<Pid> },
    /// Enable a feature for some PIDs and submit
    Enable(ChangeArgs),
    /// Disable a feature for some PIDs and submit
    Disable(ChangeArgs),
    /// Replace the stored configuration with the empty one
    Reset,
}

#[derive(Debug, Args)]
struct ChangeArgs {
    /// vfs_write, send_message, jni_references, sigquit, gc, open_file_descriptors or uprobe
    feature: FeatureTag,
    #[clap(required = true)]
    pids: Vec<Pid>,
    /// send_message threshold in nanoseconds
    #[clap(long, default_value_t = DEFAULT_DURATION_THRESHOLD)]
    threshold: u64,
    /// uprobe symbol
    #[clap(long)]
    function: Option<String>,
    /// uprobe binary or odex file
    #[clap(long)]
    target: Option<String>,
    /// uprobe symbol offset
    #[clap(long, default_value_t = 0)]
    offset: u64,
}

impl ChangeArgs {
    fn feature(&self) -> Result<Feature, tracesync_engine::Error> {
        Ok(match self.feature {
            FeatureTag::VfsWrite => Feature::VfsWrite,
            FeatureTag::SendMessage => Feature::SendMessage {
                threshold: self.threshold,
            },
            FeatureTag::JniReferences => Feature::JniReferences,
            FeatureTag::Sigquit => Feature::Sigquit,
            FeatureTag::Gc => Feature::Gc,
            FeatureTag::OpenFileDescriptors => Feature::OpenFileDescriptors,
            FeatureTag::Uprobe => match (&self.function, &self.target) {
                (Some(function_name), Some(target_module)) => Feature::Uprobe {
                    function_name: function_name.clone(),
                    target_module: target_module.clone(),
                    offset: self.offset,
                },
                _ => {
                    return Err(tracesync_engine::Error::InvalidAction(
                        "uprobe requires --function and --target".into(),
                    ))
                }
            },
        })
    }

    fn into_change(self, enable: bool) -> Result<ChangeFeature, tracesync_engine::Error> {
        let feature = self.feature()?;
        Ok(if enable {
            ChangeFeature::enable(feature, self.pids)
        } else {
            ChangeFeature::disable(feature, self.pids)
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing()?;

    // Load configuration
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if !run(cli).await? {
        std::process::exit(1);
    }
    Ok(())
}

/// Run one command and print its result. Returns `false` when the
/// synchronizer settled in `Error`.
async fn run(cli: Cli) -> tracesync_synchronizer::Result<bool> {
    let mut config = SynchronizerConfig::from_env()?;
    if let Some(store) = cli.store {
        config = config.with_store_path(store);
    }

    // Reject bad arguments before anything touches the store.
    let (submit, option_pids) = match cli.command {
        Commands::Show => (None, None),
        Commands::Options { pids } => (None, Some(pids)),
        Commands::Enable(args) => (
            Some(ConfigurationAction::from(args.into_change(true)?)),
            None,
        ),
        Commands::Disable(args) => (
            Some(ConfigurationAction::from(args.into_change(false)?)),
            None,
        ),
        Commands::Reset => (Some(ConfigurationAction::Reset), None),
    };

    tracing::info!(store = %config.store_path.display(), "Starting tracesync");
    let remote = FileRemote::new(&config.store_path);
    let handle = Synchronizer::spawn(remote, config);

    if let Some(action) = submit {
        let is_change = matches!(action, ConfigurationAction::ChangeFeature(_));
        handle.dispatch(action)?;
        if is_change {
            handle.dispatch(ConfigurationAction::Synchronize)?;
        }
    }

    let state = handle.wait_for_settled().await?;
    handle.shutdown().await?;

    let output = match option_pids {
        Some(pids) => {
            let options = state
                .local_configuration()
                .map(|config| feature_options(config, &pids))
                .unwrap_or_default();
            serde_json::to_string_pretty(&options)?
        }
        None => serde_json::to_string_pretty(&state)?,
    };
    writeln!(std::io::stdout(), "{output}")?;

    Ok(!state.is_error())
}
