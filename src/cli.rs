use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;

use crate::{
    SharedCredentialsResolver, SharedCredentialsResolverBuilder,
    cache::FileCacheProvider,
    commands::{ExportCommand, ProcessCommand},
    config::StsOptions,
    constants::DEFAULT_DURATION,
};

#[derive(Debug, Clone, Parser)]
#[command(name = "sharedcreds", version, about = "Resolve AWS shared credentials, assuming chained roles through STS", long_about = None)]
pub struct Cli {
    #[arg(
        short = 'p',
        long,
        global = true,
        help = "AWS profile name [default: $AWS_PROFILE, then \"default\"]"
    )]
    pub profile: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Shared credentials file [default: $AWS_SHARED_CREDENTIALS_FILE, then ~/.aws/credentials]"
    )]
    pub credentials_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Reuse and store assumed role sessions")]
    pub cache: bool,

    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Session cache directory, implies --cache [default: ~/.aws/cli/cache]"
    )]
    pub cache_dir: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        default_value_t = DEFAULT_DURATION.as_secs(),
        value_parser = clap::value_parser!(u64).range(900..=43200),
        help = "Lifetime requested for assumed role sessions"
    )]
    pub duration_seconds: u64,

    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        default_value_t = 0,
        help = "Treat sessions as expired this long before they actually expire"
    )]
    pub expiry_window_seconds: u64,

    #[arg(short = 'v', long, global = true, action = ArgAction::Count, help = "Increase verbosity (-v info, -vv debug, -vvv trace)")]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Print shell export statements for the resolved credentials")]
    Export(ExportCommand),
    #[command(about = "Print credentials in the AWS credential_process JSON format")]
    Process(ProcessCommand),
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let mut resolver = self
            .resolver_builder()?
            .build()
            .context("Failed to set up the credentials resolver")?;

        let credentials = resolver
            .retrieve()
            .context("Failed to resolve AWS credentials")?;
        info!("Resolved credentials from {}", credentials.provider_name);

        let output = match self.command.unwrap_or(Commands::Export(ExportCommand {})) {
            Commands::Export(cmd) => cmd.render(&credentials),
            Commands::Process(cmd) => cmd.render(&credentials)?,
        };
        println!("{output}");

        Ok(())
    }

    pub fn resolver_builder(&self) -> Result<SharedCredentialsResolverBuilder> {
        let mut builder = SharedCredentialsResolver::builder().sts_options(StsOptions {
            duration: Duration::from_secs(self.duration_seconds),
            expiry_window: Duration::from_secs(self.expiry_window_seconds),
        });

        if let Some(profile) = &self.profile {
            builder = builder.profile(profile);
        }
        if let Some(path) = &self.credentials_file {
            builder = builder.filename(path);
        }

        match &self.cache_dir {
            Some(dir) => {
                let provider = FileCacheProvider::new(dir)
                    .with_context(|| format!("Invalid cache directory: {}", dir.display()))?;
                builder = builder.cache(true).cache_provider(provider);
            }
            None => builder = builder.cache(self.cache),
        }

        Ok(builder)
    }
}
