use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use supabase_cdn::config::{find_config_file, OriginConfig};
use supabase_cdn::CdnConfig;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "supabase-cdn")]
#[command(about = "Synthesize and deploy the CloudFront + WAF stack in front of a Supabase API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to read. Defaults to the closest supabase-cdn.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,
}

/// Values that take precedence over the config file.
/// They can go before or after the subcommand, eg: `supabase-cdn synth --rate-limit 500`
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Origin host name, reached over https
    #[arg(long, global = true, conflicts_with_all = ["load_balancer", "load_balancer_dns_name"])]
    origin: Option<String>,

    /// Logical id of a load balancer in the same template, reached over http
    #[arg(long, global = true, conflicts_with = "load_balancer_dns_name")]
    load_balancer: Option<String>,

    /// DNS name of an existing load balancer, reached over http
    #[arg(long, global = true)]
    load_balancer_dns_name: Option<String>,

    /// Requests per client IP per 5 minutes before the client is blocked
    #[arg(long, global = true)]
    rate_limit: Option<u32>,

    #[arg(long, global = true)]
    stack_name: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut CdnConfig) {
        if let Some(origin) = self.origin {
            config.origin = Some(OriginConfig::Host(origin));
        }
        if let Some(load_balancer) = self.load_balancer {
            config.origin = Some(OriginConfig::LoadBalancer { load_balancer });
        }
        if let Some(load_balancer_dns_name) = self.load_balancer_dns_name {
            config.origin = Some(OriginConfig::LoadBalancerDns { load_balancer_dns_name });
        }
        if self.rate_limit.is_some() {
            config.request_rate_limit = self.rate_limit;
        }
        if self.stack_name.is_some() {
            config.stack_name = self.stack_name;
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the CloudFormation template
    Synth {
        /// Write the template to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Create or update the stack and print its outputs
    #[cfg(feature = "deploy")]
    Deploy,
}

fn initialise_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // logs go to stderr so a synthesized template can be piped
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // already set, eg: by tests
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<CdnConfig> {
    let path = match path {
        Some(p) => Some(p),
        None => find_config_file(std::env::current_dir().context("Failed to get current directory")?),
    };
    match path {
        Some(p) => {
            info!(path = ?p, "using config file");
            Ok(CdnConfig::load(&p)?)
        }
        None => {
            info!("no config file found, using command line values only");
            Ok(CdnConfig::default())
        }
    }
}

fn synth(config: &CdnConfig, out: Option<PathBuf>) -> anyhow::Result<()> {
    let stack = config.build_stack()?;
    let template = stack.to_json()?;
    match out {
        Some(path) => {
            std::fs::write(&path, template).with_context(|| format!("Failed to write template to {:?}", path))?;
            info!(path = ?path, stack = %stack.name, "wrote template");
        }
        None => println!("{template}"),
    }
    Ok(())
}

#[cfg(feature = "deploy")]
fn deploy(config: &CdnConfig) -> anyhow::Result<()> {
    if let Some(region) = &config.region {
        std::env::set_var("AWS_REGION", region);
    }
    let stack = config.build_stack()?;
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let outputs = runtime.block_on(supabase_cdn::aws_cfn_stack::deploy::deploy_stack(&stack))?;
    let mut outputs: Vec<_> = outputs.into_iter().collect();
    outputs.sort();
    for (key, value) in outputs {
        println!("{key} = {value}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    initialise_logging(cli.verbose);
    let mut config = load_config(cli.config)?;
    cli.overrides.apply(&mut config);
    match cli.command {
        Commands::Synth { out } => synth(&config, out),
        #[cfg(feature = "deploy")]
        Commands::Deploy => deploy(&config),
    }
}
