use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use vectorbench_workload::params::TenantSetupParamSource;
use vectorbench_workload::provision::CREATE_INDICES_RUNNER;
use vectorbench_workload::{Registry, RequestDescriptor, RunnerResponse};
use yansi::Paint;

use crate::config::Config;
use crate::generate::generate;
use crate::http::{HttpIndexClient, TimingContext};
use crate::observability;

/// Workload generator for vector search benchmarks.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Setup(SetupCommand),
    Generate(GenerateCommand),
    Sources(SourcesCommand),
    Version(VersionCommand),
}

/// drop and recreate all tenant indices
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "setup")]
struct SetupCommand {}

/// write generated request parameters as JSON lines to stdout
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "generate")]
struct GenerateCommand {
    /// name of the parameter source
    #[argh(positional)]
    source: String,

    /// maximum number of requests per worker; unbounded sources run forever without it
    #[argh(option, short = 'n')]
    limit: Option<usize>,

    /// number of workers, overriding the configuration
    #[argh(option, short = 'w')]
    workers: Option<usize>,
}

/// list the registered parameter sources and runners
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "sources")]
struct SourcesCommand {}

/// print the vectorbench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap logging and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;
    observability::init_tracing(&config);
    tracing::debug!(?config);

    let registry = Registry::with_defaults();

    match args.command {
        Command::Setup(SetupCommand {}) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .thread_name("main-rt")
                .enable_all()
                .build()?;
            let response = runtime.block_on(setup(&registry, &config))?;
            println!("{}", serde_json::to_string(&response)?);
        }
        Command::Generate(GenerateCommand {
            source,
            limit,
            workers,
        }) => {
            let workers = workers.unwrap_or(config.workers);
            generate(
                &registry,
                &source,
                &config.workload,
                workers,
                limit,
                io::stdout().lock(),
            )?;
        }
        Command::Sources(SourcesCommand {}) => {
            println!("{}", "## Parameter sources".bold());
            for name in registry.param_source_names() {
                println!("  {}", name.blue());
            }
            println!("{}", "## Runners".bold());
            for name in registry.runner_names() {
                println!("  {}", name.blue());
            }
        }
        Command::Version(VersionCommand {}) => unreachable!(),
    }

    Ok(())
}

/// Runs the tenant provisioning runner with the options of the setup source.
async fn setup(registry: &Registry, config: &Config) -> Result<RunnerResponse> {
    let mut source = registry
        .param_source(TenantSetupParamSource::NAME, &config.workload)?
        .partition(0, 1);
    let options = match source.params().into_descriptor() {
        Some(RequestDescriptor::Setup(options)) => options,
        other => anyhow::bail!("unexpected setup parameters: {other:?}"),
    };

    let client = HttpIndexClient::new(&config.endpoint, config.request_timeout)?;
    let mut context = TimingContext::default();
    let runner = registry.runner(CREATE_INDICES_RUNNER)?;

    let response = runner(&client, &mut context, &options)
        .await
        .with_context(|| format!("failed to provision tenant indices on {}", config.endpoint))?;

    tracing::info!(
        requests = context.timings().len(),
        total = ?context.total(),
        "tenant indices provisioned"
    );
    Ok(response)
}
