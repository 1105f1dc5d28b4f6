//! `ceprov` application entry point.
//!
//! Thin command-line front end over [`engine_provisioner::Provisioner`]. Domain
//! errors are converted into `eyre` reports at this boundary.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/ceprov/config.toml` or path from `CEPROV_CONFIG_PATH`)
//! 3. Environment variables (`CEPROV_*`)
//! 4. Command-line arguments
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`). Results go to
//! stdout.

use std::process::ExitCode;

use clap::Parser;
use engine_provisioner::Provisioner;
use engine_provisioner::config::{
    AppConfig, Cli, Commands, ConnectNetworkArgs, CreateRegistryArgs, CreateRegistryProxyArgs,
    ExecArgs, load_config,
};
use engine_provisioner::error::Result as ProvisionerResult;
use engine_provisioner::provisioner::{RegistryProxyRequest, RegistryRequest};
use eyre::{Report, Result as EyreResult};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() -> EyreResult<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(&cli).map_err(Report::from)?;
    run(&cli, &config).await.map_err(Report::from)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_target(false).with_writer(std::io::stderr)))
        .init();
}

fn connect(config: &AppConfig) -> ProvisionerResult<Provisioner> {
    let provisioner = Provisioner::connect(config.engine.kind, config.engine_socket.as_deref())?;
    Ok(provisioner.with_operation_timeout(config.engine.operation_timeout()))
}

/// Execute the CLI command, returning domain-specific errors.
async fn run(cli: &Cli, config: &AppConfig) -> ProvisionerResult<ExitCode> {
    let provisioner = connect(config)?;

    match &cli.command {
        Commands::Ready => Ok(report_flag(provisioner.check_ready().await)),
        Commands::Exists(args) => Ok(report_flag(
            provisioner.check_container_exists(&args.name).await?,
        )),
        Commands::Id(args) => {
            let id = provisioner.get_container_id(&args.name).await?;
            emit(&id);
            Ok(ExitCode::SUCCESS)
        }
        Commands::CreateRegistry(args) => create_registry(&provisioner, config, args).await,
        Commands::CreateRegistryProxy(args) => {
            create_registry_proxy(&provisioner, config, args).await
        }
        Commands::DeleteRegistry(args) => {
            provisioner.delete_registry(&args.name).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Mkdir(args) => {
            provisioner
                .create_directory_in_container(&args.container_id, &args.path, args.parents)
                .await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::WriteFile(args) => {
            provisioner
                .create_file_in_container(&args.container_id, &args.path, &args.content)
                .await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ConnectNetwork(args) => connect_network(&provisioner, args).await,
        Commands::Exec(args) => exec(&provisioner, args).await,
    }
}

async fn create_registry(
    provisioner: &Provisioner,
    config: &AppConfig,
    args: &CreateRegistryArgs,
) -> ProvisionerResult<ExitCode> {
    let base = RegistryRequest::new(args.name.clone(), args.port)?
        .with_image(config.images.registry.clone());
    let request = match args.proxy_url.as_ref() {
        Some(url) => base.with_proxy_url(url.clone())?,
        None => base,
    };
    provisioner.create_registry(&request).await?;
    Ok(ExitCode::SUCCESS)
}

async fn create_registry_proxy(
    provisioner: &Provisioner,
    config: &AppConfig,
    args: &CreateRegistryProxyArgs,
) -> ProvisionerResult<ExitCode> {
    let request = RegistryProxyRequest::new(args.name.clone(), args.port, &args.upstreams)?
        .with_image(config.images.registry_proxy.clone());
    provisioner.create_registry_proxy(&request).await?;
    Ok(ExitCode::SUCCESS)
}

async fn connect_network(
    provisioner: &Provisioner,
    args: &ConnectNetworkArgs,
) -> ProvisionerResult<ExitCode> {
    if args.by_id {
        provisioner
            .connect_container_to_network_by_id(&args.container, &args.network)
            .await?;
    } else {
        provisioner
            .connect_container_to_network_by_name(&args.container, &args.network)
            .await?;
    }
    Ok(ExitCode::SUCCESS)
}

#[expect(clippy::print_stderr, reason = "relays the command's stderr")]
async fn exec(provisioner: &Provisioner, args: &ExecArgs) -> ProvisionerResult<ExitCode> {
    let output = provisioner
        .run_in_container(&args.container_id, &args.command)
        .await?;
    emit_raw(output.stdout());
    eprint!("{}", output.stderr());
    Ok(ExitCode::from(
        u8::try_from(output.exit_code()).unwrap_or(u8::MAX),
    ))
}

fn report_flag(flag: bool) -> ExitCode {
    emit(if flag { "true" } else { "false" });
    if flag {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn emit(line: &str) {
    println!("{line}");
}

#[expect(clippy::print_stdout, reason = "relays the command's stdout")]
fn emit_raw(text: &str) {
    print!("{text}");
}
