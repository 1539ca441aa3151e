use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use mobject::{Admin, BackendFactory, Provider, ProviderHost, SequencerId};
use mobject_bootstrap::{AppConfig, CliArgs, LoggingConfig};

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Mobject Server - hosts sequencer providers
#[derive(Parser)]
#[command(name = "mobject-server")]
#[command(about = "Mobject Server - remotely addressable sequencer backends")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for the RPC server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
    /// Administer sequencers on a running server
    Admin {
        /// Server address, e.g. http://127.0.0.1:8087
        #[arg(long)]
        address: String,
        #[arg(long, default_value_t = 0)]
        provider_id: u16,
        /// Security token expected by the provider
        #[arg(long, default_value = "")]
        token: String,
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a sequencer and print its id
    Create {
        #[arg(long = "type", default_value = dummy_sequencer::TYPE_NAME)]
        sequencer_type: String,
        /// JSON object handed to the backend
        #[arg(long, default_value = "{}")]
        config: String,
    },
    /// Attach to existing sequencer state and print the new id
    Open {
        #[arg(long = "type", default_value = dummy_sequencer::TYPE_NAME)]
        sequencer_type: String,
        #[arg(long, default_value = "{}")]
        config: String,
    },
    /// Detach a sequencer, keeping its state
    Close { id: SequencerId },
    /// Destroy a sequencer and its state
    Destroy { id: SequencerId },
    /// Stop the server
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let check_only = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => false,
        Commands::Check => true,
        Commands::Admin {
            address,
            provider_id,
            token,
            action,
        } => {
            // Admin calls are short-lived: console logging only, no home dir.
            mobject_bootstrap::init_logging_unified(&LoggingConfig::new(), Path::new("."));
            return run_admin(&address, provider_id, &token, action).await;
        }
    };

    let args = CliArgs {
        port: cli.port,
        verbose: cli.verbose,
    };

    // 1) defaults -> 2) YAML (if provided) -> 3) env (MOBJECT__*) -> 4) CLI overrides
    // Also normalizes + creates server.home_dir.
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_default();
    mobject_bootstrap::init_logging_unified(&logging_config, Path::new(&config.server.home_dir));

    tracing::info!("Mobject Server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    if check_only {
        check_config(config)
    } else {
        run_server(config).await
    }
}

/// Backend types this binary knows about.
fn build_factory() -> BackendFactory {
    let mut factory = BackendFactory::new();
    dummy_sequencer::register(&mut factory);
    factory
}

/// Build the host and register one provider per configured entry.
fn build_host(config: &AppConfig) -> Result<Arc<ProviderHost>> {
    let factory = Arc::new(build_factory());
    let host = Arc::new(ProviderHost::new(config.server.self_address()));

    for options in &config.providers {
        let provider = Provider::new(options.clone(), factory.clone());
        host.register_provider(Arc::new(provider))
            .context("Failed to register provider")?;
    }

    tracing::info!(
        address = %host.address(),
        providers = ?host.provider_ids(),
        backend_types = ?factory.backend_types(),
        "Provider host ready"
    );
    Ok(host)
}

async fn run_server(config: AppConfig) -> Result<()> {
    let host = build_host(&config)?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;

    let cancel = host.shutdown_token();
    let server = tokio::spawn(mobject::transport::http::serve(
        host.clone(),
        listener,
        cancel.clone(),
    ));

    tokio::select! {
        res = mobject_bootstrap::wait_for_shutdown() => {
            res?;
            cancel.cancel();
        }
        () = cancel.cancelled() => {}
    }

    server
        .await
        .context("RPC server task panicked")?
        .context("RPC server failed")?;

    host.teardown().await;
    tracing::info!("Mobject Server stopped");
    Ok(())
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    build_host(&config)?;
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn run_admin(address: &str, provider_id: u16, token: &str, action: AdminAction) -> Result<()> {
    let admin = Admin::default();
    match action {
        AdminAction::Create {
            sequencer_type,
            config,
        } => {
            let id = admin
                .create_sequencer(address, provider_id, &sequencer_type, &config, token)
                .await?;
            println!("{id}");
        }
        AdminAction::Open {
            sequencer_type,
            config,
        } => {
            let id = admin
                .open_sequencer(address, provider_id, &sequencer_type, &config, token)
                .await?;
            println!("{id}");
        }
        AdminAction::Close { id } => {
            admin.close_sequencer(address, provider_id, id, token).await?;
        }
        AdminAction::Destroy { id } => {
            let destroyed = admin
                .destroy_sequencer(address, provider_id, id, token)
                .await?;
            println!("{destroyed}");
        }
        AdminAction::Shutdown => admin.shutdown_server(address).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn admin_subcommand_parses_ids() {
        let id = SequencerId::generate();
        let id_arg = id.to_string();
        let cli = Cli::try_parse_from([
            "mobject-server",
            "admin",
            "--address",
            "http://127.0.0.1:8087",
            "--token",
            "s3cret",
            "destroy",
            id_arg.as_str(),
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Admin {
                token,
                provider_id,
                action: AdminAction::Destroy { id: parsed },
                ..
            }) => {
                assert_eq!(token, "s3cret");
                assert_eq!(provider_id, 0);
                assert_eq!(parsed, id);
            }
            _ => panic!("expected admin destroy"),
        }
    }

    #[test]
    fn build_host_registers_configured_providers() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mobject.yaml");
        std::fs::write(
            &path,
            format!(
                "server:\n  host: \"127.0.0.1\"\n  port: 9000\n  home_dir: \"{}\"\nproviders:\n  - provider_id: 0\n  - provider_id: 5\n    token: \"t\"\n",
                tmp.path().display()
            ),
        )
        .unwrap();

        let config = AppConfig::load_layered(&path).unwrap();
        let host = build_host(&config).unwrap();
        assert_eq!(host.address(), "http://127.0.0.1:9000");
        assert_eq!(host.provider_ids(), vec![0, 5]);
        assert!(host.provider(5).unwrap().get_config()["token_protected"]
            .as_bool()
            .unwrap());
    }

    #[tokio::test]
    async fn serves_dummy_sequencers_end_to_end() {
        let config = AppConfig::default();
        let host = build_host(&config).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(mobject::transport::http::serve(
            host.clone(),
            listener,
            host.shutdown_token(),
        ));

        let admin = Admin::default();
        let id = admin
            .create_sequencer(&address, 0, dummy_sequencer::TYPE_NAME, "{}", "")
            .await
            .unwrap();
        let handle = mobject::Client::default()
            .make_sequencer_handle(&address, 0, id, true)
            .await
            .unwrap();
        assert_eq!(handle.compute_sum(42, 51).await.unwrap(), 93);

        admin.shutdown_server(&address).await.unwrap();
        server.await.unwrap().unwrap();
    }
}
