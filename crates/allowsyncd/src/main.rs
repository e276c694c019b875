// # allowsyncd - Allow-list Sync Daemon
//
// This daemon is a THIN integration layer:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers and building the configured backend
// 4. Running one reconciliation (one-shot) or serving `GET /ip` (server mode)
//
// All reconciliation logic lives in allowsync-core.
//
// ## Configuration
//
// ### Provider
// - `PROVIDER`: `OCI` or `Cloudflare` (case-insensitive)
// - `LIST_ID`, `ACCOUNT_ID`, `CLOUDFLARE_API_TOKEN`: Cloudflare IP list
// - `NSG_ID`: OCI Network Security Group
// - `OCI_TENANCY_OCID`, `OCI_USER_OCID`, `OCI_FINGERPRINT`, `OCI_PRIVATE_KEY_PATH`: OCI API key
// - `LOCAL`: Any value reads OCI credentials from `OCI_CONFIG_FILE` (default `~/.oci/config`), profile `OCI_PROFILE`
// - `OCI_REGION`: Region (otherwise taken from the config profile)
// - `OCI_ALLOWED_PORTS`: Comma-separated destination ports (default `80,443,7000`)
//
// ### Trigger
// - `DNS_RECORD`: ';'-separated hostnames (one-shot mode)
// - `SERVER_MODE`: `true` serves `GET /ip?ip=<address>` instead
// - `BIND_ADDR`: Listen address (default `0.0.0.0:8080`; `:port` means `0.0.0.0:port`)
// - `CACHE_PATH`: Last-applied address file (default `<temp_dir>/ip_cache`)
//
// ### Misc
//
// Boolean flags are on only for the exact value `true`.
//
// - `DRY_RUN`: `true` logs provider writes instead of sending them
// - `MAX_ATTEMPTS`, `RETRY_DELAY_MS`: Read retry policy
// - `DISABLE_UPDATE`: `true` only reports the latest release
// - `DISABLE_CHECKS`: `true` skips the release check
// - `LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export PROVIDER=Cloudflare
// export ACCOUNT_ID=your_account
// export LIST_ID=your_list
// export CLOUDFLARE_API_TOKEN=your_token
// export DNS_RECORD="home.example.com;office.example.com"
//
// allowsyncd
// ```

mod config;
mod server;
mod update;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use allowsync_core::cache::store_from_config;
use allowsync_core::config::TriggerConfig;
use allowsync_core::traits::SystemResolver;
use allowsync_core::trigger::run_once;
use allowsync_core::{
    AllowSyncConfig, IdempotencyCache, ProviderRegistry, Reconciler, ReportGate,
};
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use crate::config::Config;
use crate::update::{UpdateChecker, UpdatePolicy, run_update_check};

/// How long in-flight requests may take once shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// - 0: Success (one-shot reconciled, or clean shutdown)
/// - 1: Configuration or startup error
/// - 2: Runtime error (resolution or reconciliation failed)
#[derive(Debug, Clone, Copy)]
enum AllowSyncExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<AllowSyncExitCode> for ExitCode {
    fn from(code: AllowSyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return AllowSyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return AllowSyncExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return AllowSyncExitCode::ConfigError.into();
    }

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let settings = match config.to_allowsync_config() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return AllowSyncExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return AllowSyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config, settings)).into()
}

/// Build the backend, then run the configured trigger mode
async fn run_daemon(config: Config, settings: AllowSyncConfig) -> AllowSyncExitCode {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    allowsync_provider_cloudflare::register(&registry);

    #[cfg(feature = "oci")]
    allowsync_provider_oci::register(&registry);

    info!("Registered providers: {}", registry.list_providers().join(", "));

    let backend = match registry.create_backend(&settings) {
        Ok(backend) => backend,
        Err(e) => {
            error!("Failed to create {} provider: {}", settings.provider.type_name(), e);
            return AllowSyncExitCode::ConfigError;
        }
    };
    let reconciler = Reconciler::new(backend);

    let shutdown = CancellationToken::new();
    let policy = UpdatePolicy::from_flags(config.disable_checks, config.disable_update);
    tokio::spawn(run_update_check(
        UpdateChecker::new(),
        policy,
        shutdown.clone(),
    ));

    let result = match &settings.trigger {
        TriggerConfig::OneShot => run_one_shot(&settings, &reconciler).await,
        TriggerConfig::Server { bind_addr } => {
            match tokio::net::TcpListener::bind(bind_addr.as_str()).await {
                Ok(listener) => run_server(listener, &settings, reconciler, shutdown.clone()).await,
                Err(e) => {
                    error!("Failed to bind {}: {}", bind_addr, e);
                    shutdown.cancel();
                    return AllowSyncExitCode::ConfigError;
                }
            }
        }
    };

    shutdown.cancel();

    match result {
        Ok(()) => AllowSyncExitCode::Success,
        Err(e) => {
            error!("{:#}", e);
            AllowSyncExitCode::RuntimeError
        }
    }
}

/// Resolve the configured records and reconcile once
async fn run_one_shot(settings: &AllowSyncConfig, reconciler: &Reconciler) -> Result<()> {
    let resolver = SystemResolver::new();

    tokio::select! {
        result = run_once(&resolver, &settings.records, reconciler) => {
            result?;
            info!("Updated rules");
            Ok(())
        }
        signal = wait_for_shutdown() => {
            anyhow::bail!("Interrupted by {} before reconciliation finished", signal?)
        }
    }
}

/// Serve `GET /ip` until a termination signal arrives
async fn run_server(
    listener: tokio::net::TcpListener,
    settings: &AllowSyncConfig,
    reconciler: Reconciler,
    shutdown: CancellationToken,
) -> Result<()> {
    let cache = IdempotencyCache::new(store_from_config(&settings.cache));
    match cache.load().await {
        Some(ip) => info!("Cached ip: {}", ip),
        None => info!("No cached ip"),
    }

    let gate = Arc::new(ReportGate::new(reconciler, cache));
    let mut server = tokio::spawn(server::serve(listener, gate, shutdown.clone()));

    tokio::select! {
        joined = &mut server => {
            // The server only returns on its own when it failed
            return joined?;
        }
        signal = wait_for_shutdown() => {
            info!("Received shutdown signal: {}", signal?);
        }
    }

    info!("Shutting down");
    shutdown.cancel();

    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(joined) => joined?,
        Err(_) => Err(anyhow::anyhow!(
            "Shutdown timeout after {:?}",
            SHUTDOWN_GRACE
        )),
    }
}

/// Wait for SIGTERM or SIGINT
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
