// # failoverd - Dual-Uplink DNS Failover Daemon
//
// This daemon is a THIN integration layer:
// - All decision logic lives in failover-core
// - Configuration is via environment variables ONLY (see `env.rs`)
//
// The failoverd daemon is responsible for:
// 1. Reading and validating configuration
// 2. Initializing logging and the runtime
// 3. Resolving the managed records (fatal on failure, distinct exit codes)
// 4. Wiring the collaborators into the engine
// 5. Serving the liveness probe
// 6. Translating SIGTERM/SIGINT into an engine shutdown
//
// ## Example
//
// ```bash
// export FAILOVER_CLOUDFLARE_ZONE_ID=your_zone_id
// export FAILOVER_CLOUDFLARE_API_TOKEN=your_token
// export FAILOVER_DYNAMIC_ALIAS=dyn.example.com
// export FAILOVER_PRIMARY_TARGET=wan1.example.com
// export FAILOVER_PRIMARY_RANGE=88.42.1.0/24
// export FAILOVER_SECONDARY_TARGET=wan2.example.com
//
// failoverd
// ```

mod env;
mod health;
mod ping;

use env::DaemonConfig;
use failover_core::{
    DnsRecordUpdater, EngineEvent, FailoverConfig, FailoverEngine, NotificationDispatcher,
    RecordRole,
};
use failover_ip_http::HttpAddressSource;
use failover_provider_cloudflare::CloudflareRecordStore;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration error
/// - 2: Runtime error (unexpected)
/// - 3: Dynamic alias could not be resolved to a record ID
/// - 4: Address record could not be resolved to a record ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailoverExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
    /// Startup lookup of the dynamic alias failed
    AliasLookupFailed = 3,
    /// Startup lookup of the address record failed
    AddressRecordLookupFailed = 4,
}

impl From<FailoverExitCode> for ExitCode {
    fn from(code: FailoverExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<RecordRole> for FailoverExitCode {
    fn from(role: RecordRole) -> Self {
        match role {
            RecordRole::Alias => FailoverExitCode::AliasLookupFailed,
            RecordRole::AddressRecord => FailoverExitCode::AddressRecordLookupFailed,
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FailoverExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return FailoverExitCode::ConfigError.into();
    }

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FailoverExitCode::ConfigError.into();
    }

    info!("Starting failoverd daemon");
    debug!("Configuration loaded: {:?}", config.failover);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FailoverExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(run_daemon(config.failover));
    info!("Bye!");
    code.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: FailoverConfig) -> FailoverExitCode {
    let store = match CloudflareRecordStore::from_config(&config.cloudflare) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to create Cloudflare record store: {}", e);
            return FailoverExitCode::RuntimeError;
        }
    };

    // Startup lookups are the only fatal remote calls
    let updater = match DnsRecordUpdater::resolve(Box::new(store), &config).await {
        Ok(updater) => updater,
        Err(e) => {
            error!("{}", e);
            return e
                .lookup_role()
                .map_or(FailoverExitCode::RuntimeError, FailoverExitCode::from);
        }
    };

    let source = match HttpAddressSource::from_config(&config.engine) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to create address source: {}", e);
            return FailoverExitCode::RuntimeError;
        }
    };
    info!("Discovering external address via {} service(s)", source.services().len());

    let dispatcher = match build_dispatcher(&config) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!("Failed to create notification transport: {}", e);
            return FailoverExitCode::RuntimeError;
        }
    };

    let (engine, events) = match FailoverEngine::new(Box::new(source), updater, dispatcher, &config)
    {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to create failover engine: {}", e);
            return FailoverExitCode::ConfigError;
        }
    };

    let mut engine = match config.health.ping_url {
        Some(ref url) => {
            match ping::HttpLivenessPing::new(url.clone(), config.engine.ping_timeout()) {
                Ok(ping) => engine.with_liveness_ping(Box::new(ping)),
                Err(e) => {
                    error!("Failed to create liveness ping: {}", e);
                    return FailoverExitCode::RuntimeError;
                }
            }
        }
        None => engine,
    };

    // Liveness probe
    let listener = match TcpListener::bind(&config.health.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind liveness probe to {}: {}", config.health.bind, e);
            return FailoverExitCode::RuntimeError;
        }
    };
    info!("Liveness probe listening on {}/health", config.health.bind);

    let (probe_stop_tx, probe_stop_rx) = oneshot::channel::<()>();
    let probe = tokio::spawn(health::serve(
        listener,
        health::router(engine.heartbeat(), config.engine.poll_interval()),
        async move {
            let _ = probe_stop_rx.await;
        },
    ));

    tokio::spawn(log_events(events));

    // Signal handling
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown signal error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Startup complete.");
    let engine_result = engine.run_with_shutdown(shutdown_rx).await;
    signals.abort();

    let _ = probe_stop_tx.send(());
    let probe_result = probe.await;

    match (engine_result, probe_result) {
        (Err(e), _) => {
            error!("Engine error: {}", e);
            FailoverExitCode::RuntimeError
        }
        (Ok(()), Ok(Err(e))) => {
            error!("Liveness probe error: {}", e);
            FailoverExitCode::RuntimeError
        }
        (Ok(()), Err(e)) => {
            error!("Liveness probe task failed: {}", e);
            FailoverExitCode::RuntimeError
        }
        (Ok(()), Ok(Ok(()))) => FailoverExitCode::CleanShutdown,
    }
}

/// Build the notification dispatcher from the optional Telegram section
fn build_dispatcher(config: &FailoverConfig) -> failover_core::Result<NotificationDispatcher> {
    let Some(ref telegram) = config.telegram else {
        info!("Notifications disabled");
        return Ok(NotificationDispatcher::disabled());
    };

    #[cfg(feature = "telegram")]
    {
        let transport = failover_notify_telegram::TelegramTransport::from_config(telegram)?;
        info!("Sending notifications to Telegram chat {}", telegram.chat_id);
        Ok(NotificationDispatcher::new(Box::new(transport))
            .with_send_timeout(config.engine.notification_timeout()))
    }

    #[cfg(not(feature = "telegram"))]
    {
        warn!(
            "Telegram configured for chat {} but failoverd was built without the telegram feature",
            telegram.chat_id
        );
        Ok(NotificationDispatcher::disabled())
    }
}

/// Consume engine events so the channel never fills up
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::AliasWriteFailed { state, error } => {
                warn!("Dynamic alias stays stale until the next {} transition: {}", state, error)
            }
            event => trace!("Engine event: {:?}", event),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> anyhow::Result<&'static str> {
    // Set up signal handlers for SIGTERM and SIGINT
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
