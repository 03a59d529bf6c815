use anyhow::{Context, Result};
use clap::Parser;
use hostpulsed::alert::HostIdentity;
use hostpulsed::api::{self, AppState};
use hostpulsed::notifier::{AlertDispatcher, DISPATCH_QUEUE_DEPTH, SmtpNotifier};
use hostpulsed::source::{SnapshotSource, SysinfoSource};
use hostpulsed::{Config, Metrics, MonitorState, Sampler, config, public_ip};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(version, about = "Host utilization monitor and alerting agent")]
struct Args {
    /// Path to hostpulse.toml (falls back to $HOSTPULSE_CONFIG, then /etc/hostpulse/hostpulse.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override server.listen from the config file
    #[arg(long)]
    listen: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let path = config::resolve_path(args.config);
    let mut cfg = Config::load_from(&path)?;
    if let Some(listen) = args.listen {
        cfg.server.listen = listen;
        cfg.validate()?;
    }
    let notifier = SmtpNotifier::new(&cfg.smtp).context("invalid [smtp] settings")?;
    let addr = cfg.listen_addr()?;

    if args.check {
        println!("{}: configuration OK", path.display());
        return Ok(());
    }

    let public_ip = public_ip::resolve(&cfg.server.public_ip_url, public_ip::LOOKUP_TIMEOUT).await;
    let host = HostIdentity {
        server_name: cfg.server.name.clone(),
        public_ip,
    };

    let source: Arc<dyn SnapshotSource> = Arc::new(SysinfoSource::new());
    let metrics = Arc::new(Metrics::new());
    let state = Arc::new(MonitorState::new(&cfg.monitor));

    let (dispatcher, notify_worker) =
        AlertDispatcher::spawn(Arc::new(notifier), Arc::clone(&metrics), DISPATCH_QUEUE_DEPTH);
    let sampler = Sampler::new(
        cfg.monitor.clone(),
        Arc::clone(&state),
        Arc::clone(&source),
        dispatcher,
        Arc::clone(&metrics),
        host.clone(),
    );
    let (stop_tx, stop_rx) = watch::channel(false);
    let sampler_task = tokio::spawn(sampler.run(stop_rx));

    let app = api::router(AppState {
        monitor: state,
        source,
        metrics,
        host,
        cpu_window: cfg.monitor.cpu_window(),
        top_k: cfg.monitor.top_k,
    });
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("[api] {} listening on http://{addr}", cfg.server.name);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("[main] shutting down");
    let _ = stop_tx.send(true);
    sampler_task.await.context("sampling loop panicked")?;
    // The loop owned the only dispatcher handle, so the worker now drains
    // whatever is still queued and exits.
    if tokio::time::timeout(DRAIN_TIMEOUT, notify_worker).await.is_err() {
        warn!("[main] pending alerts not delivered within {DRAIN_TIMEOUT:?}");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("[main] failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!("[main] failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
