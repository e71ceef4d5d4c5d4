//! embed-supervisor CLI entry point.
//!
//! Runs one supervised mount against the simulated host page until the run
//! time elapses, the mount fails, or a shutdown signal arrives, then tears
//! it down and reports the outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use embed_supervisor_common::ConfigFile;
use embed_supervisor_core::{LifecyclePhase, Supervisor, Unmount};
use embed_supervisor_host::{
    BannerBoard, Capabilities, LogConfig, ProgressBar, SessionBootstrap, init_logging,
};
use embed_supervisor_sim::{SimEnvironment, SimHostSession};

/// Supervise an embedded WebGL/WASM runtime in a simulated host page.
#[derive(Parser, Debug)]
#[command(name = "embed-supervisor", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "EMBED_SUPERVISOR_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds to keep the runtime mounted. Runs until interrupted if omitted.
    #[arg(long, env = "EMBED_SUPERVISOR_RUN_FOR")]
    run_for: Option<u64>,

    /// Log filter directive, overriding the configuration file.
    #[arg(long, env = "EMBED_SUPERVISOR_LOG")]
    log_filter: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json: bool,

    /// Simulate a browser without WebGL support.
    #[arg(long)]
    no_webgl: bool,

    /// Simulated total memory per metrics read, in MB (comma separated).
    #[arg(long, value_delimiter = ',')]
    memory_profile: Option<Vec<f64>>,

    /// Meeting id reported by the simulated host session.
    #[arg(long, default_value = "sim-meeting")]
    meeting_id: String,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<ConfigFile> {
        let mut config = match &self.config {
            Some(path) => ConfigFile::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ConfigFile::default(),
        };

        if let Some(filter) = &self.log_filter {
            config.logging.filter = Some(filter.clone());
        }
        if self.json {
            config.logging.json = true;
        }
        if self.no_webgl {
            config.simulation.webgl = false;
        }
        if let Some(profile) = &self.memory_profile {
            config.simulation.memory_profile_mb.clone_from(profile);
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    init_logging(&LogConfig::from(&config.logging)).context("Failed to initialize logging")?;

    info!(
        product = %config.supervisor.product.product_name,
        version = %config.supervisor.product.product_version,
        "Starting embed supervisor"
    );

    // Host session handshake. A failure is shown but does not stop the mount.
    let bootstrap = SessionBootstrap::new(
        Capabilities::from_names(config.session.capabilities.iter().cloned()),
        config.session.version.clone(),
    );
    let session = bootstrap
        .connect(&SimHostSession::in_meeting(cli.meeting_id.clone()))
        .await;
    info!(
        status = %session.status_text(&config.supervisor.product.product_name),
        meeting_id = session.meeting_id(),
        "Host session"
    );

    let env = SimEnvironment::from_config(&config.simulation);
    let progress = ProgressBar::new();
    let banner = BannerBoard::new(&config.supervisor.banner);

    let supervisor = Supervisor::mount(
        env.mount_context(Arc::new(progress.clone()), Arc::new(banner.clone())),
        config.supervisor.clone(),
    )
    .context("Failed to mount runtime supervisor")?;
    env.schedule_attach();

    info!(mount_id = %supervisor.mount_id(), "Runtime mounted");

    let meeting_id = session.meeting_id().to_string();
    let run = follow_phases(&supervisor, &meeting_id);

    let run_for = async {
        match cli.run_for {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = run => {}
        () = run_for => info!("Run time elapsed"),
        () = shutdown_signal() => info!("Shutdown signal received"),
    }

    let final_phase = supervisor.phase();
    for entry in banner.entries() {
        warn!(severity = %entry.severity, message = %entry.message, "Banner");
    }

    match supervisor.unmount().await {
        Unmount::Performed(report) => info!(
            phase_at_unmount = %report.phase_at_unmount,
            monitor_stopped = report.monitor_stopped,
            quit = ?report.quit,
            script_removed = report.script_removed,
            "Teardown complete"
        ),
        Unmount::AlreadyRequested => warn!("Teardown was already requested"),
    }

    if let LifecyclePhase::TerminalError(kind) = final_phase {
        error!(%kind, "Mount failed");
        anyhow::bail!("mount failed: {kind}");
    }

    Ok(())
}

/// Follow the mount's phases until it settles or is abandoned, forwarding
/// the meeting id once the runtime is running. Returns the last phase seen.
async fn follow_phases(supervisor: &Supervisor, meeting_id: &str) -> LifecyclePhase {
    let mut phases = supervisor.subscribe();
    let mut phase = *phases.borrow_and_update();
    let mut started = phase != LifecyclePhase::Idle;

    loop {
        info!(%phase, "Phase changed");

        match phase {
            LifecyclePhase::Running => {
                if let Err(e) = supervisor.send_message("GameManager", "SetMeetingId", meeting_id) {
                    warn!(error = %e, "Could not forward meeting id");
                }
            }
            // Idle after bring-up started means the canvas never attached.
            LifecyclePhase::Idle if started => break,
            phase if phase.is_settled() => break,
            _ => {}
        }

        if phases.changed().await.is_err() {
            break;
        }
        phase = *phases.borrow_and_update();
        started |= phase != LifecyclePhase::Idle;
    }

    phase
}

/// Wait for SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embed_supervisor_core::Size;
    use embed_supervisor_sim::{SimDocument, SimRuntimeFactory};

    fn mount(env: &SimEnvironment) -> Supervisor {
        Supervisor::mount(
            env.mount_context(Arc::new(ProgressBar::new()), Arc::new(BannerBoard::default())),
            Default::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_follow_phases_returns_when_already_failed() {
        let env = SimEnvironment::with_factory(
            SimRuntimeFactory::new(),
            SimDocument::builder().webgl(false),
            Size::new(1024.0, 768.0),
        );
        let supervisor = mount(&env);
        supervisor
            .subscribe()
            .wait_for(|phase| phase.is_settled())
            .await
            .unwrap();

        let phase = tokio::time::timeout(
            Duration::from_secs(1),
            follow_phases(&supervisor, "sim-meeting"),
        )
        .await
        .unwrap();

        assert!(matches!(phase, LifecyclePhase::TerminalError(_)));
    }

    #[tokio::test]
    async fn test_follow_phases_forwards_meeting_id() {
        let env = SimEnvironment::desktop();
        let supervisor = mount(&env);
        supervisor
            .subscribe()
            .wait_for(|phase| *phase == LifecyclePhase::Running)
            .await
            .unwrap();

        let follow = follow_phases(&supervisor, "123-456");
        let _ = tokio::time::timeout(Duration::from_millis(50), follow).await;

        let runtime = env.factory.last_instance().unwrap();
        let sent = runtime.messages();
        assert_eq!(sent[0].method, "SetMeetingId");
        assert_eq!(sent[0].value, "123-456");
        supervisor.unmount().await;
    }
}
