use clap::Parser;
use config::Config;
use delve_agent::{cli::Cli, rpc};
use orchestrator::{Agent, AgentService, DelveClient, GetSnapshotRequest};
use std::io::Write;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // NOTE: The verbosity flag takes precedence over the environment variable
    // for log control. `DELVE_AGENT_LOG` can only set the level per crate,
    // e.g. `DELVE_AGENT_LOG=orchestrator::backend=trace delve-agent -v`.
    let env_filter = EnvFilter::builder()
        .with_env_var("DELVE_AGENT_LOG")
        .from_env()?
        .add_directive(cli.verbosity.log_level_filter().as_str().parse()?);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();

    // load config
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        _ => {
            let mut candidates = glob::glob("/etc/delve-agent/config.d/*.toml")?
                .filter_map(Result::ok)
                .collect::<Vec<_>>();
            candidates.insert(0, "/etc/delve-agent/config.toml".into());
            trace!(?candidates, "config file candidates");
            Config::load_multiple(candidates)?
        }
    };
    if let Some(addr) = &cli.addr {
        config.backend.address = addr.clone();
    }
    if let Some(listen) = &cli.listen {
        config.server.listen = listen.clone();
    }
    debug!(?config, ?cli);

    let backend =
        DelveClient::connect(&config.backend.address, config.backend.connect_timeout).await?;
    info!(address = %config.backend.address, "attached to delve");
    let service = Arc::new(AgentService::new(&config, Arc::new(backend)));

    if cli.oneshot {
        let snapshot = service.get_snapshot(GetSnapshotRequest::default()).await?;
        service.coordinator().idle().await;

        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &snapshot.stacks)?;
        writeln!(stdout)?;
        if let Some(path) = &cli.pprof_out {
            std::fs::write(path, snapshot.profile.encode_pprof())?;
            info!(path = %path.display(), "wrote pprof profile");
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupted, shutting down");
                shutdown.cancel();
            }
            Err(err) => warn!(%err, "failed to listen for ctrl-c"),
        }
    });

    let listener = TcpListener::bind(&config.server.listen).await?;
    rpc::serve(listener, Arc::clone(&service) as Arc<dyn Agent>, cancel).await?;

    // Do not leave the target halted behind us.
    service.coordinator().idle().await;
    Ok(())
}
