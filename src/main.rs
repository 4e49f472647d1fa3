use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokenring::api;
use tokenring::audit::FileAuditLog;
use tokenring::cli;
use tokenring::node::{RingNode, RingScheduler};
use tokenring::registry::FileRegistry;
use tokenring::transport::HttpTokenSender;

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tokenring=debug,tower_http=debug".into());
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args and env vars
    let settings = cli::Cli::parse().into_settings();
    init_tracing(settings.log_json);

    let listen_address: IpAddr = settings
        .listen_address
        .parse::<IpAddr>()
        .with_context(|| format!("Invalid ip address {:?}", settings.listen_address))?;

    // Collaborators: shared registry, audit sink, outbound transport
    let registry = Arc::new(FileRegistry::new(&settings.registry_path));
    info!("Using membership registry at {:?}", registry.path());
    let audit = Arc::new(FileAuditLog::new(&settings.audit_log_path));
    let sender = Arc::new(HttpTokenSender::new(
        settings.peer_host.clone(),
        settings.ring.rpc_timeout(),
    )?);

    let node = RingNode::join(
        settings.member_id,
        settings.base_member(),
        registry,
        sender,
        audit,
        &settings.ring,
    )
    .await
    .context("Failed to join the ring")?;

    // The member id doubles as the listen port
    let socket_address = SocketAddr::from((listen_address, node.member_id().value()));
    let server = axum::Server::try_bind(&socket_address)
        .with_context(|| format!("Failed to listen on {}", socket_address))?;

    let api = api::api(node.clone()).await?;
    let loops = RingScheduler::new(&settings.ring).start(node.clone());

    info!("[{}] Node listening at {}", node.member_id(), socket_address);
    let served = server
        .serve(api.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    for handle in loops {
        handle.abort();
    }
    served?;
    info!("[{}] Shut down", node.member_id());
    Ok(())
}
