//! Standalone relay proxy binary.
//!
//! Thin glue around the library core: loads configuration, installs the
//! logging subscriber, registers the built-in observer hooks, and runs the
//! listener until ctrl-c.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use packet_relay::config::RelayConfig;
use packet_relay::protocol::hooks::{Action, HookDispatcher, Matcher};
use packet_relay::proxy::ProxyListener;
use packet_relay::utils::logging;

#[derive(Parser, Debug)]
#[command(name = "packet-relay", version, about = "Intercepting relay proxy for session-keyed binary game protocols")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    listen: Option<String>,

    /// Override the upstream address (skips negotiation)
    #[arg(long)]
    upstream: Option<String>,

    /// Log every relayed packet
    #[arg(long)]
    log_packets: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match RelayConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => RelayConfig::default(),
    };

    if let Some(listen) = args.listen {
        config.proxy.listen_address = listen;
    }
    if let Some(upstream) = args.upstream {
        config.proxy.upstream_address_override = Some(upstream);
    }

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let mut hooks = HookDispatcher::new();
    if args.log_packets {
        register_packet_logger(&mut hooks);
    }

    info!(app = %config.logging.app_name, "Starting relay proxy");

    let listener = match ProxyListener::new(config, Arc::new(hooks)) {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match listener.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Listener failed");
            ExitCode::FAILURE
        }
    }
}

/// Observer hook that logs every decoded packet with its direction, and
/// variant-bearing payloads in structured form.
fn register_packet_logger(hooks: &mut HookDispatcher) {
    hooks.register("packet_logger", Matcher::any(), i32::MAX, |packet, ctx| {
        if packet.kind.is_variant_bearing() {
            let record = packet.variant_record()?;
            info!(
                session = ctx.session_id,
                direction = ctx.direction.name(),
                kind = packet.kind.name(),
                entries = record.len(),
                "Variant packet"
            );
        } else {
            info!(
                session = ctx.session_id,
                direction = ctx.direction.name(),
                kind = packet.kind.name(),
                bytes = packet.payload.len(),
                "Packet"
            );
        }
        Ok(Action::Forward)
    });
}
