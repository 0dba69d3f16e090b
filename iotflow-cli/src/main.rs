use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iotflow_core::app::{Camera, PassiveApp};
use iotflow_core::config;
use iotflow_core::model::TrafficProfile;
use iotflow_core::scenario::{Scenario, ServerApp};
use iotflow_core::{Direction, MemorySink, SimTime};

/// Iotflow: IoT traffic scenario simulator
///
/// Loads a JSON traffic profile, runs a server with one or more stream
/// clients against a simulated clock, and reports the packet trace.
///
/// Example usage:
///   iotflow -P profiles/tapo-c200.json --duration 60
///   iotflow -P profiles/tapo-c200.json --role camera --clients 3 --seed 42
///   iotflow -P profiles/tapo-c200.json --csv camera_tx_packets.csv
#[derive(Parser)]
#[command(name = "iotflow")]
#[command(version, about = "IoT traffic scenario simulator", long_about = None)]
struct Cli {
    /// Path to JSON traffic profile file
    #[arg(short = 'P', long, required = true)]
    profile: PathBuf,

    /// Simulated duration in seconds
    #[arg(short, long, default_value_t = 10.0)]
    duration: f64,

    /// Number of stream clients
    #[arg(short, long, default_value_t = 1)]
    clients: usize,

    /// Server role
    #[arg(short, long, value_enum, default_value_t = Role::Passive)]
    role: Role,

    /// RNG seed for a reproducible run
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write the Tx packet trace to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Role {
    /// Stream to every client as soon as it connects
    Passive,
    /// Wait for the GET_STREAM trigger on each connection
    Camera,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !cli.duration.is_finite() || cli.duration <= 0.0 {
        anyhow::bail!("duration must be a positive number of seconds");
    }

    tracing::info!("Loading profile: {}", cli.profile.display());
    let profile = config::load_profile_file(&cli.profile)?;
    if profile.is_empty() {
        tracing::warn!("profile has no usable packet classes; nothing will stream");
    }
    tracing::info!(
        "Profile loaded: {} packet class(es), role {:?}, {} client(s), {} s",
        profile.len(),
        cli.role,
        cli.clients,
        cli.duration
    );
    if let Some(seed) = cli.seed {
        tracing::info!("Seed: {} (reproducible mode)", seed);
    }

    let class_ids: Vec<u16> = profile.iter().map(|c| c.id()).collect();
    let server_addr = "10.0.0.1:8800".parse()?;
    let server = build_server(cli.role, server_addr, profile, cli.seed);

    let mut scenario = Scenario::new(server, MemorySink::new());
    scenario.start_server()?;
    for idx in 0..cli.clients {
        let local = format!("10.0.1.{}:4000", idx + 1).parse()?;
        scenario.add_client(local, SimTime::ZERO);
    }

    scenario.run_until(SimTime::from_secs_f64(cli.duration));

    let sink = scenario.into_sink();
    let tx_bytes: u64 = sink
        .events()
        .iter()
        .filter(|ev| ev.dir == Direction::Tx)
        .map(|ev| ev.bytes as u64)
        .sum();
    tracing::info!(
        "Run complete: {} packets sent ({} bytes), {} packets received",
        sink.tx_count(),
        tx_bytes,
        sink.rx_count()
    );
    for id in class_ids {
        let sends = sink.tx_for_class(id);
        let bytes: u64 = sends.iter().map(|ev| ev.bytes as u64).sum();
        tracing::info!("  Class {}: {} packets, {} bytes", id, sends.len(), bytes);
    }

    if let Some(path) = &cli.csv {
        write_tx_csv(path, &sink)?;
        tracing::info!("Tx trace written to: {}", path.display());
    }

    Ok(())
}

fn build_server(
    role: Role,
    addr: std::net::SocketAddr,
    profile: TrafficProfile,
    seed: Option<u64>,
) -> ServerApp {
    match role {
        Role::Passive => {
            let app = match seed {
                Some(seed) => PassiveApp::with_seed(addr, profile, seed),
                None => PassiveApp::new(addr, profile),
            };
            ServerApp::Passive(app)
        }
        Role::Camera => {
            let mut cam = match seed {
                Some(seed) => Camera::with_seed(addr, seed),
                None => Camera::new(addr),
            };
            for class in profile.classes() {
                cam.add_class(class.clone());
            }
            ServerApp::Camera(cam)
        }
    }
}

fn write_tx_csv(path: &Path, sink: &MemorySink) -> anyhow::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "Timestamp,PacketClassId,PacketSize")?;
    for ev in sink.events().iter().filter(|ev| ev.dir == Direction::Tx) {
        writeln!(file, "{},{},{}", ev.at.as_secs_f64(), ev.class_id, ev.bytes)?;
    }
    Ok(())
}
