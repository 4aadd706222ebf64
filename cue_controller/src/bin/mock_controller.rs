use clap::Parser;
use crossbeam_channel::bounded;
use cue_controller::{ControllerConfig, MainLoop, NetworkThread, TICK_INTERVAL};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock_controller", about = "Stand-in StageCue controller on a local port")]
struct Args {
    #[arg(long, env = "STAGECUE_CONTROLLER_ADDR", default_value = "127.0.0.1:0")]
    addr: String,

    /// Write the bound address here once listening.
    #[arg(long, value_name = "PATH")]
    addr_file: Option<PathBuf>,

    #[arg(long, default_value_t = cue_controller::DEFAULT_CUE_COUNT)]
    cues: usize,

    /// Release active cues after this many milliseconds.
    #[arg(long)]
    auto_release_ms: Option<u64>,

    /// Push a full snapshot to every panel at this interval.
    #[arg(long)]
    snapshot_every_ms: Option<u64>,

    #[arg(long)]
    run_for_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let config = ControllerConfig {
        auto_release: args.auto_release_ms.map(Duration::from_millis),
        ..ControllerConfig::default()
    }
    .with_cue_count(args.cues)?;

    let (in_tx, in_rx) = bounded(cue_controller::INBOUND_CAP);
    let (out_tx, out_rx) = bounded(cue_controller::OUTBOUND_CAP);

    let net = NetworkThread::spawn_with_addr(&args.addr, in_tx, out_rx)?;
    if let Some(path) = &args.addr_file {
        fs::write(path, net.listen_addr().to_string())?;
    }
    println!("mock_controller listening on ws://{}/ws", net.listen_addr());

    let mut main_loop = MainLoop::new(in_rx, out_tx, config);
    let snapshot_every = args.snapshot_every_ms.map(Duration::from_millis);
    let run_for = args.run_for_ms.map(Duration::from_millis);

    let start = Instant::now();
    let mut last_snapshot = Instant::now();
    loop {
        main_loop.tick();
        if let Some(every) = snapshot_every {
            if last_snapshot.elapsed() >= every {
                main_loop.broadcast_snapshot();
                last_snapshot = Instant::now();
            }
        }
        thread::sleep(TICK_INTERVAL);
        if let Some(max) = run_for {
            if start.elapsed() >= max {
                break;
            }
        }
    }

    info!("mock_controller shutting down");
    net.shutdown();
    Ok(())
}
