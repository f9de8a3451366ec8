mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{resolve_seed, session_config, Cli, Command, RunArgs};
use log::{info, warn};
use ping_arq_core::env::SystemClock;
use ping_arq_core::error::{Error, TransportError};
use ping_arq_core::events::SessionEvent;
use ping_arq_core::framing::{FrameCodec, Verdict};
use ping_arq_core::network::SimChannel;
use ping_arq_core::udp::UdpTransport;
use ping_arq_core::{MasterSession, RunReport, SessionConfig, SlaveSession};
use std::io::Write;
use std::thread;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.command.run_args().quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let run_args = cli.command.run_args().clone();
    let seed = resolve_seed(run_args.seed);
    info!("seed: {} (pass --seed {} to replay)", seed, seed);

    let report = match cli.command {
        Command::Master { run, tx, bind, peer } => {
            let config = session_config(SessionConfig::master(), &run, Some(&tx), seed);
            show(&run, &config);

            let link = UdpTransport::bind(bind, peer)
                .with_context(|| format!("binding master socket on {}", bind))?;
            info!("master on {} -> {}", bind, peer);

            let sink = progress_sink(config.verbose, config.num_packets);
            MasterSession::new(link, FrameCodec::from_seed(seed), SystemClock, config)
                .with_events(sink)
                .run()?
        }

        Command::Slave { run, bind, peer } => {
            let config = session_config(SessionConfig::slave(), &run, None, seed);
            show(&run, &config);

            let link = UdpTransport::bind(bind, peer)
                .with_context(|| format!("binding slave socket on {}", bind))?;
            info!("slave on {} -> {}", bind, peer);

            let sink = progress_sink(config.verbose, config.num_packets);
            SlaveSession::new(link, FrameCodec::from_seed(seed), SystemClock, config)
                .with_events(sink)
                .run()?
        }

        Command::Simulate { run, tx, sim } => {
            let master_config = session_config(SessionConfig::master(), &run, Some(&tx), seed);
            let slave_config = session_config(SessionConfig::slave(), &run, None, seed);
            show(&run, &master_config);
            if run.print_config {
                sim.print();
            }

            let channel = SimChannel::new(sim.sim_config(seed));
            let master_link = channel.endpoint();
            let slave_link = channel.endpoint();

            let slave = thread::spawn(move || {
                let codec = FrameCodec::from_seed(seed.wrapping_add(1));
                SlaveSession::new(slave_link, codec, SystemClock, slave_config).run()
            });

            let sink = progress_sink(master_config.verbose, master_config.num_packets);
            let master_result =
                MasterSession::new(master_link, FrameCodec::from_seed(seed), SystemClock, master_config)
                    .with_events(sink)
                    .run();

            // Release the slave if it is still waiting for traffic.
            channel.close();
            let slave_result = slave
                .join()
                .map_err(|_| anyhow::anyhow!("slave thread panicked"))?;

            let stats = channel.stats();
            info!(
                "channel: {} frames sent, {} dropped, {} header / {} payload corrupted",
                stats.frames_sent, stats.frames_dropped, stats.header_corrupted, stats.payload_corrupted
            );

            match slave_result {
                Ok(report) => summarize(&run, &report),
                Err(Error::Transport(TransportError::ChannelClosed)) => {
                    warn!("slave stopped before detecting the end of the run")
                }
                Err(err) => warn!("slave failed: {}", err),
            }

            master_result?
        }
    };

    summarize(&run_args, &report);

    // Non-zero exit status when the master aborted.
    report.into_result()?;
    Ok(())
}

/// Print the resolved configuration when requested.
fn show(run: &RunArgs, config: &SessionConfig) {
    if run.print_config {
        config.print();
    }
}

fn summarize(run: &RunArgs, report: &RunReport) {
    report.print_summary();
    if run.export {
        print!("{}", report.export_text());
    }
}

/// Per-packet lines when verbose, single-character codes otherwise.
fn progress_sink(verbose: bool, num_packets: u32) -> impl Fn(SessionEvent) + Send + 'static {
    move |event: SessionEvent| {
        if !verbose {
            if let Some(glyph) = event.glyph() {
                print!("{}", glyph);
                let _ = std::io::stdout().flush();
            }
            if event == SessionEvent::Finished {
                println!();
            }
            return;
        }

        match event {
            SessionEvent::Transmitting {
                packet_id,
                attempt,
                max_attempts,
            } => println!(
                "  tx packet {:6} / {:6}, attempt {:6} / {:6}",
                packet_id, num_packets, attempt, max_attempts
            ),
            SessionEvent::FrameClassified { verdict, packet_id } => match verdict {
                Verdict::HeaderError => println!("  rx header invalid!"),
                Verdict::PayloadError => println!("  rx payload invalid!"),
                Verdict::IdMismatch => println!("  rx unexpected packet id {}", packet_id),
                Verdict::Accepted | Verdict::TypeMismatch => {}
            },
            SessionEvent::AckTimeout { .. } => println!("  ack timeout"),
            SessionEvent::DataAccepted {
                packet_id,
                payload_len,
                link_stats,
            } => println!(
                "  rx packet {:6} / {:6}, {} bytes, rssi = {:5.1} dB, evm = {:5.1} dB",
                packet_id, num_packets, payload_len, link_stats.rssi, link_stats.evm
            ),
            SessionEvent::Aborted {
                packet_id,
                attempts,
            } => println!("  giving up on packet {} after {} attempts", packet_id, attempts),
            SessionEvent::AckSent { .. } | SessionEvent::Finished => {}
        }
    }
}
