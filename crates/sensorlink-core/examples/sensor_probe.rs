//! SensorLink Probe Tool
//!
//! Exercises the sensor and actuator slaves from the command line: one
//! ultrasonic read, one TCRT read, a relay on/off cycle, then a few seconds
//! of auto-read. Prints the communication log as it goes.
//!
//! Usage:
//!   cargo run --example sensor_probe -- [OPTIONS] [PORT]
//!
//! Options:
//!   --demo            Talk to the built-in demo slaves instead of a port
//!   --config FILE     JSON configuration file
//!   --auto SECS       Auto-read duration in seconds (default: 5)
//!   --list            List serial ports and exit

use sensorlink_core::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensorlink_core=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name: Option<String> = None;
    let mut config_path: Option<String> = None;
    let mut demo = false;
    let mut list_only = false;
    let mut auto_secs = 5u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--demo" => demo = true,
            "--list" | "-l" => list_only = true,
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(args[i].clone());
                }
            }
            "--auto" | "-a" => {
                i += 1;
                if i < args.len() {
                    auto_secs = args[i].parse().unwrap_or(5);
                }
            }
            "--help" | "-h" => {
                print_help();
                return;
            }
            arg if !arg.starts_with('-') => port_name = Some(arg.to_string()),
            other => eprintln!("Unknown option: {}", other),
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => match MasterConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ {}", e);
                return;
            }
        },
        None => MasterConfig::default(),
    };

    let mut master = match Master::new(config) {
        Ok(master) => master,
        Err(e) => {
            eprintln!("❌ {}", e);
            return;
        }
    };

    let mut log_rx = master.log().subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(entry) = log_rx.recv().await {
            println!("  {}", entry);
        }
    });

    if list_only {
        for port in master.enumerate_ports() {
            println!("  {}", port);
        }
        return;
    }

    let connected = if demo {
        master
            .connect_with("demo", Box::new(DemoTransport::new()))
            .await
    } else {
        let port = match port_name.or_else(|| master.enumerate_ports().into_iter().next()) {
            Some(port) => port,
            None => {
                eprintln!("❌ No serial port given and none found");
                return;
            }
        };
        println!("Opening {} (waiting for the slaves to settle)...", port);
        master.connect(&port).await
    };
    if connected.is_err() {
        printer.abort();
        return;
    }

    println!();
    println!("Manual reads:");
    let _ = master.read_distance().await;
    let _ = master.read_presence().await;
    let _ = master.set_relay(RelayState::On).await;
    let _ = master.set_relay(RelayState::Off).await;

    if auto_secs > 0 {
        println!();
        println!("Auto read for {}s:", auto_secs);
        if master.enable_auto_read().is_ok() {
            tokio::time::sleep(Duration::from_secs(auto_secs)).await;
            master.disable_auto_read().await;
        }
    }

    println!();
    let readings = master.readings();
    println!("Last distance: {:?} cm", readings.distance_cm);
    println!("Last presence: {:?}", readings.presence);
    println!("Relay:         {}", master.relay_state());
    if let Some(stats) = master.stats() {
        println!(
            "Traffic:       {} requests, {} failed, {} bytes out, {} bytes in",
            stats.requests, stats.failures, stats.tx_bytes, stats.rx_bytes
        );
    }

    master.disconnect().await;
    // Let the printer drain the last entries
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();
}

fn print_help() {
    println!("SensorLink Probe Tool");
    println!();
    println!("Usage: sensor_probe [OPTIONS] [PORT]");
    println!();
    println!("Options:");
    println!("  --demo              Use the built-in demo slaves");
    println!("  --config, -c FILE   JSON configuration file");
    println!("  --auto, -a SECS     Auto-read duration (default: 5, 0 to skip)");
    println!("  --list, -l          List serial ports and exit");
    println!("  --help, -h          Show this help");
}
