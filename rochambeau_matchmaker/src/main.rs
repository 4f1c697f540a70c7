// CLI entry point for the standalone matchmaking service.
//
// Usage:
//   matchmaker [OPTIONS]
//     --bind <HOST>                 Listen address (default: 127.0.0.1)
//     --port <PORT>                 Listen port (default: 5556)
//     --identifier-timeout-ms <MS>  Time allowed to send an identifier (default: 5000)
//
// Logging is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).

use std::time::Duration;

use log::error;
use rochambeau_matchmaker::server::{MatchmakerConfig, start_matchmaker};

fn main() {
    env_logger::init();
    let config = parse_args();

    let (handle, addr) = match start_matchmaker(config) {
        Ok(result) => result,
        Err(e) => {
            error!("Failed to start matchmaker: {e}");
            eprintln!("Failed to start matchmaker: {e}");
            std::process::exit(1);
        }
    };

    println!("Matchmaker listening on {addr}");
    println!("Press Ctrl+C to stop.");
    handle.wait();
}

/// Parse command-line arguments into a `MatchmakerConfig`. Uses simple
/// `std::env::args()` matching.
fn parse_args() -> MatchmakerConfig {
    let mut config = MatchmakerConfig::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                i += 1;
                config.bind_host = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--bind requires a value");
                    std::process::exit(1);
                });
            }
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--identifier-timeout-ms" => {
                i += 1;
                let ms: u64 = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--identifier-timeout-ms requires a number");
                    std::process::exit(1);
                });
                config.identifier_timeout = Duration::from_millis(ms);
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_usage() {
    println!("Usage: matchmaker [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --bind <HOST>                 Listen address (default: 127.0.0.1)");
    println!("  --port <PORT>                 Listen port (default: 5556)");
    println!("  --identifier-timeout-ms <MS>  Time allowed to send an identifier (default: 5000)");
    println!("  --help, -h                    Show this help");
}
