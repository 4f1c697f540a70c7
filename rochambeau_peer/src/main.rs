// CLI entry point: play one round of Rochambeau from a terminal.
//
// Usage:
//   rochambeau host [OPTIONS]
//   rochambeau join <TARGET> [OPTIONS]
//   rochambeau matchmake [--server <ADDR>] [--id <ID>] [--serve] [OPTIONS]
//
// Options shared by every mode:
//   --name <NAME>   Display name sent to the opponent (default: Default)
//   --user <ID>     Account id the result is recorded under (default: local)
//   --bind <HOST>   Host listen address (default: 127.0.0.1)
//   --port <PORT>   Gameplay port (default: 5555)
//
// While a round is running, type `rock`, `paper` or `scissors` to commit,
// `exit` to acknowledge the result, or `quit` to abandon the session.
// Logging is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).

use std::io::BufRead;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use log::error;
use rochambeau_matchmaker::{MatchmakerConfig, MatchmakerHandle, start_matchmaker};
use rochambeau_peer::{
    LocalPlayer, PeerConfig, Presentation, Scoreboard, SessionController, SessionError,
};
use rochambeau_protocol::{Choice, DEFAULT_MATCHMAKING_PORT, Role};

const INPUT_POLL: Duration = Duration::from_millis(100);

enum Mode {
    Host,
    Join(String),
    Matchmake {
        server: Option<String>,
        identifier: Option<String>,
        serve: bool,
    },
}

struct Options {
    mode: Mode,
    config: PeerConfig,
    name: String,
    user: String,
}

/// Prints every presentation update as a line on stdout.
struct TerminalPresentation;

impl Presentation for TerminalPresentation {
    fn set_status(&self, text: &str) {
        println!("[status] {text}");
    }

    fn set_choice_display(&self, text: &str) {
        if !text.is_empty() {
            println!("{text}");
        }
    }

    fn show_choice_options(&self) {
        println!("Choose: rock, paper or scissors");
    }

    fn hide_choice_options(&self) {}

    fn show_exit(&self) {
        println!("Type 'exit' to leave the match.");
    }

    fn hide_exit(&self) {}
}

fn main() {
    env_logger::init();
    let opts = parse_args();

    let board = Arc::new(Scoreboard::new());
    let controller = SessionController::with_accounts(
        opts.config.clone(),
        Arc::new(TerminalPresentation),
        board.clone(),
    );
    let player = LocalPlayer::new(opts.user.clone(), opts.name.clone());

    // Kept alive for the whole process when embedded.
    let mut _matchmaker: Option<MatchmakerHandle> = None;

    let started = match opts.mode {
        Mode::Host => controller.start_host(&player).map(|addr| {
            println!("Hosting on {addr}");
            Role::Host
        }),
        Mode::Join(target) => controller.start_guest(&player, &target).map(|()| Role::Guest),
        Mode::Matchmake {
            server,
            identifier,
            serve,
        } => {
            let mut embedded = None;
            if serve {
                match start_matchmaker(MatchmakerConfig {
                    bind_host: opts.config.bind_host.clone(),
                    ..MatchmakerConfig::default()
                }) {
                    Ok((handle, addr)) => {
                        println!("Matchmaker listening on {addr}");
                        _matchmaker = Some(handle);
                        embedded = Some(addr);
                    }
                    Err(e) => println!("Matchmaker already running elsewhere ({e})"),
                }
            }
            let server = matchmaking_server(server, embedded, &opts.config);
            let identifier = identifier.unwrap_or_else(|| opts.config.advertised_identifier());
            controller
                .join_matchmaking(&server, &identifier)
                .and_then(|assignment| {
                    controller
                        .start_matched(&player, &assignment)
                        .map(|()| assignment.role())
                })
        }
    };
    let role = match started {
        Ok(role) => role,
        Err(e) => {
            error!("Failed to start session: {e}");
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    drive(&controller, role, spawn_stdin_reader());

    match controller.join(role) {
        Some(Ok(outcome)) => println!("{}", outcome.choice_summary()),
        Some(Err(SessionError::Cancelled)) => println!("Session cancelled."),
        Some(Err(e)) => eprintln!("{e}"),
        None => {}
    }
    for (id, stats) in board.leaderboard() {
        println!(
            "{id}: {} points (W{} L{} T{})",
            stats.score, stats.wins, stats.losses, stats.ties
        );
    }
}

/// Feed terminal lines to the controller until the session ends. A choice
/// typed before the opponent connects is held and committed once choices
/// open.
fn drive(controller: &SessionController, role: Role, input: Receiver<String>) {
    let mut pending: Option<Choice> = None;
    let mut committed = false;
    let mut input_open = true;
    while controller.is_running(role) {
        if let Some(choice) = pending {
            match controller.on_choice_selected(role, choice) {
                Err(SessionError::ChoiceNotOpen) => {}
                result => {
                    pending = None;
                    committed |= result.is_ok();
                    report(result);
                }
            }
        }
        if !input_open {
            thread::sleep(INPUT_POLL);
            continue;
        }
        match input.recv_timeout(INPUT_POLL) {
            Ok(line) => match line.trim().to_ascii_lowercase().as_str() {
                "" => {}
                "exit" => report(controller.on_exit_requested(role)),
                "quit" => controller.cancel(role),
                other => match other.parse::<Choice>() {
                    Ok(choice) if committed => {
                        report(controller.on_choice_selected(role, choice));
                    }
                    Ok(choice) => pending = Some(choice),
                    Err(e) => println!("{e}"),
                },
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // Nobody is left to type; a round without a choice can't finish.
                input_open = false;
                if committed || pending.is_some() {
                    let _ = controller.on_exit_requested(role);
                } else {
                    controller.cancel(role);
                }
            }
        }
    }
}

/// The matchmaker to join: an explicit `--server`, else the one embedded in
/// this process, else the default port on the host we bind to.
fn matchmaking_server(
    explicit: Option<String>,
    embedded: Option<SocketAddr>,
    config: &PeerConfig,
) -> String {
    match (explicit, embedded) {
        (Some(server), _) => server,
        (None, Some(addr)) => addr.to_string(),
        (None, None) => config.matchmaker_addr(),
    }
}

fn report(result: Result<(), SessionError>) {
    if let Err(e) = result {
        println!("{e}");
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Parse command-line arguments. Uses simple `std::env::args()` matching.
fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut config = PeerConfig::default();
    let mut name = String::new();
    let mut user = "local".to_string();
    let mut server = None;
    let mut identifier = None;
    let mut serve = false;

    let mode = match args.get(1).map(String::as_str) {
        Some("host") => "host",
        Some("join") => "join",
        Some("matchmake") => "matchmake",
        Some("--help" | "-h") => {
            print_usage();
            std::process::exit(0);
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    };
    let mut i = 2;
    let mut target = None;
    if mode == "join" {
        target = args.get(2).cloned();
        i = 3;
    }

    while i < args.len() {
        match args[i].as_str() {
            "--name" => {
                i += 1;
                name = required(&args, i, "--name");
            }
            "--user" => {
                i += 1;
                user = required(&args, i, "--user");
            }
            "--bind" => {
                i += 1;
                config.bind_host = required(&args, i, "--bind");
            }
            "--port" => {
                i += 1;
                config.gameplay_port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--server" if mode == "matchmake" => {
                i += 1;
                server = Some(required(&args, i, "--server"));
            }
            "--id" if mode == "matchmake" => {
                i += 1;
                identifier = Some(required(&args, i, "--id"));
            }
            "--serve" if mode == "matchmake" => serve = true,
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

    let mode = match mode {
        "host" => Mode::Host,
        "join" => Mode::Join(target.unwrap_or_else(|| {
            eprintln!("join requires a target address");
            std::process::exit(1);
        })),
        _ => Mode::Matchmake {
            server,
            identifier,
            serve,
        },
    };
    Options {
        mode,
        config,
        name,
        user,
    }
}

fn required(args: &[String], i: usize, flag: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("{flag} requires a value");
        std::process::exit(1);
    })
}

fn print_usage() {
    println!("Usage:");
    println!("  rochambeau host [OPTIONS]");
    println!("  rochambeau join <TARGET> [OPTIONS]");
    println!("  rochambeau matchmake [--server <ADDR>] [--id <ID>] [--serve] [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --name <NAME>   Display name (default: Default)");
    println!("  --user <ID>     Account id for the scoreboard (default: local)");
    println!("  --bind <HOST>   Host listen address (default: 127.0.0.1)");
    println!("  --port <PORT>   Gameplay port (default: 5555)");
    println!("  --server <ADDR> Matchmaker address (default: <bind>:{DEFAULT_MATCHMAKING_PORT})");
    println!("  --id <ID>       Matchmaking identifier (default: <bind>:<port>)");
    println!("  --serve         Also run the matchmaker in this process");
    println!("  --help, -h      Show this help");
}
