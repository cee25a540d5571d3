use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use crossterm::execute;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use oracle_arena::server::{
    ChallengeKind, ChallengeService, ServerConfig, ServerState, SessionFactory,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Interactive cryptographic challenge server", long_about = None)]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Challenge hosted by every session
    #[arg(short, long, env = "SERVER_KIND", value_enum)]
    kind: Option<ChallengeKind>,

    /// File holding the flag
    #[arg(short, long, env = "SERVER_FLAG_FILE")]
    flag_file: Option<PathBuf>,

    /// Run without the interactive console
    #[arg(long)]
    headless: bool,
}

enum Command {
    Status,
    Sessions,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(input: &str) -> Self {
        let input = input.trim();

        if input.is_empty() {
            return Command::Unknown(String::new());
        }

        if !input.starts_with('/') {
            return Command::Unknown(
                "Commands must start with '/'. Type /help for available commands.".to_string(),
            );
        }

        let cmd = input.split_whitespace().next().unwrap_or("").to_lowercase();

        match cmd.as_str() {
            "/status" | "/st" => Command::Status,
            "/sessions" | "/s" => Command::Sessions,
            "/help" | "/h" | "/?" => Command::Help,
            "/quit" | "/exit" | "/q" => Command::Quit,
            _ => Command::Unknown(format!(
                "Unknown command: {cmd}. Type /help for available commands."
            )),
        }
    }
}

fn print_colored(color: Color, text: &str) {
    let mut stdout = io::stdout();
    execute!(stdout, SetForegroundColor(color), Print(text), ResetColor).ok();
    stdout.flush().ok();
}

fn println_colored(color: Color, text: &str) {
    print_colored(color, text);
    println!();
}

fn display_banner() {
    println!();
    println_colored(
        Color::Cyan,
        "+---------------------------------------------------------+",
    );
    println_colored(
        Color::Cyan,
        "|            Oracle Arena Challenge Server                |",
    );
    println_colored(
        Color::Cyan,
        "+---------------------------------------------------------+",
    );
    println!();
}

fn display_help() {
    println!();
    println_colored(Color::Yellow, "Available Commands:");
    println!();
    println!("  /status              - Show server status and configuration");
    println!("  /sessions            - List connected sessions");
    println!("  /help                - Show this help message");
    println!("  /quit or /exit       - Stop accepting connections and exit");
    println!();
}

fn display_prompt(addr: &str) {
    print_colored(Color::Green, &format!("arena@{addr}"));
    print_colored(Color::White, "> ");
    io::stdout().flush().ok();
}

fn apply_overrides(config: &mut ServerConfig, args: &Args) {
    if let Some(host) = &args.host {
        config.server.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(kind) = args.kind {
        config.challenge.kind = kind;
    }
    if let Some(path) = &args.flag_file {
        config.challenge.flag_file = Some(path.clone());
    }
}

async fn display_sessions(state: &ServerState) {
    let sessions = state.sessions().await;
    if sessions.is_empty() {
        println_colored(Color::Cyan, "No connected sessions");
        return;
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    println_colored(Color::Cyan, &format!("Connected sessions: {}", sessions.len()));
    for session in sessions {
        println_colored(
            Color::White,
            &format!(
                "  {}  {:<21}  {:<8}  {}s",
                session.session_id,
                session.peer,
                session.kind.name(),
                now.saturating_sub(session.connected_at)
            ),
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    display_banner();

    let mut config = ServerConfig::from_env().unwrap_or_else(|e| {
        error!("Failed to load configuration: {e}");
        info!("Using default configuration");
        ServerConfig::default()
    });
    apply_overrides(&mut config, &args);

    if let Err(e) = config.validate() {
        println_colored(Color::Red, &format!("Configuration validation failed: {e}"));
        return Err(format!("Invalid configuration: {e}").into());
    }

    let flag = config.load_flag()?;
    let factory = SessionFactory::from_config(&config, flag)?;
    let state = ServerState::new(config.server.max_sessions);
    let service = ChallengeService::new(&config, factory, state.clone());

    let addr = config.server.addr()?;
    let listener = TcpListener::bind(addr).await?;
    let addr_str = listener.local_addr()?.to_string();

    println_colored(Color::Green, &format!("Server listening on {addr_str}"));
    println_colored(
        Color::White,
        &format!("  Challenge: {}", config.challenge.kind.name()),
    );
    println_colored(
        Color::White,
        &format!("  Max sessions: {}", config.server.max_sessions),
    );
    println_colored(
        Color::White,
        &format!("  Idle timeout: {}s", config.server.idle_timeout_secs),
    );
    println!();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_handle = tokio::spawn(service.serve_with_shutdown(
        listener,
        shutdown_signal(shutdown_rx),
    ));

    if args.headless {
        server_handle.await??;
        return Ok(());
    }

    println_colored(
        Color::Yellow,
        "Type /help for available commands or /quit to exit",
    );
    println!();

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        if server_handle.is_finished() {
            break;
        }
        display_prompt(&addr_str);

        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                println_colored(Color::Red, &format!("Error reading input: {e}"));
                continue;
            }
        }

        match Command::parse(&line) {
            Command::Status => {
                let session_count = state.session_count().await;

                println!();
                println_colored(Color::Cyan, "Server Status:");
                println_colored(Color::White, &format!("  Address: {addr_str}"));
                println_colored(
                    Color::White,
                    &format!("  Challenge: {}", config.challenge.kind.name()),
                );
                println_colored(
                    Color::White,
                    &format!("  RSA modulus: {} bits", config.oracle.rsa_bits),
                );
                println_colored(
                    Color::White,
                    &format!(
                        "  Sessions: {session_count}/{}",
                        state.max_sessions()
                    ),
                );
                println!();
            }
            Command::Sessions => display_sessions(&state).await,
            Command::Help => display_help(),
            Command::Quit => {
                println!();
                println_colored(Color::Yellow, "Initiating shutdown...");
                let _ = shutdown_tx.send(true);
                break;
            }
            Command::Unknown(msg) => {
                if !msg.is_empty() {
                    println_colored(Color::Red, &msg);
                }
            }
        }
    }

    let _ = shutdown_tx.send(true);
    match server_handle.await {
        Ok(Ok(())) => {
            println_colored(Color::Green, "Server shutdown complete. Goodbye!");
        }
        Ok(Err(e)) => {
            println_colored(Color::Red, &format!("Server error: {e}"));
        }
        Err(e) => {
            println_colored(Color::Red, &format!("Server task panicked: {e}"));
        }
    }

    println!();
    Ok(())
}

async fn shutdown_signal(mut quit: watch::Receiver<bool>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let repl_quit = async {
        while !*quit.borrow_and_update() {
            if quit.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
        _ = repl_quit => {
            info!("Shutdown requested via console");
        },
    }
}
