//! ttlkv - Expiring Key-Value Store Shell
//!
//! Opens a store and either runs the single command given on the command
//! line or reads commands from stdin, one per line.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use ttlkv::commands::CommandHandler;
use ttlkv::{Config, GcScheduler, SledEngine, Store};

/// Command-line options
#[derive(Debug, Default)]
struct CliArgs {
    /// Database directory, overrides the config file
    path: Option<PathBuf>,
    /// Use a throwaway database
    temporary: bool,
    /// TOML config file
    config: Option<PathBuf>,
    /// Command to run instead of the interactive shell
    command: Vec<String>,
}

impl CliArgs {
    /// Parse options from command-line arguments
    fn from_args() -> Self {
        let mut cli = CliArgs::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--path" | "-p" => {
                    if i + 1 < args.len() {
                        cli.path = Some(PathBuf::from(&args[i + 1]));
                        i += 2;
                    } else {
                        eprintln!("Error: --path requires a value");
                        std::process::exit(1);
                    }
                }
                "--config" | "-c" => {
                    if i + 1 < args.len() {
                        cli.config = Some(PathBuf::from(&args[i + 1]));
                        i += 2;
                    } else {
                        eprintln!("Error: --config requires a value");
                        std::process::exit(1);
                    }
                }
                "--temporary" | "-t" => {
                    cli.temporary = true;
                    i += 1;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("ttlkv version {}", ttlkv::VERSION);
                    std::process::exit(0);
                }
                arg if arg.starts_with('-') => {
                    eprintln!("Unknown argument: {}", arg);
                    print_help();
                    std::process::exit(1);
                }
                _ => {
                    // Everything from the first positional argument on is the command
                    cli.command = args[i..].to_vec();
                    break;
                }
            }
        }

        cli
    }

    /// Builds the store configuration from the config file and flags.
    fn store_config(&self) -> ttlkv::Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(path) = &self.path {
            config.engine.path = path.clone();
        }
        if self.temporary {
            config.engine.temporary = true;
        }
        Ok(config)
    }
}

fn print_help() {
    println!(
        r#"
ttlkv - Expiring key-value store

USAGE:
    ttlkv [OPTIONS] [COMMAND [ARGS...]]

OPTIONS:
    -p, --path <DIR>       Database directory (default: ./ttlkv-data)
    -t, --temporary        Use a temporary database, removed on exit
    -c, --config <FILE>    Load settings from a TOML file
    -v, --version          Print version information
    -h, --help             Print this help message

ENVIRONMENT:
    TTLKV__ENGINE__PATH=...        Override any config key
    RUST_LOG=debug                 Log filter (default: warn)

COMMANDS:
    GET key                 SET key value          DEL key [key ...]
    EXISTS key [key ...]    XGET key               XSET key value
    XSETEX key secs value   TTL key                EXPIRE key secs
    EXPIREAT key unixtime   INCR key               INCRBY key delta
    DECR key                DECRBY key delta       KEYS [prefix]
    XKEYS [prefix]          GC [ratio]             PING [message]

EXAMPLES:
    ttlkv XSETEX session:1 3600 token
    ttlkv TTL session:1
    (integer) 3600
    echo "INCR visits" | ttlkv --path /var/lib/ttlkv
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse command-line arguments
    let cli = CliArgs::from_args();

    // Set up logging on stderr so replies stay clean on stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = cli.store_config()?;
    let store = Store::with_config(&config)?;
    info!(
        path = %config.engine.path.display(),
        temporary = config.engine.temporary,
        "Store opened"
    );

    let handler = CommandHandler::new(store.clone()).with_discard_ratio(config.gc.discard_ratio);

    let status = if cli.command.is_empty() {
        // Long-lived session: reclaim space in the background
        let _gc = GcScheduler::start(store.clone(), config.gc.clone());

        tokio::select! {
            result = run_shell(&handler) => result?,
            _ = signal::ctrl_c() => {
                info!("Interrupted, closing store");
            }
        }
        ExitCode::SUCCESS
    } else {
        let reply = handler.execute(cli.command.as_slice());
        println!("{}", reply);
        if reply.is_error() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    };

    drop(handler);
    store.close()?;
    Ok(status)
}

/// Reads commands from stdin until EOF or `QUIT`.
async fn run_shell(handler: &CommandHandler<SledEngine>) -> anyhow::Result<()> {
    let interactive = std::io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if interactive {
            print!("ttlkv> ");
            std::io::stdout().flush()?;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        debug!(command = line, "Executing");
        println!("{}", handler.execute_line(line));
    }

    Ok(())
}
