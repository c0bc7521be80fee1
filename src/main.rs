//! latchkv - A Networked In-Memory Key-Value Store
//!
//! This is the main entry point for the latchkv server.
//! It parses the listen port, builds the shared store, and runs the
//! dispatch server until Ctrl+C.

use latchkv::server::{Server, DEFAULT_WORKERS};
use latchkv::storage::Store;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Port to listen on
    port: u16,
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();

        if args.len() != 2 {
            print_help();
            std::process::exit(1);
        }

        match args[1].as_str() {
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("latchkv version {}", latchkv::VERSION);
                std::process::exit(0);
            }
            raw => {
                let port = raw.parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid port number: {}", raw);
                    print_help();
                    std::process::exit(1);
                });
                Self { port }
            }
        }
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", latchkv::DEFAULT_HOST, self.port)
    }
}

fn print_help() {
    println!(
        r#"
latchkv - A Networked In-Memory Key-Value Store

USAGE:
    latchkv <PORT>

OPTIONS:
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    latchkv 4000                   # Start on 127.0.0.1:4000

CONNECTING:
    Use the bundled CLI to talk to the server:
    $ latchkv-cli 127.0.0.1 4000 put name kv
    name = kv
    $ latchkv-cli 127.0.0.1 4000 get name
    kv
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
 _         _          _      _
| |  __ _ | |_   ___ | |__  | | ____   __
| | / _` || __| / __|| '_ \ | |/ /\ \ / /
| || (_| || |_ | (__ | | | ||   <  \ V /
|_| \__,_| \__| \___||_| |_||_|\_\  \_/

latchkv v{} - Networked In-Memory Key-Value Store
──────────────────────────────────────────────────────────────
Server started on {}
Serving with {} workers, one request per connection.

Use Ctrl+C to shutdown gracefully.
"#,
        latchkv::VERSION,
        config.bind_address(),
        DEFAULT_WORKERS
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Print the banner
    print_banner(&config);

    // Create the store (shared across all connections)
    let store = Arc::new(Store::new());
    info!("Store initialized");

    // Bind the listener and start the worker pool
    let server = Server::bind(config.bind_address(), store).await?;
    info!("Listening on {}", config.bind_address());

    server.run_until_ctrl_c().await?;

    info!("Server shutdown complete");
    Ok(())
}
