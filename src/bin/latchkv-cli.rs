//! latchkv-cli - Command-line client for latchkv
//!
//! Sends requests to a running latchkv server. Every request travels on
//! its own connection, matching the one-request-per-connection protocol.

use latchkv::client::Client;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// What the invocation asked for
enum Command {
    Put { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Exercise { count: usize },
}

/// Parsed command line
struct Args {
    addr: String,
    command: Command,
}

impl Args {
    /// Parse the command line, exiting with usage on anything malformed
    fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();

        if args.len() < 4 {
            print_usage();
            std::process::exit(1);
        }

        let host = args[1].clone();
        let port: u16 = args[2].parse().unwrap_or_else(|_| {
            eprintln!("Error: invalid port number: {}", args[2]);
            print_usage();
            std::process::exit(1);
        });
        let addr = format!("{}:{}", host, port);

        let command = match args[3].as_str() {
            "put" if args.len() == 6 => Command::Put {
                key: args[4].clone(),
                value: args[5].clone(),
            },
            "get" if args.len() == 5 => Command::Get {
                key: args[4].clone(),
            },
            "del" if args.len() == 5 => Command::Delete {
                key: args[4].clone(),
            },
            "exercise" if args.len() == 4 => Command::Exercise { count: 200 },
            "exercise" if args.len() == 5 => Command::Exercise {
                count: args[4].parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid request count: {}", args[4]);
                    std::process::exit(1);
                }),
            },
            _ => {
                print_usage();
                std::process::exit(1);
            }
        };

        Self { addr, command }
    }
}

fn print_usage() {
    println!(
        r#"
latchkv-cli - Command-line client for latchkv

USAGE:
    latchkv-cli <HOST> <PORT> <COMMAND>

COMMANDS:
    put <KEY> <VALUE>    Store a value under a key
    get <KEY>            Look up a key
    del <KEY>            Remove a key
    exercise [COUNT]     Run a mixed workload (default: 200 requests)

EXAMPLES:
    latchkv-cli 127.0.0.1 4000 put name kv
    latchkv-cli 127.0.0.1 4000 get name
    latchkv-cli 127.0.0.1 4000 del name
    latchkv-cli 127.0.0.1 4000 exercise 1000
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::from_env();

    // Keep the client quiet unless something goes wrong
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_target(false)
        .init();

    let client = Client::new(args.addr);

    match args.command {
        Command::Put { key, value } => {
            let response = client.put(key, value).await?;
            println!("{} = {}", response.key, response.value);
        }
        Command::Get { key } => match client.get_value(key).await? {
            Some(value) => println!("{}", value),
            None => println!("(not found)"),
        },
        Command::Delete { key } => {
            let response = client.delete(key).await?;
            println!("deleted {}", response.key);
        }
        Command::Exercise { count } => {
            run_exercise(&client, count).await?;
        }
    }

    Ok(())
}

/// Drives a deterministic mixed workload against the server.
///
/// Requests cycle through put, read-back, probe, delete over a bounded
/// keyspace, so repeated runs are comparable.
async fn run_exercise(client: &Client, count: usize) -> anyhow::Result<()> {
    const KEY_SPACE: usize = 1000;

    let mut puts = 0usize;
    let mut hits = 0usize;
    let mut misses = 0usize;
    let mut deletes = 0usize;

    for i in 0..count {
        let slot = (i / 4) % KEY_SPACE;
        let key = format!("key-{}", slot);

        match i % 4 {
            0 => {
                client.put(key, format!("value-{}", i)).await?;
                puts += 1;
            }
            1 => match client.get_value(key).await? {
                Some(_) => hits += 1,
                None => misses += 1,
            },
            2 => {
                // Probe a neighbouring slot, usually still empty
                let probe = format!("key-{}", (slot + 1) % KEY_SPACE);
                match client.get_value(probe).await? {
                    Some(_) => hits += 1,
                    None => misses += 1,
                }
            }
            _ => {
                client.delete(key).await?;
                deletes += 1;
            }
        }
    }

    println!(
        "exercise complete: {} requests ({} puts, {} hits, {} misses, {} deletes)",
        count, puts, hits, misses, deletes
    );

    Ok(())
}
