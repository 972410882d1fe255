//! respkv CLI Client
//!
//! Command-line interface for sending commands to a respkv server.

use clap::{Parser, Subcommand};
use respkv::Client;
use tracing_subscriber::{fmt, EnvFilter};

/// respkv CLI
#[derive(Parser, Debug)]
#[command(name = "respkv-cli")]
#[command(about = "CLI for the respkv key-value server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = respkv::config::DEFAULT_LISTEN_ADDR)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Set `count` keys, one connection each: <key-prefix>i → <value-prefix>i
    Fill {
        #[arg(short, long, default_value = "10")]
        count: usize,

        #[arg(long, default_value = "foo_")]
        key_prefix: String,

        #[arg(long, default_value = "bar_")]
        value_prefix: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let client = Client::new(&args.server);

    let result = match args.command {
        Commands::Set { key, value } => client.set(&key, &value).map(|()| 1),
        Commands::Fill {
            count,
            key_prefix,
            value_prefix,
        } => (0..count)
            .try_for_each(|i| {
                client.set(&format!("{}{}", key_prefix, i), &format!("{}{}", value_prefix, i))
            })
            .map(|()| count),
    };

    match result {
        Ok(sent) => println!("Sent {} command(s) to {}", sent, client.address()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
