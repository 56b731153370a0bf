//! Command-line arguments.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Wire protocol selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    Tcp,
    Ws,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Ws => f.write_str("ws"),
        }
    }
}

/// Demo echo gateway.
#[derive(Debug, Parser)]
#[command(name = "mock_srv", version, about)]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(short = 'a', long = "address", default_value = "0.0.0.0:8000")]
    pub address: String,

    /// Wire protocol
    #[arg(short = 'p', long = "protocol", value_enum, default_value_t = Protocol::Tcp)]
    pub protocol: Protocol,

    /// Optional TOML configuration file
    #[arg(long, env = "PORTICO_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Demo client: sends `hello` messages and prints the replies.
#[derive(Debug, Parser)]
#[command(name = "mock_cli", version, about)]
pub struct ClientArgs {
    /// Gateway address to dial
    #[arg(short = 'a', long = "address", default_value = "127.0.0.1:8000")]
    pub address: String,

    /// Wire protocol
    #[arg(short = 'p', long = "protocol", value_enum, default_value_t = Protocol::Tcp)]
    pub protocol: Protocol,

    /// Identity to log in with (random when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Optional TOML configuration file
    #[arg(long, env = "PORTICO_CONFIG")]
    pub config: Option<PathBuf>,
}
