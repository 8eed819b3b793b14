use std::{io, net::SocketAddr};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::framing::{DEFAULT_CHUNK_SIZE, Framing};

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve one client at a time until a client sends `qqqs`.
    Server(ServerArgs),
    /// Connect to a server and send lines typed on stdin.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Socket address to listen on. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "[::]:5000")]
    pub listen: SocketAddr,

    #[command(flatten)]
    pub framing: FramingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Host name or address of the server.
    #[arg(default_value = "127.0.0.1")]
    pub host: String,

    /// Port the server listens on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[command(flatten)]
    pub framing: FramingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FramingArgs {
    /// How messages are delimited on the wire. Both ends must agree.
    #[arg(long, value_enum, default_value_t = FramingMode::Delimited)]
    pub framing: FramingMode,

    /// Read size in bytes for `--framing fixed`.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// Newline-terminated messages.
    Delimited,
    /// Each read of up to `--chunk-size` bytes is one message.
    Fixed,
}

impl FramingArgs {
    /// Fails when `--chunk-size 0` is combined with `--framing fixed`.
    pub fn framing(&self) -> io::Result<Framing> {
        match self.framing {
            FramingMode::Delimited => Ok(Framing::newline()),
            FramingMode::Fixed => Framing::fixed(self.chunk_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_subcommands_use_reference_defaults() {
        let cli = Cli::try_parse_from(["tcp-session", "server"]).expect("parse");
        let Command::Server(args) = cli.command else {
            panic!("expected server");
        };
        assert_eq!(args.listen, "[::]:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(args.framing.framing().expect("framing"), Framing::newline());

        let cli = Cli::try_parse_from(["tcp-session", "client"]).expect("parse");
        let Command::Client(args) = cli.command else {
            panic!("expected client");
        };
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 5000);
    }

    #[test]
    fn fixed_framing_takes_chunk_size() {
        let cli = Cli::try_parse_from([
            "tcp-session",
            "client",
            "example.org",
            "--framing",
            "fixed",
            "--chunk-size",
            "64",
        ])
        .expect("parse");
        let Command::Client(args) = cli.command else {
            panic!("expected client");
        };
        assert_eq!(args.host, "example.org");
        assert_eq!(
            args.framing.framing().expect("framing"),
            Framing::fixed(64).expect("chunk size")
        );
    }

    #[test]
    fn zero_chunk_size_is_rejected_for_fixed_framing() {
        let cli = Cli::try_parse_from([
            "tcp-session",
            "server",
            "--framing",
            "fixed",
            "--chunk-size",
            "0",
        ])
        .expect("parse");
        let Command::Server(args) = cli.command else {
            panic!("expected server");
        };
        assert!(args.framing.framing().is_err());
    }
}
