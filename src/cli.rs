//! The `chordnet` binary's command-line surface (§10.5): ring identity, bootstrap peer, and
//! the knobs §10.3's `Settings` otherwise defaults.

use clap::Parser;
use std::net::IpAddr;

#[derive(Parser, Debug)]
#[command(name = "chordnet", about = "A Chord distributed hash table peer")]
pub struct Cli {
    /// Address this peer binds to and derives its ring identifier from.
    #[arg(long, default_value = "127.0.0.1")]
    pub ip: IpAddr,

    /// Port this peer binds to. `0` is not special-cased here (unlike the external-interface
    /// convention of "bootstrap node"); bind a real port and pass `--join` to reach a ring.
    #[arg(long)]
    pub port: u16,

    /// `ip:port` of an existing ring member to join through. Omit to start a new
    /// single-node ring.
    #[arg(long)]
    pub join: Option<String>,

    /// Replication factor (`REPLICAS`), must be >= 2.
    #[arg(long, default_value_t = 2)]
    pub replicas: usize,

    /// Repeat for more verbosity: unset = warn, -v = info, -vv = debug, -vvv = trace.
    #[arg(short, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn env_filter_directive(&self) -> &'static str {
        match self.verbose {
            0 => "chordnet=warn",
            1 => "chordnet=info",
            2 => "chordnet=debug",
            _ => "chordnet=trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_count_maps_to_expected_directive() {
        let mut cli = Cli { ip: "127.0.0.1".parse().unwrap(), port: 10001, join: None, replicas: 2, verbose: 0 };
        assert_eq!(cli.env_filter_directive(), "chordnet=warn");
        cli.verbose = 2;
        assert_eq!(cli.env_filter_directive(), "chordnet=debug");
    }
}
