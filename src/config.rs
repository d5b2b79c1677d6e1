//! Runtime configuration: pacing between engine steps and command-line options.
use bitcoin::Network;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};

/// Pauses the driver inserts between externally visible actions.
///
/// These bound the request rate against the node and the store; none of them
/// matter for correctness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    /// After a block has been indexed.
    pub step: Duration,
    /// After the node reported a new chain height.
    pub tip_refresh: Duration,
    /// After a mempool poll at the tip.
    pub idle: Duration,
    /// Between fetching the mempool snapshot and indexing it.
    pub mempool_gap: Duration,
    /// Between two transactions of the same batch.
    pub tx_gap: Duration,
    /// Before retrying a failed RPC or store read.
    pub retry: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(5),
            tip_refresh: Duration::from_millis(10),
            idle: Duration::from_millis(100),
            mempool_gap: Duration::from_millis(100),
            tx_gap: Duration::from_millis(1),
            retry: Duration::from_secs(1),
        }
    }
}

impl Pacing {
    /// No pauses at all (tests).
    pub fn none() -> Self {
        Self {
            step: Duration::ZERO,
            tip_refresh: Duration::ZERO,
            idle: Duration::ZERO,
            mempool_gap: Duration::ZERO,
            tx_gap: Duration::ZERO,
            retry: Duration::ZERO,
        }
    }
}

/// Command-line options of the `spkindex` binary.
#[derive(Clone, Debug, Parser)]
#[command(version, about = "Index transaction outputs by scriptPubKey hash")]
pub struct Options {
    /// Connect to the node's JSON-RPC at <RPC_URL>.
    #[arg(long, env = "SPKINDEX_RPC_URL", default_value = "http://127.0.0.1:8332")]
    pub rpc_url: String,
    /// Authenticate to RPC as <RPC_USER>.
    #[arg(long, env = "SPKINDEX_RPC_USER")]
    pub rpc_user: Option<String>,
    /// Authenticate to RPC with <RPC_PASS>.
    #[arg(long, env = "SPKINDEX_RPC_PASS", hide_env_values = true)]
    pub rpc_pass: Option<String>,
    /// Load the RPC cookie from <COOKIE_FILE> (takes precedence over user/pass).
    #[arg(long, env = "SPKINDEX_COOKIE_FILE")]
    pub cookie_file: Option<PathBuf>,
    /// Store the index in the SQLite file at <DB>.
    #[arg(long, env = "SPKINDEX_DB", default_value = "spkindex.sqlite3")]
    pub db: PathBuf,
    /// Validate addresses against <CHAIN>.
    #[arg(long, env = "SPKINDEX_CHAIN", default_value_t = Network::Bitcoin)]
    pub chain: Network,
    /// Defaults to [`Command::Sync`].
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What the binary does; running with no subcommand means `sync`.
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Follow the node and keep the index current (runs until killed).
    Sync,
    /// Print every indexed txid with an output paying to <ADDRESS>.
    Lookup {
        /// Address to look up.
        address: String,
    },
}
