use anyhow::Result;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::account_store::OverdraftPolicy;
use crate::operation_types::OperationTypeRegistry;

/// Command line and environment configuration of the ledger server
#[derive(Debug, Clone, Parser)]
#[command(name = "ledger-engine", version, about = "In-memory account ledger over HTTP")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "LEDGER_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Reject debits that would take a balance below zero
    #[arg(long, env = "LEDGER_DENY_OVERDRAFT")]
    pub deny_overdraft: bool,

    /// Take negative amounts by their magnitude instead of rejecting them
    #[arg(long, env = "LEDGER_ACCEPT_SIGNED_AMOUNTS")]
    pub accept_signed_amounts: bool,

    /// TOML file with the accepted operation types (built-in defaults otherwise)
    #[arg(long, env = "LEDGER_OPERATION_TYPES")]
    pub operation_types: Option<PathBuf>,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, env = "LEDGER_SHUTDOWN_TIMEOUT_SECS", default_value_t = 30)]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn overdraft_policy(&self) -> OverdraftPolicy {
        if self.deny_overdraft {
            OverdraftPolicy::Deny
        } else {
            OverdraftPolicy::Allow
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn load_registry(&self) -> Result<OperationTypeRegistry> {
        match &self.operation_types {
            Some(path) => OperationTypeRegistry::from_file(path),
            None => Ok(OperationTypeRegistry::default()),
        }
    }
}
