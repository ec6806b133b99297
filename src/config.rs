//! Process configuration
//!
//! The hub has three knobs: where to listen, how many payloads each session
//! may have queued, and what to do when a session's queue is full.
//!
//! Usage: `broadcast_hub [ADDR] [drop-newest|disconnect]`

use std::str::FromStr;

use crate::error::ConfigError;

/// Default listen address
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Default per-session outbound queue capacity
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// What a broadcast does for a recipient whose outbound queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the payload for that recipient only
    #[default]
    DropNewest,
    /// Remove the recipient from the room and close its queue
    Disconnect,
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop-newest" => Ok(Self::DropNewest),
            "disconnect" => Ok(Self::Disconnect),
            _ => Err(ConfigError::UnknownOverflowPolicy(s.to_string())),
        }
    }
}

/// Hub configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the front door listens on
    pub addr: String,
    /// Capacity of each session's outbound queue
    pub outbound_capacity: usize,
    /// Full-queue behavior during broadcast
    pub overflow: OverflowPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl Config {
    /// Build the configuration from command line arguments
    ///
    /// The first argument (after the program name) replaces the listen
    /// address, the second selects the overflow policy. Missing arguments
    /// keep their defaults.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter().skip(1);

        if let Some(addr) = args.next() {
            config.addr = addr;
        }
        if let Some(policy) = args.next() {
            config.overflow = policy.parse::<OverflowPolicy>()?;
        }

        Ok(config)
    }
}
