use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The address the HTTP server will listen on.
    pub listen_address: IpAddr,
    /// The port the HTTP server will listen on. `0` lets the OS pick a free port.
    pub listen_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            listen_port: 9000,
        }
    }
}
