//! Cluster configuration payload
//!
//! ```text
//! <version>\n
//! <host>|<ip>|<port> <host>|<ip>|<port> ...\n
//! ```

use std::net::{IpAddr, SocketAddr};

use super::EndpointResolver;
use crate::error::{ClusterError, Result};

/// One member of the cluster as announced by the configuration endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEndpoint {
    pub hostname: String,
    pub ip: Option<IpAddr>,
    pub port: u16,
}

impl ClusterEndpoint {
    /// Parse `host|ip|port`; the ip field may be empty
    pub fn parse(entry: &str) -> Result<Self> {
        let invalid = || ClusterError::Protocol(format!("invalid cluster endpoint {:?}", entry));

        let mut parts = entry.split('|');
        let hostname = parts.next().ok_or_else(invalid)?.trim().to_string();
        let ip = parts.next().ok_or_else(invalid)?.trim();
        let port = parts.next().ok_or_else(invalid)?.trim();
        if parts.next().is_some() {
            return Err(invalid());
        }

        let ip = if ip.is_empty() {
            None
        } else {
            Some(ip.parse().map_err(|_| invalid())?)
        };
        let port = port.parse().map_err(|_| invalid())?;

        if hostname.is_empty() && ip.is_none() {
            return Err(invalid());
        }

        Ok(Self { hostname, ip, port })
    }

    /// Socket address of the member, using the announced ip when present
    pub fn resolve(&self, resolver: &dyn EndpointResolver) -> Result<SocketAddr> {
        if let Some(ip) = self.ip {
            return Ok(SocketAddr::new(ip, self.port));
        }

        resolver
            .resolve(&self.hostname, self.port)
            .map_err(|e| ClusterError::Dns(format!("{}: {}", self.hostname, e)))?
            .into_iter()
            .next()
            .ok_or_else(|| ClusterError::Dns(format!("{} has no addresses", self.hostname)))
    }
}

/// A versioned cluster member list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub version: u64,
    pub endpoints: Vec<ClusterEndpoint>,
}

impl ClusterConfig {
    pub fn parse(payload: &str) -> Result<Self> {
        let mut lines = payload
            .split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty());

        let version_line = lines
            .next()
            .ok_or_else(|| ClusterError::Protocol("empty cluster configuration".to_string()))?;
        let version = version_line.trim().parse().map_err(|_| {
            ClusterError::Protocol(format!("invalid cluster config version {:?}", version_line))
        })?;

        let endpoints = match lines.next() {
            Some(line) => line
                .split_whitespace()
                .map(ClusterEndpoint::parse)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self { version, endpoints })
    }

    pub fn from_bytes(payload: &[u8]) -> Result<Self> {
        Self::parse(&String::from_utf8_lossy(payload))
    }

    /// Socket addresses of all members that resolve, without duplicates
    pub fn resolve(&self, resolver: &dyn EndpointResolver) -> Vec<SocketAddr> {
        let mut addresses: Vec<SocketAddr> = Vec::with_capacity(self.endpoints.len());

        for endpoint in &self.endpoints {
            match endpoint.resolve(resolver) {
                Ok(address) if !addresses.contains(&address) => addresses.push(address),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping cluster member: {}", e),
            }
        }

        addresses
    }
}
