//! Configuration poller
//!
//! Periodically asks the discovery node for the member list and pushes
//! changes into the server pool. A failed poll re-resolves the configuration
//! endpoint and tries once more; if that fails too the pool gets an empty
//! node list. The loop itself never stops on error.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use super::{DiscoveryNode, ServerPool};
use crate::error::Result;

/// What a single poll did to the server pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The pool was given a new list of this many endpoints
    Updated(usize),
    /// Version and node count matched, nothing to do
    Unchanged,
    /// Configuration could not be fetched; the pool now has no nodes
    Degraded,
}

pub struct ConfigurationPoller {
    interval: Duration,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ConfigurationPoller {
    /// Poll once right away, then every `interval` on a background thread
    pub fn start(discovery: Arc<DiscoveryNode>, pool: ServerPool, interval: Duration) -> Result<Self> {
        tracing::debug!("Starting configuration poller ({:?})", interval);
        poll_once(&discovery, &pool);

        let (stop, stopped) = channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("memcluster-poller".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        poll_once(&discovery, &pool);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            interval,
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop polling and wait for an in-progress poll to finish
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            tracing::debug!("Stopping configuration poller");
            let _ = stop.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for ConfigurationPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One poll cycle
pub fn poll_once(discovery: &DiscoveryNode, pool: &ServerPool) -> PollOutcome {
    tracing::debug!("Polling cluster configuration");

    match refresh(discovery, pool) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::debug!(
                "Error updating endpoints, re-resolving the configuration endpoint: {}",
                e
            );

            let retry = discovery
                .resolve_endpoint()
                .and_then(|_| refresh(discovery, pool));

            match retry {
                Ok(outcome) => outcome,
                Err(e) => {
                    // most likely not running where the cluster is reachable
                    tracing::debug!(
                        "Error updating endpoints, setting endpoints to an empty list: {}",
                        e
                    );
                    pool.update_locator(&[]);
                    PollOutcome::Degraded
                }
            }
        }
    }
}

fn refresh(discovery: &DiscoveryNode, pool: &ServerPool) -> Result<PollOutcome> {
    let old_version = discovery.cluster_version();
    let endpoints = discovery.get_endpoint_list()?;

    if old_version != discovery.cluster_version() || endpoints.len() != pool.working_nodes().len() {
        tracing::debug!("Updating endpoints to have {} nodes", endpoints.len());
        pool.update_locator(&endpoints);
        return Ok(PollOutcome::Updated(endpoints.len()));
    }

    Ok(PollOutcome::Unchanged)
}
