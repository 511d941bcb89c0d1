//! SASL authentication of new connections

use bytes::Bytes;

use crate::config::AuthConfig;
use crate::error::{ClusterError, Result};
use crate::network::PooledSocket;
use crate::protocol::{Operation, ResponseStatus, SaslStartOperation, SaslStepOperation};

/// A SASL mechanism
pub trait SaslAuthenticator: Send + Sync {
    /// Mechanism name sent as the key, e.g. "PLAIN"
    fn mechanism(&self) -> &str;

    /// Initial client response
    fn authenticate(&self) -> Bytes;

    /// Response to a server challenge
    fn step(&self, challenge: &[u8]) -> Bytes;
}

/// SASL PLAIN: `zone \0 username \0 password`
#[derive(Debug, Clone)]
pub struct PlainTextAuthenticator {
    auth_data: Bytes,
}

impl PlainTextAuthenticator {
    pub fn new(zone: &str, username: &str, password: &str) -> Self {
        let auth_data = format!("{}\0{}\0{}", zone, username, password);
        Self {
            auth_data: Bytes::from(auth_data),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.zone, &config.username, &config.password)
    }
}

impl SaslAuthenticator for PlainTextAuthenticator {
    fn mechanism(&self) -> &str {
        "PLAIN"
    }

    fn authenticate(&self) -> Bytes {
        self.auth_data.clone()
    }

    fn step(&self, _challenge: &[u8]) -> Bytes {
        Bytes::new()
    }
}

/// Run the SASL exchange on a freshly connected socket
///
/// Status 0x21 asks for another step; any other failure rejects the
/// connection.
pub(crate) fn authenticate_socket(
    socket: &mut PooledSocket,
    authenticator: &dyn SaslAuthenticator,
) -> Result<()> {
    let mechanism = Bytes::copy_from_slice(authenticator.mechanism().as_bytes());

    let mut start = SaslStartOperation::new(mechanism.clone(), authenticator.authenticate());
    socket.write_segments(&start.build_request())?;
    let mut result = start.read_response(socket)?;
    let mut status = start.status();
    let mut challenge = start.challenge().clone();

    while !result.success {
        if status != Some(ResponseStatus::AuthenticationContinue as u16) {
            tracing::warn!(
                "Authentication failed on {}, return code: 0x{:x}",
                socket.endpoint(),
                status.unwrap_or_default()
            );
            return Err(ClusterError::Auth(format!(
                "auth failed: {} ({})",
                socket.endpoint(),
                result
            )));
        }

        let mut step = SaslStepOperation::new(mechanism.clone(), authenticator.step(&challenge));
        socket.write_segments(&step.build_request())?;
        result = step.read_response(socket)?;
        status = step.status();
        challenge = step.challenge().clone();
    }

    tracing::debug!("Authenticated socket {} to {}", socket.instance_id(), socket.endpoint());
    Ok(())
}
