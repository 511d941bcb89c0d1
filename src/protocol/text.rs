//! Text protocol subset
//!
//! Only what topology discovery needs: `stats` for the server version and the
//! cluster configuration commands.
//!
//! ```text
//! config get cluster\r\n
//! CONFIG cluster 0 <bytes>\r\n<payload>\r\nEND\r\n
//!
//! get AmazonElastiCache:cluster\r\n          (servers before 1.4.14)
//! VALUE AmazonElastiCache:cluster 0 <bytes>\r\n<payload>\r\nEND\r\n
//! ```

use std::collections::HashMap;
use std::io::Read;

use bytes::{Bytes, BytesMut};

use super::OperationResult;
use super::Operation;
use crate::error::{ClusterError, Result};

const GENERIC_ERROR: &str = "ERROR";
const CLIENT_ERROR: &str = "CLIENT_ERROR ";
const SERVER_ERROR: &str = "SERVER_ERROR ";
const END: &str = "END";

/// Longest response line accepted, terminator excluded
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Largest data block accepted; cluster configurations are a few KiB
pub const MAX_DATA_BLOCK_LENGTH: usize = 1024 * 1024;

/// Key holding the cluster configuration on servers without `config get`
pub const LEGACY_CONFIG_KEY: &str = "AmazonElastiCache:cluster";

/// A response line, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextReply {
    /// Anything that is not an error
    Line(String),
    /// `ERROR`: unknown command or malformed request
    Error,
    /// `CLIENT_ERROR <message>`
    ClientError(String),
    /// `SERVER_ERROR <message>`
    ServerError(String),
}

impl TextReply {
    pub fn classify(line: String) -> Self {
        if line == GENERIC_ERROR {
            TextReply::Error
        } else if let Some(message) = line.strip_prefix(CLIENT_ERROR) {
            TextReply::ClientError(message.to_string())
        } else if let Some(message) = line.strip_prefix(SERVER_ERROR) {
            TextReply::ServerError(message.to_string())
        } else {
            TextReply::Line(line)
        }
    }

    /// The line itself, or the failed result an error reply stands for
    pub fn into_line(self) -> std::result::Result<String, OperationResult> {
        match self {
            TextReply::Line(line) => Ok(line),
            TextReply::Error => Err(OperationResult::fail(
                "Operation is not supported by the server or the request was malformed",
            )),
            TextReply::ClientError(message) => {
                Err(OperationResult::fail(format!("client error: {}", message)))
            }
            TextReply::ServerError(message) => {
                Err(OperationResult::fail(format!("server error: {}", message)))
            }
        }
    }
}

/// Read one `\r\n` terminated line (a lone `\r` is kept as data)
///
/// Lines longer than [`MAX_LINE_LENGTH`] are a protocol error.
pub fn read_line(reader: &mut dyn Read) -> Result<String> {
    let mut line = Vec::with_capacity(64);
    let mut got_cr = false;
    let mut byte = [0u8; 1];

    loop {
        if line.len() > MAX_LINE_LENGTH {
            return Err(ClusterError::Protocol(format!(
                "response line exceeds {} bytes",
                MAX_LINE_LENGTH
            )));
        }
        reader.read_exact(&mut byte)?;
        let data = byte[0];

        if data == b'\r' {
            if got_cr {
                line.push(b'\r');
            }
            got_cr = true;
            continue;
        }
        if got_cr {
            if data == b'\n' {
                break;
            }
            line.push(b'\r');
            got_cr = false;
        }
        line.push(data);
    }

    let line = String::from_utf8_lossy(&line).into_owned();
    tracing::trace!("Read line: {}", line);
    Ok(line)
}

/// Read and classify one response line; an empty line is a protocol error
pub fn read_response(reader: &mut dyn Read) -> Result<TextReply> {
    let line = read_line(reader)?;
    tracing::debug!("Received response: {}", line);

    if line.is_empty() {
        return Err(ClusterError::Protocol("empty response received".to_string()));
    }

    Ok(TextReply::classify(line))
}

/// Header of a data block: `<VALUE|CONFIG> <key> <flags> <bytes> [<cas>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemHeader {
    pub key: String,
    pub flags: u32,
    pub length: usize,
    pub cas: Option<u64>,
}

impl ItemHeader {
    pub fn parse(line: &str, keyword: &str) -> Result<Self> {
        let mut parts = line.split(' ');
        if parts.next() != Some(keyword) {
            return Err(ClusterError::Protocol(format!(
                "expected {} line, got {:?}",
                keyword, line
            )));
        }

        let invalid = || ClusterError::Protocol(format!("invalid {} line: {:?}", keyword, line));

        let key = parts.next().ok_or_else(invalid)?.to_string();
        let flags = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let length = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let cas = match parts.next() {
            Some(p) => Some(p.parse().map_err(|_| invalid())?),
            None => None,
        };

        Ok(Self {
            key,
            flags,
            length,
            cas,
        })
    }
}

/// Read a data block announced by `header`, including its trailing `\r\n`
pub fn read_data_block(reader: &mut dyn Read, header: &ItemHeader) -> Result<Bytes> {
    if header.length > MAX_DATA_BLOCK_LENGTH {
        return Err(ClusterError::Protocol(format!(
            "data block for {} announces {} bytes, the limit is {}",
            header.key, header.length, MAX_DATA_BLOCK_LENGTH
        )));
    }

    let mut data = BytesMut::zeroed(header.length + 2);
    reader.read_exact(&mut data)?;

    if &data[header.length..] != b"\r\n" {
        return Err(ClusterError::Protocol(format!(
            "data block for {} is not terminated by CRLF",
            header.key
        )));
    }

    data.truncate(header.length);
    Ok(data.freeze())
}

fn expect_end(reader: &mut dyn Read) -> Result<()> {
    let line = read_line(reader)?;
    if line != END {
        return Err(ClusterError::Protocol(format!("expected END, got {:?}", line)));
    }
    Ok(())
}

// =============================================================================
// Stats
// =============================================================================

/// Text `stats` command
#[derive(Debug, Default)]
pub struct TextStatsOperation {
    group: Option<String>,
    stats: HashMap<String, String>,
}

impl TextStatsOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            stats: HashMap::new(),
        }
    }

    pub fn stats(&self) -> &HashMap<String, String> {
        &self.stats
    }

    /// The `version` statistic
    pub fn version(&self) -> Option<&str> {
        self.stats.get("version").map(String::as_str)
    }
}

impl Operation for TextStatsOperation {
    fn build_request(&mut self) -> Vec<Bytes> {
        let command = match &self.group {
            Some(group) if !group.is_empty() => format!("stats {}\r\n", group),
            _ => "stats\r\n".to_string(),
        };
        vec![Bytes::from(command)]
    }

    fn read_response(&mut self, reader: &mut dyn Read) -> Result<OperationResult> {
        self.stats.clear();

        loop {
            let line = match read_response(reader)?.into_line() {
                Ok(line) => line,
                Err(failure) => return Ok(failure),
            };

            if line == END {
                return Ok(OperationResult::pass());
            }

            // STAT <name> <value>
            let mut parts = line.splitn(3, ' ');
            match (parts.next(), parts.next(), parts.next()) {
                (Some("STAT"), Some(name), value) => {
                    self.stats
                        .insert(name.to_string(), value.unwrap_or_default().to_string());
                }
                _ => {
                    return Err(ClusterError::Protocol(format!(
                        "unexpected stats line: {:?}",
                        line
                    )))
                }
            }
        }
    }
}

// =============================================================================
// Cluster configuration
// =============================================================================

/// Fetch the cluster configuration blob
#[derive(Debug)]
pub struct ConfigGetOperation {
    legacy: bool,
    config: Option<Bytes>,
}

impl ConfigGetOperation {
    /// `config get cluster`
    pub fn new() -> Self {
        Self {
            legacy: false,
            config: None,
        }
    }

    /// `get AmazonElastiCache:cluster`, for servers before 1.4.14
    pub fn legacy() -> Self {
        Self {
            legacy: true,
            config: None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Raw configuration payload
    pub fn config(&self) -> Option<&Bytes> {
        self.config.as_ref()
    }
}

impl Default for ConfigGetOperation {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for ConfigGetOperation {
    fn build_request(&mut self) -> Vec<Bytes> {
        let command = if self.legacy {
            format!("get {}\r\n", LEGACY_CONFIG_KEY)
        } else {
            "config get cluster\r\n".to_string()
        };
        vec![Bytes::from(command)]
    }

    fn read_response(&mut self, reader: &mut dyn Read) -> Result<OperationResult> {
        self.config = None;

        let line = match read_response(reader)?.into_line() {
            Ok(line) => line,
            Err(failure) => return Ok(failure),
        };

        if line == END {
            return Ok(OperationResult::fail("cluster configuration not found"));
        }

        let keyword = if self.legacy { "VALUE" } else { "CONFIG" };
        let header = ItemHeader::parse(&line, keyword)?;
        let data = read_data_block(reader, &header)?;
        expect_end(reader)?;

        self.config = Some(data);
        Ok(OperationResult::pass())
    }
}
