//! SASL authentication steps

use bytes::Bytes;

use crate::protocol::operation::binary_operation;
use crate::protocol::{BinaryRequest, BinaryResponse, OpCode, ResponseStep, StreamingOperation};

use super::result_from_response;

/// List the mechanisms the server supports
#[derive(Debug, Default)]
pub struct SaslListOperation {
    mechanisms: Vec<String>,
}

impl SaslListOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mechanisms(&self) -> &[String] {
        &self.mechanisms
    }

    fn build(&mut self) -> Vec<Bytes> {
        BinaryRequest::new(OpCode::SaslList).to_segments()
    }
}

impl StreamingOperation for SaslListOperation {
    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        if response.is_success() {
            self.mechanisms = String::from_utf8_lossy(&response.value)
                .split_whitespace()
                .map(str::to_string)
                .collect();
        }
        ResponseStep::Done(result_from_response(&response))
    }
}

binary_operation!(SaslListOperation);

/// Shared shape of SASL start and step: mechanism as key, payload as value
#[derive(Debug)]
struct SaslExchange {
    opcode: OpCode,
    mechanism: Bytes,
    payload: Bytes,
    status: Option<u16>,
    challenge: Bytes,
}

impl SaslExchange {
    fn build(&mut self) -> Vec<Bytes> {
        BinaryRequest::new(self.opcode)
            .with_key(self.mechanism.clone())
            .with_value(self.payload.clone())
            .to_segments()
    }

    fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
        let result = result_from_response(&response);
        self.status = Some(response.status());
        self.challenge = response.value;
        ResponseStep::Done(result)
    }
}

macro_rules! sasl_step {
    ($name:ident, $opcode:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {
            exchange: SaslExchange,
        }

        impl $name {
            pub fn new(mechanism: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
                Self {
                    exchange: SaslExchange {
                        opcode: $opcode,
                        mechanism: mechanism.into(),
                        payload: payload.into(),
                        status: None,
                        challenge: Bytes::new(),
                    },
                }
            }

            /// Status of the server's answer (0x21 asks for another step)
            pub fn status(&self) -> Option<u16> {
                self.exchange.status
            }

            /// Server data to feed into the next step
            pub fn challenge(&self) -> &Bytes {
                &self.exchange.challenge
            }

            fn build(&mut self) -> Vec<Bytes> {
                self.exchange.build()
            }
        }

        impl StreamingOperation for $name {
            fn on_response(&mut self, response: BinaryResponse) -> ResponseStep {
                self.exchange.on_response(response)
            }
        }

        binary_operation!($name);
    };
}

sasl_step!(SaslStartOperation, OpCode::SaslStart, "First SASL message (SASL_AUTH)");
sasl_step!(SaslStepOperation, OpCode::SaslStep, "Continuation of a SASL exchange");
