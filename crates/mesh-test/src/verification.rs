//! Verification helpers for mesh integration tests
//!
//! Provides assertion helpers over captured responses and collaborator call
//! order

use crate::mocks::SentResponses;
use mesh_core::tmf::MessageType;
use mesh_core::{TmfFields, TmfResponse};
use mesh_types::Ip6Address;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected {expected} responses, found {actual}")]
    ResponseCountMismatch { expected: usize, actual: usize },

    #[error("No response at index {index}")]
    MissingResponse { index: usize },

    #[error("Response {index} has no {field} field")]
    FieldNotFound { index: usize, field: &'static str },

    #[error("Value mismatch for response {index} {field}: expected '{expected}', got '{actual}'")]
    ValueMismatch {
        index: usize,
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Expected calls {expected:?} in order, log was {actual:?}")]
    CallOrderMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Checks responses captured by a recording transport
pub struct ResponseVerifier {
    sent: SentResponses,
}

impl ResponseVerifier {
    pub fn new(sent: SentResponses) -> Self {
        Self { sent }
    }

    pub fn count(&self) -> usize {
        self.sent.borrow().len()
    }

    pub fn response(&self, index: usize) -> VerifyResult<TmfResponse> {
        self.sent
            .borrow()
            .get(index)
            .map(|(response, _)| response.clone())
            .ok_or(VerificationError::MissingResponse { index })
    }

    /// Most recently sent response.
    pub fn last(&self) -> VerifyResult<TmfResponse> {
        let count = self.count();
        match count {
            0 => Err(VerificationError::MissingResponse { index: 0 }),
            n => self.response(n - 1),
        }
    }

    pub fn assert_count(&self, expected: usize) -> VerifyResult<()> {
        let actual = self.count();
        if actual != expected {
            return Err(VerificationError::ResponseCountMismatch { expected, actual });
        }
        Ok(())
    }

    /// Verify that response `index` is a piggybacked 2.04 carrying `status`
    pub fn assert_status(&self, index: usize, status: impl Into<u8>) -> VerifyResult<()> {
        let response = self.response(index)?;
        let expected = status.into();

        if response.message_type != MessageType::Acknowledgment {
            return Err(VerificationError::ValueMismatch {
                index,
                field: "message_type",
                expected: format!("{:?}", MessageType::Acknowledgment),
                actual: format!("{:?}", response.message_type),
            });
        }

        let actual = response.status().ok_or(VerificationError::FieldNotFound {
            index,
            field: "status",
        })?;
        if actual != expected {
            return Err(VerificationError::ValueMismatch {
                index,
                field: "status",
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Verify the addresses reported as failed, or that none were reported
    pub fn assert_failed_addresses(&self, index: usize, expected: &[Ip6Address]) -> VerifyResult<()> {
        let response = self.response(index)?;
        let actual = response.ip6_addresses().unwrap_or(&[]);

        if actual != expected {
            return Err(VerificationError::ValueMismatch {
                index,
                field: "ip6_addresses",
                expected: format!("{:?}", expected),
                actual: format!("{:?}", actual),
            });
        }
        Ok(())
    }
}

/// Verify that `expected` appears in `log` in order, other entries allowed
/// in between
pub fn assert_calls_in_order(log: &[String], expected: &[&str]) -> VerifyResult<()> {
    let mut remaining = log.iter();
    let in_order = expected
        .iter()
        .all(|want| remaining.any(|entry| entry == want));

    if !in_order {
        return Err(VerificationError::CallOrderMismatch {
            expected: expected.iter().map(|s| s.to_string()).collect(),
            actual: log.to_vec(),
        });
    }
    Ok(())
}

/// Installs a test-friendly tracing subscriber. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_target(false)
        .with_test_writer()
        .try_init();
}
