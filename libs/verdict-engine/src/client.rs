//! Execution Client - Boundary to the Code Execution Backend
//!
//! The backend compiles and runs code and reports raw output. It knows
//! nothing about expected outputs or scoring; that is the reconciler's job.

use async_trait::async_trait;
use verdict_common::types::{Language, RawExecutionResult};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Execution service unreachable: {0}")]
    Transport(String),

    #[error("Execution service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Execution service response could not be decoded: {0}")]
    Decode(String),

    #[error("Execution service failed internally: {0}")]
    Backend(String),

    #[error("Execution did not finish after {attempts} polls")]
    Timeout { attempts: u32 },
}

#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Run `code` once with `stdin` and report what happened.
    ///
    /// A compile failure is a successful call with `compile_error` set;
    /// `Err` is reserved for the call itself failing.
    async fn execute(
        &self,
        language: Language,
        code: &str,
        stdin: &str,
    ) -> Result<RawExecutionResult, ClientError>;
}

#[async_trait]
impl<T: ExecutionClient + ?Sized> ExecutionClient for std::sync::Arc<T> {
    async fn execute(
        &self,
        language: Language,
        code: &str,
        stdin: &str,
    ) -> Result<RawExecutionResult, ClientError> {
        (**self).execute(language, code, stdin).await
    }
}
