use std::time::Duration;

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use thiserror::Error;

use crate::config::ConfigError;

/// Error class used for logging and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    ExternalService,
    Internal,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{service} error: {message}")]
    ExternalService {
        service: String,
        message: String,
        retryable: bool,
    },

    #[error("Publish timed out after {}s waiting for container {container_id}", waited.as_secs())]
    PublishTimeout {
        container_id: String,
        waited: Duration,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// A failed external call that is safe to retry (network, 429, 5xx).
    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
            retryable: true,
        }
    }

    /// A failed external call that will not succeed on retry.
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
            Self::ExternalService { .. } | Self::PublishTimeout { .. } => {
                ErrorKind::ExternalService
            }
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalService {
                retryable: true,
                ..
            }
        )
    }

    /// Classify a reqwest failure from `service`.
    pub fn from_reqwest(service: &str, err: reqwest::Error) -> Self {
        let retryable = err.is_timeout()
            || err.is_connect()
            || err.is_request()
            || err
                .status()
                .map(|s| s.as_u16() == 429 || s.is_server_error())
                .unwrap_or(false);
        Self::ExternalService {
            service: service.to_string(),
            message: err.to_string(),
            retryable,
        }
    }

    /// Classify a non-success HTTP status returned by `service`.
    pub fn from_status(service: &str, status: u16, body: &str) -> Self {
        let retryable = status == 429 || (500..600).contains(&status);
        Self::ExternalService {
            service: service.to_string(),
            message: format!("HTTP {}: {}", status, body),
            retryable,
        }
    }

    /// Classify an AWS SDK failure from `service`.
    ///
    /// Timeouts, dispatch failures and unparseable responses are transient.
    /// Service errors follow their HTTP status, so `NoSuchKey` or
    /// `ParameterNotFound` fail at once.
    pub fn from_sdk_error<E>(service: &str, context: &str, err: &SdkError<E, HttpResponse>) -> Self
    where
        E: std::error::Error + 'static,
    {
        let message = format!("{}: {}", context, DisplayErrorContext(err));
        match err {
            SdkError::ServiceError(_) => match err.raw_response() {
                Some(raw) => Self::from_status(service, raw.status().as_u16(), &message),
                None => Self::external(service, message),
            },
            SdkError::ConstructionFailure(_) => Self::external(service, message),
            _ => Self::transient(service, message),
        }
    }
}
