//! External digest verification.
//!
//! Hashes a payload by piping it through a `*sum`-style program and
//! reading back its output. Diagnostic only: nothing on the send path
//! depends on the result.

mod channel;

pub use channel::{CappedOutput, ChildProcessChannel};

use crate::error::DigestError;
use serde::Deserialize;
use std::time::Duration;

/// Default digest program.
pub const DEFAULT_PROGRAM: &str = "sha256sum";

/// Default cap on captured output.
pub const DEFAULT_MAX_OUTPUT: usize = 1024;

/// Default bound on one round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for [`ExternalDigest`].
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DigestConfig {
    /// Program name, resolved through `PATH`.
    pub program: String,
    /// Arguments passed before the payload is piped in.
    pub args: Vec<String>,
    /// Output beyond this many bytes is dropped and flagged as truncated.
    pub max_output: usize,
    /// Bound on one round trip, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: Vec::new(),
            max_output: DEFAULT_MAX_OUTPUT,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl DigestConfig {
    /// Replace the program name.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the output cap in bytes.
    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    /// Set the round-trip bound. Sub-millisecond remainders round up.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let ms = timeout.as_nanos().div_ceil(1_000_000);
        self.timeout_ms = u64::try_from(ms).unwrap_or(u64::MAX);
        self
    }

    /// Round-trip bound as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Output read back from the digest program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestOutput {
    /// Captured output, lossily decoded as UTF-8.
    pub text: String,
    /// Total bytes the program wrote, including any dropped past the cap.
    pub bytes_read: usize,
    /// Whether output past `max_output` was dropped.
    pub truncated: bool,
}

impl DigestOutput {
    /// Leading hex token, e.g. `e3b0...` from `"e3b0...  -\n"`.
    pub fn hex_digest(&self) -> Option<&str> {
        let token = self.text.split_whitespace().next()?;
        token
            .chars()
            .all(|c| c.is_ascii_hexdigit())
            .then_some(token)
    }
}

/// Computes digests through an external program, one child per call.
#[derive(Clone, Debug, Default)]
pub struct ExternalDigest {
    config: DigestConfig,
}

impl ExternalDigest {
    /// Digest runner for `config`.
    pub fn new(config: DigestConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// Run the configured program over `payload`.
    ///
    /// The round trip is bounded by the configured timeout; on expiry the
    /// child is killed and reaped before [`DigestError::Timeout`] is
    /// returned.
    pub async fn digest(&self, payload: &[u8]) -> Result<DigestOutput, DigestError> {
        let mut channel = ChildProcessChannel::spawn(&self.config.program, &self.config.args)?;
        let timeout = self.config.timeout();
        let round_trip = channel.round_trip(payload, self.config.max_output);
        let output = match tokio::time::timeout(timeout, round_trip).await {
            Ok(res) => res?,
            Err(_) => {
                channel.kill().await;
                tracing::warn!(program = %self.config.program, ?timeout, "digest process timed out");
                return Err(DigestError::Timeout(timeout));
            }
        };

        let truncated = output.truncated();
        if truncated {
            tracing::warn!(
                program = %self.config.program,
                total = output.total,
                kept = output.bytes.len(),
                "digest output truncated"
            );
        }
        Ok(DigestOutput {
            text: String::from_utf8_lossy(&output.bytes).into_owned(),
            bytes_read: output.total,
            truncated,
        })
    }
}
