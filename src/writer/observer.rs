//! Send observers: side-effect-only hooks around data frame writes.

use crate::digest::{DigestOutput, ExternalDigest};
use crate::error::{DigestError, WriteError};
use crate::frame::FrameKind;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Hook called by [`FrameWriter`](super::FrameWriter) for every data frame.
///
/// Observers cannot change the outcome of a write. Control frames are not
/// observed.
pub trait SendObserver: Send + Sync {
    fn before_send(&self, kind: FrameKind, payload: &[u8]) {
        let _ = (kind, payload);
    }

    fn after_send(&self, kind: FrameKind, len: usize, result: &Result<(), WriteError>) {
        let _ = (kind, len, result);
    }
}

/// Outcome of one background digest run.
#[derive(Debug)]
pub struct DigestReport {
    pub kind: FrameKind,
    pub len: usize,
    pub result: Result<DigestOutput, DigestError>,
    /// Whether the external digest equals an in-process SHA-256 of the
    /// payload. `None` when not compared or when the output had no hex token.
    pub matches_sha256: Option<bool>,
}

/// Default number of digest children allowed to run at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Runs [`ExternalDigest`] over outgoing payloads on a background task.
///
/// Binary frames only unless [`include_text`](Self::include_text) is set.
/// At most `max_in_flight` digests run at once; payloads arriving while the
/// limit is reached are skipped. Results are logged and, when a channel is
/// attached, reported. A full report channel drops the report.
#[derive(Clone, Debug)]
pub struct DigestObserver {
    digest: Arc<ExternalDigest>,
    include_text: bool,
    compare_sha256: bool,
    max_in_flight: usize,
    in_flight: Arc<Semaphore>,
    reports: Option<mpsc::Sender<DigestReport>>,
}

impl DigestObserver {
    /// Observer running `digest` on binary frames, up to the default in-flight limit.
    pub fn new(digest: ExternalDigest) -> Self {
        Self {
            digest: Arc::new(digest),
            include_text: false,
            compare_sha256: false,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            in_flight: Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT)),
            reports: None,
        }
    }

    /// Also digest text frames.
    pub fn include_text(mut self, include: bool) -> Self {
        self.include_text = include;
        self
    }

    /// Compare the program's output with an in-process SHA-256. Only
    /// meaningful for `sha256sum`-compatible programs.
    pub fn compare_sha256(mut self, compare: bool) -> Self {
        self.compare_sha256 = compare;
        self
    }

    /// Cap on concurrently running digest children. Zero disables digests.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        let max = max.min(Semaphore::MAX_PERMITS);
        self.max_in_flight = max;
        self.in_flight = Arc::new(Semaphore::new(max));
        self
    }

    /// Send a [`DigestReport`] per completed digest on `tx`.
    pub fn with_reports(mut self, tx: mpsc::Sender<DigestReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Digests currently running.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight
            .saturating_sub(self.in_flight.available_permits())
    }
}

impl SendObserver for DigestObserver {
    fn before_send(&self, kind: FrameKind, payload: &[u8]) {
        if kind == FrameKind::Text && !self.include_text {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no tokio runtime, skipping payload digest");
            return;
        };
        let Ok(permit) = Arc::clone(&self.in_flight).try_acquire_owned() else {
            tracing::debug!(len = payload.len(), "digest limit reached, skipping payload digest");
            return;
        };

        let payload = Bytes::copy_from_slice(payload);
        let digest = Arc::clone(&self.digest);
        let compare = self.compare_sha256;
        let reports = self.reports.clone();
        handle.spawn(async move {
            let result = digest.digest(&payload).await;
            let matches_sha256 = match &result {
                Ok(out) if compare => out.hex_digest().map(|external| {
                    external.eq_ignore_ascii_case(&hex::encode(Sha256::digest(&payload)))
                }),
                _ => None,
            };

            match (&result, matches_sha256) {
                (Ok(out), Some(false)) => tracing::warn!(
                    len = payload.len(),
                    digest = %out.text.trim(),
                    "external digest does not match payload"
                ),
                (Ok(out), _) => tracing::debug!(
                    len = payload.len(),
                    digest = %out.text.trim(),
                    "payload digest"
                ),
                (Err(e), _) => tracing::warn!(len = payload.len(), error = %e, "payload digest failed"),
            }
            drop(permit);

            if let Some(tx) = reports {
                let report = DigestReport {
                    kind,
                    len: payload.len(),
                    result,
                    matches_sha256,
                };
                if tx.try_send(report).is_err() {
                    tracing::debug!("digest report dropped");
                }
            }
        });
    }
}
