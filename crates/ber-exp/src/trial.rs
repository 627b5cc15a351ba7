use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use ber_cmp::{compare, CompareSpec, ComparisonOutcome, FailureKind};
use ber_core::Bitstream;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborator::{ArtifactPaths, Collaborator, TrialRequest};

/// Anything that can evaluate one grid cell.
pub trait Trial {
    /// Runs one trial. Failures are returned as outcomes, never as errors.
    fn run_trial(&mut self, noise: f64, bandwidth: f64) -> ComparisonOutcome;
}

impl<F> Trial for F
where
    F: FnMut(f64, f64) -> ComparisonOutcome,
{
    fn run_trial(&mut self, noise: f64, bandwidth: f64) -> ComparisonOutcome {
        self(noise, bandwidth)
    }
}

/// Fixed waits around each trial.
///
/// The collaborator's completion is not observable, so the runner sleeps for
/// `settle` before stopping it. Too short a window makes correct trials
/// look like failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialTiming {
    /// Time the collaborator runs before it is stopped.
    #[serde(with = "millis")]
    pub settle: Duration,
    /// Time allowed for artefact files to be flushed after stopping.
    #[serde(with = "millis", default)]
    pub flush: Duration,
    /// Pause after each trial before the next one starts.
    #[serde(with = "millis", default)]
    pub cooldown: Duration,
}

impl TrialTiming {
    /// No waits at all; for in-process collaborators and tests.
    pub const fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            flush: Duration::ZERO,
            cooldown: Duration::ZERO,
        }
    }
}

impl Default for TrialTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(200),
            flush: Duration::ZERO,
            cooldown: Duration::from_millis(100),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Drives the collaborator for one cell and compares its artefacts.
#[derive(Debug)]
pub struct TrialRunner<C> {
    collaborator: C,
    spec: CompareSpec,
    artifacts: ArtifactPaths,
    timing: TrialTiming,
}

impl<C: Collaborator> TrialRunner<C> {
    /// Creates a runner with a fixed compare spec and artefact namespace.
    pub fn new(
        collaborator: C,
        spec: CompareSpec,
        artifacts: ArtifactPaths,
        timing: TrialTiming,
    ) -> Self {
        Self {
            collaborator,
            spec,
            artifacts,
            timing,
        }
    }

    /// Compare spec applied to every trial.
    pub fn spec(&self) -> &CompareSpec {
        &self.spec
    }

    /// Artefact namespace owned by this runner.
    pub fn artifacts(&self) -> &ArtifactPaths {
        &self.artifacts
    }

    fn execute(&mut self, noise: f64, bandwidth: f64) -> ComparisonOutcome {
        if let Err(err) = self.artifacts.clear() {
            warn!(%err, "could not clear previous artefacts");
            return ComparisonOutcome::Failed(FailureKind::CollaboratorFailure);
        }

        let request = TrialRequest {
            noise,
            bandwidth,
            duration: self.timing.settle,
            artifacts: &self.artifacts,
        };
        if let Err(err) = self.collaborator.start(&request) {
            warn!(%err, noise, bandwidth, "collaborator did not start");
            return ComparisonOutcome::Failed(FailureKind::CollaboratorFailure);
        }
        pause(self.timing.settle);
        if let Err(err) = self.collaborator.finish() {
            warn!(%err, noise, bandwidth, "collaborator did not finish cleanly");
            return ComparisonOutcome::Failed(FailureKind::CollaboratorFailure);
        }
        pause(self.timing.flush);

        let sent = match load_artifact(&self.artifacts.sent) {
            Ok(stream) => stream,
            Err(kind) => return ComparisonOutcome::Failed(kind),
        };
        let received = match load_artifact(&self.artifacts.received) {
            Ok(stream) => stream,
            Err(kind) => return ComparisonOutcome::Failed(kind),
        };
        debug!(
            sent_bytes = sent.len(),
            received_bytes = received.len(),
            "artefacts loaded"
        );
        compare(&sent, &received, &self.spec)
    }
}

impl<C: Collaborator> Trial for TrialRunner<C> {
    fn run_trial(&mut self, noise: f64, bandwidth: f64) -> ComparisonOutcome {
        let outcome = self.execute(noise, bandwidth);
        pause(self.timing.cooldown);
        outcome
    }
}

fn load_artifact(path: &Path) -> Result<Bitstream, FailureKind> {
    match fs::read(path) {
        Ok(bytes) => Ok(Bitstream::from_bytes(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "artefact missing");
            Err(FailureKind::MissingOrEmptyInput)
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "artefact unreadable");
            Err(FailureKind::CollaboratorFailure)
        }
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
