//! Interface to the external channel simulation and two implementations:
//! a subprocess driver and a deterministic in-process stand-in.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use ber_core::errors::{BerError, ErrorInfo};
use ber_core::Bitstream;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, warn};

/// Fixed transmission pattern fed to the modulator by the reference flowgraphs.
pub const DEFAULT_PAYLOAD: [u8; 35] = [
    240, 240, 240, 15, 15, 15, 240, 240, 240, 10, 38, 33, 10, 74, 72, 11, 6, 34, 15, 15, 15, 240,
    240, 240, 15, 15, 15, 0, 0, 0, 0, 0, 0, 0, 0,
];

fn collaborator_error(code: &str, err: impl ToString) -> BerError {
    BerError::Collaborator(ErrorInfo::new(code, err.to_string()))
}

/// Locations of the two artefacts produced by one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Bits as handed to the modulator.
    pub sent: PathBuf,
    /// Bits recovered by the slicer.
    pub received: PathBuf,
}

impl ArtifactPaths {
    /// Joins the two file names onto `dir`.
    pub fn in_dir(dir: &Path, sent: &str, received: &str) -> Self {
        Self {
            sent: dir.join(sent),
            received: dir.join(received),
        }
    }

    /// Removes both artefacts so a trial never reads a previous trial's output.
    pub fn clear(&self) -> Result<(), BerError> {
        for path in [&self.sent, &self.received] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(BerError::Collaborator(
                        ErrorInfo::new("artifact-remove", err.to_string())
                            .with_context("path", path.display().to_string()),
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Parameters of one transmission/reception cycle.
#[derive(Debug, Clone, Copy)]
pub struct TrialRequest<'a> {
    /// Channel noise voltage.
    pub noise: f64,
    /// Symbol timing loop bandwidth.
    pub bandwidth: f64,
    /// How long the cycle is given to run before it is stopped.
    pub duration: Duration,
    /// Where the artefacts must be written.
    pub artifacts: &'a ArtifactPaths,
}

/// External channel simulation driven once per trial.
///
/// `start` launches the cycle and returns without waiting for it; the trial
/// runner sleeps for the settle window and then calls `finish`.
pub trait Collaborator {
    /// Starts one cycle writing to `request.artifacts`.
    fn start(&mut self, request: &TrialRequest<'_>) -> Result<(), BerError>;

    /// Stops the cycle started by the last `start` call.
    fn finish(&mut self) -> Result<(), BerError>;
}

impl<C: Collaborator + ?Sized> Collaborator for Box<C> {
    fn start(&mut self, request: &TrialRequest<'_>) -> Result<(), BerError> {
        (**self).start(request)
    }

    fn finish(&mut self) -> Result<(), BerError> {
        (**self).finish()
    }
}

/// Runs an external program per trial, e.g. a flowgraph script.
///
/// Arguments may contain `{noise}`, `{bandwidth}`, `{sent}`, `{received}` and
/// `{duration_ms}` placeholders. A program still running when `finish` is
/// called is killed; one that already exited must have exited successfully.
#[derive(Debug)]
pub struct CommandCollaborator {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    child: Option<Child>,
}

impl CommandCollaborator {
    /// Creates a driver for `program` with templated `args`.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            child: None,
        }
    }

    /// Runs the program from `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Expands the argument templates for one request.
    ///
    /// Relative artefact paths are resolved against this process's working
    /// directory, since the child may run from `working_dir` while the trial
    /// runner reads them from here.
    pub fn render_args(&self, request: &TrialRequest<'_>) -> Vec<String> {
        let sent = anchored(&request.artifacts.sent).display().to_string();
        let received = anchored(&request.artifacts.received).display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{noise}", &request.noise.to_string())
                    .replace("{bandwidth}", &request.bandwidth.to_string())
                    .replace("{sent}", &sent)
                    .replace("{received}", &received)
                    .replace("{duration_ms}", &request.duration.as_millis().to_string())
            })
            .collect()
    }

    fn reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn anchored(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(err) => {
            warn!(%err, path = %path.display(), "cannot resolve relative artefact path");
            path.to_path_buf()
        }
    }
}

impl Collaborator for CommandCollaborator {
    fn start(&mut self, request: &TrialRequest<'_>) -> Result<(), BerError> {
        self.reap();
        let args = self.render_args(request);
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        debug!(program = %self.program.display(), ?args, "spawning collaborator");
        let child = cmd.spawn().map_err(|err| {
            BerError::Collaborator(
                ErrorInfo::new("spawn", err.to_string())
                    .with_context("program", self.program.display().to_string())
                    .with_hint("check the collaborator program path in the sweep config"),
            )
        })?;
        self.child = Some(child);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BerError> {
        let Some(mut child) = self.child.take() else {
            return Err(collaborator_error("finish-idle", "no collaborator running"));
        };
        match child.try_wait() {
            Ok(Some(status)) if status.success() => Ok(()),
            Ok(Some(status)) => Err(BerError::Collaborator(
                ErrorInfo::new("exit-status", "collaborator exited unsuccessfully")
                    .with_context("status", status.to_string()),
            )),
            Ok(None) => {
                child
                    .kill()
                    .map_err(|err| collaborator_error("kill", err))?;
                child
                    .wait()
                    .map_err(|err| collaborator_error("wait", err))?;
                Ok(())
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(collaborator_error("try-wait", err))
            }
        }
    }
}

impl Drop for CommandCollaborator {
    fn drop(&mut self) {
        self.reap();
    }
}

/// Deterministic stand-in for the channel simulation.
///
/// Writes the payload as the sent artefact and, as the received artefact,
/// `lead_bits` of preamble followed by the payload with each bit flipped with
/// probability `min(0.5, error_scale * noise)`. Randomness is seeded from the
/// master seed and the trial parameters, so reruns produce identical files.
#[derive(Debug, Clone)]
pub struct SyntheticCollaborator {
    payload: Vec<u8>,
    lead_bits: usize,
    seed: u64,
    error_scale: f64,
    pending: Option<(Vec<u8>, Vec<u8>, ArtifactPaths)>,
}

impl SyntheticCollaborator {
    /// Creates a stand-in with the given payload and preamble length.
    pub fn new(payload: Vec<u8>, lead_bits: usize, seed: u64, error_scale: f64) -> Self {
        Self {
            payload,
            lead_bits,
            seed,
            error_scale,
            pending: None,
        }
    }

    fn trial_seed(&self, noise: f64, bandwidth: f64) -> u64 {
        self.seed
            ^ noise.to_bits().wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ bandwidth.to_bits().rotate_left(17)
    }
}

impl Collaborator for SyntheticCollaborator {
    fn start(&mut self, request: &TrialRequest<'_>) -> Result<(), BerError> {
        let mut rng = StdRng::seed_from_u64(self.trial_seed(request.noise, request.bandwidth));
        let flip_probability = (self.error_scale * request.noise).clamp(0.0, 0.5);
        let payload = Bitstream::from_bytes(self.payload.clone());
        let preamble: Vec<bool> = (0..self.lead_bits).map(|_| rng.gen()).collect();
        let corrupted: Vec<bool> = payload
            .bits()
            .map(|bit| bit ^ rng.gen_bool(flip_probability))
            .collect();
        let received = Bitstream::from_bits(preamble.into_iter().chain(corrupted));
        self.pending = Some((
            self.payload.clone(),
            received.as_bytes().to_vec(),
            request.artifacts.clone(),
        ));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BerError> {
        let Some((sent, received, paths)) = self.pending.take() else {
            return Err(collaborator_error("finish-idle", "no synthetic trial pending"));
        };
        for (path, bytes) in [(&paths.sent, sent), (&paths.received, received)] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|err| collaborator_error("artifact-dir", err))?;
            }
            fs::write(path, bytes).map_err(|err| {
                warn!(path = %path.display(), "failed to write synthetic artefact");
                BerError::Collaborator(
                    ErrorInfo::new("artifact-write", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_args_substitutes_placeholders() {
        let paths = ArtifactPaths::in_dir(Path::new("/tmp/run"), "s.dat", "r.dat");
        let collaborator = CommandCollaborator::new(
            "python3",
            vec![
                "flowgraph.py".to_string(),
                "--noise={noise}".to_string(),
                "--bw={bandwidth}".to_string(),
                "{sent}".to_string(),
                "{received}".to_string(),
                "{duration_ms}".to_string(),
            ],
        );
        let request = TrialRequest {
            noise: 1.5,
            bandwidth: 0.0025,
            duration: Duration::from_millis(200),
            artifacts: &paths,
        };
        assert_eq!(
            collaborator.render_args(&request),
            vec![
                "flowgraph.py",
                "--noise=1.5",
                "--bw=0.0025",
                "/tmp/run/s.dat",
                "/tmp/run/r.dat",
                "200",
            ]
        );
    }

    #[test]
    fn relative_artifacts_are_anchored_to_the_parent_directory() {
        let paths = ArtifactPaths::in_dir(Path::new("runs"), "s.dat", "r.dat");
        let collaborator = CommandCollaborator::new("sh", vec!["{sent}".to_string()])
            .with_working_dir("/somewhere/else");
        let request = TrialRequest {
            noise: 0.0,
            bandwidth: 0.0,
            duration: Duration::ZERO,
            artifacts: &paths,
        };
        let expected = env::current_dir().unwrap().join("runs").join("s.dat");
        assert_eq!(
            collaborator.render_args(&request),
            vec![expected.display().to_string()]
        );
    }

    #[test]
    fn finish_without_start_is_an_error() {
        let mut synthetic = SyntheticCollaborator::new(DEFAULT_PAYLOAD.to_vec(), 49, 7, 0.1);
        assert!(synthetic.finish().is_err());
        let mut command = CommandCollaborator::new("true", Vec::new());
        assert!(command.finish().is_err());
    }
}
