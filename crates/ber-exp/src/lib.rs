//! Two-axis bit error rate sweeps.
//!
//! A sweep walks a (loop bandwidth × noise voltage) grid, runs one trial per
//! cell through a [`Collaborator`], compares the artefacts with
//! [`ber_cmp::compare`] and checkpoints every completed row. Rows are never
//! persisted half-finished, so an interrupted sweep can be resumed from its
//! manifest.

pub mod collaborator;
pub mod config;
pub mod grid;
pub mod hash;
pub mod matrix;
pub mod persist;
pub mod serde;
pub mod sweep;
pub mod trial;

pub use collaborator::{
    ArtifactPaths, Collaborator, CommandCollaborator, SyntheticCollaborator, TrialRequest,
    DEFAULT_PAYLOAD,
};
pub use config::{
    ArtifactConfig, CollaboratorConfig, GridConfig, OutputConfig, Scheme, SweepConfig,
};
pub use grid::{AxisSpec, ParameterGrid};
pub use hash::grid_hash;
pub use matrix::{MatrixRow, ResultMatrix};
pub use persist::{
    load_table, Persist, RunPersister, SweepManifest, SweepStatus, TableFormat,
    TablePersister, TableSnapshot,
};
pub use sweep::{run_sweep, CancelToken, SweepOpts, SweepReport};
pub use trial::{Trial, TrialRunner, TrialTiming};
