use std::path::PathBuf;
use std::time::Duration;

use ber_exp::{AxisSpec, CollaboratorConfig, Scheme, SweepConfig};

const FLOWGRAPH_YAML: &str = r#"
scheme: qpsk
compare:
  length_bits: 216
  offset_bits: 0.98
grid:
  noise:
    type: values
    values: [0.0, 1.0, 2.0]
  bandwidth:
    type: range
    start: 0.0
    stop: 0.01
    step: 0.0025
timing:
  settle: 2000
  flush: 1000
  cooldown: 500
artifacts:
  dir: /tmp/qpsk
  sent: qpsk_sent.dat
  received: qpsk_rec.dat
output:
  table: qpsk_results.csv
collaborator:
  type: command
  program: python3
  args: [qpsk_flowgraph.py, "--noise-voltage", "{noise}", "--loop-bandwidth", "{bandwidth}"]
"#;

#[test]
fn flowgraph_config_loads_from_disk() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("qpsk.yaml");
    std::fs::write(&path, FLOWGRAPH_YAML).expect("write config");
    let config = SweepConfig::load(&path).expect("load config");

    assert_eq!(config.scheme, Scheme::Qpsk);
    assert_eq!(config.compare.resolved_offset(), 0);
    assert_eq!(config.timing.flush, Duration::from_secs(1));
    let grid = config.grid().expect("grid");
    assert_eq!(grid.noise_levels(), &[0.0, 1.0, 2.0]);
    assert_eq!(grid.loop_bandwidths(), &[0.0, 0.0025, 0.005, 0.0075]);
    assert_eq!(
        config.artifacts.paths().received,
        PathBuf::from("/tmp/qpsk/qpsk_rec.dat")
    );
    assert_eq!(config.output.manifest, "sweep_manifest.json");
    assert_eq!(
        config.output.table_path(),
        PathBuf::from("results/qpsk_results.csv")
    );
    match &config.collaborator {
        CollaboratorConfig::Command { program, args, .. } => {
            assert_eq!(program, &PathBuf::from("python3"));
            assert_eq!(args.len(), 5);
        }
        other => panic!("unexpected collaborator {other:?}"),
    }
}

#[test]
fn preset_survives_store_and_load() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("nested").join("bpsk.yaml");
    let preset = SweepConfig::preset(Scheme::Bpsk);
    preset.store(&path).expect("store");
    assert_eq!(SweepConfig::load(&path).expect("load"), preset);
}

#[test]
fn invalid_compare_spec_is_rejected_on_load() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let path = temp.path().join("bad.yaml");
    std::fs::write(&path, "compare:\n  length_bits: 0\n  offset_bits: 49\n").expect("write");
    let err = SweepConfig::load(&path).unwrap_err();
    assert!(matches!(err, ber_core::BerError::Serde(_)));
}

#[test]
fn negative_error_scale_is_rejected() {
    let mut config = SweepConfig::preset(Scheme::Bpsk);
    config.collaborator = CollaboratorConfig::Synthetic {
        seed: 0,
        error_scale: -0.5,
        lead_bits: None,
        payload: vec![0xaa; 8],
    };
    assert_eq!(
        config.validate().unwrap_err().info().code,
        "synthetic-error-scale"
    );
}

#[test]
fn descending_axis_is_rejected() {
    let mut config = SweepConfig::default();
    config.grid.noise = AxisSpec::Values {
        values: vec![1.0, 0.5],
    };
    assert!(config.validate().is_err());
}
