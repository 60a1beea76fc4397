use assert_cmd::prelude::*;
use assert_cmd::Command;
use predicates::prelude::*;
use std::error::Error;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn demo(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

/// `snnc` with an empty config file, so the user's own snnc.toml never leaks in
fn snnc(dir: &Path) -> Result<Command, Box<dyn Error>> {
    let config = dir.join("snnc.toml");
    if !config.exists() {
        std::fs::write(&config, "")?;
    }
    let mut cmd = Command::cargo_bin("snnc")?;
    cmd.current_dir(dir).arg("--config").arg(&config);
    Ok(cmd)
}

const TWO_HOSTS: &str = r#"
name = "split"

[[neurons]]
name = "PN"
size = 8
model = "izhikevich"
params = [0.02, 0.2, -65.0, 8.0]
init = [-65.0, -13.0]

[[neurons]]
name = "KC"
size = 16
model = "izhikevich"
params = [0.02, 0.2, -65.0, 8.0]
init = [-65.0, -13.0]
host = 1

[[synapses]]
name = "PNKC"
source = "PN"
target = "KC"
weight_update = "static_pulse"
postsynaptic = "delta_curr"
host = 1
"#;

#[test]
fn generate_writes_the_file_set() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let out = tmp.path().join("MBody_CODE");
    snnc(tmp.path())?
        .args(["generate", demo("mbody.toml").to_str().unwrap(), "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("definitions.h"));

    for file in ["definitions.h", "neuronFnct.cc", "runner.cc", "synapseFnct.cc"] {
        assert!(out.join(file).exists(), "{file} missing");
    }
    let runner = std::fs::read_to_string(out.join("runner.cc"))?;
    assert!(runner.contains("void stepTimeCPU("));
    Ok(())
}

#[test]
fn generate_defaults_to_model_named_directory() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    snnc(tmp.path())?
        .args(["gen", demo("mbody.toml").to_str().unwrap()])
        .assert()
        .success();
    assert!(tmp.path().join("MBody_CODE/definitions.h").exists());
    Ok(())
}

#[test]
fn config_file_selects_backend() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    std::fs::write(tmp.path().join("snnc.toml"), "[generator]\nbackend = \"cpu_parallel\"\n")?;
    snnc(tmp.path())?
        .args(["generate", demo("mbody.toml").to_str().unwrap(), "-o", "out"])
        .assert()
        .success();
    let neuron = std::fs::read_to_string(tmp.path().join("out/neuronFnct.cc"))?;
    assert!(neuron.contains("#pragma omp parallel for"));
    Ok(())
}

#[test]
fn mpi_backend_adds_exchange_sources() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let model = tmp.path().join("split.toml");
    std::fs::write(&model, TWO_HOSTS)?;
    snnc(tmp.path())?
        .args(["generate", model.to_str().unwrap(), "--backend", "mpi", "-o", "code"])
        .assert()
        .success();
    assert!(tmp.path().join("code/infraMPI.cc").exists());
    assert!(tmp.path().join("code/infraMPI.h").exists());
    Ok(())
}

#[test]
fn unknown_backend_is_rejected_by_the_parser() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    snnc(tmp.path())?
        .args(["generate", demo("mbody.toml").to_str().unwrap(), "--backend", "cuda"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown backend 'cuda'"));
    Ok(())
}

#[test]
fn unknown_model_fails_with_message() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let model = tmp.path().join("bad.toml");
    std::fs::write(&model, TWO_HOSTS.replace("\"delta_curr\"", "\"alpha_curr\""))?;
    let assert = snnc(tmp.path())?
        .args(["generate", model.to_str().unwrap(), "-o", "code"])
        .assert()
        .failure();
    let err = String::from_utf8_lossy(&assert.get_output().stderr);
    assert!(err.contains("Unknown postsynaptic model 'alpha_curr'"), "stderr={err}");
    assert!(!tmp.path().join("code").exists());
    Ok(())
}

#[test]
fn inspect_reports_delay_slots_and_exchange() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let assert = snnc(tmp.path())?
        .args(["inspect", demo("mbody.toml").to_str().unwrap(), "--format", "json"])
        .assert()
        .success();
    let summary: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(summary["name"], "MBody");
    let lhi = summary["neurons"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["name"] == "LHI")
        .unwrap();
    assert_eq!(lhi["delay_slots"], 4);
    assert!(summary["exchange"].as_array().unwrap().is_empty());

    let model = tmp.path().join("split.toml");
    std::fs::write(&model, TWO_HOSTS)?;
    snnc(tmp.path())?
        .args(["inspect", model.to_str().unwrap(), "--backend", "mpi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exchange tag 0: PN spikes host 0 -> host 1"));
    Ok(())
}

#[test]
fn sparse_pack_then_check_round_trips() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let file = tmp.path().join("PNKC.bin");
    snnc(tmp.path())?
        .args(["sparse", "pack", "--edges", demo("pnkc_edges.txt").to_str().unwrap()])
        .args(["--sources", "100", "--targets", "1000", "-o"])
        .arg(&file)
        .assert()
        .success();
    // 5 float weights + 101 row starts + 5 column indices
    assert_eq!(std::fs::metadata(&file)?.len(), 5 * 4 + 101 * 4 + 5 * 4);

    let assert = snnc(tmp.path())?
        .args(["sparse", "check"])
        .arg(&file)
        .args(["--sources", "100", "--targets", "1000", "--json"])
        .assert()
        .success();
    let stats: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(stats["conn_n"], 5);
    assert_eq!(stats["max_out_degree"], 2);
    assert_eq!(stats["weight_min"], 0.125);
    assert_eq!(stats["weight_max"], 1.0);
    Ok(())
}

#[test]
fn sparse_shape_can_come_from_the_model() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let file = tmp.path().join("PNKC.bin");
    let model = demo("mbody.toml");
    snnc(tmp.path())?
        .args(["sparse", "pack", "--edges", demo("pnkc_edges.txt").to_str().unwrap()])
        .args(["--model", model.to_str().unwrap(), "--synapse", "PNKC", "-o"])
        .arg(&file)
        .assert()
        .success();
    snnc(tmp.path())?
        .args(["sparse", "check"])
        .arg(&file)
        .args(["--model", model.to_str().unwrap(), "--synapse", "PNKC"])
        .assert()
        .success()
        .stdout(predicate::str::contains("connections:    5"));

    snnc(tmp.path())?
        .args(["sparse", "check"])
        .arg(&file)
        .args(["--model", model.to_str().unwrap(), "--synapse", "PNLHI"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not sparse"));
    Ok(())
}

#[test]
fn truncated_file_is_rejected() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let file = tmp.path().join("short.bin");
    std::fs::write(&file, [0u8; 10])?;
    snnc(tmp.path())?
        .args(["sparse", "check"])
        .arg(&file)
        .args(["--sources", "100", "--targets", "1000"])
        .assert()
        .failure();
    Ok(())
}
