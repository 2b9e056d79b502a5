use std::path::PathBuf;
use std::process::{Command, Output};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sbnsyst"))
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn tmp_path(filename: &str) -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("sbnsyst_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn stdout_json(out: &Output) -> serde_json::Value {
    assert!(
        out.status.success(),
        "command failed, status={:?}, stderr={}",
        out.status,
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON")
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn systs_lists_catalog() {
    let universes = fixture_path("universes.json");
    let v = stdout_json(&run(&["systs", "--universes", universes.to_string_lossy().as_ref()]));

    assert_eq!(v["n_knobs"].as_u64(), Some(5));
    assert_eq!(v["n_genie"].as_u64(), Some(39));
    assert_eq!(v["n_flux"].as_u64(), Some(1));

    let systs = v["systs"].as_array().unwrap();
    assert_eq!(systs.len(), 40);

    let find = |name: &str| systs.iter().find(|s| s["name"] == name).unwrap().clone();
    assert_eq!(find("QEMA")["n_universes"].as_u64(), Some(5));
    assert!(find("DISAth")["n_universes"].is_null());
    assert_eq!(find("NonResRvn1piCC")["knob"], "NonResRvbarp1pi");
    assert_eq!(find("NonResRvn1piCC")["n_universes"].as_u64(), Some(3));
    assert_eq!(find("expskin_FluxUnisim")["n_universes"].as_u64(), Some(10));
}

#[test]
fn weight_combines_universes() {
    let universes = fixture_path("universes.json");
    let events = fixture_path("events.json");
    let v = stdout_json(&run(&[
        "weight",
        "--universes",
        universes.to_string_lossy().as_ref(),
        "--events",
        events.to_string_lossy().as_ref(),
        "--systs",
        "QEMA,NC",
        "--universe",
        "3",
    ]));

    let w: Vec<f64> =
        v["weights"].as_array().unwrap().iter().map(|x| x.as_f64().unwrap()).collect();
    assert_eq!(w.len(), 2);
    // QEMA universe 3 times NC universe 3.
    assert!(approx(w[0], 1.05 * 1.2), "got {}", w[0]);
    assert_eq!(w[1], 1.0);
    assert!(v.get("shifted").is_none());
}

#[test]
fn weight_reports_continuous_shift() {
    let universes = fixture_path("universes.json");
    let events = fixture_path("events.json");
    let out_path = tmp_path("weights.json");
    let out = run(&[
        "weight",
        "--universes",
        universes.to_string_lossy().as_ref(),
        "--events",
        events.to_string_lossy().as_ref(),
        "--systs",
        "QEMA,NC,NonResRvn1piCC",
        "--sigma",
        "0.5",
        "--output",
        out_path.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let bytes = std::fs::read(&out_path).unwrap();
    let _ = std::fs::remove_file(&out_path);
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(v["sigma"].as_f64(), Some(0.5));
    let qema = v["shifted"]["QEMA"].as_array().unwrap();
    assert!(approx(qema[0].as_f64().unwrap(), 0.5 * 0.98 + 0.5 * 1.05));
    assert_eq!(qema[1].as_f64(), Some(1.0));

    let nc = v["shifted"]["NC"][0].as_f64().unwrap();
    assert!(approx(nc, 0.5 * 1.1 + 0.5 * 1.0));

    // Neutrino CC event; vn borrows the vbarp universes.
    let vn = v["shifted"]["NonResRvn1piCC"][0].as_f64().unwrap();
    assert!(approx(vn, 0.5 * 1.0 + 0.5 * 1.3));
}

#[test]
fn weight_rejects_unknown_systematic() {
    let universes = fixture_path("universes.json");
    let events = fixture_path("events.json");
    let out = run(&[
        "weight",
        "--universes",
        universes.to_string_lossy().as_ref(),
        "--events",
        events.to_string_lossy().as_ref(),
        "--systs",
        "NotAKnob",
    ]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("NotAKnob"), "stderr={stderr}");
}

#[test]
fn weight_rejects_malformed_family_name() {
    let universes = fixture_path("universes.json");
    let events = fixture_path("events.json");
    let out = run(&[
        "weight",
        "--universes",
        universes.to_string_lossy().as_ref(),
        "--events",
        events.to_string_lossy().as_ref(),
        "--systs",
        "QEMA,NonResRvp1piXX",
    ]);
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("NonResRvp1piXX"), "stderr={stderr}");
}

#[test]
fn sensitivity_writes_output_file() {
    let config = fixture_path("sensitivity_config.json");
    let input = fixture_path("sensitivity_input.json");
    let out_path = tmp_path("sensitivity.json");
    let out = run(&[
        "sensitivity",
        "--config",
        config.to_string_lossy().as_ref(),
        "--input",
        input.to_string_lossy().as_ref(),
        "--output",
        out_path.to_string_lossy().as_ref(),
        "--threads",
        "2",
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());

    let bytes = std::fs::read(&out_path).unwrap();
    let _ = std::fs::remove_file(&out_path);
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(v["schema_version"], "sbn_chi2_sensitivity_v0");
    assert_eq!(v["energy_type"], "reco_e");
    assert_eq!(v["dm2"].as_array().unwrap().len(), 6);
    assert_eq!(v["sin2theta"].as_array().unwrap().len(), 8);
    let chi2 = v["chi2"].as_array().unwrap();
    assert_eq!(chi2.len(), 6);
    assert!(chi2.iter().all(|row| row.as_array().unwrap().len() == 8));

    let labels: Vec<&str> =
        v["contours"].as_array().unwrap().iter().map(|c| c["label"].as_str().unwrap()).collect();
    assert_eq!(labels, vec!["90pct", "3sigma", "5sigma"]);

    let sample = &v["samples"][0];
    assert_eq!(sample["name"], "SBND");
    assert_eq!(sample["scale_factor"].as_f64(), Some(2.0));
    // The event outside the active volume is dropped.
    let signal: Vec<f64> =
        sample["signal"].as_array().unwrap().iter().map(|x| x.as_f64().unwrap()).collect();
    assert_eq!(signal, vec![1000.0, 1000.0, 1000.0]);
    assert!(sample.get("background").is_none());
}

#[test]
fn sensitivity_prints_to_stdout_without_output() {
    let config = fixture_path("sensitivity_config.json");
    let input = fixture_path("sensitivity_input.json");
    let v = stdout_json(&run(&[
        "sensitivity",
        "--config",
        config.to_string_lossy().as_ref(),
        "--input",
        input.to_string_lossy().as_ref(),
    ]));
    assert_eq!(v["schema_version"], "sbn_chi2_sensitivity_v0");
    // The smallest mixing stays close to the null prediction.
    let first = v["chi2"][0][0].as_f64().unwrap();
    assert!(first >= 0.0 && first < 1.0);
}

#[test]
fn sensitivity_rejects_mismatched_covariance() {
    let config = fixture_path("sensitivity_config.json");
    let input = tmp_path("bad_input.json");
    std::fs::write(
        &input,
        r#"{"samples":[{"name":"SBND","pot":1e20,"background":[{"reco_energy":0.3}]}],
            "covariance":[[0.01]]}"#,
    )
    .unwrap();
    let out = run(&[
        "sensitivity",
        "--config",
        config.to_string_lossy().as_ref(),
        "--input",
        input.to_string_lossy().as_ref(),
    ]);
    let _ = std::fs::remove_file(&input);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("covariance"), "stderr={stderr}");
}
