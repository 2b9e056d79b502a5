use std::path::PathBuf;

use approx::assert_relative_eq;
use sbn_core::Error;
use sbn_osc::{
    Chi2Sensitivity, ContourLevel, FixedCovariance, OscType, SampleConfig, SensitivityConfig,
    SensitivityOutput, Stage, UniverseCovariance,
};

const EDGES: [f64; 4] = [0.2, 0.5, 1.0, 3.0];
const CENTRES: [f64; 3] = [0.35, 0.75, 2.0];

fn tmp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("sbn_osc_{}_{}", std::process::id(), name));
    p
}

fn appearance_config() -> SensitivityConfig {
    SensitivityConfig::new(12, 10, [-3.0, 0.0], [-1.0, 2.0]).add_sample(
        SampleConfig::new("SBND", 2e20, &EDGES, &EDGES, &[0.09, 0.13])
            .osc_type(OscType::Appearance),
    )
}

/// 1000 fully-transmuted signal events and 100 background events per bin,
/// filled at half the target exposure.
fn fill(sens: &mut Chi2Sensitivity, name: &str) {
    let s = sens.sample_mut(name).unwrap();
    s.add_pot(1e20);
    for &e in &CENTRES {
        s.fill_signal(e, e, 0.11, 500.0);
        s.fill_background(e, 50.0);
    }
}

#[test]
fn asimov_surface_matches_closed_form() {
    let mut sens =
        Chi2Sensitivity::new(appearance_config(), Box::new(FixedCovariance::zeros(3))).unwrap();
    fill(&mut sens, "SBND");
    let out = sens.finalize().unwrap().clone();

    assert_eq!(out.schema_version, "sbn_chi2_sensitivity_v0");
    assert!(out.energy_type.is_empty());
    assert_eq!(out.samples[0].scale_factor, 2.0);

    for (i, &m) in out.dm2.iter().enumerate() {
        for (j, &s) in out.sin2theta.iter().enumerate() {
            let expected: f64 = CENTRES
                .iter()
                .map(|&e| {
                    let p = s * (1.267 * m * 0.11 / e).sin().powi(2);
                    (1000.0 * p).powi(2) / 100.0
                })
                .sum();
            assert_relative_eq!(out.chi2[i][j], expected, max_relative = 1e-9, epsilon = 1e-12);
        }
    }
}

#[test]
fn contours_follow_levels() {
    let mut sens =
        Chi2Sensitivity::new(appearance_config(), Box::new(FixedCovariance::zeros(3))).unwrap();
    fill(&mut sens, "SBND");
    let out = sens.finalize().unwrap();

    assert_eq!(out.contours.len(), 3);
    let c90 = out.contour("90pct").unwrap();
    let c5 = out.contour("5sigma").unwrap();
    assert!(!c90.is_empty());
    assert!(c5.len() <= c90.len());

    // A tighter level needs a larger mixing on every shared row.
    for (m, s5) in c5.dm2.iter().zip(&c5.sin2theta) {
        let k = c90.dm2.iter().position(|x| x == m).unwrap();
        assert!(*s5 >= c90.sin2theta[k]);
    }
    for s in &c90.sin2theta {
        assert!(*s >= out.sin2theta[0] && *s <= out.sin2theta[out.sin2theta.len() - 1]);
    }
}

#[test]
fn systematics_weaken_sensitivity() {
    let stat_only = {
        let mut sens =
            Chi2Sensitivity::new(appearance_config(), Box::new(FixedCovariance::zeros(3)))
                .unwrap();
        fill(&mut sens, "SBND");
        sens.finalize().unwrap().clone()
    };

    let mut cov = UniverseCovariance::new(vec![100.0; 3]);
    cov.add_universe(vec![120.0; 3]).unwrap();
    cov.add_universe(vec![80.0; 3]).unwrap();
    let mut sens = Chi2Sensitivity::new(appearance_config(), Box::new(cov)).unwrap();
    fill(&mut sens, "SBND");
    let syst = sens.finalize().unwrap();

    let last = stat_only.chi2.len() - 1;
    for (a, b) in stat_only.chi2[last].iter().zip(&syst.chi2[last]) {
        assert!(b <= a);
    }
    assert!(syst.chi2[last][11] < stat_only.chi2[last][11]);
}

#[test]
fn degenerate_covariance_is_reported() {
    let cfg = SensitivityConfig::new(4, 4, [-2.0, 0.0], [-1.0, 1.0]).add_sample(
        SampleConfig::new("FD", 1e20, &EDGES, &EDGES, &[0.5, 0.7]).osc_type(OscType::Appearance),
    );
    let mut sens = Chi2Sensitivity::new(cfg, Box::new(FixedCovariance::zeros(3))).unwrap();
    let s = sens.sample_mut("FD").unwrap();
    s.add_pot(1e20);
    // Last bin stays empty: zero row in the absolute covariance.
    s.fill_background(0.3, 10.0);
    s.fill_background(0.7, 10.0);

    sens.finalize_covariance().unwrap();
    sens.scale().unwrap();
    assert!(matches!(sens.compute_chi2(), Err(Error::Computation(_))));
    assert_eq!(sens.stage(), Stage::Scaled);
    assert!(matches!(sens.compute_contours(), Err(Error::Stage(_))));
}

#[test]
fn failed_scale_leaves_samples_untouched() {
    let cfg = appearance_config().add_sample(
        SampleConfig::new("FD", 4e20, &EDGES, &EDGES, &[0.5, 0.7]).osc_type(OscType::Appearance),
    );
    let mut sens = Chi2Sensitivity::new(cfg, Box::new(FixedCovariance::zeros(6))).unwrap();
    fill(&mut sens, "SBND");
    // FD gets events but no exposure.
    sens.sample_mut("FD").unwrap().fill_background(0.3, 10.0);

    sens.finalize_covariance().unwrap();
    let before: Vec<(Vec<f64>, Vec<f64>)> =
        sens.samples().iter().map(|s| (s.signal(), s.background())).collect();

    for _ in 0..2 {
        let err = sens.scale().unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("FD")), "{err}");
        assert_eq!(sens.stage(), Stage::Covariance);
    }
    let after: Vec<(Vec<f64>, Vec<f64>)> =
        sens.samples().iter().map(|s| (s.signal(), s.background())).collect();
    assert_eq!(before, after);
    assert_eq!(after[0].0, vec![500.0, 500.0, 500.0]);
}

#[test]
fn stages_cannot_be_skipped() {
    let mut sens =
        Chi2Sensitivity::new(appearance_config(), Box::new(FixedCovariance::zeros(3))).unwrap();
    fill(&mut sens, "SBND");
    assert!(matches!(sens.compute_chi2(), Err(Error::Stage(_))));
    assert!(matches!(sens.compute_contours(), Err(Error::Stage(_))));
    assert!(matches!(sens.write(), Err(Error::Stage(_))));
    assert_eq!(sens.stage(), Stage::Filling);
    assert!(sens.chi2_surface().is_empty());

    sens.finalize().unwrap();
    assert!(matches!(sens.finalize(), Err(Error::Stage(_))));
}

#[test]
fn output_is_written_with_saved_spectra() {
    let path = tmp_path("out.json");
    let mut cfg = appearance_config()
        .output_file(&path)
        .contour_levels(vec![ContourLevel::new("90pct", 1.64)]);
    cfg.save_signal = true;
    cfg.save_background = true;
    cfg.save_oscillations = vec![[1.0, 10.0]];
    cfg.energy_type = "reco_e".into();

    let mut sens = Chi2Sensitivity::new(cfg, Box::new(FixedCovariance::zeros(3))).unwrap();
    fill(&mut sens, "SBND");
    sens.finalize().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let out: SensitivityOutput = serde_json::from_slice(&bytes).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(out.energy_type, "reco_e");
    assert_eq!(out.contours.len(), 1);
    assert_eq!(out.samples[0].signal.as_deref(), Some(&[1000.0, 1000.0, 1000.0][..]));
    assert_eq!(out.samples[0].background.as_deref(), Some(&[100.0, 100.0, 100.0][..]));
    assert_eq!(out.oscillations.len(), 1);
    let osc = &out.oscillations[0].signal[0];
    for (o, &e) in osc.iter().zip(&CENTRES) {
        let p = (1.267 * 10.0 * 0.11 / e).sin().powi(2);
        assert_relative_eq!(*o, 1000.0 * p, max_relative = 1e-9);
    }
}
