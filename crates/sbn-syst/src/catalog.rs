//! Catalog of supported universe-backed systematics.

use std::sync::{Arc, OnceLock};

use sbn_core::{Result, Systematic};
use sbn_core::cut::{is_antinu, is_cc, is_nc};

use crate::nonres::{Current, NonResKnob};
use crate::registry::{self, UniverseLookup};
use crate::shift::WeightSyst;

/// Single-knob GENIE systematics, in catalog order.
///
/// `CohMA` and `CohR0` are left out: their stored universes contain NaNs.
pub const GENIE_KNOBS: [&str; 23] = [
    "DISAth",
    "DISBth",
    "DISCv1u",
    "DISCv2u",
    "IntraNukeNabs",
    "IntraNukeNcex",
    "IntraNukeNinel",
    "IntraNukeNmfp",
    "IntraNukeNpi",
    "IntraNukePIabs",
    "IntraNukePIcex",
    "IntraNukePIinel",
    "IntraNukePImfp",
    "IntraNukePIpi",
    "NC",
    "ResDecayGamma",
    "CCResAxial",
    "CCResVector",
    "NCELaxial",
    "NCELeta",
    "NCResAxial",
    "NCResVector",
    "QEMA",
];

/// Build-once lists of weight systematics over one registry.
pub struct SystCatalog {
    lookup: Arc<dyn UniverseLookup>,
    genie: OnceLock<Vec<Arc<WeightSyst>>>,
    flux: OnceLock<Vec<Arc<WeightSyst>>>,
    all: OnceLock<Vec<Arc<WeightSyst>>>,
}

impl SystCatalog {
    /// Catalog over `lookup`. Nothing is built until first requested.
    pub fn new(lookup: Arc<dyn UniverseLookup>) -> Self {
        Self { lookup, genie: OnceLock::new(), flux: OnceLock::new(), all: OnceLock::new() }
    }

    /// GENIE systematics: the simple knobs plus the 16 non-resonant variants.
    ///
    /// The list does not depend on the registry contents, so it can be built
    /// before any knob is resolved.
    pub fn genie_systs(&self) -> &[Arc<WeightSyst>] {
        self.genie.get_or_init(|| self.build_genie())
    }

    /// Flux systematics: every registry knob that is not a GENIE knob.
    ///
    /// GENIE knobs are recognised by a "genie" substring, by membership in
    /// [`GENIE_KNOBS`], or by the `NonResR` prefix.
    pub fn flux_systs(&self) -> &[Arc<WeightSyst>] {
        self.flux.get_or_init(|| {
            self.lookup
                .systs()
                .iter()
                .filter(|name| !name.contains("genie"))
                .filter(|name| !GENIE_KNOBS.contains(&name.as_str()))
                .filter(|name| !NonResKnob::is_family(name))
                .map(|name| Arc::new(WeightSyst::new(name.clone(), Arc::clone(&self.lookup))))
                .collect()
        })
    }

    /// GENIE followed by flux systematics.
    pub fn weight_systs(&self) -> &[Arc<WeightSyst>] {
        self.all.get_or_init(|| {
            self.genie_systs().iter().chain(self.flux_systs()).cloned().collect()
        })
    }

    /// Look a systematic up by short name among [`Self::weight_systs`].
    pub fn find(&self, name: &str) -> Option<&Arc<WeightSyst>> {
        self.weight_systs().iter().find(|s| s.short_name() == name)
    }

    fn build_genie(&self) -> Vec<Arc<WeightSyst>> {
        let mut ret: Vec<Arc<WeightSyst>> = GENIE_KNOBS
            .iter()
            .map(|&name| Arc::new(WeightSyst::new(name, Arc::clone(&self.lookup))))
            .collect();

        // Split by current and restricted to neutrino or antineutrino. The
        // neutron-target variants borrow the opposite proton knob by isospin
        // symmetry.
        for knob in NonResKnob::all() {
            let current_cut = match knob.current {
                Current::Cc => is_cc(),
                Current::Nc => is_nc(),
            };
            let cut = if knob.nucleon.is_antiparticle() {
                current_cut & is_antinu()
            } else {
                current_cut & !is_antinu()
            };
            ret.push(Arc::new(WeightSyst::with_knob(
                knob.to_string(),
                knob.backing_knob(),
                cut,
                Arc::clone(&self.lookup),
            )));
        }

        log::debug!("built GENIE weight systematics: {}", ret.len());
        ret
    }
}

static GLOBAL_CATALOG: OnceLock<SystCatalog> = OnceLock::new();

/// GENIE systematics over the process-wide registry.
///
/// Requires [`registry::install_global`] to have run. Repeated calls return
/// the same objects.
pub fn sbn_genie_weight_systs() -> Result<&'static [Arc<WeightSyst>]> {
    if let Some(c) = GLOBAL_CATALOG.get() {
        return Ok(c.genie_systs());
    }
    let lookup: Arc<dyn UniverseLookup> = registry::global()?;
    Ok(GLOBAL_CATALOG.get_or_init(|| SystCatalog::new(lookup)).genie_systs())
}
