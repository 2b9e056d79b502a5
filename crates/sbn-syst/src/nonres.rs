//! Decoding of the correlated non-resonant pion production knobs.
//!
//! GENIE's `NonResR` family comes as four logical systematics per pion
//! multiplicity and current: neutrino/antineutrino on proton/neutron
//! targets. Isospin symmetry ties `vn` to `vbarp` and `vbarn` to `vp`, so only
//! the proton-target knobs are stored in the event record. Names look like
//! `NonResRvbarn2piNC`: prefix, target, pion count, current.

use std::fmt;

use sbn_core::{Error, Result};

/// Name prefix shared by the whole family.
pub const NONRES_PREFIX: &str = "NonResR";

/// Projectile/target combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nucleon {
    /// Neutrino on proton.
    Vp,
    /// Neutrino on neutron.
    Vn,
    /// Antineutrino on proton.
    Vbarp,
    /// Antineutrino on neutron.
    Vbarn,
}

impl Nucleon {
    /// All targets, in catalog order.
    pub const ALL: [Nucleon; 4] = [Nucleon::Vp, Nucleon::Vbarp, Nucleon::Vbarn, Nucleon::Vn];

    /// Name token.
    pub fn token(self) -> &'static str {
        match self {
            Nucleon::Vp => "vp",
            Nucleon::Vn => "vn",
            Nucleon::Vbarp => "vbarp",
            Nucleon::Vbarn => "vbarn",
        }
    }

    /// Whether the projectile is an antineutrino.
    pub fn is_antiparticle(self) -> bool {
        matches!(self, Nucleon::Vbarp | Nucleon::Vbarn)
    }

    /// The proton-target knob that stores this combination's universes.
    pub fn backing(self) -> Nucleon {
        match self {
            Nucleon::Vp | Nucleon::Vbarn => Nucleon::Vp,
            Nucleon::Vbarp | Nucleon::Vn => Nucleon::Vbarp,
        }
    }

    fn from_token(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.token() == s)
    }
}

/// Number of pions in the final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PionCount {
    /// One pion.
    One,
    /// Two pions.
    Two,
}

impl PionCount {
    /// All multiplicities, in catalog order.
    pub const ALL: [PionCount; 2] = [PionCount::One, PionCount::Two];

    /// Name token.
    pub fn token(self) -> &'static str {
        match self {
            PionCount::One => "1pi",
            PionCount::Two => "2pi",
        }
    }
}

/// Weak current of the interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Current {
    /// Charged current.
    Cc,
    /// Neutral current.
    Nc,
}

impl Current {
    /// All currents, in catalog order.
    pub const ALL: [Current; 2] = [Current::Cc, Current::Nc];

    /// Name token.
    pub fn token(self) -> &'static str {
        match self {
            Current::Cc => "CC",
            Current::Nc => "NC",
        }
    }
}

/// One logical systematic of the non-resonant family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NonResKnob {
    /// Projectile/target.
    pub nucleon: Nucleon,
    /// Pion multiplicity.
    pub npi: PionCount,
    /// Current.
    pub current: Current,
}

impl NonResKnob {
    /// Whether `name` belongs to the family at all.
    pub fn is_family(name: &str) -> bool {
        name.starts_with(NONRES_PREFIX)
    }

    /// Decode a full systematic name such as `NonResRvn1piCC`.
    pub fn parse(name: &str) -> Result<Self> {
        let malformed = || Error::MalformedKnob(name.to_string());

        let rest = name.strip_prefix(NONRES_PREFIX).ok_or_else(malformed)?;

        let (rest, current) = Current::ALL
            .into_iter()
            .find_map(|c| rest.strip_suffix(c.token()).map(|r| (r, c)))
            .ok_or_else(malformed)?;

        let (rest, npi) = PionCount::ALL
            .into_iter()
            .find_map(|p| rest.strip_suffix(p.token()).map(|r| (r, p)))
            .ok_or_else(malformed)?;

        let nucleon = Nucleon::from_token(rest).ok_or_else(malformed)?;

        Ok(Self { nucleon, npi, current })
    }

    /// Universe rotation: 0 CCν, 1 CCν̄, 2 NCν, 3 NCν̄.
    ///
    /// Logical systematics backed by the same stored knob get different
    /// offsets so that they throw independent universes.
    pub fn offset(&self) -> usize {
        let mut offset = 0;
        if self.nucleon.is_antiparticle() {
            offset += 1;
        }
        if self.current == Current::Nc {
            offset += 2;
        }
        offset
    }

    /// Name of the stored knob carrying this systematic's universes.
    pub fn backing_knob(&self) -> String {
        format!("{NONRES_PREFIX}{}{}", self.nucleon.backing().token(), self.npi.token())
    }

    /// Name of the knob for this exact target, without symmetry substitution.
    pub fn direct_knob(&self) -> String {
        format!("{NONRES_PREFIX}{}{}", self.nucleon.token(), self.npi.token())
    }

    /// Every member of the family: 4 targets × 2 multiplicities × 2 currents.
    pub fn all() -> impl Iterator<Item = NonResKnob> {
        PionCount::ALL.into_iter().flat_map(|npi| {
            Current::ALL.into_iter().flat_map(move |current| {
                Nucleon::ALL.into_iter().map(move |nucleon| NonResKnob { nucleon, npi, current })
            })
        })
    }
}

impl fmt::Display for NonResKnob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{NONRES_PREFIX}{}{}{}",
            self.nucleon.token(),
            self.npi.token(),
            self.current.token()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_examples() {
        let k = NonResKnob::parse("NonResRvn1piCC").unwrap();
        assert_eq!(k.backing_knob(), "NonResRvbarp1pi");
        assert_eq!(k.offset(), 0);

        let k = NonResKnob::parse("NonResRvbarn2piNC").unwrap();
        assert_eq!(k.backing_knob(), "NonResRvp2pi");
        assert_eq!(k.offset(), 3);
    }

    #[test]
    fn test_all_sixteen_names() {
        // (name, backing knob, offset)
        let table = [
            ("NonResRvp1piCC", "NonResRvp1pi", 0),
            ("NonResRvn1piCC", "NonResRvbarp1pi", 0),
            ("NonResRvbarp1piCC", "NonResRvbarp1pi", 1),
            ("NonResRvbarn1piCC", "NonResRvp1pi", 1),
            ("NonResRvp1piNC", "NonResRvp1pi", 2),
            ("NonResRvn1piNC", "NonResRvbarp1pi", 2),
            ("NonResRvbarp1piNC", "NonResRvbarp1pi", 3),
            ("NonResRvbarn1piNC", "NonResRvp1pi", 3),
            ("NonResRvp2piCC", "NonResRvp2pi", 0),
            ("NonResRvn2piCC", "NonResRvbarp2pi", 0),
            ("NonResRvbarp2piCC", "NonResRvbarp2pi", 1),
            ("NonResRvbarn2piCC", "NonResRvp2pi", 1),
            ("NonResRvp2piNC", "NonResRvp2pi", 2),
            ("NonResRvn2piNC", "NonResRvbarp2pi", 2),
            ("NonResRvbarp2piNC", "NonResRvbarp2pi", 3),
            ("NonResRvbarn2piNC", "NonResRvp2pi", 3),
        ];

        for (name, knob, offset) in table {
            let k = NonResKnob::parse(name).unwrap();
            assert_eq!(k.backing_knob(), knob, "{name}");
            assert_eq!(k.offset(), offset, "{name}");
            assert_eq!(k.to_string(), name);
        }

        let generated: Vec<String> = NonResKnob::all().map(|k| k.to_string()).collect();
        assert_eq!(generated.len(), 16);
        for (name, _, _) in table {
            assert!(generated.iter().any(|g| g == name), "{name} not generated");
        }
    }

    #[test]
    fn test_symmetry_pairs_share_knob_but_not_offset() {
        for k in NonResKnob::all() {
            let partner = NonResKnob {
                nucleon: match k.nucleon {
                    Nucleon::Vp => Nucleon::Vbarn,
                    Nucleon::Vbarn => Nucleon::Vp,
                    Nucleon::Vn => Nucleon::Vbarp,
                    Nucleon::Vbarp => Nucleon::Vn,
                },
                ..k
            };
            assert_eq!(k.backing_knob(), partner.backing_knob());
            assert_ne!(k.offset(), partner.offset());
        }
    }

    #[test]
    fn test_direct_knob() {
        let k = NonResKnob::parse("NonResRvbarn1piCC").unwrap();
        assert_eq!(k.direct_knob(), "NonResRvbarn1pi");
    }

    #[test]
    fn test_malformed_names() {
        for name in [
            "NonResR",
            "NonResRvp1pi",
            "NonResRvp3piCC",
            "NonResRvx1piCC",
            "NonResRvp1piXC",
            "NonResRvp1piCCextra",
            "nonresrvp1picc",
            "QEMA",
        ] {
            assert!(
                matches!(NonResKnob::parse(name), Err(Error::MalformedKnob(ref n)) if n == name),
                "{name} should be malformed"
            );
        }
    }

    #[test]
    fn test_is_family() {
        assert!(NonResKnob::is_family("NonResRvp1piCC"));
        assert!(NonResKnob::is_family("NonResRanything"));
        assert!(!NonResKnob::is_family("NCResAxial"));
    }
}
