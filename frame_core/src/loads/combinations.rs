//! ASCE 7 gravity load combinations
//!
//! Each design code gets a fixed set: strength combinations checked against
//! member capacity, plus serviceability combinations that carry a deflection
//! limit expressed as span / ratio.
//!
//! | Code | Strength | Serviceability |
//! |------|----------|----------------|
//! | LRFD (§2.3) | 1.4D; 1.2D + 1.6L + 0.5Lr; 1.2D + L + 1.6Lr | D + L (L/240); L + Lr (L/360) |
//! | ASD (§2.4)  | D; D + L; D + Lr; D + 0.75L + 0.75Lr | same |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::load_types::LoadType::{self, Dead as D, Live as L, LiveRoof as LR};
use super::LoadCase;
use crate::config::DesignCode;

/// Whether a combination is checked for strength or deflection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombinationKind {
    Strength,
    Serviceability,
}

/// A linear combination of load-type factors
///
/// # Example
/// ```
/// use frame_core::loads::{LoadCase, LoadCombination, LoadType};
///
/// let combo = LoadCombination::strength(
///     "LRFD-2",
///     &[(LoadType::Dead, 1.2), (LoadType::Live, 1.6), (LoadType::LiveRoof, 0.5)],
/// );
/// assert_eq!(combo.equation, "1.2D + 1.6L + 0.5Lr");
///
/// let case = LoadCase::new("Floor")
///     .with_load(LoadType::Dead, 20.0)
///     .with_load(LoadType::Live, 50.0);
/// assert!((combo.apply(&case) - 104.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadCombination {
    /// Identifier (e.g. "LRFD-2", "SERV-1")
    pub name: String,
    /// Display form, generated from the factors
    pub equation: String,
    pub factors: BTreeMap<LoadType, f64>,
    pub kind: CombinationKind,
    /// Span / deflection ratio limit for serviceability combinations
    pub deflection_limit: Option<f64>,
}

impl LoadCombination {
    fn build(name: &str, kind: CombinationKind, factors: &[(LoadType, f64)], limit: Option<f64>) -> Self {
        let factors: BTreeMap<LoadType, f64> = factors.iter().copied().collect();
        LoadCombination {
            name: name.to_string(),
            equation: equation_of(&factors),
            factors,
            kind,
            deflection_limit: limit,
        }
    }

    pub fn strength(name: &str, factors: &[(LoadType, f64)]) -> Self {
        Self::build(name, CombinationKind::Strength, factors, None)
    }

    /// Serviceability combination with a span/`ratio` deflection limit
    pub fn serviceability(name: &str, factors: &[(LoadType, f64)], ratio: f64) -> Self {
        Self::build(name, CombinationKind::Serviceability, factors, Some(ratio))
    }

    /// Factored total of a load case. Missing types count as zero.
    pub fn apply(&self, case: &LoadCase) -> f64 {
        self.factors
            .iter()
            .map(|(load_type, factor)| factor * case.get(*load_type))
            .sum()
    }

    pub fn factor(&self, load_type: LoadType) -> f64 {
        self.factors.get(&load_type).copied().unwrap_or(0.0)
    }

    pub fn is_strength(&self) -> bool {
        self.kind == CombinationKind::Strength
    }
}

/// `1.2D + 1.6L + 0.5Lr`; unit factors print without a coefficient.
fn equation_of(factors: &BTreeMap<LoadType, f64>) -> String {
    factors
        .iter()
        .filter(|(_, f)| **f != 0.0)
        .map(|(t, f)| {
            if *f == 1.0 {
                t.code().to_string()
            } else {
                format!("{}{}", f, t.code())
            }
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

type Row = (&'static str, &'static [(LoadType, f64)]);

const LRFD_STRENGTH: &[Row] = &[
    ("LRFD-1", &[(D, 1.4)]),
    ("LRFD-2", &[(D, 1.2), (L, 1.6), (LR, 0.5)]),
    ("LRFD-3", &[(D, 1.2), (L, 1.0), (LR, 1.6)]),
];

const ASD_STRENGTH: &[Row] = &[
    ("ASD-1", &[(D, 1.0)]),
    ("ASD-2", &[(D, 1.0), (L, 1.0)]),
    ("ASD-3", &[(D, 1.0), (LR, 1.0)]),
    ("ASD-4", &[(D, 1.0), (L, 0.75), (LR, 0.75)]),
];

/// Total load at L/240, live load at L/360
const SERVICEABILITY: &[(&str, &[(LoadType, f64)], f64)] = &[
    ("SERV-1", &[(D, 1.0), (L, 1.0)], 240.0),
    ("SERV-2", &[(L, 1.0), (LR, 1.0)], 360.0),
];

fn with_serviceability(strength: &[Row]) -> Vec<LoadCombination> {
    strength
        .iter()
        .map(|(name, factors)| LoadCombination::strength(name, factors))
        .chain(
            SERVICEABILITY
                .iter()
                .map(|(name, factors, ratio)| LoadCombination::serviceability(name, factors, *ratio)),
        )
        .collect()
}

/// ASCE 7 §2.3 gravity combinations plus the serviceability set
pub fn lrfd_gravity_combinations() -> Vec<LoadCombination> {
    with_serviceability(LRFD_STRENGTH)
}

/// ASCE 7 §2.4 gravity combinations plus the serviceability set
pub fn asd_gravity_combinations() -> Vec<LoadCombination> {
    with_serviceability(ASD_STRENGTH)
}

/// Combination set fixed by the design code
pub fn combinations_for(code: DesignCode) -> Vec<LoadCombination> {
    match code {
        DesignCode::AiscLrfd => lrfd_gravity_combinations(),
        DesignCode::AiscAsd => asd_gravity_combinations(),
    }
}

/// Governing (maximum) strength combination for a load case
pub fn find_governing_combination<'a>(
    case: &LoadCase,
    combinations: &'a [LoadCombination],
) -> Option<(f64, &'a LoadCombination)> {
    combinations
        .iter()
        .filter(|c| c.is_strength())
        .map(|c| (c.apply(case), c))
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lrfd_set() {
        let combos = lrfd_gravity_combinations();
        assert_eq!(combos.len(), 5);
        assert_eq!(combos.iter().filter(|c| c.is_strength()).count(), 3);
        let lrfd1 = &combos[0];
        assert_eq!(lrfd1.factor(LoadType::Dead), 1.4);
        assert_eq!(lrfd1.factor(LoadType::Live), 0.0);
        assert_eq!(combos[2].equation, "1.2D + L + 1.6Lr");
    }

    #[test]
    fn test_asd_set() {
        let combos = combinations_for(DesignCode::AiscAsd);
        let names: Vec<_> = combos.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ASD-1", "ASD-2", "ASD-3", "ASD-4", "SERV-1", "SERV-2"]);
        assert_eq!(combos[3].equation, "D + 0.75L + 0.75Lr");
    }

    #[test]
    fn test_serviceability_limits() {
        let combos = lrfd_gravity_combinations();
        let total = combos.iter().find(|c| c.name == "SERV-1").unwrap();
        let live = combos.iter().find(|c| c.name == "SERV-2").unwrap();
        assert_eq!(total.deflection_limit, Some(240.0));
        assert_eq!(total.equation, "D + L");
        assert_eq!(live.deflection_limit, Some(360.0));
        assert_eq!(live.factor(LoadType::Dead), 0.0);
    }

    #[test]
    fn test_governing_floor() {
        let case = LoadCase::new("Floor")
            .with_load(LoadType::Dead, 20.0)
            .with_load(LoadType::Live, 50.0);
        let combos = lrfd_gravity_combinations();
        let (value, combo) = find_governing_combination(&case, &combos).unwrap();
        assert!((value - 104.0).abs() < 1e-9);
        assert_eq!(combo.name, "LRFD-2");
    }

    #[test]
    fn test_governing_roof() {
        // 1.2(15) + 1.6(20) = 50
        let case = LoadCase::new("Roof")
            .with_load(LoadType::Dead, 15.0)
            .with_load(LoadType::LiveRoof, 20.0);
        let combos = lrfd_gravity_combinations();
        let (value, combo) = find_governing_combination(&case, &combos).unwrap();
        assert!((value - 50.0).abs() < 1e-9);
        assert_eq!(combo.name, "LRFD-3");
    }
}
