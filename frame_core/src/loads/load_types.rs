//! Gravity load types per ASCE 7

use serde::{Deserialize, Serialize};

/// Load types carried by a gravity frame
///
/// # Example
/// ```
/// use frame_core::loads::LoadType;
///
/// assert_eq!(LoadType::LiveRoof.code(), "Lr");
/// assert_eq!(LoadType::Dead.description(), "Dead load");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LoadType {
    /// D - Dead load (self-weight, superimposed dead)
    Dead,
    /// L - Floor live load
    Live,
    /// Lr - Roof live load
    LiveRoof,
}

impl LoadType {
    pub const ALL: [LoadType; 3] = [LoadType::Dead, LoadType::Live, LoadType::LiveRoof];

    /// Standard abbreviation (D, L, Lr)
    pub fn code(&self) -> &'static str {
        match self {
            LoadType::Dead => "D",
            LoadType::Live => "L",
            LoadType::LiveRoof => "Lr",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LoadType::Dead => "Dead load",
            LoadType::Live => "Live load",
            LoadType::LiveRoof => "Roof live load",
        }
    }

    /// Whether the load is transient (counts toward live-load deflection)
    pub fn is_live(&self) -> bool {
        matches!(self, LoadType::Live | LoadType::LiveRoof)
    }
}

impl std::fmt::Display for LoadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let codes: Vec<_> = LoadType::ALL.iter().map(|t| t.code()).collect();
        assert_eq!(codes, vec!["D", "L", "Lr"]);
    }

    #[test]
    fn test_live_flags() {
        assert!(!LoadType::Dead.is_live());
        assert!(LoadType::Live.is_live());
        assert!(LoadType::LiveRoof.is_live());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&LoadType::LiveRoof).unwrap();
        assert_eq!(json, "\"LiveRoof\"");
        let parsed: LoadType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, LoadType::LiveRoof);
    }
}
