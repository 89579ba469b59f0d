use crate::cfg::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tuning [Profile]. The alignment screens went through several
/// tuning iterations; both sets of thresholds are kept as presets.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Profile {
    /// [Profile::Strict]: long stability window, low variance threshold
    /// and responsive filtering. This is our default.
    #[default]
    #[cfg_attr(feature = "serde", serde(alias = "strict", alias = "Strict"))]
    Strict,

    /// [Profile::Relaxed]: shorter window, tolerant variance threshold,
    /// coarser filtering. Suits noisy magnetometers.
    #[cfg_attr(feature = "serde", serde(alias = "relaxed", alias = "Relaxed"))]
    Relaxed,
}

impl std::str::FromStr for Profile {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        let trimmed = s.trim();
        match trimmed {
            "strict" => Ok(Self::Strict),
            "relaxed" => Ok(Self::Relaxed),
            _ => Err(Error::InvalidProfile),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Relaxed => write!(f, "relaxed"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Profile;
    use std::str::FromStr;

    #[test]
    fn profile_parsing() {
        for (desc, expected) in [
            ("strict", Profile::Strict),
            (" Relaxed ", Profile::Relaxed),
            ("STRICT", Profile::Strict),
        ] {
            let profile = Profile::from_str(desc).unwrap();
            assert_eq!(profile, expected);
            let formatted = profile.to_string();
            assert_eq!(Profile::from_str(&formatted).unwrap(), expected);
        }
        assert!(Profile::from_str("pedestrian").is_err());
    }
}
