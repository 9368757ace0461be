//! Selectable companion personalities.

mod engine;
mod system_prompt;
mod traits;

pub use engine::{InteractionContext, PersonalityEngine, PersonalityInfo, PersonalityStats};
pub use system_prompt::{SystemPromptParams, build_system_prompt};
pub use traits::{PersonalityTraits, traits_for};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalityType {
    #[default]
    Caring,
    Playful,
    Intellectual,
    Romantic,
}

impl PersonalityType {
    pub const ALL: [PersonalityType; 4] = [
        PersonalityType::Caring,
        PersonalityType::Playful,
        PersonalityType::Intellectual,
        PersonalityType::Romantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonalityType::Caring => "caring",
            PersonalityType::Playful => "playful",
            PersonalityType::Intellectual => "intellectual",
            PersonalityType::Romantic => "romantic",
        }
    }

    /// Display name, e.g. "돌봄이".
    pub fn display_name(&self) -> &'static str {
        traits_for(*self).name
    }
}

impl fmt::Display for PersonalityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonalityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "caring" => Ok(PersonalityType::Caring),
            "playful" => Ok(PersonalityType::Playful),
            "intellectual" => Ok(PersonalityType::Intellectual),
            "romantic" => Ok(PersonalityType::Romantic),
            other => anyhow::bail!(
                "Unknown personality '{}' (expected caring, playful, intellectual or romantic)",
                other
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        for kind in PersonalityType::ALL {
            assert_eq!(kind.to_string().parse::<PersonalityType>().unwrap(), kind);
        }
        assert_eq!(
            " Romantic ".parse::<PersonalityType>().unwrap(),
            PersonalityType::Romantic
        );
        assert!("grumpy".parse::<PersonalityType>().is_err());
        assert_eq!(PersonalityType::Playful.display_name(), "장난꾸러기");
    }
}
