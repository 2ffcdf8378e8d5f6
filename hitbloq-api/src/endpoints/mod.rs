pub mod events;
pub mod leaderboards;
pub mod levels;
pub mod pools;
pub mod ranks;

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Hitbloq user id (not the platform id of the player)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Expert,
    ExpertPlus,
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Easy => "Easy",
            Self::Normal => "Normal",
            Self::Hard => "Hard",
            Self::Expert => "Expert",
            Self::ExpertPlus => "ExpertPlus",
        };
        f.write_str(name)
    }
}

impl FromStr for Difficulty {
    type Err = LevelKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            "hard" => Ok(Self::Hard),
            "expert" => Ok(Self::Expert),
            "expertplus" | "expert+" => Ok(Self::ExpertPlus),
            _ => Err(LevelKeyError(format!("unknown difficulty '{}'", s))),
        }
    }
}

/// Identifies one difficulty of one beatmap on the ranking service.
///
/// Hitbloq leaderboard ids look like `{hash}|_{difficulty}_Solo{characteristic}`,
/// e.g. `4A3B...|_ExpertPlus_SoloStandard`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LevelKey {
    hash: String,
    difficulty: Difficulty,
    characteristic: String,
}

impl LevelKey {
    pub fn new(hash: impl Into<String>, difficulty: Difficulty, characteristic: impl Into<String>) -> Self {
        Self {
            hash: hash.into().to_ascii_uppercase(),
            difficulty,
            characteristic: characteristic.into(),
        }
    }

    pub fn standard(hash: impl Into<String>, difficulty: Difficulty) -> Self {
        Self::new(hash, difficulty, "Standard")
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn characteristic(&self) -> &str {
        &self.characteristic
    }
}

impl Display for LevelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|_{}_Solo{}", self.hash, self.difficulty, self.characteristic)
    }
}

impl FromStr for LevelKey {
    type Err = LevelKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, rest) = s
            .split_once("|_")
            .ok_or_else(|| LevelKeyError(format!("missing '|_' separator in '{}'", s)))?;
        let (difficulty, characteristic) = rest
            .split_once("_Solo")
            .ok_or_else(|| LevelKeyError(format!("missing '_Solo' marker in '{}'", s)))?;
        if hash.is_empty() || characteristic.is_empty() {
            return Err(LevelKeyError(format!("incomplete level key '{}'", s)));
        }
        Ok(Self::new(hash, difficulty.parse()?, characteristic))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelKeyError(String);

impl Display for LevelKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for LevelKeyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_key_display_matches_leaderboard_id() {
        let key = LevelKey::standard("abc123", Difficulty::ExpertPlus);
        assert_eq!(key.to_string(), "ABC123|_ExpertPlus_SoloStandard");
    }

    #[test]
    fn level_key_parses_leaderboard_id() {
        let key: LevelKey = "ABC123|_Hard_SoloLawless".parse().unwrap();
        assert_eq!(key.hash(), "ABC123");
        assert_eq!(key.difficulty(), Difficulty::Hard);
        assert_eq!(key.characteristic(), "Lawless");
        assert_eq!(key.to_string(), "ABC123|_Hard_SoloLawless");
    }

    #[test]
    fn level_key_rejects_malformed_ids() {
        assert!("ABC123".parse::<LevelKey>().is_err());
        assert!("ABC123|_Hard".parse::<LevelKey>().is_err());
        assert!("ABC123|_Impossible_SoloStandard".parse::<LevelKey>().is_err());
        assert!("|_Hard_SoloStandard".parse::<LevelKey>().is_err());
    }

    #[test]
    fn difficulty_parsing_is_case_insensitive() {
        assert_eq!("expertplus".parse::<Difficulty>(), Ok(Difficulty::ExpertPlus));
        assert_eq!("Expert+".parse::<Difficulty>(), Ok(Difficulty::ExpertPlus));
        assert_eq!("NORMAL".parse::<Difficulty>(), Ok(Difficulty::Normal));
    }
}
