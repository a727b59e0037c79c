//! Physical store sites with independently tracked stock.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A store location.
///
/// Ordering is stable (`Utawala < Kamulu`) and is used to acquire row locks in
/// a deterministic order when a unit of work touches both sites.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Utawala,
    Kamulu,
}

impl Location {
    pub const ALL: [Location; 2] = [Location::Utawala, Location::Kamulu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Utawala => "utawala",
            Location::Kamulu => "kamulu",
        }
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utawala" => Ok(Location::Utawala),
            "kamulu" => Ok(Location::Kamulu),
            other => Err(DomainError::validation(format!(
                "unknown location '{other}' (expected one of: utawala, kamulu)"
            ))),
        }
    }
}
