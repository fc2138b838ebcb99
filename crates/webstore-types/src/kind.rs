use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Which storage medium a facade binds to.
///
/// Both kinds expose the exact same contract. `Local` data outlives the
/// session that wrote it, `Session` data is scoped to the current session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Local,
    Session,
}

impl StoreKind {
    /// All store kinds, in declaration order.
    pub const ALL: [StoreKind; 2] = [StoreKind::Local, StoreKind::Session];

    /// Lowercase name used in logs and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "localstorage" => Ok(Self::Local),
            "session" | "sessionstorage" => Ok(Self::Session),
            other => Err(TypeError::UnknownStoreKind(other.to_string())),
        }
    }
}
