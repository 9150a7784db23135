use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SatchelError;

/// External learning platforms Satchel knows how to sync from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Canvas,
    WebAssign,
    Owlv2,
    Gradescope,
    Piazza,
    Moodle,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Canvas,
        Platform::WebAssign,
        Platform::Owlv2,
        Platform::Gradescope,
        Platform::Piazza,
        Platform::Moodle,
    ];

    /// Wire identifier, also used as the `platform` column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Canvas => "canvas",
            Platform::WebAssign => "webassign",
            Platform::Owlv2 => "owlv2",
            Platform::Gradescope => "gradescope",
            Platform::Piazza => "piazza",
            Platform::Moodle => "moodle",
        }
    }

    /// Human-facing name used in notifications.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Canvas => "Canvas",
            Platform::WebAssign => "WebAssign",
            Platform::Owlv2 => "OWLv2",
            Platform::Gradescope => "Gradescope",
            Platform::Piazza => "Piazza",
            Platform::Moodle => "Moodle",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = SatchelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| SatchelError::UnknownPlatform(s.to_string()))
    }
}
