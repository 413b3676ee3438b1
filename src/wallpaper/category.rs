//! Category and resolution value types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Image category selected by the user.
///
/// Closed set. Drives both the fetch URL shape and the label used when a
/// wallpaper is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Nature,
    City,
    Tech,
    Abstract,
    Random,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Nature,
        Category::City,
        Category::Tech,
        Category::Abstract,
        Category::Random,
    ];

    /// Capitalized name, used in saved file names and UI labels.
    pub fn label(self) -> &'static str {
        match self {
            Category::Nature => "Nature",
            Category::City => "City",
            Category::Tech => "Tech",
            Category::Abstract => "Abstract",
            Category::Random => "Random",
        }
    }

    /// Lowercase keyword, used as the seed path segment and in action ids.
    pub fn keyword(self) -> &'static str {
        match self {
            Category::Nature => "nature",
            Category::City => "city",
            Category::Tech => "tech",
            Category::Abstract => "abstract",
            Category::Random => "random",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown category: {0:?} (expected: nature, city, tech, abstract, random)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.keyword().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Display dimensions in pixels. Both sides are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Used when the display cannot be queried.
    pub const FALLBACK: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };

    /// Forced by the "4K" action.
    pub const UHD: Resolution = Resolution {
        width: 3840,
        height: 2160,
    };

    /// Returns `None` if either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid resolution {0:?} (expected WIDTHxHEIGHT, e.g. 2560x1440)")]
pub struct InvalidResolution(pub String);

impl FromStr for Resolution {
    type Err = InvalidResolution;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidResolution(s.to_string());
        let (w, h) = s.trim().split_once(|c| c == 'x' || c == 'X').ok_or_else(invalid)?;
        let width = w.trim().parse().map_err(|_| invalid())?;
        let height = h.trim().parse().map_err(|_| invalid())?;
        Resolution::new(width, height).ok_or_else(invalid)
    }
}
