use serde::{Deserialize, Serialize};

use crate::dom::Rect;

/// Decides whether a measured box is worth reporting to the driver, which
/// turns reported geometry into touch coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisibilityPolicy {
    /// Positive size, `left >= 0` and `top >= 0`.
    #[default]
    NonNegativeOrigin,
    /// Positive size, `left > 0` and `top > 0`.
    PositiveOrigin,
}

impl VisibilityPolicy {
    pub fn is_visible(self, rect: &Rect) -> bool {
        let sized = rect.width > 0.0 && rect.height > 0.0;
        let placed = match self {
            VisibilityPolicy::NonNegativeOrigin => rect.left >= 0.0 && rect.top >= 0.0,
            VisibilityPolicy::PositiveOrigin => rect.left > 0.0 && rect.top > 0.0,
        };
        sized && placed
    }
}

impl std::str::FromStr for VisibilityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "non-negative-origin" => Ok(VisibilityPolicy::NonNegativeOrigin),
            "positive-origin" => Ok(VisibilityPolicy::PositiveOrigin),
            other => Err(format!(
                "unknown visibility policy {other:?} (expected non-negative-origin or positive-origin)"
            )),
        }
    }
}
