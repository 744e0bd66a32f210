//! What happens to the bound container when the channel closes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Action applied to the bound container once the port stops serving.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExitPolicy {
    /// Leave the container exactly as the last command left it.
    #[default]
    Keep,
    /// Stop the container if it is running, then destroy it.
    Destroy,
}

impl ExitPolicy {
    /// Returns `true` when the container must be torn down on exit.
    #[must_use]
    pub const fn destroys_container(self) -> bool {
        matches!(self, Self::Destroy)
    }
}

/// Errors encountered while parsing an [`ExitPolicy`] from text.
pub type ExitPolicyParseError = strum::ParseError;
