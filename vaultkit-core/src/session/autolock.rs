use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Idle period after which the session locks itself.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum AutolockPeriod {
    /// One minute.
    #[strum(serialize = "1")]
    #[serde(rename = "1")]
    OneMinute,
    /// Ten minutes.
    #[default]
    #[strum(serialize = "2")]
    #[serde(rename = "2")]
    TenMinutes,
    /// One hour.
    #[strum(serialize = "3")]
    #[serde(rename = "3")]
    OneHour,
    /// Never lock on idle.
    #[strum(serialize = "never")]
    #[serde(rename = "never")]
    Never,
}

impl AutolockPeriod {
    /// Every option, in menu order.
    pub const ALL: [Self; 4] = [Self::OneMinute, Self::TenMinutes, Self::OneHour, Self::Never];

    /// The idle period, `None` for [`Self::Never`].
    #[must_use]
    pub const fn period(self) -> Option<Duration> {
        match self {
            Self::OneMinute => Some(Duration::from_secs(60)),
            Self::TenMinutes => Some(Duration::from_secs(10 * 60)),
            Self::OneHour => Some(Duration::from_secs(60 * 60)),
            Self::Never => None,
        }
    }
}
