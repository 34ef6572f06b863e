//! Disk watermark thresholds and their evaluation.
//!
//! A threshold is either a used-space percentage (`"90%"`) or an absolute
//! free-space floor (`"512mb"`, `"10gb"`, or a plain byte count). Evaluation is
//! pure so the admission policy can be tested without touching a filesystem.

use clone_pipeline_shared::{BoundedU32, ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Used-space percentage accepted by a threshold (1-100).
pub type UsedPercent = BoundedU32<1, 100>;

/// Snapshot of a volume's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskUsage {
    /// Volume size in bytes.
    pub total_bytes: u64,
    /// Bytes available to the current user.
    pub available_bytes: u64,
}

impl DiskUsage {
    /// Used percentage, rounded down. An empty volume reports 100.
    #[must_use]
    pub fn used_percent(self) -> u64 {
        if self.total_bytes == 0 {
            return 100;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes.min(self.total_bytes));
        let pct = u128::from(used) * 100 / u128::from(self.total_bytes);
        u64::try_from(pct).unwrap_or(100)
    }
}

/// Low-watermark threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkThreshold {
    /// Low when used space reaches this percentage.
    UsedPercent(UsedPercent),
    /// Low when available space drops to this many bytes or fewer.
    FreeBytes(u64),
}

impl fmt::Display for WatermarkThreshold {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsedPercent(percent) => write!(formatter, "{percent}%"),
            Self::FreeBytes(bytes) => write!(formatter, "{bytes}b"),
        }
    }
}

/// Parse failures for [`WatermarkThreshold`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkParseError {
    /// Input was empty.
    Empty,
    /// Percentage outside 1-100.
    PercentOutOfRange {
        /// Raw input.
        input: String,
    },
    /// Input is neither a percentage nor a byte size.
    Malformed {
        /// Raw input.
        input: String,
    },
}

impl fmt::Display for WatermarkParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => formatter.write_str("watermark must be non-empty"),
            Self::PercentOutOfRange { input } => {
                write!(formatter, "watermark percentage `{input}` must be within 1-100%")
            },
            Self::Malformed { input } => write!(
                formatter,
                "watermark `{input}` must be a percentage like `90%` or a size like `512mb`"
            ),
        }
    }
}

impl std::error::Error for WatermarkParseError {}

impl From<WatermarkParseError> for ErrorEnvelope {
    fn from(error: WatermarkParseError) -> Self {
        let envelope = Self::expected(
            ErrorCode::new("domain", "invalid_watermark"),
            error.to_string(),
        );
        match error {
            WatermarkParseError::Empty => envelope,
            WatermarkParseError::PercentOutOfRange { input }
            | WatermarkParseError::Malformed { input } => envelope.with_metadata("input", input),
        }
    }
}

impl FromStr for WatermarkThreshold {
    type Err = WatermarkParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let raw = value.trim();
        if raw.is_empty() {
            return Err(WatermarkParseError::Empty);
        }
        let malformed = || WatermarkParseError::Malformed {
            input: raw.to_owned(),
        };

        if let Some(number) = raw.strip_suffix('%') {
            let percent: u32 = number.trim().parse().map_err(|_| malformed())?;
            return UsedPercent::try_new(percent).map(Self::UsedPercent).map_err(|_| {
                WatermarkParseError::PercentOutOfRange {
                    input: raw.to_owned(),
                }
            });
        }

        let lower = raw.to_ascii_lowercase();
        let digits_end = lower
            .find(|ch: char| !ch.is_ascii_digit())
            .unwrap_or(lower.len());
        let (digits, unit) = lower.split_at(digits_end);
        let amount: u64 = digits.parse().map_err(|_| malformed())?;
        let multiplier: u64 = match unit.trim() {
            "" | "b" => 1,
            "kb" | "k" => 1 << 10,
            "mb" | "m" => 1 << 20,
            "gb" | "g" => 1 << 30,
            "tb" | "t" => 1 << 40,
            _ => return Err(malformed()),
        };
        amount
            .checked_mul(multiplier)
            .map(Self::FreeBytes)
            .ok_or_else(malformed)
    }
}

impl TryFrom<String> for WatermarkThreshold {
    type Error = WatermarkParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WatermarkThreshold> for String {
    fn from(value: WatermarkThreshold) -> Self {
        value.to_string()
    }
}

/// Outcome of comparing a usage snapshot with a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkDecision {
    /// Snapshot that was evaluated.
    pub usage: DiskUsage,
    /// Threshold that was applied.
    pub threshold: WatermarkThreshold,
    low: bool,
}

impl WatermarkDecision {
    /// True when the volume is at or below the low watermark.
    #[must_use]
    pub const fn is_low(&self) -> bool {
        self.low
    }
}

/// Compare a usage snapshot with a threshold.
///
/// A zero-sized volume is always low.
#[must_use]
pub fn evaluate_watermark(usage: DiskUsage, threshold: WatermarkThreshold) -> WatermarkDecision {
    let low = usage.total_bytes == 0
        || match threshold {
            WatermarkThreshold::UsedPercent(percent) => {
                usage.used_percent() >= u64::from(percent.get())
            },
            WatermarkThreshold::FreeBytes(floor) => usage.available_bytes <= floor,
        };
    WatermarkDecision {
        usage,
        threshold,
        low,
    }
}
