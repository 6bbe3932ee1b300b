//! Common types used across the platform

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// GPS coordinates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpsCoordinates {
    pub latitude: Decimal,
    pub longitude: Decimal,
}

impl GpsCoordinates {
    pub fn new(latitude: Decimal, longitude: Decimal) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude_f64(&self) -> f64 {
        self.latitude.to_f64().unwrap_or_default()
    }

    pub fn longitude_f64(&self) -> f64 {
        self.longitude.to_f64().unwrap_or_default()
    }
}

/// Viewing window within a day, in park-local time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// 06:00 - 09:00
    EarlyMorning,
    /// 09:00 - 12:00
    Morning,
    /// 12:00 - 15:00
    Afternoon,
    /// 15:00 - 18:00
    LateAfternoon,
    /// 18:00 - 21:00
    Evening,
    /// 21:00 - 06:00
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 6] = [
        TimeOfDay::EarlyMorning,
        TimeOfDay::Morning,
        TimeOfDay::Afternoon,
        TimeOfDay::LateAfternoon,
        TimeOfDay::Evening,
        TimeOfDay::Night,
    ];

    /// Bucket a local hour (0-23)
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=8 => TimeOfDay::EarlyMorning,
            9..=11 => TimeOfDay::Morning,
            12..=14 => TimeOfDay::Afternoon,
            15..=17 => TimeOfDay::LateAfternoon,
            18..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    /// Bucket a UTC instant using the park's UTC offset
    pub fn at(instant: DateTime<Utc>, utc_offset_hours: i32) -> Self {
        Self::from_hour(local_time(instant, utc_offset_hours).hour())
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeOfDay::EarlyMorning => "early_morning",
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::LateAfternoon => "late_afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// East African season
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    /// Long rains, March - May
    Wet,
    /// June - October
    Dry,
    /// Short rains and the hot months, November - February
    Transition,
}

impl Season {
    pub const ALL: [Season; 3] = [Season::Wet, Season::Dry, Season::Transition];

    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Wet,
            6..=10 => Season::Dry,
            _ => Season::Transition,
        }
    }

    pub fn at(instant: DateTime<Utc>, utc_offset_hours: i32) -> Self {
        Self::from_month(local_time(instant, utc_offset_hours).month())
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Season::Wet => "wet",
            Season::Dry => "dry",
            Season::Transition => "transition",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Convert a UTC instant into park-local wall-clock time
pub fn local_time(instant: DateTime<Utc>, utc_offset_hours: i32) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(utc_offset_hours.clamp(-12, 14) * 3600)
        .unwrap_or_else(|| Utc.fix());
    instant.with_timezone(&offset)
}
