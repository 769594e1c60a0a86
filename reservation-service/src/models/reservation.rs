//! Reservation model and the time arithmetic it depends on.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Reservation lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Cancelled reservations no longer hold their window.
    pub fn blocks_window(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Half-open `[start, end)` interval within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "clock_time")]
    pub start: NaiveTime,
    #[serde(with = "clock_time")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse two `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self {
            start: clock_time::parse(start)?,
            end: clock_time::parse(end)?,
        })
    }

    pub fn is_ordered(&self) -> bool {
        self.start < self.end
    }

    /// Any shared instant. Touching edges (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// `other` lies entirely within `self`.
    pub fn covers(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && self.end >= other.end
    }
}

/// Hours of the day during which reservations may start and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for OperatingHours {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 20,
        }
    }
}

impl OperatingHours {
    /// Hour-of-day in `[start_hour, end_hour)`; minutes are not considered.
    pub fn contains(&self, time: NaiveTime) -> bool {
        let hour = time.hour();
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// Persisted reservation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub section_id: i64,
    pub project_id: Option<i64>,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
    pub status: ReservationStatus,
    pub approver_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }
}

/// Validated reservation about to be written.
#[derive(Debug, Clone)]
pub struct ReservationDraft {
    pub user_id: i64,
    pub section_id: i64,
    pub project_id: Option<i64>,
    pub date: NaiveDate,
    pub window: TimeWindow,
    pub status: ReservationStatus,
    pub notes: Option<String>,
}

/// Caller input for a new reservation.
#[derive(Debug, Clone)]
pub struct CreateReservation {
    pub user_id: i64,
    pub section_id: i64,
    pub project_id: Option<i64>,
    pub date: NaiveDate,
    pub window: TimeWindow,
    pub notes: Option<String>,
}

/// Outcome of a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationResult {
    pub id: i64,
    pub status: ReservationStatus,
    pub needs_approver: bool,
}

/// `HH:MM` wire format for clock times; `HH:MM:SS` is accepted on input.
pub mod clock_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(value: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(value, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
    }

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: &str, end: &str) -> TimeWindow {
        TimeWindow::parse(start, end).unwrap()
    }

    #[test]
    fn overlap_covers_all_four_relationships() {
        let existing = window("10:00", "12:00");
        // spans existing start edge
        assert!(window("09:00", "10:30").overlaps(&existing));
        // spans existing end edge
        assert!(window("11:30", "13:00").overlaps(&existing));
        // nested inside existing
        assert!(window("10:15", "11:45").overlaps(&existing));
        // existing nested inside new
        assert!(window("09:00", "13:00").overlaps(&existing));
        // identical
        assert!(existing.overlaps(&existing));
    }

    #[test]
    fn adjacent_windows_do_not_overlap() {
        let existing = window("10:00", "12:00");
        assert!(!window("08:00", "10:00").overlaps(&existing));
        assert!(!window("12:00", "13:00").overlaps(&existing));
        assert!(!window("13:00", "14:00").overlaps(&existing));
    }

    #[test]
    fn overlap_agrees_with_half_open_rule_for_every_pair() {
        // quarter hours from 08:00 to 12:00
        let slots: Vec<NaiveTime> = (32u32..=48)
            .map(|quarter| NaiveTime::from_hms_opt(quarter / 4, (quarter % 4) * 15, 0).unwrap())
            .collect();
        for (i, a_start) in slots.iter().enumerate() {
            for a_end in &slots[i + 1..] {
                for (j, b_start) in slots.iter().enumerate() {
                    for b_end in &slots[j + 1..] {
                        let a = TimeWindow::new(*a_start, *a_end);
                        let b = TimeWindow::new(*b_start, *b_end);
                        let expected = a.start < b.end && a.end > b.start;
                        assert_eq!(a.overlaps(&b), expected, "{a:?} vs {b:?}");
                        assert_eq!(a.overlaps(&b), b.overlaps(&a));
                    }
                }
            }
        }
    }

    #[test]
    fn covers_requires_full_containment() {
        let availability = window("09:00", "12:00");
        assert!(availability.covers(&window("09:30", "11:00")));
        assert!(availability.covers(&window("09:00", "12:00")));
        assert!(!availability.covers(&window("08:00", "09:00")));
        assert!(!availability.covers(&window("11:00", "12:30")));
    }

    #[test]
    fn operating_hours_check_hour_of_day() {
        let hours = OperatingHours::default();
        assert!(hours.contains(clock_time::parse("08:00").unwrap()));
        assert!(hours.contains(clock_time::parse("19:59").unwrap()));
        assert!(!hours.contains(clock_time::parse("20:00").unwrap()));
        assert!(!hours.contains(clock_time::parse("07:59").unwrap()));
    }

    #[test]
    fn clock_time_wire_format() {
        let w: TimeWindow = serde_json::from_str(r#"{"start":"09:30","end":"11:00:00"}"#).unwrap();
        assert_eq!(w, window("09:30", "11:00"));
        assert_eq!(
            serde_json::to_string(&w).unwrap(),
            r#"{"start":"09:30","end":"11:00"}"#
        );
        assert!(TimeWindow::parse("9am", "10:00").is_err());
    }
}
