use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use crate::models::{clock_time, CreateReservation, LoggedIn, TimeWindow};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReservationRequest {
    #[validate(range(min = 1, message = "section_id must be positive"))]
    pub section_id: i64,

    #[validate(range(min = 1, message = "project_id must be positive"))]
    pub project_id: Option<i64>,

    pub date: NaiveDate,

    #[serde(with = "clock_time")]
    pub start: NaiveTime,

    #[serde(with = "clock_time")]
    pub end: NaiveTime,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

impl CreateReservationRequest {
    pub fn into_command(self, user_id: i64) -> CreateReservation {
        CreateReservation {
            user_id,
            section_id: self.section_id,
            project_id: self.project_id,
            date: self.date,
            window: TimeWindow::new(self.start, self.end),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
        }
    }
}

/// One approver window, used to declare and to withdraw it.
#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub date: NaiveDate,

    #[serde(with = "clock_time")]
    pub start: NaiveTime,

    #[serde(with = "clock_time")]
    pub end: NaiveTime,
}

impl AvailabilityRequest {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user_id: i64,
    pub name: String,
    pub is_approver: bool,
    pub has_accepted_terms: bool,
}

impl From<LoggedIn> for ProfileResponse {
    fn from(profile: LoggedIn) -> Self {
        Self {
            user_id: profile.user_id,
            name: profile.name,
            is_approver: profile.is_approver,
            has_accepted_terms: profile.has_accepted_terms,
        }
    }
}

/// `YYYY-MM-DD` path segment.
pub fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AppError::BadRequest(anyhow::anyhow!(
            "Invalid date '{}', expected YYYY-MM-DD",
            raw
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_parses_clock_times() {
        let req: CreateReservationRequest = serde_json::from_str(
            r#"{"section_id":1,"date":"2024-06-01","start":"09:00","end":"11:00","notes":"  "}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());

        let command = req.into_command(7);
        assert_eq!(command.window, TimeWindow::parse("09:00", "11:00").unwrap());
        assert_eq!(command.user_id, 7);
        assert_eq!(command.notes, None);
    }

    #[test]
    fn create_request_rejects_non_positive_section() {
        let req: CreateReservationRequest = serde_json::from_str(
            r#"{"section_id":0,"date":"2024-06-01","start":"09:00","end":"11:00"}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn parse_date_requires_iso_format() {
        assert_eq!(
            parse_date("2024-06-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
        assert!(matches!(parse_date("01.06.2024"), Err(AppError::BadRequest(_))));
    }
}
