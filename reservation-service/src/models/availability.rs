//! Approver availability declarations.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::reservation::{clock_time, TimeWindow};

/// One window during which an approver is on hand.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApproverAvailability {
    pub id: i64,
    pub approver_id: i64,
    pub date: NaiveDate,
    #[serde(with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(with = "clock_time")]
    pub end_time: NaiveTime,
}

impl ApproverAvailability {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }
}
