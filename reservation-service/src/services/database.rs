//! PostgreSQL storage for reservation-service.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use super::error::ServiceError;
use super::store::{AvailabilityStore, ReservationStore, UserDirectory};
use crate::models::{
    ApproverAvailability, Reservation, ReservationDraft, TimeWindow, UserRecord, UserRole,
};

const RESERVATION_COLUMNS: &str = "id, user_id, section_id, project_id, date, start_time, \
     end_time, status, approver_id, notes, created_at, updated_at";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(database_url))]
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, ServiceError> {
        info!(max_connections, "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| ServiceError::Storage(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), ServiceError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ServiceError::Storage(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for Database {
    async fn has_overlap(
        &self,
        section_id: i64,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<bool, ServiceError> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM reservations
                WHERE section_id = $1 AND date = $2 AND status <> 'cancelled'
                  AND start_time < $4 AND end_time > $3
            )
            "#,
        )
        .bind(section_id)
        .bind(date)
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    #[instrument(skip(self, draft), fields(section_id = draft.section_id, date = %draft.date))]
    async fn insert_unless_overlapping(
        &self,
        draft: ReservationDraft,
    ) -> Result<Option<Reservation>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        // serialises every writer for this (section, date) until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("reservation:{}:{}", draft.section_id, draft.date))
            .execute(&mut *tx)
            .await?;

        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM reservations
                WHERE section_id = $1 AND date = $2 AND status <> 'cancelled'
                  AND start_time < $4 AND end_time > $3
            )
            "#,
        )
        .bind(draft.section_id)
        .bind(draft.date)
        .bind(draft.window.start)
        .bind(draft.window.end)
        .fetch_one(&mut *tx)
        .await?;

        if taken {
            tx.rollback().await.ok();
            return Ok(None);
        }

        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            INSERT INTO reservations (user_id, section_id, project_id, date, start_time, end_time, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            RESERVATION_COLUMNS
        ))
        .bind(draft.user_id)
        .bind(draft.section_id)
        .bind(draft.project_id)
        .bind(draft.date)
        .bind(draft.window.start)
        .bind(draft.window.end)
        .bind(draft.status.as_str())
        .bind(&draft.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(reservation))
    }

    async fn get_reservation(&self, id: i64) -> Result<Option<Reservation>, ServiceError> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reservation)
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Reservation>, ServiceError> {
        let rows = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE date = $1 AND status <> 'cancelled' \
             ORDER BY start_time, section_id, id",
            RESERVATION_COLUMNS
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_pending(&self) -> Result<Vec<Reservation>, ServiceError> {
        let rows = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {} FROM reservations WHERE status = 'pending' ORDER BY date, start_time, id",
            RESERVATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn confirm_reservation(
        &self,
        id: i64,
        approver_id: i64,
    ) -> Result<Option<Reservation>, ServiceError> {
        let row = sqlx::query_as::<_, Reservation>(&format!(
            "UPDATE reservations SET status = 'confirmed', approver_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status <> 'cancelled' RETURNING {}",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .bind(approver_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn cancel_reservation(&self, id: i64) -> Result<Option<Reservation>, ServiceError> {
        let row = sqlx::query_as::<_, Reservation>(&format!(
            "UPDATE reservations SET status = 'cancelled', updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl AvailabilityStore for Database {
    async fn add_availability(
        &self,
        approver_id: i64,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<ApproverAvailability, ServiceError> {
        let row = sqlx::query_as::<_, ApproverAvailability>(
            r#"
            INSERT INTO approver_availability (approver_id, date, start_time, end_time)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (approver_id, date, start_time, end_time)
            DO UPDATE SET approver_id = EXCLUDED.approver_id
            RETURNING id, approver_id, date, start_time, end_time
            "#,
        )
        .bind(approver_id)
        .bind(date)
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn remove_availability(
        &self,
        approver_id: i64,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            "DELETE FROM approver_availability \
             WHERE approver_id = $1 AND date = $2 AND start_time = $3 AND end_time = $4",
        )
        .bind(approver_id)
        .bind(date)
        .bind(window.start)
        .bind(window.end)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_availability(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ApproverAvailability>, ServiceError> {
        let rows = sqlx::query_as::<_, ApproverAvailability>(
            "SELECT id, approver_id, date, start_time, end_time FROM approver_availability \
             WHERE date = $1 ORDER BY start_time, approver_id",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn covering_approvers(
        &self,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> Result<Vec<i64>, ServiceError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT a.approver_id
            FROM approver_availability a
            JOIN users u ON u.id = a.approver_id
            WHERE a.date = $1 AND a.start_time <= $2 AND a.end_time >= $3
              AND u.role = 'approver'
            ORDER BY a.approver_id
            "#,
        )
        .bind(date)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl UserDirectory for Database {
    #[instrument(skip(self, first_name, last_name))]
    async fn find_or_create_user(
        &self,
        provider_id: i64,
        first_name: &str,
        last_name: &str,
    ) -> Result<UserRecord, ServiceError> {
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(provider_id)
        .bind(first_name)
        .bind(last_name)
        .execute(&self.pool)
        .await?;

        self.get_user(provider_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    async fn get_user(&self, id: i64) -> Result<Option<UserRecord>, ServiceError> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT id, first_name, last_name, role, accepted_terms, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn accept_terms(&self, id: i64) -> Result<(), ServiceError> {
        let result = sqlx::query("UPDATE users SET accepted_terms = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("User"));
        }
        Ok(())
    }

    async fn set_role(&self, id: i64, role: UserRole) -> Result<(), ServiceError> {
        let result = sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
            .bind(id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("User"));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ServiceError::Storage(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }
}
