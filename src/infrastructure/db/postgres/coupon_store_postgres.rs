use crate::infrastructure::db::dto::CouponRow;
use crate::infrastructure::db::postgres::PostgresDatabase;
use crate::infrastructure::db::stores::coupon_store::{
    CouponRepositoryError, CouponStats, CouponStore,
};
use async_trait::async_trait;
use sqlx::PgConnection;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct CouponStorePostgres {
    db: std::sync::Arc<PostgresDatabase>,
}

impl CouponStorePostgres {
    /// Build a Postgres-backed coupon store.
    pub fn new(db: std::sync::Arc<PostgresDatabase>) -> Self {
        Self { db }
    }

    async fn get_impl_conn(
        conn: &mut PgConnection,
        coupon_id: uuid::Uuid,
        owner_id: uuid::Uuid,
    ) -> Result<Option<CouponRow>, CouponRepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT
                id,
                owner_id,
                code,
                state,
                starts_at,
                ends_at,
                order_id,
                used_at,
                created_at,
                updated_at
            FROM coupons
            WHERE id = $1
              AND owner_id = $2",
        )
        .bind(coupon_id)
        .bind(owner_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|_| CouponRepositoryError::StorageUnavailable)?;

        Ok(row)
    }

    async fn insert_impl_conn(
        conn: &mut PgConnection,
        row: &CouponRow,
    ) -> Result<CouponRow, CouponRepositoryError> {
        let stored = sqlx::query_as::<_, CouponRow>(
            "INSERT INTO coupons (
                id,
                owner_id,
                code,
                state,
                starts_at,
                ends_at,
                order_id,
                used_at,
                created_at,
                updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            RETURNING
                id,
                owner_id,
                code,
                state,
                starts_at,
                ends_at,
                order_id,
                used_at,
                created_at,
                updated_at",
        )
        .bind(row.id)
        .bind(row.owner_id)
        .bind(&row.code)
        .bind(&row.state)
        .bind(row.starts_at)
        .bind(row.ends_at)
        .bind(row.order_id)
        .bind(row.used_at)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|_| CouponRepositoryError::StorageUnavailable)?;

        Ok(stored)
    }

    async fn update_impl_conn(
        conn: &mut PgConnection,
        row: &CouponRow,
    ) -> Result<CouponRow, CouponRepositoryError> {
        let stored = sqlx::query_as::<_, CouponRow>(
            "UPDATE coupons SET
                state = $2,
                order_id = $3,
                used_at = $4,
                updated_at = $5
            WHERE id = $1
            RETURNING
                id,
                owner_id,
                code,
                state,
                starts_at,
                ends_at,
                order_id,
                used_at,
                created_at,
                updated_at",
        )
        .bind(row.id)
        .bind(&row.state)
        .bind(row.order_id)
        .bind(row.used_at)
        .bind(row.updated_at)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|_| CouponRepositoryError::StorageUnavailable)?;

        match stored {
            Some(row) => Ok(row),
            None => Err(CouponRepositoryError::NotFound),
        }
    }

    async fn delete_impl_conn(
        conn: &mut PgConnection,
        coupon_id: uuid::Uuid,
    ) -> Result<(), CouponRepositoryError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(coupon_id)
            .execute(&mut *conn)
            .await
            .map_err(|_| CouponRepositoryError::StorageUnavailable)?;

        if result.rows_affected() == 0 {
            return Err(CouponRepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_by_owner_impl_conn(
        conn: &mut PgConnection,
        owner_id: uuid::Uuid,
        state: Option<&str>,
    ) -> Result<Vec<CouponRow>, CouponRepositoryError> {
        let rows = sqlx::query_as::<_, CouponRow>(
            "SELECT
                id,
                owner_id,
                code,
                state,
                starts_at,
                ends_at,
                order_id,
                used_at,
                created_at,
                updated_at
            FROM coupons
            WHERE owner_id = $1
              AND ($2::text IS NULL OR state = $2)
            ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .bind(state)
        .fetch_all(&mut *conn)
        .await
        .map_err(|_| CouponRepositoryError::StorageUnavailable)?;

        Ok(rows)
    }

    async fn stats_by_owner_impl_conn(
        conn: &mut PgConnection,
        owner_id: uuid::Uuid,
    ) -> Result<CouponStats, CouponRepositoryError> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT state, COUNT(*)
            FROM coupons
            WHERE owner_id = $1
            GROUP BY state",
        )
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|_| CouponRepositoryError::StorageUnavailable)?;

        let mut stats = CouponStats::default();
        for (state, count) in counts {
            let count = count.max(0) as u64;
            match state.as_str() {
                "available" => stats.available = count,
                "used" => stats.used = count,
                "expired" => stats.expired = count,
                _ => {}
            }
        }

        Ok(stats)
    }

    async fn expire_due_impl_conn(
        conn: &mut PgConnection,
        now: OffsetDateTime,
    ) -> Result<u64, CouponRepositoryError> {
        // Step 1: Sweep every available coupon whose window has closed.
        let result = sqlx::query(
            "UPDATE coupons
            SET state = 'expired',
                updated_at = $1
            WHERE state = 'available'
              AND ends_at <= $1",
        )
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|_| CouponRepositoryError::StorageUnavailable)?;

        Ok(result.rows_affected())
    }

    async fn get_for_update_impl_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        coupon_id: uuid::Uuid,
        owner_id: uuid::Uuid,
    ) -> Result<Option<CouponRow>, CouponRepositoryError> {
        // Step 1: Take the row-level exclusive lock; a concurrent redeemer
        // blocks here until our transaction ends.
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT
                id,
                owner_id,
                code,
                state,
                starts_at,
                ends_at,
                order_id,
                used_at,
                created_at,
                updated_at
            FROM coupons
            WHERE id = $1
              AND owner_id = $2
            FOR UPDATE",
        )
        .bind(coupon_id)
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|_| CouponRepositoryError::StorageUnavailable)?;

        Ok(row)
    }
}

#[async_trait]
impl CouponStore for CouponStorePostgres {
    /// Fetch a coupon by id scoped to its owner. Returns `None` if absent.
    async fn get(
        &self,
        coupon_id: uuid::Uuid,
        owner_id: uuid::Uuid,
    ) -> Result<Option<CouponRow>, CouponRepositoryError> {
        self.db
            .with_conn(move |conn| Box::pin(Self::get_impl_conn(conn, coupon_id, owner_id)))
            .await
    }

    /// Create a coupon and return exactly what was stored in the database.
    async fn insert(&self, row: &CouponRow) -> Result<CouponRow, CouponRepositoryError> {
        let row = row.clone();
        self.db
            .with_conn(move |conn| {
                let row = row;
                Box::pin(async move { Self::insert_impl_conn(conn, &row).await })
            })
            .await
    }

    /// Update a coupon and return exactly what was stored in the database.
    async fn update(&self, row: &CouponRow) -> Result<CouponRow, CouponRepositoryError> {
        let row = row.clone();
        self.db
            .with_conn(move |conn| {
                let row = row;
                Box::pin(async move { Self::update_impl_conn(conn, &row).await })
            })
            .await
    }

    /// Delete a coupon by its ID. Returns an error if it doesn't exist.
    async fn delete(&self, coupon_id: uuid::Uuid) -> Result<(), CouponRepositoryError> {
        self.db
            .with_conn(move |conn| Box::pin(Self::delete_impl_conn(conn, coupon_id)))
            .await
    }

    /// List an owner's coupons, optionally filtered by state.
    async fn list_by_owner(
        &self,
        owner_id: uuid::Uuid,
        state: Option<&str>,
    ) -> Result<Vec<CouponRow>, CouponRepositoryError> {
        let state = state.map(str::to_string);
        self.db
            .with_conn(move |conn| {
                let state = state;
                Box::pin(async move {
                    Self::list_by_owner_impl_conn(conn, owner_id, state.as_deref()).await
                })
            })
            .await
    }

    /// Count an owner's coupons per state.
    async fn stats_by_owner(
        &self,
        owner_id: uuid::Uuid,
    ) -> Result<CouponStats, CouponRepositoryError> {
        self.db
            .with_conn(move |conn| Box::pin(Self::stats_by_owner_impl_conn(conn, owner_id)))
            .await
    }

    /// Expire every available coupon whose window has closed.
    async fn expire_due(&self, now: OffsetDateTime) -> Result<u64, CouponRepositoryError> {
        self.db
            .with_conn(move |conn| Box::pin(Self::expire_due_impl_conn(conn, now)))
            .await
    }

    /// Fetch a coupon under `FOR UPDATE` inside an existing transaction.
    async fn get_for_update_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        coupon_id: uuid::Uuid,
        owner_id: uuid::Uuid,
    ) -> Result<Option<CouponRow>, CouponRepositoryError> {
        Self::get_for_update_impl_tx(tx, coupon_id, owner_id).await
    }

    /// Update a coupon inside an existing transaction.
    async fn update_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &CouponRow,
    ) -> Result<CouponRow, CouponRepositoryError> {
        Self::update_impl_conn(&mut *tx, row).await
    }
}
