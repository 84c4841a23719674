use crate::infrastructure::db::database::DatabaseError;
use crate::infrastructure::db::dto::CouponRow;
use async_trait::async_trait;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponRepositoryError {
    StorageUnavailable,
    NotFound,
    InvalidInput,
}

impl From<DatabaseError> for CouponRepositoryError {
    fn from(_: DatabaseError) -> Self {
        CouponRepositoryError::StorageUnavailable
    }
}

/// Per-owner coupon counts, keyed by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CouponStats {
    pub available: u64,
    pub used: u64,
    pub expired: u64,
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Fetch a coupon scoped by owner. A coupon held by a different owner
    /// is indistinguishable from a missing one.
    async fn get(
        &self,
        coupon_id: uuid::Uuid,
        owner_id: uuid::Uuid,
    ) -> Result<Option<CouponRow>, CouponRepositoryError>;

    async fn insert(&self, row: &CouponRow) -> Result<CouponRow, CouponRepositoryError>;

    async fn update(&self, row: &CouponRow) -> Result<CouponRow, CouponRepositoryError>;

    async fn delete(&self, coupon_id: uuid::Uuid) -> Result<(), CouponRepositoryError>;

    async fn list_by_owner(
        &self,
        owner_id: uuid::Uuid,
        state: Option<&str>,
    ) -> Result<Vec<CouponRow>, CouponRepositoryError>;

    async fn stats_by_owner(
        &self,
        owner_id: uuid::Uuid,
    ) -> Result<CouponStats, CouponRepositoryError>;

    /// Move every available coupon whose window has closed to `expired`.
    /// Idempotent; returns the number of rows transitioned.
    async fn expire_due(&self, now: OffsetDateTime) -> Result<u64, CouponRepositoryError>;

    /// Fetch a coupon with a row-level exclusive lock (`FOR UPDATE`) inside
    /// an existing transaction. A concurrent holder blocks this call until
    /// its transaction ends, after which the post-mutation row is observed.
    async fn get_for_update_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        coupon_id: uuid::Uuid,
        owner_id: uuid::Uuid,
    ) -> Result<Option<CouponRow>, CouponRepositoryError>;

    /// Persist a mutation inside an existing transaction.
    async fn update_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &CouponRow,
    ) -> Result<CouponRow, CouponRepositoryError>;
}
