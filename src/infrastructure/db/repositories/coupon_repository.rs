use crate::domain::entities::coupon::{Coupon, CouponState};
use crate::domain::value_objects::ids::{CouponId, OwnerId};
use crate::domain::value_objects::timestamps::Timestamp;
use crate::infrastructure::db::dto::CouponRow;
use crate::infrastructure::db::stores::coupon_store::{
    CouponRepositoryError, CouponStats, CouponStore,
};
use std::sync::Arc;

pub struct CouponRepository {
    store: Arc<dyn CouponStore>,
}

impl CouponRepository {
    /// Build a repository that uses the given store implementation.
    pub fn new(store: Arc<dyn CouponStore>) -> Self {
        Self { store }
    }

    /// Issue a coupon and return what was actually stored in the database.
    pub async fn insert(&self, coupon: &Coupon) -> Result<Coupon, CouponRepositoryError> {
        let dto = CouponRow::from_coupon(coupon);
        let stored = self.store.insert(&dto).await?;

        Ok(stored.into_coupon())
    }

    /// Fetch an owner's coupon. Returns `None` when absent or owned by
    /// someone else.
    pub async fn get(
        &self,
        coupon_id: CouponId,
        owner_id: OwnerId,
    ) -> Result<Option<Coupon>, CouponRepositoryError> {
        let row = self.store.get(coupon_id.0, owner_id.0).await?;

        Ok(row.map(CouponRow::into_coupon))
    }

    /// Update a coupon and return what was actually stored in the database.
    pub async fn update(&self, coupon: &Coupon) -> Result<Coupon, CouponRepositoryError> {
        let dto = CouponRow::from_coupon(coupon);
        let stored = self.store.update(&dto).await?;

        Ok(stored.into_coupon())
    }

    /// Delete a coupon by its ID. Returns an error if it doesn't exist.
    pub async fn delete(&self, coupon_id: CouponId) -> Result<(), CouponRepositoryError> {
        self.store.delete(coupon_id.0).await
    }

    /// List an owner's coupons, optionally filtered by state.
    pub async fn list_by_owner(
        &self,
        owner_id: OwnerId,
        state: Option<CouponState>,
    ) -> Result<Vec<Coupon>, CouponRepositoryError> {
        let rows = self
            .store
            .list_by_owner(owner_id.0, state.map(|s| s.as_str()))
            .await?;

        Ok(rows.into_iter().map(CouponRow::into_coupon).collect())
    }

    /// Count an owner's coupons per state.
    pub async fn stats(&self, owner_id: OwnerId) -> Result<CouponStats, CouponRepositoryError> {
        self.store.stats_by_owner(owner_id.0).await
    }

    /// Sweep overdue available coupons into `expired`; returns how many.
    pub async fn expire_due(&self, now: Timestamp) -> Result<u64, CouponRepositoryError> {
        self.store.expire_due(now.as_inner()).await
    }
}
