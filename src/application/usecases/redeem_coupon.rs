// Use case: redeem_coupon.

use crate::domain::entities::coupon::Coupon;
use crate::domain::value_objects::ids::{CouponId, OrderId, OwnerId};
use crate::domain::value_objects::timestamps::Timestamp;
use crate::infrastructure::db::database::DatabaseError;
use crate::infrastructure::db::dto::CouponRow;
use crate::infrastructure::db::postgres::PostgresDatabase;
use crate::infrastructure::db::stores::coupon_store::{CouponRepositoryError, CouponStore};
use std::sync::Arc;
use tracing::{info, instrument};

/// Transitions one coupon from available to used for exactly one caller.
///
/// Correctness rests on the exclusive row read: a concurrent redeemer
/// blocks on the same `FOR UPDATE` fetch until this transaction ends and
/// then observes the post-commit state, so at most one caller ever sees an
/// available coupon. No external lock service is involved; redemption keys
/// are per-resource and unbounded, and the write needs a transaction
/// anyway, so the database's native row lock is the cheaper primitive.
pub struct RedeemCouponUseCase<S: CouponStore> {
    pub db: Arc<PostgresDatabase>,
    pub coupon_store: S,
}

#[derive(Debug)]
pub enum RedeemCouponError {
    /// No coupon for this `(coupon_id, owner_id)` pair. Deliberately
    /// identical for "absent" and "owned by someone else".
    NotFound,
    /// The coupon exists but is not redeemable (wrong state or outside its
    /// validity window).
    NotAvailable,
    /// The store failed for infrastructure reasons.
    Store(String),
}

impl From<DatabaseError> for RedeemCouponError {
    fn from(err: DatabaseError) -> Self {
        RedeemCouponError::Store(err.to_string())
    }
}

#[derive(Debug)]
pub struct RedeemCouponResult {
    pub coupon: Coupon,
}

impl<S> RedeemCouponUseCase<S>
where
    S: CouponStore + Send + Sync + Clone + 'static,
{
    /// Redeem the coupon for `order_id`, at most once per coupon ever.
    #[instrument(skip(self))]
    pub async fn execute(
        &self,
        coupon_id: CouponId,
        owner_id: OwnerId,
        order_id: OrderId,
    ) -> Result<RedeemCouponResult, RedeemCouponError> {
        let store = self.coupon_store.clone();
        let now = Timestamp::now_utc();

        let coupon = self
            .db
            .with_tx(move |tx| {
                let store = store.clone();
                Box::pin(async move {
                    // Step 1: Exclusive read of the target row, strictly
                    // inside the transaction.
                    let Some(row) = store
                        .get_for_update_tx(tx, coupon_id.0, owner_id.0)
                        .await
                        .map_err(storage_error)?
                    else {
                        return Err(RedeemCouponError::NotFound);
                    };

                    // Step 2: Validate and mutate the locked row.
                    let mut coupon = row.into_coupon();
                    coupon
                        .redeem(order_id, now)
                        .map_err(|_| RedeemCouponError::NotAvailable)?;

                    // Step 3: Persist within the same transaction; commit
                    // happens on return, rollback on any error above.
                    let stored = store
                        .update_tx(tx, &CouponRow::from_coupon(&coupon))
                        .await
                        .map_err(storage_error)?;

                    Ok(stored.into_coupon())
                })
            })
            .await?;

        info!(coupon = %coupon.id, order = %order_id, "coupon redeemed");
        Ok(RedeemCouponResult { coupon })
    }
}

fn storage_error(err: CouponRepositoryError) -> RedeemCouponError {
    RedeemCouponError::Store(format!("{err:?}"))
}

#[cfg(test)]
mod tests {
    use super::{RedeemCouponError, RedeemCouponUseCase};
    use crate::domain::entities::coupon::{Coupon, CouponState};
    use crate::domain::value_objects::ids::{CouponId, OrderId, OwnerId};
    use crate::domain::value_objects::timestamps::Timestamp;
    use crate::infrastructure::db::dto::CouponRow;
    use crate::infrastructure::db::postgres::PostgresDatabase;
    use crate::infrastructure::db::postgres::coupon_store_postgres::CouponStorePostgres;
    use crate::infrastructure::db::stores::coupon_store::CouponStore;
    use std::sync::Arc;
    use time::Duration;

    fn test_db_url() -> Option<String> {
        std::env::var("DATABASE_URL").ok()
    }

    async fn setup() -> Option<(Arc<PostgresDatabase>, CouponStorePostgres)> {
        let url = test_db_url()?;
        let db = Arc::new(PostgresDatabase::connect(&url).await.ok()?);
        let store = CouponStorePostgres::new(db.clone());
        Some((db, store))
    }

    fn open_coupon() -> Coupon {
        let now = Timestamp::now_utc();
        Coupon::issue(
            CouponId::new(),
            OwnerId::new(),
            "SAVE10".to_string(),
            now.shifted(Duration::hours(-1)),
            now.shifted(Duration::hours(1)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn given_available_coupon_when_execute_should_mark_used_with_order_ref() {
        let Some((db, store)) = setup().await else {
            return;
        };
        let usecase = RedeemCouponUseCase {
            db,
            coupon_store: store.clone(),
        };
        let coupon = open_coupon();
        let stored = store.insert(&CouponRow::from_coupon(&coupon)).await.unwrap();
        let order_id = OrderId::new();

        let result = usecase
            .execute(coupon.id, coupon.owner_id, order_id)
            .await
            .unwrap();

        assert_eq!(result.coupon.state, CouponState::Used);
        assert_eq!(result.coupon.order_id, Some(order_id));
        assert!(result.coupon.used_at.is_some());

        store.delete(stored.id).await.unwrap();
    }

    #[tokio::test]
    async fn given_other_owners_coupon_when_execute_should_return_not_found() {
        let Some((db, store)) = setup().await else {
            return;
        };
        let usecase = RedeemCouponUseCase {
            db,
            coupon_store: store.clone(),
        };
        let coupon = open_coupon();
        let stored = store.insert(&CouponRow::from_coupon(&coupon)).await.unwrap();

        let result = usecase
            .execute(coupon.id, OwnerId::new(), OrderId::new())
            .await;

        assert!(matches!(result, Err(RedeemCouponError::NotFound)));

        // The record is untouched.
        let row = store.get(stored.id, stored.owner_id).await.unwrap().unwrap();
        assert_eq!(row.state, "available");
        assert!(row.order_id.is_none());

        store.delete(stored.id).await.unwrap();
    }

    #[tokio::test]
    async fn given_used_coupon_when_execute_should_keep_original_order() {
        let Some((db, store)) = setup().await else {
            return;
        };
        let usecase = RedeemCouponUseCase {
            db,
            coupon_store: store.clone(),
        };
        let mut coupon = open_coupon();
        let original_order = OrderId::new();
        coupon.redeem(original_order, Timestamp::now_utc()).unwrap();
        let stored = store.insert(&CouponRow::from_coupon(&coupon)).await.unwrap();

        let result = usecase
            .execute(coupon.id, coupon.owner_id, OrderId::new())
            .await;

        assert!(matches!(result, Err(RedeemCouponError::NotAvailable)));

        let row = store.get(stored.id, stored.owner_id).await.unwrap().unwrap();
        assert_eq!(row.state, "used");
        assert_eq!(row.order_id, Some(original_order.0));

        store.delete(stored.id).await.unwrap();
    }

    #[tokio::test]
    async fn given_coupon_outside_window_when_execute_should_return_not_available() {
        let Some((db, store)) = setup().await else {
            return;
        };
        let usecase = RedeemCouponUseCase {
            db,
            coupon_store: store.clone(),
        };
        let now = Timestamp::now_utc();
        let coupon = Coupon::issue(
            CouponId::new(),
            OwnerId::new(),
            "TOOLATE".to_string(),
            now.shifted(Duration::hours(-2)),
            now.shifted(Duration::hours(-1)),
        )
        .unwrap();
        let stored = store.insert(&CouponRow::from_coupon(&coupon)).await.unwrap();

        let result = usecase
            .execute(coupon.id, coupon.owner_id, OrderId::new())
            .await;

        assert!(matches!(result, Err(RedeemCouponError::NotAvailable)));

        // Rollback left the row byte-for-byte as it was.
        let row = store.get(stored.id, stored.owner_id).await.unwrap().unwrap();
        assert_eq!(row.state, "available");
        assert!(row.order_id.is_none());
        assert!(row.used_at.is_none());
        assert_eq!(row.updated_at, stored.updated_at);

        store.delete(stored.id).await.unwrap();
    }

    #[tokio::test]
    async fn given_missing_coupon_when_execute_should_return_not_found() {
        let Some((db, store)) = setup().await else {
            return;
        };
        let usecase = RedeemCouponUseCase {
            db,
            coupon_store: store,
        };

        let result = usecase
            .execute(CouponId::new(), OwnerId::new(), OrderId::new())
            .await;

        assert!(matches!(result, Err(RedeemCouponError::NotFound)));
    }
}
