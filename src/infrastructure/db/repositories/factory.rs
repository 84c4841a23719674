use std::sync::Arc;

use crate::infrastructure::db::postgres::PostgresDatabase;
use crate::infrastructure::db::postgres::coupon_store_postgres::CouponStorePostgres;
use crate::infrastructure::db::repositories::coupon_repository::CouponRepository;

#[derive(Clone)]
pub struct Repositories {
    pub coupon: Arc<CouponRepository>,
}

impl Repositories {
    /// Build all repositories backed by Postgres stores.
    pub fn postgres(db: Arc<PostgresDatabase>) -> Self {
        let coupon_store = Arc::new(CouponStorePostgres::new(db));

        Self {
            coupon: Arc::new(CouponRepository::new(coupon_store)),
        }
    }
}
