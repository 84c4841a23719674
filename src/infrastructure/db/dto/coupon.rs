use crate::domain::entities::coupon::{Coupon, CouponState};
use crate::domain::value_objects::ids::{CouponId, OrderId, OwnerId};
use crate::domain::value_objects::timestamps::Timestamp;
use time::OffsetDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CouponRow {
    pub id: uuid::Uuid,
    pub owner_id: uuid::Uuid,
    pub code: String,
    pub state: String,
    pub starts_at: OffsetDateTime,
    pub ends_at: OffsetDateTime,
    pub order_id: Option<uuid::Uuid>,
    pub used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl CouponRow {
    pub fn from_coupon(coupon: &Coupon) -> Self {
        Self {
            id: coupon.id.0,
            owner_id: coupon.owner_id.0,
            code: coupon.code.clone(),
            state: coupon.state.as_str().to_string(),
            starts_at: coupon.starts_at.as_inner(),
            ends_at: coupon.ends_at.as_inner(),
            order_id: coupon.order_id.map(|o| o.0),
            used_at: coupon.used_at.map(|t| t.as_inner()),
            created_at: coupon.created_at.as_inner(),
            updated_at: coupon.updated_at.as_inner(),
        }
    }

    pub fn into_coupon(self) -> Coupon {
        Coupon {
            id: CouponId(self.id),
            owner_id: OwnerId(self.owner_id),
            code: self.code,
            state: match self.state.as_str() {
                "available" => CouponState::Available,
                "used" => CouponState::Used,
                // Unknown states map to a terminal state so a corrupt row
                // can never be redeemed.
                _ => CouponState::Expired,
            },
            starts_at: Timestamp::from(self.starts_at),
            ends_at: Timestamp::from(self.ends_at),
            order_id: self.order_id.map(OrderId),
            used_at: self.used_at.map(Timestamp::from),
            created_at: Timestamp::from(self.created_at),
            updated_at: Timestamp::from(self.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CouponRow;
    use crate::domain::entities::coupon::{Coupon, CouponState};
    use crate::domain::value_objects::ids::{CouponId, OrderId, OwnerId};
    use crate::domain::value_objects::timestamps::Timestamp;
    use time::{Duration, OffsetDateTime};

    fn sample_coupon() -> Coupon {
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

    #[test]
    fn given_coupon_when_from_coupon_should_map_fields() {
        let mut coupon = sample_coupon();
        coupon.redeem(OrderId::new(), Timestamp::now_utc()).unwrap();

        let row = CouponRow::from_coupon(&coupon);

        assert_eq!(row.id, coupon.id.0);
        assert_eq!(row.owner_id, coupon.owner_id.0);
        assert_eq!(row.code, "SAVE10");
        assert_eq!(row.state, "used");
        assert_eq!(row.starts_at, coupon.starts_at.as_inner());
        assert_eq!(row.ends_at, coupon.ends_at.as_inner());
        assert_eq!(row.order_id, coupon.order_id.map(|o| o.0));
        assert_eq!(row.used_at, coupon.used_at.map(|t| t.as_inner()));
    }

    #[test]
    fn given_row_when_into_coupon_should_map_fields() {
        let now = OffsetDateTime::now_utc();
        let row = CouponRow {
            id: uuid::Uuid::new_v4(),
            owner_id: uuid::Uuid::new_v4(),
            code: "SAVE20".to_string(),
            state: "available".to_string(),
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(1),
            order_id: None,
            used_at: None,
            created_at: now,
            updated_at: now,
        };

        let coupon = row.clone().into_coupon();

        assert_eq!(coupon.id.0, row.id);
        assert_eq!(coupon.owner_id.0, row.owner_id);
        assert_eq!(coupon.code, "SAVE20");
        assert_eq!(coupon.state, CouponState::Available);
        assert_eq!(coupon.starts_at, Timestamp::from(row.starts_at));
        assert_eq!(coupon.ends_at, Timestamp::from(row.ends_at));
        assert!(coupon.order_id.is_none());
    }

    #[test]
    fn given_row_with_unknown_state_when_into_coupon_should_map_to_terminal() {
        let now = OffsetDateTime::now_utc();
        let row = CouponRow {
            id: uuid::Uuid::new_v4(),
            owner_id: uuid::Uuid::new_v4(),
            code: "MYSTERY".to_string(),
            state: "frozen".to_string(),
            starts_at: now,
            ends_at: now + Duration::hours(1),
            order_id: None,
            used_at: None,
            created_at: now,
            updated_at: now,
        };

        let coupon = row.into_coupon();

        assert_eq!(coupon.state, CouponState::Expired);
        assert!(!coupon.is_available(Timestamp::now_utc()));
    }
}
