use crate::domain::value_objects::ids::{CouponId, OrderId, OwnerId};
use crate::domain::value_objects::timestamps::Timestamp;
use crate::domain::workflows::state_machine::{CouponStateMachine, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponState {
    Available,
    Used,
    Expired,
}

impl CouponState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponState::Available => "available",
            CouponState::Used => "used",
            CouponState::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponError {
    /// The validity window is empty or inverted.
    InvalidWindow,
    /// The coupon is not redeemable right now (wrong state or outside window).
    NotAvailable,
}

/// A single-use discount coupon owned by one account.
///
/// Redemption is the only mutation with concurrency constraints; callers
/// serialize it through the store's row-level lock, never through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coupon {
    pub id: CouponId,
    pub owner_id: OwnerId,
    pub code: String,
    pub state: CouponState,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub order_id: Option<OrderId>,
    pub used_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Coupon {
    /// Issue a fresh coupon valid over `[starts_at, ends_at)`.
    pub fn issue(
        id: CouponId,
        owner_id: OwnerId,
        code: String,
        starts_at: Timestamp,
        ends_at: Timestamp,
    ) -> Result<Self, CouponError> {
        if ends_at <= starts_at {
            return Err(CouponError::InvalidWindow);
        }

        let now = Timestamp::now_utc();
        Ok(Self {
            id,
            owner_id,
            code,
            state: CouponState::Available,
            starts_at,
            ends_at,
            order_id: None,
            used_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// The redemption predicate: available state and `now` inside the
    /// half-open validity window.
    pub fn is_available(&self, now: Timestamp) -> bool {
        self.state == CouponState::Available && self.starts_at <= now && now < self.ends_at
    }

    /// Consume the coupon for `order_id`. Legal at most once per coupon.
    pub fn redeem(&mut self, order_id: OrderId, now: Timestamp) -> Result<(), CouponError> {
        if !self.is_available(now) {
            return Err(CouponError::NotAvailable);
        }

        self.state = CouponStateMachine::transition(self.state, CouponState::Used)
            .map_err(|TransitionError::Forbidden| CouponError::NotAvailable)?;
        self.order_id = Some(order_id);
        self.used_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn open_window() -> (Timestamp, Timestamp) {
        let now = Timestamp::now_utc();
        (now.shifted(Duration::hours(-1)), now.shifted(Duration::hours(1)))
    }

    fn sample_coupon() -> Coupon {
        let (starts_at, ends_at) = open_window();
        Coupon::issue(
            CouponId::new(),
            OwnerId::new(),
            "WELCOME10".to_string(),
            starts_at,
            ends_at,
        )
        .unwrap()
    }

    #[test]
    fn given_valid_window_when_issue_should_start_available() {
        let coupon = sample_coupon();

        assert_eq!(coupon.state, CouponState::Available);
        assert!(coupon.order_id.is_none());
        assert!(coupon.used_at.is_none());
    }

    #[test]
    fn given_inverted_window_when_issue_should_reject() {
        let now = Timestamp::now_utc();

        let result = Coupon::issue(
            CouponId::new(),
            OwnerId::new(),
            "BACKWARDS".to_string(),
            now,
            now.shifted(Duration::hours(-1)),
        );

        assert_eq!(result.unwrap_err(), CouponError::InvalidWindow);
    }

    #[test]
    fn given_available_coupon_when_redeem_should_transition_to_used() {
        let mut coupon = sample_coupon();
        let order_id = OrderId::new();
        let now = Timestamp::now_utc();

        coupon.redeem(order_id, now).unwrap();

        assert_eq!(coupon.state, CouponState::Used);
        assert_eq!(coupon.order_id, Some(order_id));
        assert_eq!(coupon.used_at, Some(now));
    }

    #[test]
    fn given_used_coupon_when_redeem_again_should_reject_and_keep_first_order() {
        let mut coupon = sample_coupon();
        let first_order = OrderId::new();
        coupon.redeem(first_order, Timestamp::now_utc()).unwrap();

        let result = coupon.redeem(OrderId::new(), Timestamp::now_utc());

        assert_eq!(result.unwrap_err(), CouponError::NotAvailable);
        assert_eq!(coupon.order_id, Some(first_order));
    }

    #[test]
    fn given_coupon_before_window_when_redeem_should_reject() {
        let now = Timestamp::now_utc();
        let mut coupon = Coupon::issue(
            CouponId::new(),
            OwnerId::new(),
            "NOTYET".to_string(),
            now.shifted(Duration::hours(1)),
            now.shifted(Duration::hours(2)),
        )
        .unwrap();

        assert!(!coupon.is_available(now));
        assert_eq!(
            coupon.redeem(OrderId::new(), now).unwrap_err(),
            CouponError::NotAvailable
        );
    }

    #[test]
    fn given_coupon_past_window_when_redeem_should_reject() {
        let now = Timestamp::now_utc();
        let mut coupon = Coupon::issue(
            CouponId::new(),
            OwnerId::new(),
            "TOOLATE".to_string(),
            now.shifted(Duration::hours(-2)),
            now.shifted(Duration::hours(-1)),
        )
        .unwrap();

        assert!(!coupon.is_available(now));
        assert_eq!(
            coupon.redeem(OrderId::new(), now).unwrap_err(),
            CouponError::NotAvailable
        );
    }

    #[test]
    fn given_window_end_when_checked_should_be_exclusive() {
        let mut coupon = sample_coupon();
        let end = coupon.ends_at;

        assert!(!coupon.is_available(end));
        assert!(coupon.is_available(coupon.starts_at));
        assert_eq!(
            coupon.redeem(OrderId::new(), end).unwrap_err(),
            CouponError::NotAvailable
        );
    }
}
