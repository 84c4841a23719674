pub mod expire_coupons;
pub mod redeem_coupon;
