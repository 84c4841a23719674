use time::{Duration, OffsetDateTime, UtcOffset};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    pub fn now_utc() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Normalizes any offset to UTC before storing.
    pub fn from(dt: OffsetDateTime) -> Self {
        Self(dt.to_offset(UtcOffset::UTC))
    }

    pub fn as_inner(&self) -> OffsetDateTime {
        self.0
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Returns this instant shifted by `delta` (negative shifts backwards).
    pub fn shifted(self, delta: Duration) -> Self {
        Self(self.0 + delta)
    }
}
