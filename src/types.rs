//! Boundary types shared across the core: timestamps and the actor context.
//!
//! The actor is always passed in explicitly by the host; the core never reads
//! an ambient "current user".

use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Capability flags resolved by the host from its role lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub can_verify_payments: bool,
    pub can_override_lock: bool,
    pub can_edit_quotation: bool,
}

impl Capabilities {
    /// Sales role: may create and edit quotations.
    pub fn sales() -> Self {
        Self {
            can_edit_quotation: true,
            ..Self::default()
        }
    }
    /// Finance role: may decide payment verifications.
    pub fn finance() -> Self {
        Self {
            can_verify_payments: true,
            ..Self::default()
        }
    }
    /// Administrator-equivalent role: everything, including lock override.
    pub fn admin() -> Self {
        Self {
            can_verify_payments: true,
            can_override_lock: true,
            can_edit_quotation: true,
        }
    }
}

/// The authenticated identity performing an operation, supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub actor_id: String,
    pub capabilities: Capabilities,
}

impl Actor {
    pub fn new(actor_id: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            actor_id: actor_id.into(),
            capabilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn role_presets() {
        assert!(Capabilities::sales().can_edit_quotation);
        assert!(!Capabilities::sales().can_verify_payments);
        assert!(Capabilities::finance().can_verify_payments);
        assert!(!Capabilities::finance().can_override_lock);
        assert!(Capabilities::admin().can_override_lock);
    }
}
