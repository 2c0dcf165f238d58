use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRADE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique trade identity.
///
/// A session uses it to reject the same trade being added twice. Cloning a
/// trade keeps its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeId(pub u64);

impl TradeId {
    pub fn next() -> Self {
        Self(NEXT_TRADE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = TradeId::next();
        let b = TradeId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn display_format() {
        assert_eq!(TradeId(7).to_string(), "T7");
    }
}
