//! Asset denominations and their static precision table.
//!
//! A [`Unit`] is the smallest subdivision balances and quotes are counted in
//! (e.g. `sat`, `gwei`, `millistrk`). Converting to a display amount divides
//! by the unit's precision; the matching asset symbol is what the price feed
//! quotes.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// `(unit, asset symbol, smallest-units per display unit)`.
const UNIT_TABLE: &[(&str, &str, u64)] = &[
    ("sat", "BTC", 100_000_000),
    ("msat", "BTC", 100_000_000_000),
    ("gwei", "ETH", 1_000_000_000),
    ("millistrk", "STRK", 1_000),
    ("usdc", "USDC", 1_000_000),
    ("usdt", "USDT", 1_000_000),
];

/// Asset denomination tag. Always stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Unit(String);

impl Unit {
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(s.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn lookup(&self) -> Option<&'static (&'static str, &'static str, u64)> {
        UNIT_TABLE.iter().find(|(name, _, _)| *name == self.0)
    }

    /// Returns `true` if the unit appears in the static table.
    pub fn is_known(&self) -> bool {
        self.lookup().is_some()
    }

    /// Smallest-units per display unit. Unknown units count as precision 1.
    pub fn precision(&self) -> u64 {
        match self.lookup() {
            Some((_, _, precision)) => *precision,
            None => {
                warn!(unit = %self.0, "unknown unit, defaulting precision to 1");
                1
            }
        }
    }

    /// Asset symbol the price feed uses for this unit, if known.
    pub fn asset_symbol(&self) -> Option<&'static str> {
        self.lookup().map(|(_, asset, _)| *asset)
    }
}

impl From<String> for Unit {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Unit {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Unit> for String {
    fn from(u: Unit) -> Self {
        u.0
    }
}

impl AsRef<str> for Unit {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_units_have_asset_and_precision() {
        let sat = Unit::new("sat");
        assert_eq!(sat.precision(), 100_000_000);
        assert_eq!(sat.asset_symbol(), Some("BTC"));

        let strk = Unit::new("MilliStrk");
        assert_eq!(strk.as_str(), "millistrk");
        assert_eq!(strk.precision(), 1_000);
        assert_eq!(strk.asset_symbol(), Some("STRK"));
    }

    #[test]
    fn unknown_unit_defaults_to_precision_one() {
        let u = Unit::new("doge");
        assert!(!u.is_known());
        assert_eq!(u.precision(), 1);
        assert_eq!(u.asset_symbol(), None);
    }

    #[test]
    fn deserialization_normalizes_case() {
        let u: Unit = serde_json::from_str("\"GWEI\"").unwrap();
        assert_eq!(u, Unit::new("gwei"));
        assert_eq!(serde_json::to_string(&u).unwrap(), "\"gwei\"");
    }
}
