//! wsync-schemas
//!
//! Data model shared by every wsync crate: node balances, pending mint/melt
//! quotes, the push-channel event payloads and price quotes.
//!
//! Wire shapes follow the JSON the wallet backend emits (camelCase fields,
//! `type` / `kind` discriminators). No logic beyond small accessors lives here.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

mod unit;

pub use unit::Unit;

/// Amounts are counted in the unit's smallest subdivision.
///
/// `u64` keeps every amount representable inside the internally tagged event
/// and quote-group payloads, which buffer fields before decoding.
pub type Amount = u64;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque identifier of a registered remote node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub String);

impl QuoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub unit: Unit,
    pub amount: Amount,
}

impl Balance {
    pub fn new(unit: impl Into<Unit>, amount: Amount) -> Self {
        Self {
            unit: unit.into(),
            amount,
        }
    }
}

/// Balances of one node. Unique per unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub id: NodeId,
    pub url: String,
    /// Serialized as a `[{unit, amount}]` list; duplicate units keep the last entry.
    #[serde(with = "balance_list")]
    pub balances: BTreeMap<Unit, Amount>,
}

impl NodeState {
    pub fn new(id: impl Into<NodeId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            balances: BTreeMap::new(),
        }
    }

    /// Builder-style balance setter.
    pub fn with_balance(mut self, unit: impl Into<Unit>, amount: Amount) -> Self {
        self.balances.insert(unit.into(), amount);
        self
    }

    pub fn balance(&self, unit: &Unit) -> Amount {
        self.balances.get(unit).copied().unwrap_or(0)
    }
}

mod balance_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{Amount, Balance, Unit};

    pub fn serialize<S>(map: &BTreeMap<Unit, Amount>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let list: Vec<Balance> = map
            .iter()
            .map(|(unit, amount)| Balance {
                unit: unit.clone(),
                amount: *amount,
            })
            .collect();
        list.serialize(s)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<BTreeMap<Unit, Amount>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<Balance>::deserialize(d)?;
        Ok(list.into_iter().map(|b| (b.unit, b.amount)).collect())
    }
}

// ---------------------------------------------------------------------------
// Quotes
// ---------------------------------------------------------------------------

/// A pending mint (deposit) or melt (withdrawal) awaiting settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub unit: Unit,
    pub amount: Amount,
}

impl Quote {
    pub fn new(id: impl Into<String>, unit: impl Into<Unit>, amount: Amount) -> Self {
        Self {
            id: QuoteId::new(id),
            unit: unit.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteKind {
    Mint,
    Melt,
}

impl QuoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteKind::Mint => "mint",
            QuoteKind::Melt => "melt",
        }
    }
}

impl fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mint quotes: `Unpaid -> Paid`, then dropped once redeemed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuotes {
    pub unpaid: Vec<Quote>,
    pub paid: Vec<Quote>,
}

/// Melt quotes: `Unpaid -> Pending` (payment in flight), then dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuotes {
    pub unpaid: Vec<Quote>,
    pub pending: Vec<Quote>,
}

/// Outstanding quotes of one node. A missing record is equivalent to an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePendingQuotes {
    pub mint: MintQuotes,
    pub melt: MeltQuotes,
}

impl NodePendingQuotes {
    fn lists(&self) -> [&Vec<Quote>; 4] {
        [
            &self.mint.unpaid,
            &self.mint.paid,
            &self.melt.unpaid,
            &self.melt.pending,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.lists().iter().all(|l| l.is_empty())
    }

    pub fn len(&self) -> usize {
        self.lists().iter().map(|l| l.len()).sum()
    }

    /// Linear scan of all four lists.
    pub fn contains(&self, id: &QuoteId) -> bool {
        self.lists().iter().any(|l| l.iter().any(|q| &q.id == id))
    }
}

/// Full poll result for one node and one quote kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QuoteGroup {
    #[serde(rename_all = "camelCase")]
    Mint {
        node_id: NodeId,
        unpaid: Vec<Quote>,
        paid: Vec<Quote>,
    },
    #[serde(rename_all = "camelCase")]
    Melt {
        node_id: NodeId,
        unpaid: Vec<Quote>,
        pending: Vec<Quote>,
    },
}

impl QuoteGroup {
    pub fn node_id(&self) -> NodeId {
        match self {
            QuoteGroup::Mint { node_id, .. } | QuoteGroup::Melt { node_id, .. } => *node_id,
        }
    }

    pub fn kind(&self) -> QuoteKind {
        match self {
            QuoteGroup::Mint { .. } => QuoteKind::Mint,
            QuoteGroup::Melt { .. } => QuoteKind::Melt,
        }
    }
}

// ---------------------------------------------------------------------------
// Push-channel events
// ---------------------------------------------------------------------------

/// Quote lifecycle notification.
///
/// `created` carries the full quote; the other variants only identify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuoteEvent {
    #[serde(rename_all = "camelCase")]
    Created {
        quote_type: QuoteKind,
        node_id: NodeId,
        quote: Quote,
    },
    #[serde(rename_all = "camelCase")]
    Paid {
        quote_type: QuoteKind,
        node_id: NodeId,
        quote_id: QuoteId,
    },
    #[serde(rename_all = "camelCase")]
    Redeemed {
        quote_type: QuoteKind,
        node_id: NodeId,
        quote_id: QuoteId,
    },
    #[serde(rename_all = "camelCase")]
    Removed {
        quote_type: QuoteKind,
        node_id: NodeId,
        quote_id: QuoteId,
    },
}

impl QuoteEvent {
    pub fn node_id(&self) -> NodeId {
        match self {
            QuoteEvent::Created { node_id, .. }
            | QuoteEvent::Paid { node_id, .. }
            | QuoteEvent::Redeemed { node_id, .. }
            | QuoteEvent::Removed { node_id, .. } => *node_id,
        }
    }

    pub fn quote_type(&self) -> QuoteKind {
        match self {
            QuoteEvent::Created { quote_type, .. }
            | QuoteEvent::Paid { quote_type, .. }
            | QuoteEvent::Redeemed { quote_type, .. }
            | QuoteEvent::Removed { quote_type, .. } => *quote_type,
        }
    }

    pub fn quote_id(&self) -> &QuoteId {
        match self {
            QuoteEvent::Created { quote, .. } => &quote.id,
            QuoteEvent::Paid { quote_id, .. }
            | QuoteEvent::Redeemed { quote_id, .. }
            | QuoteEvent::Removed { quote_id, .. } => quote_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QuoteEvent::Created { .. } => "created",
            QuoteEvent::Paid { .. } => "paid",
            QuoteEvent::Redeemed { .. } => "redeemed",
            QuoteEvent::Removed { .. } => "removed",
        }
    }
}

/// Balance change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BalanceEvent {
    #[serde(rename_all = "camelCase")]
    Increase {
        node_id: NodeId,
        unit: Unit,
        amount: Amount,
    },
    #[serde(rename_all = "camelCase")]
    Decrease {
        node_id: NodeId,
        unit: Unit,
        amount: Amount,
    },
}

impl BalanceEvent {
    pub fn node_id(&self) -> NodeId {
        match self {
            BalanceEvent::Increase { node_id, .. } | BalanceEvent::Decrease { node_id, .. } => {
                *node_id
            }
        }
    }
}

/// Anything the notification channel can deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "event", rename_all = "lowercase")]
pub enum Notification {
    Quote(QuoteEvent),
    Balance(BalanceEvent),
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// Price of one asset in the display currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub symbol: String,
    pub value: f64,
}

impl Price {
    pub fn new(symbol: impl Into<String>, value: f64) -> Self {
        Self {
            symbol: symbol.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_state_balances_round_trip_as_list() {
        let node = NodeState::new(1, "https://node.example")
            .with_balance("sat", 500)
            .with_balance("gwei", 10);
        let v = serde_json::to_value(&node).unwrap();
        assert_eq!(v["balances"].as_array().map(|a| a.len()), Some(2));

        let json = r#"{"id":2,"url":"u","balances":[{"unit":"sat","amount":1},{"unit":"sat","amount":7}]}"#;
        let parsed: NodeState = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.balance(&Unit::new("sat")), 7, "last duplicate wins");
    }

    #[test]
    fn quote_event_wire_shape() {
        let json = r#"{"type":"paid","quoteType":"melt","nodeId":3,"quoteId":"q-1"}"#;
        let ev: QuoteEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ev.node_id(), NodeId(3));
        assert_eq!(ev.quote_type(), QuoteKind::Melt);
        assert_eq!(ev.quote_id().as_str(), "q-1");
        assert_eq!(ev.name(), "paid");

        let created = r#"{"type":"created","quoteType":"mint","nodeId":1,"quote":{"id":"a","unit":"sat","amount":21}}"#;
        let ev: QuoteEvent = serde_json::from_str(created).unwrap();
        assert!(matches!(ev, QuoteEvent::Created { ref quote, .. } if quote.amount == 21));
    }

    #[test]
    fn quote_group_tagged_by_kind() {
        let json = r#"{"kind":"melt","nodeId":4,"unpaid":[],"pending":[{"id":"x","unit":"gwei","amount":5}]}"#;
        let g: QuoteGroup = serde_json::from_str(json).unwrap();
        assert_eq!(g.kind(), QuoteKind::Melt);
        assert_eq!(g.node_id(), NodeId(4));
    }

    #[test]
    fn tagged_payloads_carry_the_largest_amount() {
        let group = QuoteGroup::Mint {
            node_id: NodeId(1),
            unpaid: vec![Quote::new("big", "msat", Amount::MAX)],
            paid: vec![],
        };
        let json = serde_json::to_string(&group).unwrap();
        assert_eq!(serde_json::from_str::<QuoteGroup>(&json).unwrap(), group);

        let created = Notification::Quote(QuoteEvent::Created {
            quote_type: QuoteKind::Melt,
            node_id: NodeId(2),
            quote: Quote::new("big", "sat", Amount::MAX),
        });
        let json = serde_json::to_string(&created).unwrap();
        assert_eq!(serde_json::from_str::<Notification>(&json).unwrap(), created);

        let inc = BalanceEvent::Increase {
            node_id: NodeId(3),
            unit: Unit::new("sat"),
            amount: Amount::MAX,
        };
        let json = serde_json::to_string(&inc).unwrap();
        assert_eq!(serde_json::from_str::<BalanceEvent>(&json).unwrap(), inc);
    }

    #[test]
    fn pending_quotes_emptiness_and_lookup() {
        let mut p = NodePendingQuotes::default();
        assert!(p.is_empty());
        p.melt.pending.push(Quote::new("m1", "sat", 3));
        assert!(!p.is_empty());
        assert_eq!(p.len(), 1);
        assert!(p.contains(&QuoteId::from("m1")));
        assert!(!p.contains(&QuoteId::from("m2")));
    }
}
