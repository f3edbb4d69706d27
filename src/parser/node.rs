use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::atom::parse_atom;

/// JSON key that carries a block's type tag.
pub const TYPE_KEY: &str = "__type__";

/// Ordered field list shared by blocks and maps.
///
/// Keeps insertion order. Re-inserting an existing key replaces the value in
/// place, so the first position of a key wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, ParsedNode)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParsedNode) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParsedNode> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParsedNode)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ParsedNode)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, ParsedNode)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Scalar leaf of a parsed trace.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Decimal(Decimal),
    Integer(i64),
    Bool(bool),
    Null,
    Str(String),
    /// The compound `amount:side` literal, e.g. `1000000:S`.
    Amount { amount: Decimal, side: String },
}

/// Universal output unit of the trace parser.
///
/// Parsing is purely structural: nothing here knows about FX. The
/// accessors below are lenient so that downstream code can read numbers
/// regardless of whether the trace spelled them as integers, decimals or
/// strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedNode {
    Block { tag: String, fields: Fields },
    Map(Fields),
    Sequence(Vec<ParsedNode>),
    Atom(Atom),
}

impl ParsedNode {
    pub fn str(s: impl Into<String>) -> Self {
        ParsedNode::Atom(Atom::Str(s.into()))
    }

    pub fn null() -> Self {
        ParsedNode::Atom(Atom::Null)
    }

    /// Type tag, for blocks only.
    pub fn tag(&self) -> Option<&str> {
        match self {
            ParsedNode::Block { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Field list of a block or map.
    pub fn fields(&self) -> Option<&Fields> {
        match self {
            ParsedNode::Block { fields, .. } | ParsedNode::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Field lookup on a block or map; `None` for every other shape.
    pub fn get(&self, key: &str) -> Option<&ParsedNode> {
        self.fields().and_then(|f| f.get(key))
    }

    /// Walk a dotted path of field names, e.g. `"crl.XCalc.finalTriBid"`.
    pub fn path(&self, path: &str) -> Option<&ParsedNode> {
        path.split('.')
            .try_fold(self, |node, key| node.get(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParsedNode::Atom(Atom::Null))
    }

    pub fn as_sequence(&self) -> Option<&[ParsedNode]> {
        match self {
            ParsedNode::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParsedNode::Atom(Atom::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Text form of a scalar, suitable for display fields.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ParsedNode::Atom(Atom::Str(s)) => Some(s.clone()),
            ParsedNode::Atom(Atom::Decimal(d)) => Some(d.to_string()),
            ParsedNode::Atom(Atom::Integer(i)) => Some(i.to_string()),
            ParsedNode::Atom(Atom::Bool(b)) => Some(b.to_string()),
            ParsedNode::Atom(Atom::Amount { amount, side }) => Some(format!("{amount}:{side}")),
            _ => None,
        }
    }

    /// Exact decimal view of a numeric scalar. Strings are parsed, so values
    /// persisted as JSON strings read back the same.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            ParsedNode::Atom(Atom::Decimal(d)) => Some(*d),
            ParsedNode::Atom(Atom::Integer(i)) => Some(Decimal::from(*i)),
            ParsedNode::Atom(Atom::Amount { amount, .. }) => Some(*amount),
            ParsedNode::Atom(Atom::Str(s)) => parse_decimal_text(s),
            _ => None,
        }
    }

    /// Integer view; decimals are accepted only when they carry no fraction.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParsedNode::Atom(Atom::Integer(i)) => Some(*i),
            _ => {
                let d = self.as_decimal()?;
                if d.fract().is_zero() {
                    d.to_i64()
                } else {
                    None
                }
            }
        }
    }

    /// Truthiness in the trace's own terms: `F`, `0`, `null` and empty text
    /// are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            ParsedNode::Atom(Atom::Bool(b)) => *b,
            ParsedNode::Atom(Atom::Null) => false,
            ParsedNode::Atom(Atom::Integer(i)) => *i != 0,
            ParsedNode::Atom(Atom::Decimal(d)) => !d.is_zero(),
            ParsedNode::Atom(Atom::Amount { amount, .. }) => !amount.is_zero(),
            ParsedNode::Atom(Atom::Str(s)) => {
                let s = s.trim();
                !s.is_empty() && s != "0"
            }
            ParsedNode::Sequence(items) => !items.is_empty(),
            ParsedNode::Block { .. } => true,
            ParsedNode::Map(fields) => !fields.is_empty(),
        }
    }
}

fn parse_decimal_text(s: &str) -> Option<Decimal> {
    let s = s.trim();
    s.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

/// Fixed-point text of a decimal atom. A whole number keeps a `.0` so it
/// reads back as a decimal rather than an integer.
pub(crate) fn decimal_text(d: &Decimal) -> String {
    if d.scale() == 0 {
        format!("{d}.0")
    } else {
        d.to_string()
    }
}

impl From<Atom> for ParsedNode {
    fn from(atom: Atom) -> Self {
        ParsedNode::Atom(atom)
    }
}

impl fmt::Display for ParsedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_trace_text())
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Atom::Decimal(d) => serializer.serialize_str(&decimal_text(d)),
            Atom::Integer(i) => serializer.serialize_i64(*i),
            Atom::Bool(b) => serializer.serialize_bool(*b),
            Atom::Null => serializer.serialize_unit(),
            Atom::Str(s) => serializer.serialize_str(s),
            Atom::Amount { amount, side } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("amount", &amount.to_string())?;
                map.serialize_entry("side", side)?;
                map.end()
            }
        }
    }
}

impl Serialize for ParsedNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParsedNode::Block { tag, fields } => {
                let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry(TYPE_KEY, tag)?;
                for (k, v) in fields.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            ParsedNode::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            ParsedNode::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ParsedNode::Atom(atom) => atom.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ParsedNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = ParsedNode;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a parsed SCP trace document")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(Atom::Bool(v).into())
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Atom::Integer(v).into())
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                match i64::try_from(v) {
                    Ok(i) => Ok(Atom::Integer(i).into()),
                    Err(_) => Ok(Atom::Decimal(Decimal::from(v)).into()),
                }
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Decimal::try_from(v)
                    .map(|d| Atom::Decimal(d).into())
                    .map_err(|e| E::custom(format!("unrepresentable number {v}: {e}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(parse_atom(v).into())
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ParsedNode::null())
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ParsedNode::null())
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = access.next_element::<ParsedNode>()? {
                    items.push(item);
                }
                Ok(ParsedNode::Sequence(items))
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut tag = None;
                let mut fields = Fields::new();
                while let Some(key) = access.next_key::<String>()? {
                    if key == TYPE_KEY {
                        let value: String = access.next_value()?;
                        tag = Some(value);
                    } else {
                        let value: ParsedNode = access.next_value()?;
                        fields.insert(key, value);
                    }
                }
                if let Some(tag) = tag {
                    return Ok(ParsedNode::Block { tag, fields });
                }
                Ok(amount_from_fields(&fields).unwrap_or(ParsedNode::Map(fields)))
            }
        }
        deserializer.deserialize_any(V)
    }
}

/// A persisted `{amount, side}` pair is read back as the compound atom.
fn amount_from_fields(fields: &Fields) -> Option<ParsedNode> {
    if fields.len() != 2 {
        return None;
    }
    let amount = fields.get("amount")?.as_decimal()?;
    let side = fields.get("side")?.as_str()?.to_string();
    Some(Atom::Amount { amount, side }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> ParsedNode {
        let mut inner = Fields::new();
        inner.insert("amt", Atom::Integer(1_000_000).into());
        inner.insert("bidPrice", Atom::Decimal(dec!(1.08450)).into());
        let mut root = Fields::new();
        root.insert("id", ParsedNode::str("PX-1"));
        root.insert(
            "rungs",
            ParsedNode::Sequence(vec![ParsedNode::Block {
                tag: "Rung".into(),
                fields: inner,
            }]),
        );
        root.insert(
            "notional",
            Atom::Amount {
                amount: dec!(2000000),
                side: "S".into(),
            }
            .into(),
        );
        ParsedNode::Block {
            tag: "SCP".into(),
            fields: root,
        }
    }

    #[test]
    fn test_fields_keep_first_position_on_reinsert() {
        let mut fields = Fields::new();
        fields.insert("a", Atom::Integer(1).into());
        fields.insert("b", Atom::Integer(2).into());
        fields.insert("a", Atom::Integer(3).into());
        let keys: Vec<_> = fields.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(fields.get("a"), Some(&Atom::Integer(3).into()));
    }

    #[test]
    fn test_path_lookup() {
        let node = sample();
        let rungs = node.path("rungs").and_then(|r| r.as_sequence()).unwrap();
        assert_eq!(rungs.len(), 1);
        assert_eq!(rungs[0].get("bidPrice").unwrap().as_decimal(), Some(dec!(1.08450)));
        assert!(node.path("rungs.missing").is_none());
    }

    #[test]
    fn test_decimal_serializes_fixed_point() {
        let node: ParsedNode = Atom::Decimal(dec!(0.00000012)).into();
        assert_eq!(serde_json::to_string(&node).unwrap(), "\"0.00000012\"");
    }

    #[test]
    fn test_whole_decimal_stays_decimal_in_json() {
        let node: ParsedNode = Atom::Decimal(Decimal::from(100_000)).into();
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, "\"100000.0\"");
        let back: ParsedNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
        assert!(matches!(back, ParsedNode::Atom(Atom::Decimal(_))));
    }

    #[test]
    fn test_json_round_trip_preserves_order_and_types() {
        let node = sample();
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.starts_with("{\"__type__\":\"SCP\",\"id\":\"PX-1\",\"rungs\""));

        let back: ParsedNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
        let keys: Vec<_> = back.fields().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "rungs", "notional"]);
    }

    #[test]
    fn test_lenient_numeric_views() {
        assert_eq!(ParsedNode::str("1.25").as_decimal(), Some(dec!(1.25)));
        assert_eq!(ParsedNode::from(Atom::Decimal(dec!(5000000.0))).as_i64(), Some(5_000_000));
        assert_eq!(ParsedNode::from(Atom::Decimal(dec!(1.5))).as_i64(), None);
        assert!(!ParsedNode::str("0").is_truthy());
        assert!(ParsedNode::from(Atom::Integer(1)).is_truthy());
        assert!(!ParsedNode::from(Atom::Bool(false)).is_truthy());
    }
}
