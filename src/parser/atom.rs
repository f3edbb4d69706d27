use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

use super::node::Atom;
use super::split::normalize_numbers;

static SIDED_AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?):\s*([A-Z])$").unwrap());

/// Interpret a scalar literal.
///
/// Precedence: the booleans `T`/`F`, `true`/`false` in any case, `null`,
/// the `amount:side` compound, then numbers. Anything else is returned as
/// trimmed text.
pub fn parse_atom(raw: &str) -> Atom {
    let normalized = normalize_numbers(raw.trim());
    let val = normalized.as_ref();

    match val {
        "T" => return Atom::Bool(true),
        "F" => return Atom::Bool(false),
        "null" => return Atom::Null,
        _ => {}
    }
    if val.eq_ignore_ascii_case("true") {
        return Atom::Bool(true);
    }
    if val.eq_ignore_ascii_case("false") {
        return Atom::Bool(false);
    }

    if let Some(caps) = SIDED_AMOUNT_RE.captures(val) {
        if let Ok(amount) = Decimal::from_str(&caps[1]) {
            return Atom::Amount {
                amount,
                side: caps[2].to_string(),
            };
        }
    }

    if val.contains('.') || val.contains('e') || val.contains('E') {
        if let Some(d) = parse_decimal(val) {
            return Atom::Decimal(d);
        }
    } else if let Ok(i) = val.parse::<i64>() {
        return Atom::Integer(i);
    }

    Atom::Str(val.to_string())
}

fn parse_decimal(val: &str) -> Option<Decimal> {
    Decimal::from_str(val)
        .or_else(|_| Decimal::from_scientific(val))
        .ok()
}
