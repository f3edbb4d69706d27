use super::node::{decimal_text, Atom, Fields, ParsedNode};

impl ParsedNode {
    /// Serialize back into the bracket grammar.
    ///
    /// Booleans are written as `T`/`F` and decimals in fixed-point, so
    /// parsing the output yields an equal tree for well-formed input.
    pub fn to_trace_text(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }
}

fn write_node(node: &ParsedNode, out: &mut String) {
    match node {
        ParsedNode::Block { tag, fields } => {
            out.push_str(tag);
            out.push('[');
            write_fields(fields, out);
            out.push(']');
        }
        ParsedNode::Map(fields) => {
            out.push('{');
            write_fields(fields, out);
            out.push('}');
        }
        ParsedNode::Sequence(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_node(item, out);
            }
            out.push(']');
        }
        ParsedNode::Atom(atom) => write_atom(atom, out),
    }
}

fn write_fields(fields: &Fields, out: &mut String) {
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(key);
        out.push('=');
        write_node(value, out);
    }
}

fn write_atom(atom: &Atom, out: &mut String) {
    match atom {
        Atom::Decimal(d) => out.push_str(&decimal_text(d)),
        Atom::Integer(i) => out.push_str(&i.to_string()),
        Atom::Bool(true) => out.push('T'),
        Atom::Bool(false) => out.push('F'),
        Atom::Null => out.push_str("null"),
        Atom::Str(s) => out.push_str(s),
        Atom::Amount { amount, side } => {
            out.push_str(&amount.to_string());
            out.push(':');
            out.push_str(side);
        }
    }
}
