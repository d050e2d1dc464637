//! Interpretation of filter documents against stored documents.
//!
//! The builder hands filters over in MongoDB's document shape; this module
//! evaluates that shape directly: top-level entries AND-combined, `$or` as
//! a list of alternatives, operator documents per field, regex constraints
//! as `$regex`/`$options` pairs (also inside `$nin` arrays).

use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::RegexBuilder;

pub(super) fn eval_filter(doc: &Document, filter: &Document) -> bool {
    for (key, cond) in filter.iter() {
        if key == "$or" {
            let alternatives = match cond {
                Bson::Array(a) => a,
                _ => return false,
            };
            let hit = alternatives.iter().any(|alt| match alt {
                Bson::Document(d) => eval_filter(doc, d),
                _ => false,
            });
            if !hit {
                return false;
            }
        } else if !eval_condition(get_path(doc, key), cond) {
            return false;
        }
    }
    true
}

fn eval_condition(value: Option<&Bson>, cond: &Bson) -> bool {
    match cond {
        Bson::Document(ops) if is_operator_doc(ops) => eval_operators(value, ops),
        _ => value.is_some_and(|v| bson_eq(v, cond)),
    }
}

fn is_operator_doc(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn eval_operators(value: Option<&Bson>, ops: &Document) -> bool {
    for (op, operand) in ops.iter() {
        let pass = match op.as_str() {
            "$gt" => cmp_is(value, operand, Ordering::Greater, false),
            "$gte" => cmp_is(value, operand, Ordering::Greater, true),
            "$lt" => cmp_is(value, operand, Ordering::Less, false),
            "$lte" => cmp_is(value, operand, Ordering::Less, true),
            "$ne" => !value.is_some_and(|v| bson_eq(v, operand)),
            "$in" => match operand {
                Bson::Array(set) => value.is_some_and(|v| in_set(v, set)),
                _ => false,
            },
            "$nin" => match operand {
                Bson::Array(set) => !value.is_some_and(|v| in_set(v, set)),
                _ => false,
            },
            "$exists" => {
                let want = matches!(operand, Bson::Boolean(true));
                value.is_some() == want
            }
            "$regex" => {
                let flags = ops.get_str("$options").unwrap_or("");
                match (value, operand) {
                    (Some(Bson::String(s)), Bson::String(pattern)) => {
                        regex_matches(pattern, flags, s)
                    }
                    _ => false,
                }
            }
            // evaluated together with $regex
            "$options" => true,
            // needs a geospatial index; the memory driver has none
            "$near" => false,
            _ => false,
        };
        if !pass {
            return false;
        }
    }
    true
}

/// Set membership for `$in`/`$nin`. Elements that are `$regex` documents
/// count as matches when the regex matches the value, which is how the
/// builder encodes `not_like`.
fn in_set(value: &Bson, set: &[Bson]) -> bool {
    set.iter().any(|elem| match elem {
        Bson::Document(d) => match (d.get_str("$regex"), value) {
            (Ok(pattern), Bson::String(s)) => {
                let flags = d.get_str("$options").unwrap_or("");
                regex_matches(pattern, flags, s)
            }
            _ => bson_eq(elem, value),
        },
        _ => bson_eq(elem, value),
    })
}

fn regex_matches(pattern: &str, flags: &str, text: &str) -> bool {
    let mut builder = RegexBuilder::new(pattern);
    builder
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'));
    match builder.build() {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

fn cmp_is(value: Option<&Bson>, operand: &Bson, want: Ordering, or_equal: bool) -> bool {
    match value {
        Some(v) => {
            let ord = compare_bson(v, operand);
            ord == want || (or_equal && ord == Ordering::Equal)
        }
        None => false,
    }
}

/// Multi-key document ordering for sort specs; earlier entries in the
/// spec take precedence, direction is the entry's sign.
pub(super) fn compare_docs(a: &Document, b: &Document, sorts: &Document) -> Ordering {
    for (field, dir) in sorts.iter() {
        let va = get_path(a, field);
        let vb = get_path(b, field);
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            let descending = matches!(dir, Bson::Int32(-1) | Bson::Int64(-1));
            return if descending { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

pub(super) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() {
        return None;
    }
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            return cur.get(part);
        }
        match cur.get(part) {
            Some(Bson::Document(d)) => cur = d,
            _ => return None,
        }
    }
    None
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn as_f64(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        _ => f64::NAN,
    }
}

/// Equality with MongoDB's numeric bracket: `Int32(30)`, `Int64(30)` and
/// `Double(30.0)` are the same value. Everything else is structural.
pub(super) fn bson_eq(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        as_f64(a).total_cmp(&as_f64(b)) == Ordering::Equal
    } else {
        a == b
    }
}

pub(super) fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return as_f64(a).total_cmp(&as_f64(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null => 0,
        Bson::Boolean(_) => 1,
        Bson::Int32(_) => 2,
        Bson::Int64(_) => 3,
        Bson::Double(_) => 4,
        Bson::String(_) => 5,
        Bson::Array(_) => 6,
        Bson::Document(_) => 7,
        Bson::ObjectId(_) => 8,
        Bson::DateTime(_) => 9,
        _ => 10,
    }
}

/// Inclusion projection; `_id` rides along unless it is the only field.
pub(super) fn project_fields(doc: &Document, projection: &Document) -> Document {
    if projection.is_empty() {
        return doc.clone();
    }
    let mut out = Document::new();
    if let Some(id) = doc.get("_id") {
        out.insert("_id", id.clone());
    }
    for (field, flag) in projection.iter() {
        let include = !matches!(flag, Bson::Boolean(false) | Bson::Int32(0) | Bson::Int64(0));
        if include && let Some(v) = doc.get(field) {
            out.insert(field.clone(), v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn and_combined_top_level() {
        let d = doc! {"a": 1, "b": 2};
        assert!(eval_filter(&d, &doc! {"a": 1, "b": 2}));
        assert!(!eval_filter(&d, &doc! {"a": 1, "b": 3}));
    }

    #[test]
    fn or_alternatives() {
        let d = doc! {"user": "arny"};
        let f = doc! {"$or": [{"user": "arny"}, {"age": {"$gt": 30}}]};
        assert!(eval_filter(&d, &f));
        let f = doc! {"$or": [{"user": "bob"}, {"age": {"$gt": 30}}]};
        assert!(!eval_filter(&d, &f));
    }

    #[test]
    fn comparison_operators_accumulate() {
        let d = doc! {"age": 30};
        assert!(eval_filter(&d, &doc! {"age": {"$gte": 18, "$lte": 65}}));
        assert!(!eval_filter(&d, &doc! {"age": {"$gt": 30}}));
        assert!(eval_filter(&d, &doc! {"age": {"$gt": 29.5}}));
    }

    #[test]
    fn equality_spans_numeric_types() {
        let d = doc! {"age": 30};
        assert!(eval_filter(&d, &doc! {"age": 30.0}));
        assert!(eval_filter(&d, &doc! {"age": Bson::Int64(30)}));
        assert!(!eval_filter(&d, &doc! {"age": {"$ne": 30.0}}));
        let d = doc! {"score": 2.0};
        assert!(eval_filter(&d, &doc! {"score": 2}));
    }

    #[test]
    fn ne_matches_missing_field() {
        let d = doc! {"a": 1};
        assert!(eval_filter(&d, &doc! {"b": {"$ne": 2}}));
        assert!(!eval_filter(&d, &doc! {"a": {"$ne": 1}}));
    }

    #[test]
    fn in_and_nin() {
        let d = doc! {"color": "red"};
        assert!(eval_filter(&d, &doc! {"color": {"$in": ["red", "blue"]}}));
        assert!(!eval_filter(&d, &doc! {"color": {"$nin": ["red"]}}));
        // missing field is never $in, always $nin
        assert!(!eval_filter(&d, &doc! {"size": {"$in": [1]}}));
        assert!(eval_filter(&d, &doc! {"size": {"$nin": [1]}}));
        // numeric membership spans integer and double members
        let d = doc! {"n": 2};
        assert!(eval_filter(&d, &doc! {"n": {"$in": [1.0, 2.0]}}));
        assert!(!eval_filter(&d, &doc! {"n": {"$nin": [Bson::Int64(2)]}}));
    }

    #[test]
    fn regex_with_options() {
        let d = doc! {"name": "Arny"};
        assert!(eval_filter(&d, &doc! {"name": {"$regex": "^ar", "$options": "i"}}));
        assert!(!eval_filter(&d, &doc! {"name": {"$regex": "^ar", "$options": ""}}));
    }

    #[test]
    fn nin_of_regexes() {
        let d = doc! {"name": "foobar"};
        let f = doc! {"name": {"$nin": [{"$regex": "foo"}]}};
        assert!(!eval_filter(&d, &f));
        let f = doc! {"name": {"$nin": [{"$regex": "baz"}]}};
        assert!(eval_filter(&d, &f));
    }

    #[test]
    fn dotted_paths() {
        let d = doc! {"facebook": {"id": 42}};
        assert!(eval_filter(&d, &doc! {"facebook.id": {"$gt": 1, "$lt": 5000}}));
    }

    #[test]
    fn sort_compare_insertion_order() {
        let a = doc! {"name": "b", "age": 1};
        let b = doc! {"name": "b", "age": 2};
        let sorts = doc! {"name": -1, "age": 1};
        assert_eq!(compare_docs(&a, &b, &sorts), Ordering::Less);
    }

    #[test]
    fn projection_keeps_id() {
        let d = doc! {"_id": 9, "a": 1, "b": 2};
        let p = project_fields(&d, &doc! {"a": true});
        assert_eq!(p, doc! {"_id": 9, "a": 1});
    }
}
