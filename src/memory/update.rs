//! Application of update-operator documents to stored documents.

use bson::{Bson, Document};

use super::eval::{bson_eq, eval_filter, get_path};

/// Applies every operator bucket in `update` to `doc`, in bucket order.
pub(super) fn apply_update(doc: &mut Document, update: &Document) {
    for (op, payload) in update.iter() {
        let fields = match payload {
            Bson::Document(d) => d,
            _ => continue,
        };
        for (path, operand) in fields.iter() {
            match op.as_str() {
                "$set" => set_path(doc, path, operand.clone()),
                "$inc" => {
                    let cur = get_path(doc, path).cloned();
                    set_path(doc, path, incremented(cur.as_ref(), operand));
                }
                "$unset" => {
                    unset_path(doc, path);
                }
                "$push" => with_array(doc, path, |arr| arr.push(operand.clone())),
                "$pushAll" => {
                    if let Bson::Array(values) = operand {
                        with_array(doc, path, |arr| arr.extend(values.iter().cloned()));
                    }
                }
                "$pull" => with_array(doc, path, |arr| {
                    arr.retain(|elem| !pull_matches(elem, operand));
                }),
                "$pullAll" => {
                    if let Bson::Array(values) = operand {
                        with_array(doc, path, |arr| {
                            arr.retain(|e| !values.iter().any(|v| bson_eq(v, e)));
                        });
                    }
                }
                "$addToSet" => {
                    let additions: Vec<Bson> = match operand {
                        Bson::Document(d) => match d.get("$each") {
                            Some(Bson::Array(each)) => each.clone(),
                            _ => vec![operand.clone()],
                        },
                        other => vec![other.clone()],
                    };
                    with_array(doc, path, |arr| {
                        for v in additions {
                            if !arr.iter().any(|e| bson_eq(e, &v)) {
                                arr.push(v);
                            }
                        }
                    });
                }
                "$pop" => with_array(doc, path, |arr| {
                    if arr.is_empty() {
                        return;
                    }
                    if numeric(operand) < 0.0 {
                        arr.remove(0);
                    } else {
                        arr.pop();
                    }
                }),
                "$rename" => {
                    if let (Some(value), Bson::String(to)) =
                        (get_path(doc, path).cloned(), operand)
                    {
                        let to = to.clone();
                        unset_path(doc, path);
                        set_path(doc, &to, value);
                    }
                }
                _ => {}
            }
        }
    }
}

/// `$pull` with an operator document removes elements the condition
/// matches; a plain value removes equal elements.
fn pull_matches(elem: &Bson, operand: &Bson) -> bool {
    match operand {
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => {
            let probe = bson::doc! {"v": elem.clone()};
            let cond = bson::doc! {"v": operand.clone()};
            eval_filter(&probe, &cond)
        }
        _ => bson_eq(elem, operand),
    }
}

/// Integer arithmetic stays integral; a `Double` on either side makes the
/// result a `Double`. A missing field counts as zero of the operand's type.
fn incremented(current: Option<&Bson>, operand: &Bson) -> Bson {
    fn as_i64(v: &Bson) -> Option<i64> {
        match v {
            Bson::Int32(i) => Some(i64::from(*i)),
            Bson::Int64(i) => Some(*i),
            _ => None,
        }
    }
    match current {
        None => operand.clone(),
        Some(cur) => match (as_i64(cur), as_i64(operand)) {
            (Some(a), Some(b)) => Bson::Int64(a + b),
            _ => Bson::Double(numeric(cur) + numeric(operand)),
        },
    }
}

fn numeric(v: &Bson) -> f64 {
    match v {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        _ => 0.0,
    }
}

fn with_array(doc: &mut Document, path: &str, f: impl FnOnce(&mut Vec<Bson>)) {
    let existing = matches!(get_path(doc, path), Some(Bson::Array(_)));
    if !existing {
        if get_path(doc, path).is_some() {
            // scalar in the way of an array operator; leave it untouched
            return;
        }
        set_path(doc, path, Bson::Array(Vec::new()));
    }
    if let Some(Bson::Array(arr)) = get_path_mut(doc, path) {
        f(arr);
    }
}

fn set_path(doc: &mut Document, path: &str, value: Bson) {
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            cur.insert(part, value);
            return;
        }
        if !matches!(cur.get(part), Some(Bson::Document(_))) {
            cur.insert(part, Document::new());
        }
        cur = match cur.get_mut(part) {
            Some(Bson::Document(d)) => d,
            _ => return,
        };
    }
}

fn unset_path(doc: &mut Document, path: &str) -> Option<Bson> {
    let (parent_path, leaf) = match path.rsplit_once('.') {
        Some((p, l)) => (Some(p), l),
        None => (None, path),
    };
    match parent_path {
        None => doc.remove(leaf),
        Some(p) => match get_path_mut(doc, p) {
            Some(Bson::Document(d)) => d.remove(leaf),
            _ => None,
        },
    }
}

fn get_path_mut<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Bson> {
    let mut cur = doc;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            return cur.get_mut(part);
        }
        match cur.get_mut(part) {
            Some(Bson::Document(d)) => cur = d,
            _ => return None,
        }
    }
    None
}
