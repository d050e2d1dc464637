use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Sort direction for `order_by` and index keys.
///
/// The loose inputs the fluent API historically accepted (`-1`, `false`,
/// `"desc"`) all coerce through `From`; anything unrecognized coerces to
/// ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        }
    }
}

impl From<i32> for SortOrder {
    fn from(v: i32) -> Self {
        if v == -1 { SortOrder::Desc } else { SortOrder::Asc }
    }
}

impl From<bool> for SortOrder {
    fn from(v: bool) -> Self {
        if v { SortOrder::Asc } else { SortOrder::Desc }
    }
}

impl From<&str> for SortOrder {
    fn from(v: &str) -> Self {
        if v.eq_ignore_ascii_case("desc") { SortOrder::Desc } else { SortOrder::Asc }
    }
}

/// Accumulated builder state for one logical query.
///
/// Every map is a `bson::Document` so entries keep insertion order and the
/// accumulated fragments are handed to the driver structurally unmodified.
/// Filter and update state are independent: read terminals consume the
/// query half, write terminals the update half.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    /// Projection: field name -> true. `_id` is implicitly always included.
    pub(crate) selects: Document,
    /// Filters: field path -> literal or operator document; `$or` -> array.
    pub(crate) wheres: Document,
    /// Sorts: field path -> 1 / -1, insertion order is tie-break precedence.
    pub(crate) sorts: Document,
    /// Update operators: operator name -> { field: operand }.
    pub(crate) updates: Document,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

/// The read half of the state, detached by a terminal operation.
#[derive(Debug, Clone, Default)]
pub struct QueryParts {
    pub selects: Document,
    pub wheres: Document,
    pub sorts: Document,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryState {
    /// Ensures `wheres[field]` holds an operator document, so multiple
    /// operators on the same field accumulate (`where_between` attaches
    /// `$gte` and `$lte` under one key). A previously set literal equality
    /// is replaced by the operator document.
    pub(crate) fn where_operator(&mut self, field: &str, op: &str, value: Bson) {
        match self.wheres.get_mut(field) {
            Some(Bson::Document(d)) => {
                d.insert(op, value);
            }
            _ => {
                let mut d = Document::new();
                d.insert(op, value);
                self.wheres.insert(field, d);
            }
        }
    }

    /// Appends one alternative to the `$or` list, creating it on first use.
    pub(crate) fn push_or(&mut self, alternative: Document) {
        match self.wheres.get_mut("$or") {
            Some(Bson::Array(arr)) => arr.push(Bson::Document(alternative)),
            _ => {
                self.wheres.insert("$or", vec![Bson::Document(alternative)]);
            }
        }
    }

    /// Merges `field -> operand` into the named update-operator bucket;
    /// later calls win per field.
    pub(crate) fn update_operator(&mut self, op: &str, field: &str, value: Bson) {
        match self.updates.get_mut(op) {
            Some(Bson::Document(d)) => {
                d.insert(field, value);
            }
            _ => {
                let mut d = Document::new();
                d.insert(field, value);
                self.updates.insert(op, d);
            }
        }
    }

    /// Detaches the read half, leaving it empty. The explicit reset step:
    /// every read terminal calls this exactly once, before any driver I/O,
    /// so state never leaks into the next chain even when the call fails.
    pub(crate) fn take_query(&mut self) -> QueryParts {
        QueryParts {
            selects: std::mem::take(&mut self.selects),
            wheres: std::mem::take(&mut self.wheres),
            sorts: std::mem::take(&mut self.sorts),
            limit: self.limit.take(),
            offset: self.offset.take(),
        }
    }

    /// Detaches the accumulated update operators, leaving them empty.
    pub(crate) fn take_updates(&mut self) -> Document {
        std::mem::take(&mut self.updates)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.selects.is_empty()
            && self.wheres.is_empty()
            && self.sorts.is_empty()
            && self.updates.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn sort_order_coercions() {
        assert_eq!(SortOrder::from(-1), SortOrder::Desc);
        assert_eq!(SortOrder::from(1), SortOrder::Asc);
        assert_eq!(SortOrder::from(false), SortOrder::Desc);
        assert_eq!(SortOrder::from("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::from("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::from("anything"), SortOrder::Asc);
    }

    #[test]
    fn operators_accumulate_per_field() {
        let mut st = QueryState::default();
        st.where_operator("age", "$gte", 18.into());
        st.where_operator("age", "$lte", 65.into());
        assert_eq!(st.wheres, doc! {"age": {"$gte": 18, "$lte": 65}});
    }

    #[test]
    fn operator_replaces_prior_literal() {
        let mut st = QueryState::default();
        st.wheres.insert("age", 30);
        st.where_operator("age", "$gt", 10.into());
        assert_eq!(st.wheres, doc! {"age": {"$gt": 10}});
    }

    #[test]
    fn or_list_keeps_insertion_order() {
        let mut st = QueryState::default();
        st.push_or(doc! {"a": 1});
        st.push_or(doc! {"b": 2});
        assert_eq!(st.wheres, doc! {"$or": [{"a": 1}, {"b": 2}]});
    }

    #[test]
    fn take_query_resets_read_half_only() {
        let mut st = QueryState::default();
        st.wheres.insert("a", 1);
        st.sorts.insert("a", 1);
        st.limit = Some(5);
        st.update_operator("$set", "b", 2.into());

        let parts = st.take_query();
        assert_eq!(parts.wheres, doc! {"a": 1});
        assert_eq!(parts.limit, Some(5));
        assert!(st.wheres.is_empty());
        assert!(st.sorts.is_empty());
        assert!(st.limit.is_none());
        // update half untouched
        assert_eq!(st.updates, doc! {"$set": {"b": 2}});
        assert_eq!(st.take_updates(), doc! {"$set": {"b": 2}});
        assert!(st.is_empty());
    }
}
