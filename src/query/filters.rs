use bson::{Bson, Document, doc};

use crate::MongoDb;
use crate::query::state::SortOrder;
use crate::query::translit::build_like_pattern;

/// Filter, projection, sort and window accumulators. Each merges into the
/// builder's state and returns `&mut Self` for chaining; nothing here
/// touches the driver.
impl MongoDb {
    /// Adds projected fields. `_id` is always returned by the driver.
    pub fn select<I, S>(&mut self, includes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in includes {
            self.state.selects.insert(field.as_ref(), true);
        }
        self
    }

    /// Equality constraint on one field, AND-combined with existing entries.
    pub fn where_eq(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.wheres.insert(field, value.into());
        self
    }

    /// Merges every entry of `wheres` as an AND-combined constraint.
    pub fn where_doc(&mut self, wheres: Document) -> &mut Self {
        for (field, value) in wheres {
            self.state.wheres.insert(field, value);
        }
        self
    }

    /// Replaces the accumulated filter wholesale with a document already
    /// shaped the way the driver expects.
    pub fn where_native(&mut self, wheres: Document) -> &mut Self {
        self.state.wheres = wheres;
        self
    }

    /// Appends each entry as a separate `$or` alternative.
    pub fn or_where(&mut self, wheres: Document) -> &mut Self {
        for (field, value) in wheres {
            let mut alt = Document::new();
            alt.insert(field, value);
            self.state.push_or(alt);
        }
        self
    }

    pub fn where_in(&mut self, field: &str, values: Vec<Bson>) -> &mut Self {
        self.state.where_operator(field, "$in", Bson::Array(values));
        self
    }

    pub fn where_not_in(&mut self, field: &str, values: Vec<Bson>) -> &mut Self {
        self.state.where_operator(field, "$nin", Bson::Array(values));
        self
    }

    pub fn where_gt(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.where_operator(field, "$gt", value.into());
        self
    }

    pub fn where_gte(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.where_operator(field, "$gte", value.into());
        self
    }

    pub fn where_lt(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.where_operator(field, "$lt", value.into());
        self
    }

    pub fn where_lte(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.where_operator(field, "$lte", value.into());
        self
    }

    pub fn where_ne(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.where_operator(field, "$ne", value.into());
        self
    }

    /// Inclusive range: `$gte lo` and `$lte hi` under one field key.
    pub fn where_between(
        &mut self,
        field: &str,
        lo: impl Into<Bson>,
        hi: impl Into<Bson>,
    ) -> &mut Self {
        self.state.where_operator(field, "$gte", lo.into());
        self.state.where_operator(field, "$lte", hi.into());
        self
    }

    /// Exclusive range: `$gt lo` and `$lt hi`.
    pub fn where_between_ne(
        &mut self,
        field: &str,
        lo: impl Into<Bson>,
        hi: impl Into<Bson>,
    ) -> &mut Self {
        self.state.where_operator(field, "$gt", lo.into());
        self.state.where_operator(field, "$lt", hi.into());
        self
    }

    /// Proximity constraint; the collection needs a geospatial index.
    pub fn where_near(&mut self, field: &str, coordinates: Vec<f64>) -> &mut Self {
        let coords: Vec<Bson> = coordinates.into_iter().map(Bson::from).collect();
        self.state.where_operator(field, "$near", Bson::Array(coords));
        self
    }

    /// Accent-insensitive substring match. The literal `value` is escaped,
    /// folded and expanded (see the translit module), optionally anchored,
    /// and stored as a `$regex` constraint with `flags` (default `"i"` via
    /// [`MongoDb::like_ci`]).
    pub fn like(
        &mut self,
        field: &str,
        value: &str,
        flags: &str,
        anchor_start: bool,
        anchor_end: bool,
    ) -> &mut Self {
        let mut pattern = build_like_pattern(value);
        if anchor_start {
            pattern.insert(0, '^');
        }
        if anchor_end {
            pattern.push('$');
        }
        let field = field.trim();
        self.state.where_operator(field, "$regex", Bson::String(pattern));
        self.state.where_operator(field, "$options", Bson::String(flags.to_string()));
        self
    }

    /// `like` with the default case-insensitive flags and no anchors.
    pub fn like_ci(&mut self, field: &str, value: &str) -> &mut Self {
        self.like(field, value, "i", false, false)
    }

    /// One `$or` alternative per pattern, each built like `like`.
    pub fn or_like<I, S>(&mut self, field: &str, values: I, flags: &str) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for value in values {
            let pattern = build_like_pattern(value.as_ref());
            let mut alt = Document::new();
            alt.insert(field, doc! { "$regex": pattern, "$options": flags });
            self.state.push_or(alt);
        }
        self
    }

    /// Excludes documents matching any of the patterns (`$nin` of regexes).
    pub fn not_like<I, S>(&mut self, field: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut regexes: Vec<Bson> = match self.state.wheres.get(field) {
            Some(Bson::Document(d)) => match d.get("$nin") {
                Some(Bson::Array(existing)) => existing.clone(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        for value in values {
            let pattern = build_like_pattern(value.as_ref());
            regexes.push(Bson::Document(doc! { "$regex": pattern }));
        }
        self.state.where_operator(field, "$nin", Bson::Array(regexes));
        self
    }

    /// Appends one sort key; earlier calls take tie-break precedence.
    pub fn order_by(&mut self, field: &str, order: impl Into<SortOrder>) -> &mut Self {
        self.state.sorts.insert(field, order.into().as_i32());
        self
    }

    /// Caps the number of returned documents.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.state.limit = Some(limit);
        self
    }

    /// Skips the first `offset` matched documents.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.state.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::MongoDb;
    use crate::memory::MemoryConnector;
    use bson::doc;

    fn db() -> MongoDb {
        MongoDb::connect(
            &crate::Config::new("localhost", "unit"),
            &MemoryConnector::shared(),
        )
        .unwrap()
    }

    #[test]
    fn where_doc_merges_disjoint_fields() {
        let mut a = db();
        a.where_doc(doc! {"a": 1}).where_doc(doc! {"b": 2});
        let mut b = db();
        b.where_doc(doc! {"a": 1, "b": 2});
        assert_eq!(a.state.wheres, b.state.wheres);
    }

    #[test]
    fn between_shapes() {
        let mut m = db();
        m.where_between("age", 18, 65);
        assert_eq!(m.state.wheres, doc! {"age": {"$gte": 18, "$lte": 65}});

        let mut m = db();
        m.where_between_ne("age", 18, 65);
        assert_eq!(m.state.wheres, doc! {"age": {"$gt": 18, "$lt": 65}});
    }

    #[test]
    fn where_native_replaces_everything() {
        let mut m = db();
        m.where_eq("a", 1).where_native(doc! {"b": {"$gt": 2}});
        assert_eq!(m.state.wheres, doc! {"b": {"$gt": 2}});
    }

    #[test]
    fn or_where_appends_alternatives() {
        let mut m = db();
        m.or_where(doc! {"user": "arny"}).or_where(doc! {"age": {"$gt": 30}});
        assert_eq!(
            m.state.wheres,
            doc! {"$or": [{"user": "arny"}, {"age": {"$gt": 30}}]}
        );
    }

    #[test]
    fn like_escapes_metacharacters() {
        let mut m = db();
        m.like("name", "a.b", "i", false, false);
        let field = m.state.wheres.get_document("name").unwrap();
        let pattern = field.get_str("$regex").unwrap();
        assert!(pattern.contains("\\."));
        assert_eq!(field.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn like_anchors() {
        let mut m = db();
        m.like("name", "jo", "i", true, true);
        let pattern =
            m.state.wheres.get_document("name").unwrap().get_str("$regex").unwrap().to_string();
        assert!(pattern.starts_with('^'));
        assert!(pattern.ends_with('$'));
    }

    #[test]
    fn not_like_accumulates_nin_regexes() {
        let mut m = db();
        m.not_like("name", ["foo"]).not_like("name", ["bar"]);
        let nin = m.state.wheres.get_document("name").unwrap().get_array("$nin").unwrap();
        assert_eq!(nin.len(), 2);
    }

    #[test]
    fn order_by_preserves_insertion_order() {
        let mut m = db();
        m.order_by("name", "desc").order_by("age", "asc");
        let keys: Vec<&str> = m.state.sorts.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "age"]);
        assert_eq!(m.state.sorts.get_i32("name").unwrap(), -1);
        assert_eq!(m.state.sorts.get_i32("age").unwrap(), 1);
    }
}
