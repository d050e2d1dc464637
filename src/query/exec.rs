use std::time::Instant;

use bson::{Bson, Document};

use crate::MongoDb;
use crate::cursor::ResultCursor;
use crate::driver::{RemoveOptions, UpdateOptions, WriteOptions};
use crate::errors::Error;
use crate::trace::TraceEntry;

/// Terminal operations. Every one of them detaches the half of the builder
/// state it consumes before touching the driver, so a failed call can
/// never leak filters into the next chain. `distinct`, `insert`,
/// `aggregate` and `command` are the exceptions: they neither consume nor
/// clear filter state (`distinct` reads it without clearing).
impl MongoDb {
    /// Runs `find` with the accumulated filters/projections, applies sorts
    /// and the limit/offset window, and returns the wrapped cursor.
    /// Explicit `limit`/`offset` arguments override accumulated state.
    pub fn get(
        &mut self,
        collection: &str,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<ResultCursor, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        let start = Instant::now();
        let parts = self.state.take_query();
        let limit = limit.or(parts.limit);
        let offset = offset.or(parts.offset);

        let rendered = self.debug.then(|| {
            render_select(&parts.selects, collection, &parts.wheres, &parts.sorts, limit, offset)
        });

        log::debug!("get: collection={collection} filter={:?}", parts.wheres);
        let mut raw =
            self.db.collection(collection).find(parts.wheres, parts.selects)?;
        if let Some(n) = limit {
            raw.limit(n);
        }
        if let Some(n) = offset {
            raw.skip(n);
        }
        if !parts.sorts.is_empty() {
            raw.sort(parts.sorts);
        }

        if let Some(query) = rendered {
            self.push_trace(query, start);
        }
        Ok(ResultCursor::new(raw))
    }

    /// `where_doc` followed by `get`.
    pub fn get_where(
        &mut self,
        collection: &str,
        wheres: Document,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<ResultCursor, Error> {
        self.where_doc(wheres).get(collection, limit, offset)
    }

    /// Counts every document in the collection, ignoring accumulated
    /// filters. Accumulated state is still cleared.
    pub fn count_all(&mut self, collection: &str) -> Result<u64, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        let _ = self.state.take_query();
        let mut raw =
            self.db.collection(collection).find(Document::new(), Document::new())?;
        raw.count(true)
    }

    /// Counts documents matching the accumulated filters, honoring the
    /// limit/offset window.
    pub fn count_all_results(&mut self, collection: &str) -> Result<u64, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        let parts = self.state.take_query();
        let mut raw =
            self.db.collection(collection).find(parts.wheres, Document::new())?;
        if let Some(n) = parts.limit {
            raw.limit(n);
        }
        if let Some(n) = parts.offset {
            raw.skip(n);
        }
        raw.count(true)
    }

    /// Distinct values of `field` among documents matching the current
    /// filters. Reads filter state but does not clear it.
    pub fn distinct(&mut self, collection: &str, field: &str) -> Result<Vec<Bson>, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        let start = Instant::now();
        let rendered = self.debug.then(|| {
            format!(
                "SELECT DISTINCT {field} FROM {collection} WHERE {}",
                render_json(&self.state.wheres)
            )
        });
        let result = self.db.collection(collection).distinct(field, &self.state.wheres)?;
        if let Some(query) = rendered {
            self.push_trace(query, start);
        }
        Ok(result)
    }

    /// Writes one document. Returns `Ok(true)` iff the document carried or
    /// was assigned an identifier; the identifier is retained and
    /// retrievable through [`MongoDb::insert_id`].
    pub fn insert(&mut self, collection: &str, doc: Document) -> Result<bool, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        if doc.is_empty() {
            return Err(Error::EmptyPayload);
        }
        self.inserted_id = None;
        let opts = WriteOptions { w: self.write_concern };
        let id = self
            .db
            .collection(collection)
            .insert(doc, &opts)
            .map_err(|e| Error::Insert(e.to_string()))?;
        self.inserted_id = id;
        Ok(self.inserted_id.is_some())
    }

    /// Writes many documents; `Ok(true)` iff the driver reported no error.
    pub fn insert_batch(&mut self, collection: &str, docs: Vec<Document>) -> Result<bool, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        if docs.is_empty() {
            return Err(Error::EmptyPayload);
        }
        let opts = WriteOptions { w: self.write_concern };
        self.db
            .collection(collection)
            .insert_batch(docs, &opts)
            .map_err(|e| Error::InsertBatch(e.to_string()))?;
        Ok(true)
    }

    /// Applies the accumulated filters as match criteria and the
    /// accumulated update operators as the mutation; a non-empty `data`
    /// document is folded into `$set` first (accumulated `$set` entries
    /// win per field). Fails with code 1008 when no operator remains.
    pub fn update(&mut self, collection: &str, data: Document) -> Result<bool, Error> {
        let opts = UpdateOptions { w: self.write_concern, multiple: false, upsert: false };
        self.update_with(collection, data, opts)
    }

    /// `update` with `multiple = true` forced.
    pub fn update_batch(&mut self, collection: &str, data: Document) -> Result<bool, Error> {
        let opts = UpdateOptions { w: self.write_concern, multiple: true, upsert: false };
        self.update_with(collection, data, opts)
    }

    pub fn update_with(
        &mut self,
        collection: &str,
        data: Document,
        options: UpdateOptions,
    ) -> Result<bool, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        let start = Instant::now();
        for (field, value) in data {
            if !update_bucket_has(&self.state.updates, "$set", &field) {
                self.state.update_operator("$set", &field, value);
            }
        }
        let updates = self.state.take_updates();
        let parts = self.state.take_query();
        if updates.is_empty() {
            return Err(Error::NothingToUpdate);
        }
        let rendered = self.debug.then(|| {
            format!(
                "UPDATE {collection} SET {} WHERE {}",
                render_json(&updates),
                render_json(&parts.wheres)
            )
        });
        log::debug!("update: collection={collection} multiple={}", options.multiple);
        self.db
            .collection(collection)
            .update(&parts.wheres, &updates, &options)
            .map_err(|e| Error::Update(e.to_string()))?;
        if let Some(query) = rendered {
            self.push_trace(query, start);
        }
        Ok(true)
    }

    /// Removes documents matching the accumulated filters.
    pub fn delete(&mut self, collection: &str) -> Result<bool, Error> {
        let opts = RemoveOptions { w: self.write_concern, just_one: false };
        self.delete_with(collection, opts)
    }

    /// `delete` with `just_one = false` forced.
    pub fn delete_batch(&mut self, collection: &str) -> Result<bool, Error> {
        let opts = RemoveOptions { w: self.write_concern, just_one: false };
        self.delete_with(collection, opts)
    }

    pub fn delete_with(&mut self, collection: &str, options: RemoveOptions) -> Result<bool, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        let start = Instant::now();
        let parts = self.state.take_query();
        let rendered = self
            .debug
            .then(|| format!("DELETE FROM {collection} WHERE {}", render_json(&parts.wheres)));
        log::debug!("delete: collection={collection} just_one={}", options.just_one);
        self.db
            .collection(collection)
            .remove(&parts.wheres, &options)
            .map_err(|e| Error::Delete(e.to_string()))?;
        if let Some(query) = rendered {
            self.push_trace(query, start);
        }
        Ok(true)
    }

    /// Runs an aggregation pipeline verbatim. Does not touch filter state.
    pub fn aggregate(
        &mut self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        self.db
            .collection(collection)
            .aggregate(&pipeline)
            .map_err(|e| Error::Aggregate(e.to_string()))
    }

    /// Runs an administrative command verbatim against the database.
    pub fn command(&mut self, cmd: Document) -> Result<Document, Error> {
        self.db.run_command(cmd, None).map_err(|e| Error::Command(e.to_string()))
    }

    /// Identifier of the last inserted document, if any.
    #[must_use]
    pub fn insert_id(&self) -> Option<&Bson> {
        self.inserted_id.as_ref()
    }

    fn push_trace(&mut self, query: String, start: Instant) {
        let elapsed = start.elapsed().as_secs_f64();
        self.trace.push(TraceEntry::new(query, elapsed));
    }
}

fn update_bucket_has(updates: &Document, op: &str, field: &str) -> bool {
    matches!(updates.get(op), Some(Bson::Document(d)) if d.contains_key(field))
}

fn render_json(doc: &Document) -> String {
    serde_json::to_string(doc).unwrap_or_else(|_| "{}".to_string())
}

fn render_select(
    selects: &Document,
    collection: &str,
    wheres: &Document,
    sorts: &Document,
    limit: Option<u64>,
    offset: Option<u64>,
) -> String {
    let cols = if selects.is_empty() {
        "*".to_string()
    } else {
        selects.keys().map(String::as_str).collect::<Vec<_>>().join(",")
    };
    let mut out = format!(
        "SELECT {cols} FROM {collection} WHERE {} ORDER BY {}",
        render_json(wheres),
        render_json(sorts)
    );
    if let Some(n) = limit {
        out.push_str(&format!(" LIMIT {n}"));
    }
    if let Some(n) = offset {
        out.push_str(&format!(" OFFSET {n}"));
    }
    out
}
