//! In-memory driver backend.
//!
//! A complete implementation of the driver contract over process-local
//! storage, suitable for tests and embedded use. Documents live in
//! insertion order per collection; databases on the same connector share
//! one store, so handles opened through separate `connect` calls observe
//! each other's writes.

mod eval;
mod update;

use std::sync::Arc;

use bson::{Bson, Document, doc, oid::ObjectId};
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::driver::{
    ClientHandle, CollectionHandle, Connector, DatabaseHandle, DriverCursor, RemoveOptions,
    UpdateOptions, WriteOptions,
};
use crate::errors::Error;

use eval::{compare_docs, eval_filter, get_path, project_fields};
use update::apply_update;

#[derive(Default)]
struct CollStore {
    docs: Vec<Document>,
    indexes: Vec<Document>,
}

type DbStore = BTreeMap<String, CollStore>;
type Store = Arc<RwLock<BTreeMap<String, DbStore>>>;

/// Connector producing clients over a shared in-process store.
pub struct MemoryConnector {
    store: Store,
}

impl MemoryConnector {
    /// A connector with a fresh, empty store. Every client connected
    /// through it shares the same data.
    pub fn shared() -> Self {
        MemoryConnector { store: Arc::new(RwLock::new(BTreeMap::new())) }
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, _uri: &str, _options: &Document) -> Result<Box<dyn ClientHandle>, Error> {
        Ok(Box::new(MemoryClient { store: Arc::clone(&self.store) }))
    }
}

struct MemoryClient {
    store: Store,
}

impl ClientHandle for MemoryClient {
    fn database(&self, name: &str) -> Box<dyn DatabaseHandle> {
        Box::new(MemoryDatabase { store: Arc::clone(&self.store), name: name.to_string() })
    }
}

struct MemoryDatabase {
    store: Store,
    name: String,
}

impl DatabaseHandle for MemoryDatabase {
    fn collection(&self, name: &str) -> Box<dyn CollectionHandle> {
        Box::new(MemoryCollection {
            store: Arc::clone(&self.store),
            db: self.name.clone(),
            name: name.to_string(),
        })
    }

    fn run_command(
        &self,
        cmd: Document,
        _socket_timeout_ms: Option<i64>,
    ) -> Result<Document, Error> {
        if cmd.is_empty() {
            return Err(Error::Command("empty command document".into()));
        }
        // commands are acknowledged, not interpreted
        Ok(doc! {"ok": 1})
    }

    fn drop_database(&self) -> Result<(), Error> {
        self.store.write().remove(&self.name);
        Ok(())
    }
}

struct MemoryCollection {
    store: Store,
    db: String,
    name: String,
}

impl MemoryCollection {
    fn with_coll<R>(&self, f: impl FnOnce(&mut CollStore) -> R) -> R {
        let mut store = self.store.write();
        let db = store.entry(self.db.clone()).or_default();
        let coll = db.entry(self.name.clone()).or_default();
        f(coll)
    }
}

impl CollectionHandle for MemoryCollection {
    fn find(&self, filter: Document, projection: Document) -> Result<Box<dyn DriverCursor>, Error> {
        let matched = self.with_coll(|coll| {
            coll.docs
                .iter()
                .filter(|d| eval_filter(d, &filter))
                .map(|d| project_fields(d, &projection))
                .collect::<Vec<_>>()
        });
        Ok(Box::new(MemoryCursor::new(matched)))
    }

    fn insert(&self, mut doc: Document, _opts: &WriteOptions) -> Result<Option<Bson>, Error> {
        if !doc.contains_key("_id") {
            doc.insert("_id", ObjectId::new());
        }
        let id = doc.get("_id").cloned();
        self.with_coll(|coll| {
            if coll.docs.iter().any(|d| d.get("_id") == id.as_ref()) {
                return Err(Error::Driver(format!(
                    "duplicate key in {}.{}: {:?}",
                    self.db, self.name, id
                )));
            }
            coll.docs.push(doc);
            Ok(())
        })?;
        Ok(id)
    }

    fn insert_batch(&self, docs: Vec<Document>, opts: &WriteOptions) -> Result<(), Error> {
        for doc in docs {
            self.insert(doc, opts)?;
        }
        Ok(())
    }

    fn update(
        &self,
        filter: &Document,
        update: &Document,
        opts: &UpdateOptions,
    ) -> Result<u64, Error> {
        self.with_coll(|coll| {
            let mut touched = 0u64;
            for doc in coll.docs.iter_mut() {
                if !eval_filter(doc, filter) {
                    continue;
                }
                apply_update(doc, update);
                touched += 1;
                if !opts.multiple {
                    break;
                }
            }
            if touched == 0 && opts.upsert {
                let mut fresh = Document::new();
                for (k, v) in filter.iter() {
                    // only literal equality terms seed the upserted doc
                    if !k.starts_with('$') && !matches!(v, Bson::Document(_)) {
                        fresh.insert(k.clone(), v.clone());
                    }
                }
                apply_update(&mut fresh, update);
                if !fresh.contains_key("_id") {
                    fresh.insert("_id", ObjectId::new());
                }
                coll.docs.push(fresh);
                touched = 1;
            }
            Ok(touched)
        })
    }

    fn remove(&self, filter: &Document, opts: &RemoveOptions) -> Result<u64, Error> {
        self.with_coll(|coll| {
            let before = coll.docs.len();
            if opts.just_one {
                if let Some(pos) = coll.docs.iter().position(|d| eval_filter(d, filter)) {
                    coll.docs.remove(pos);
                }
            } else {
                coll.docs.retain(|d| !eval_filter(d, filter));
            }
            Ok((before - coll.docs.len()) as u64)
        })
    }

    fn distinct(&self, field: &str, filter: &Document) -> Result<Vec<Bson>, Error> {
        self.with_coll(|coll| {
            let mut values = Vec::new();
            for doc in coll.docs.iter().filter(|d| eval_filter(d, filter)) {
                if let Some(v) = get_path(doc, field)
                    && !values.contains(v)
                {
                    values.push(v.clone());
                }
            }
            Ok(values)
        })
    }

    fn aggregate(&self, pipeline: &[Document]) -> Result<Vec<Document>, Error> {
        let mut rows = self.with_coll(|coll| coll.docs.clone());
        for stage in pipeline {
            let (name, spec) = match stage.iter().next() {
                Some(pair) => pair,
                None => continue,
            };
            match (name.as_str(), spec) {
                ("$match", Bson::Document(filter)) => {
                    rows.retain(|d| eval_filter(d, filter));
                }
                ("$project", Bson::Document(projection)) => {
                    rows = rows.iter().map(|d| project_fields(d, projection)).collect();
                }
                ("$sort", Bson::Document(sorts)) => {
                    rows.sort_by(|a, b| compare_docs(a, b, sorts));
                }
                ("$skip", n) => {
                    let n = bson_u64(n) as usize;
                    rows = rows.split_off(n.min(rows.len()));
                }
                ("$limit", n) => {
                    rows.truncate(bson_u64(n) as usize);
                }
                (other, _) => {
                    return Err(Error::Aggregate(format!("unsupported pipeline stage {other}")));
                }
            }
        }
        Ok(rows)
    }

    fn create_index(&self, keys: Document, options: Document) -> Result<(), Error> {
        let name = keys
            .iter()
            .map(|(k, v)| format!("{k}_{}", bson_i64(v)))
            .collect::<Vec<_>>()
            .join("_");
        self.with_coll(|coll| {
            coll.indexes.retain(|i| !index_key_matches(i, &keys));
            coll.indexes.push(doc! {"name": name, "key": keys, "options": options});
        });
        Ok(())
    }

    fn delete_index(&self, keys: Document) -> Result<(), Error> {
        self.with_coll(|coll| coll.indexes.retain(|i| !index_key_matches(i, &keys)));
        Ok(())
    }

    fn delete_indexes(&self) -> Result<(), Error> {
        self.with_coll(|coll| coll.indexes.clear());
        Ok(())
    }

    fn index_info(&self) -> Result<Vec<Document>, Error> {
        Ok(self.with_coll(|coll| coll.indexes.clone()))
    }

    fn drop_collection(&self) -> Result<(), Error> {
        let mut store = self.store.write();
        if let Some(db) = store.get_mut(&self.db) {
            db.remove(&self.name);
        }
        Ok(())
    }
}

fn index_key_matches(info: &Document, keys: &Document) -> bool {
    info.get_document("key").map(|d| d == keys).unwrap_or(false)
}

fn bson_u64(v: &Bson) -> u64 {
    bson_i64(v).max(0) as u64
}

fn bson_i64(v: &Bson) -> i64 {
    match v {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        Bson::Double(f) => *f as i64,
        _ => 0,
    }
}

/// Cursor over a matched snapshot. Sort, skip and limit reshape the
/// visible window before or between reads, the way server cursors allow
/// modifiers before iteration starts.
struct MemoryCursor {
    matched: Vec<Document>,
    skip: u64,
    limit: Option<u64>,
    pos: usize,
}

impl MemoryCursor {
    fn new(matched: Vec<Document>) -> Self {
        MemoryCursor { matched, skip: 0, limit: None, pos: 0 }
    }

    fn window(&self) -> (usize, usize) {
        let start = (self.skip as usize).min(self.matched.len());
        let end = match self.limit {
            Some(n) => (start + n as usize).min(self.matched.len()),
            None => self.matched.len(),
        };
        (start, end)
    }
}

impl DriverCursor for MemoryCursor {
    fn advance(&mut self) -> Option<Result<Document, Error>> {
        let (start, end) = self.window();
        let idx = start + self.pos;
        if idx >= end {
            return None;
        }
        self.pos += 1;
        Some(Ok(self.matched[idx].clone()))
    }

    fn count(&mut self, found_only: bool) -> Result<u64, Error> {
        if found_only {
            let (start, end) = self.window();
            Ok((end - start) as u64)
        } else {
            Ok(self.matched.len() as u64)
        }
    }

    fn skip(&mut self, n: u64) {
        self.skip = n;
        self.pos = 0;
    }

    fn limit(&mut self, n: u64) {
        self.limit = Some(n);
        self.pos = 0;
    }

    fn sort(&mut self, spec: Document) {
        self.matched.sort_by(|a, b| compare_docs(a, b, &spec));
        self.pos = 0;
    }

    fn rewind(&mut self) {
        self.pos = 0;
    }

    fn explain(&self) -> Result<Document, Error> {
        let (start, end) = self.window();
        Ok(doc! {
            "cursor": "BasicCursor",
            "n": (end - start) as i64,
            "nscannedObjects": self.matched.len() as i64,
        })
    }
}
