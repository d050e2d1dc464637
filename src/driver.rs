//! Contract between the builder facade and the underlying database driver.
//!
//! The facade never touches the wire; everything below `find`/`insert`/
//! `update`/`remove`/`distinct`/`aggregate`/`command` is the driver's
//! problem. Any driver exposing these traits can sit behind the facade;
//! the crate ships [`crate::memory::MemoryConnector`] as the in-process
//! reference implementation.

use bson::{Bson, Document};

use crate::errors::Error;

/// Write acknowledgement options threaded into every write call.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Write concern level; 0 requests no acknowledgement.
    pub w: i32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    pub w: i32,
    /// Apply the mutation to every matched document, not just the first.
    pub multiple: bool,
    pub upsert: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    pub w: i32,
    pub just_one: bool,
}

/// Establishes client handles from a rendered connection URI.
pub trait Connector {
    fn connect(&self, uri: &str, options: &Document) -> Result<Box<dyn ClientHandle>, Error>;
}

/// A connected client; selects databases by name.
pub trait ClientHandle {
    fn database(&self, name: &str) -> Box<dyn DatabaseHandle>;
}

/// A selected database.
pub trait DatabaseHandle {
    fn collection(&self, name: &str) -> Box<dyn CollectionHandle>;

    /// Runs an administrative command verbatim. `socket_timeout_ms` is the
    /// only timeout the facade ever sets explicitly.
    fn run_command(
        &self,
        cmd: Document,
        socket_timeout_ms: Option<i64>,
    ) -> Result<Document, Error>;

    fn drop_database(&self) -> Result<(), Error>;
}

/// A selected collection. Filter/projection/update documents arrive in the
/// exact shape the builder accumulated them; the driver must not reorder
/// or rewrite them.
pub trait CollectionHandle {
    fn find(&self, filter: Document, projection: Document) -> Result<Box<dyn DriverCursor>, Error>;

    /// Inserts one document; returns the identifier the document carried or
    /// was assigned, when the driver reports one.
    fn insert(&self, doc: Document, opts: &WriteOptions) -> Result<Option<Bson>, Error>;

    fn insert_batch(&self, docs: Vec<Document>, opts: &WriteOptions) -> Result<(), Error>;

    /// Returns the number of documents matched by `filter`.
    fn update(
        &self,
        filter: &Document,
        update: &Document,
        opts: &UpdateOptions,
    ) -> Result<u64, Error>;

    /// Returns the number of documents removed.
    fn remove(&self, filter: &Document, opts: &RemoveOptions) -> Result<u64, Error>;

    fn distinct(&self, field: &str, filter: &Document) -> Result<Vec<Bson>, Error>;

    fn aggregate(&self, pipeline: &[Document]) -> Result<Vec<Document>, Error>;

    fn create_index(&self, keys: Document, options: Document) -> Result<(), Error>;

    fn delete_index(&self, keys: Document) -> Result<(), Error>;

    fn delete_indexes(&self) -> Result<(), Error>;

    fn index_info(&self) -> Result<Vec<Document>, Error>;

    fn drop_collection(&self) -> Result<(), Error>;
}

/// A lazy result stream over matched documents.
pub trait DriverCursor {
    /// Yields the next document, or an iteration fault.
    fn advance(&mut self) -> Option<Result<Document, Error>>;

    /// Counts matched documents. With `found_only` the currently applied
    /// skip/limit window is honored; without it the full match count is
    /// returned.
    fn count(&mut self, found_only: bool) -> Result<u64, Error>;

    fn skip(&mut self, n: u64);

    fn limit(&mut self, n: u64);

    fn sort(&mut self, spec: Document);

    /// Restarts iteration from the first matched document.
    fn rewind(&mut self);

    fn explain(&self) -> Result<Document, Error>;
}
