//! # mongofluent
//!
//! A fluent query-builder facade for MongoDB. Filters, projections, sorts
//! and update operators accumulate on a [`MongoDb`] handle through chained
//! calls, then a terminal operation (`get`, `update`, `delete`, ...) hands
//! the accumulated documents to a pluggable driver backend and resets the
//! builder for the next query.
//!
//! ```no_run
//! use bson::doc;
//! use mongofluent::{Config, MemoryConnector, MongoDb};
//!
//! # fn main() -> Result<(), mongofluent::Error> {
//! let connector = MemoryConnector::shared();
//! let mut db = MongoDb::connect(&Config::new("localhost", "app"), &connector)?;
//!
//! db.insert("people", doc! {"name": "john", "age": 30})?;
//!
//! let people = db
//!     .where_eq("name", "john")
//!     .where_gte("age", 18)
//!     .order_by("age", "desc")
//!     .get("people", None, None)?
//!     .result()?;
//! assert_eq!(people.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! The driver surface is a set of object-safe traits (see [`driver`]), with
//! [`MemoryConnector`] as the in-process reference backend.

mod admin;
mod config;
mod cursor;
mod driver;
mod errors;
pub mod logger;
mod memory;
mod query;
mod trace;

use bson::Bson;

pub use config::{Config, ReturnShape};
pub use cursor::ResultCursor;
pub use driver::{
    ClientHandle, CollectionHandle, Connector, DatabaseHandle, DriverCursor, RemoveOptions,
    UpdateOptions, WriteOptions,
};
pub use errors::Error;
pub use memory::MemoryConnector;
pub use query::{QueryParts, QueryState, SortOrder};
pub use trace::TraceEntry;

/// Connection attempts before `connect` gives up.
const CONNECT_ATTEMPTS: u32 = 6;

/// A connected database handle carrying the query builder.
///
/// All accumulator methods return `&mut Self` and are intended to be
/// chained; terminal operations consume the accumulated state. State never
/// leaks across terminals: each terminal detaches the relevant half of the
/// builder before it talks to the driver, whatever the outcome.
pub struct MongoDb {
    pub(crate) client: Box<dyn ClientHandle>,
    pub(crate) db: Box<dyn DatabaseHandle>,
    pub(crate) dbname: String,
    pub(crate) write_concern: i32,
    pub(crate) state: QueryState,
    pub(crate) inserted_id: Option<Bson>,
    pub(crate) debug: bool,
    pub(crate) trace: Vec<TraceEntry>,
}

impl std::fmt::Debug for MongoDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoDb")
            .field("dbname", &self.dbname)
            .field("write_concern", &self.write_concern)
            .field("state", &self.state)
            .field("inserted_id", &self.inserted_id)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl MongoDb {
    /// Connects through `connector` using the URI rendered from `config`.
    ///
    /// Transient connection failures are retried up to [`CONNECT_ATTEMPTS`]
    /// times back to back; the final failure surfaces as
    /// [`Error::Connection`].
    pub fn connect(config: &Config, connector: &dyn Connector) -> Result<Self, Error> {
        let uri = config.connection_uri()?;
        let mut last = String::new();
        let mut client = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match connector.connect(&uri, &config.options) {
                Ok(c) => {
                    client = Some(c);
                    break;
                }
                Err(e) => {
                    last = e.to_string();
                    log::warn!("connect attempt {attempt}/{CONNECT_ATTEMPTS} failed: {last}");
                }
            }
        }
        let client = client.ok_or(Error::Connection(last))?;
        let dbname = config.db.trim().to_string();
        let db = client.database(&dbname);
        log::info!("connected to database {dbname}");
        Ok(MongoDb {
            client,
            db,
            dbname,
            write_concern: config.write_concern,
            state: QueryState::default(),
            inserted_id: None,
            debug: false,
            trace: Vec::new(),
        })
    }

    /// Name of the currently selected database.
    pub fn db_name(&self) -> &str {
        &self.dbname
    }

    /// Toggles query tracing. While enabled, terminal operations append a
    /// rendered form of each executed query to the trace.
    pub fn set_debug(&mut self, enabled: bool) -> &mut Self {
        self.debug = enabled;
        self
    }

    /// Entries recorded since tracing was enabled or last cleared.
    pub fn debug_trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn clear_debug(&mut self) {
        self.trace.clear();
    }
}
