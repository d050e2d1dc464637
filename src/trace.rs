use serde::{Deserialize, Serialize};

/// One debug-trace record, appended per terminal operation while debug
/// mode is active. The trace is owned by the facade and grows until
/// [`crate::MongoDb::clear_debug`] is called.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Short label including the elapsed time, e.g. `MongoQuery (0.000012)`.
    pub label: String,
    /// Rendered pseudo-SQL text of the executed query.
    pub query: String,
    /// Wall-clock seconds spent in the terminal operation.
    pub elapsed_secs: f64,
}

impl TraceEntry {
    pub(crate) fn new(query: String, elapsed_secs: f64) -> Self {
        Self { label: format!("MongoQuery ({elapsed_secs:.6})"), query, elapsed_secs }
    }
}
