//! Query building: accumulated state, filter and update accumulators,
//! terminal operations, and text-pattern transliteration.

mod exec;
mod filters;
mod state;
mod translit;
mod updates;

pub use state::{QueryParts, QueryState, SortOrder};
