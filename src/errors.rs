use thiserror::Error;

/// Error taxonomy for the builder facade.
///
/// Usage errors (missing collection, empty payload) fail before any driver
/// call; driver-operation errors wrap the driver's message and keep a
/// distinct numeric code per operation, matching the codes callers already
/// dispatch on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to connect to MongoDB: {0}")]
    Connection(String),

    #[error("A collection name must be specified")]
    MissingCollection,

    #[error("No values specified or not a document of values")]
    EmptyPayload,

    #[error("Insert of data failed: {0}")]
    Insert(String),

    #[error("Batch insert of data failed: {0}")]
    InsertBatch(String),

    #[error("Nothing to update: no update operators accumulated")]
    NothingToUpdate,

    #[error("Update of data failed: {0}")]
    Update(String),

    #[error("Delete of data failed: {0}")]
    Delete(String),

    #[error("Command failed to execute: {0}")]
    Command(String),

    #[error("Aggregation failed: {0}")]
    Aggregate(String),

    #[error("Index operation failed: {0}")]
    Index(String),

    #[error("Index keys must be specified")]
    MissingIndexKeys,

    #[error("To switch databases, a new database name must be specified")]
    MissingSwitchDatabase,

    #[error("Unable to switch databases: {0}")]
    SwitchDatabase(String),

    #[error("Failed to drop database because name is empty")]
    MissingDropDatabase,

    #[error("Unable to drop database: {0}")]
    DropDatabase(String),

    #[error("Failed to drop collection because a name is empty")]
    MissingDropCollection,

    #[error("Unable to drop collection: {0}")]
    DropCollection(String),

    #[error("The host must be set to connect")]
    MissingHost,

    #[error("The database must be set to connect")]
    MissingDatabase,

    #[error("A valid database reference must be passed")]
    InvalidDbRef,

    #[error("Cursor iteration failed: {0}")]
    Cursor(String),

    #[error("Driver error: {0}")]
    Driver(String),
}

impl Error {
    /// Numeric code carried by each error category; kept stable so callers
    /// that dispatch on codes keep working across driver swaps.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Error::Connection(_) => 1000,
            Error::MissingCollection => 1001,
            Error::EmptyPayload => 1002,
            Error::Insert(_) => 1003,
            Error::InsertBatch(_) => 1005,
            Error::NothingToUpdate => 1008,
            Error::Update(_) => 1009,
            Error::Delete(_) => 1012,
            Error::MissingSwitchDatabase => 1022,
            Error::SwitchDatabase(_) => 1023,
            Error::MissingDropDatabase => 1024,
            Error::DropDatabase(_) => 1025,
            Error::MissingDropCollection => 1026,
            Error::DropCollection(_) => 1028,
            Error::MissingHost => 1029,
            Error::MissingDatabase => 1030,
            Error::Command(_)
            | Error::Aggregate(_)
            | Error::Index(_)
            | Error::MissingIndexKeys
            | Error::InvalidDbRef
            | Error::Cursor(_)
            | Error::Driver(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::Connection("boom".into()).code(), 1000);
        assert_eq!(Error::MissingCollection.code(), 1001);
        assert_eq!(Error::EmptyPayload.code(), 1002);
        assert_eq!(Error::NothingToUpdate.code(), 1008);
        assert_eq!(Error::Delete("x".into()).code(), 1012);
        assert_eq!(Error::Command("x".into()).code(), 500);
    }

    #[test]
    fn messages_carry_driver_detail() {
        let e = Error::Insert("duplicate key".into());
        assert!(e.to_string().contains("duplicate key"));
    }
}
