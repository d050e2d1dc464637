use bson::{Bson, Document, doc};

use crate::MongoDb;
use crate::errors::Error;
use crate::query::SortOrder;

/// Database and index administration, plus database-reference helpers.
impl MongoDb {
    /// Points the facade at another database on the same client.
    pub fn switch_db(&mut self, database: &str) -> Result<(), Error> {
        if database.is_empty() {
            return Err(Error::MissingSwitchDatabase);
        }
        self.db = self.client.database(database);
        self.dbname = database.to_string();
        Ok(())
    }

    pub fn drop_db(&mut self, database: &str) -> Result<(), Error> {
        if database.is_empty() {
            return Err(Error::MissingDropDatabase);
        }
        self.client
            .database(database)
            .drop_database()
            .map_err(|e| Error::DropDatabase(e.to_string()))
    }

    pub fn drop_collection(&mut self, database: &str, collection: &str) -> Result<(), Error> {
        if database.is_empty() || collection.is_empty() {
            return Err(Error::MissingDropCollection);
        }
        self.client
            .database(database)
            .collection(collection)
            .drop_collection()
            .map_err(|e| Error::DropCollection(e.to_string()))
    }

    /// Server-side copy of one collection into another, with an explicit
    /// socket timeout (milliseconds; -1 means no limit).
    pub fn copy_collection(
        &mut self,
        from: &str,
        to: &str,
        socket_timeout_ms: i64,
    ) -> Result<(), Error> {
        let code = format!("function(){{ db['{from}'].copyTo('{to}') }};");
        self.db
            .run_command(doc! { "eval": code }, Some(socket_timeout_ms))
            .map(|_| ())
            .map_err(|e| Error::Command(e.to_string()))
    }

    /// Server-side rename, dropping any existing target.
    pub fn rename_collection(
        &mut self,
        from: &str,
        to: &str,
        socket_timeout_ms: i64,
    ) -> Result<(), Error> {
        let code = format!("function(){{ db['{from}'].renameCollection('{to}', true) }};");
        self.db
            .run_command(doc! { "eval": code }, Some(socket_timeout_ms))
            .map(|_| ())
            .map_err(|e| Error::Command(e.to_string()))
    }

    /// Ensures an index over `keys`; directions coerce like `order_by`.
    /// Clears accumulated builder state, like every index operation.
    pub fn create_index<I, S, O>(
        &mut self,
        collection: &str,
        keys: I,
        options: Document,
    ) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = (S, O)>,
        S: AsRef<str>,
        O: Into<SortOrder>,
    {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        let keys = coerce_index_keys(keys);
        if keys.is_empty() {
            return Err(Error::MissingIndexKeys);
        }
        self.db
            .collection(collection)
            .create_index(keys, options)
            .map_err(|e| Error::Index(e.to_string()))?;
        let _ = self.state.take_query();
        Ok(self)
    }

    pub fn remove_index<I, S, O>(&mut self, collection: &str, keys: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = (S, O)>,
        S: AsRef<str>,
        O: Into<SortOrder>,
    {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        let keys = coerce_index_keys(keys);
        if keys.is_empty() {
            return Err(Error::MissingIndexKeys);
        }
        self.db
            .collection(collection)
            .delete_index(keys)
            .map_err(|e| Error::Index(e.to_string()))?;
        let _ = self.state.take_query();
        Ok(self)
    }

    pub fn remove_all_indexes(&mut self, collection: &str) -> Result<&mut Self, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        self.db
            .collection(collection)
            .delete_indexes()
            .map_err(|e| Error::Index(e.to_string()))?;
        let _ = self.state.take_query();
        Ok(self)
    }

    pub fn list_indexes(&mut self, collection: &str) -> Result<Vec<Document>, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        self.db.collection(collection).index_info().map_err(|e| Error::Index(e.to_string()))
    }

    /// Builds a database reference document to store alongside other data.
    pub fn create_dbref(
        &self,
        collection: &str,
        id: impl Into<Bson>,
        database: Option<&str>,
    ) -> Result<Document, Error> {
        if collection.is_empty() {
            return Err(Error::MissingCollection);
        }
        let id = id.into();
        if matches!(id, Bson::Null) {
            return Err(Error::InvalidDbRef);
        }
        let mut dbref = doc! { "$ref": collection, "$id": id };
        if let Some(db) = database {
            dbref.insert("$db", db);
        }
        Ok(dbref)
    }

    /// Resolves a database reference built by [`MongoDb::create_dbref`].
    pub fn get_dbref(&mut self, dbref: &Document) -> Result<Option<Document>, Error> {
        let collection = match dbref.get("$ref") {
            Some(Bson::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(Error::InvalidDbRef),
        };
        let id = dbref.get("$id").cloned().ok_or(Error::InvalidDbRef)?;
        let handle = match dbref.get("$db") {
            Some(Bson::String(db)) => self.client.database(db).collection(&collection),
            _ => self.db.collection(&collection),
        };
        let mut cursor = handle.find(doc! { "_id": id }, Document::new())?;
        match cursor.advance() {
            Some(item) => item.map(Some),
            None => Ok(None),
        }
    }
}

fn coerce_index_keys<I, S, O>(keys: I) -> Document
where
    I: IntoIterator<Item = (S, O)>,
    S: AsRef<str>,
    O: Into<SortOrder>,
{
    let mut out = Document::new();
    for (field, order) in keys {
        out.insert(field.as_ref(), order.into().as_i32());
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::memory::MemoryConnector;
    use crate::{Config, MongoDb};
    use bson::doc;

    fn db() -> MongoDb {
        MongoDb::connect(&Config::new("localhost", "unit_admin"), &MemoryConnector::shared())
            .unwrap()
    }

    #[test]
    fn switch_db_requires_name() {
        let mut m = db();
        assert_eq!(m.switch_db("").unwrap_err().code(), 1022);
        m.switch_db("other").unwrap();
        m.insert("t", doc! {"a": 1}).unwrap();
        assert_eq!(m.count_all("t").unwrap(), 1);
        // original database is untouched
        m.switch_db("unit_admin").unwrap();
        assert_eq!(m.count_all("t").unwrap(), 0);
    }

    #[test]
    fn index_lifecycle() {
        let mut m = db();
        m.create_index("people", [("name", "asc"), ("age", "desc")], doc! {"unique": true})
            .unwrap();
        let info = m.list_indexes("people").unwrap();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].get_document("key").unwrap(), &doc! {"name": 1, "age": -1});
        m.remove_index("people", [("name", "asc"), ("age", "desc")]).unwrap();
        assert!(m.list_indexes("people").unwrap().is_empty());
    }

    #[test]
    fn empty_index_keys_rejected() {
        let mut m = db();
        let keys: [(&str, &str); 0] = [];
        assert!(m.create_index("people", keys, doc! {}).is_err());
    }

    #[test]
    fn dbref_round_trip() {
        let mut m = db();
        m.insert("authors", doc! {"_id": 7, "name": "ada"}).unwrap();
        let dbref = m.create_dbref("authors", 7, None).unwrap();
        assert_eq!(dbref.get_str("$ref").unwrap(), "authors");
        let resolved = m.get_dbref(&dbref).unwrap().unwrap();
        assert_eq!(resolved.get_str("name").unwrap(), "ada");
    }

    #[test]
    fn dbref_validation() {
        let m = db();
        assert!(m.create_dbref("", 1, None).is_err());
        let mut m = db();
        assert!(m.get_dbref(&doc! {"$id": 1}).is_err());
    }

    #[test]
    fn drop_collection_requires_both_names() {
        let mut m = db();
        assert_eq!(m.drop_collection("", "t").unwrap_err().code(), 1026);
        m.insert("gone", doc! {"a": 1}).unwrap();
        m.drop_collection("unit_admin", "gone").unwrap();
        assert_eq!(m.count_all("gone").unwrap(), 0);
    }
}
