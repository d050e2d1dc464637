use bson::Document;
use serde::de::DeserializeOwned;

use crate::driver::DriverCursor;
use crate::errors::Error;

/// Wrapper over the driver's lazy result stream.
///
/// Draining and counting surface iteration faults as `Err` uniformly; a
/// valid empty result is `Ok(vec![])`, never an error.
pub struct ResultCursor {
    inner: Box<dyn DriverCursor>,
}

impl std::fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCursor").finish_non_exhaustive()
    }
}

impl ResultCursor {
    pub(crate) fn new(inner: Box<dyn DriverCursor>) -> Self {
        Self { inner }
    }

    /// Drains the stream into an ordered sequence of documents.
    pub fn result(&mut self) -> Result<Vec<Document>, Error> {
        let mut out = Vec::new();
        while let Some(item) = self.inner.advance() {
            out.push(item?);
        }
        Ok(out)
    }

    /// Drains the stream, deserializing each document into `T`.
    pub fn result_as<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, Error> {
        self.result()?
            .into_iter()
            .map(|d| bson::deserialize_from_document(d).map_err(|e| Error::Cursor(e.to_string())))
            .collect()
    }

    /// Count of documents under the currently applied limit/skip window.
    pub fn num_rows(&mut self) -> Result<u64, Error> {
        self.inner.count(true)
    }

    /// Count of all matched documents, ignoring limit/skip.
    pub fn total_rows(&mut self) -> Result<u64, Error> {
        self.inner.count(false)
    }

    /// Returns the document at `index`, linear-scanning from the start.
    /// O(index); acceptable only for small result sets.
    pub fn row(&mut self, index: usize) -> Result<Option<Document>, Error> {
        self.inner.rewind();
        let mut seen = 0usize;
        while let Some(item) = self.inner.advance() {
            let doc = item?;
            if seen == index {
                return Ok(Some(doc));
            }
            seen += 1;
        }
        Ok(None)
    }

    pub fn skip(&mut self, n: u64) -> &mut Self {
        self.inner.skip(n);
        self
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.inner.limit(n);
        self
    }

    pub fn sort(&mut self, spec: Document) -> &mut Self {
        self.inner.sort(spec);
        self
    }

    pub fn explain(&self) -> Result<Document, Error> {
        self.inner.explain()
    }
}

impl Iterator for ResultCursor {
    type Item = Result<Document, Error>;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.advance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverCursor;
    use bson::doc;

    struct FaultyCursor {
        yielded: bool,
    }

    impl DriverCursor for FaultyCursor {
        fn advance(&mut self) -> Option<Result<Document, Error>> {
            if self.yielded {
                Some(Err(Error::Cursor("stream fault".into())))
            } else {
                self.yielded = true;
                Some(Ok(doc! {"ok": 1}))
            }
        }
        fn count(&mut self, _found_only: bool) -> Result<u64, Error> {
            Ok(1)
        }
        fn skip(&mut self, _n: u64) {}
        fn limit(&mut self, _n: u64) {}
        fn sort(&mut self, _spec: Document) {}
        fn rewind(&mut self) {
            self.yielded = false;
        }
        fn explain(&self) -> Result<Document, Error> {
            Ok(doc! {"plan": "scan"})
        }
    }

    #[test]
    fn iteration_fault_is_an_error_not_a_sentinel() {
        let mut cur = ResultCursor::new(Box::new(FaultyCursor { yielded: false }));
        let err = cur.result().unwrap_err();
        assert!(matches!(err, Error::Cursor(_)));
    }

    #[test]
    fn row_rescans_from_start() {
        let mut cur = ResultCursor::new(Box::new(FaultyCursor { yielded: false }));
        let first = cur.row(0).unwrap().unwrap();
        assert_eq!(first, doc! {"ok": 1});
        // rescan resets the stream before walking again
        let again = cur.row(0).unwrap().unwrap();
        assert_eq!(again, doc! {"ok": 1});
    }
}
