use bson::{Bson, Document};

use crate::MongoDb;

/// Update-operator accumulators. Each lazily initializes its operator
/// bucket and merges field/operand pairs into it; repeated calls to the
/// same operator merge, later calls win per field.
impl MongoDb {
    /// `$set` each field to its value.
    pub fn set(&mut self, fields: Document) -> &mut Self {
        for (field, value) in fields {
            self.state.update_operator("$set", &field, value);
        }
        self
    }

    /// `$inc` a field by `value`.
    pub fn inc(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.update_operator("$inc", field, value.into());
        self
    }

    /// Sugar for `inc` with the operand's sign inverted. Integer operands
    /// stay integers so counters do not get coerced to doubles.
    pub fn dec(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        let negated = match value.into() {
            Bson::Int32(i) => Bson::Int32(-i),
            Bson::Int64(i) => Bson::Int64(-i),
            Bson::Double(f) => Bson::Double(-f),
            other => other,
        };
        self.state.update_operator("$inc", field, negated);
        self
    }

    /// `$unset` one or more fields.
    pub fn unset_field<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in fields {
            self.state.update_operator("$unset", field.as_ref(), Bson::Int32(1));
        }
        self
    }

    /// `$addToSet`: a scalar operand is stored directly, a sequence is
    /// wrapped as `{"$each": [...]}`.
    pub fn addtoset(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        let operand = match value.into() {
            Bson::Array(values) => {
                let mut each = Document::new();
                each.insert("$each", Bson::Array(values));
                Bson::Document(each)
            }
            scalar => scalar,
        };
        self.state.update_operator("$addToSet", field, operand);
        self
    }

    /// `$push` a value onto an array field.
    pub fn push(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.update_operator("$push", field, value.into());
        self
    }

    /// `$pushAll` values onto an array field.
    pub fn push_all(&mut self, field: &str, values: Vec<Bson>) -> &mut Self {
        self.state.update_operator("$pushAll", field, Bson::Array(values));
        self
    }

    /// `$pop` the last element from one or more array fields.
    pub fn pop<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in fields {
            self.state.update_operator("$pop", field.as_ref(), Bson::Int32(-1));
        }
        self
    }

    /// `$pull` array elements equal to `value`.
    pub fn pull(&mut self, field: &str, value: impl Into<Bson>) -> &mut Self {
        self.state.update_operator("$pull", field, value.into());
        self
    }

    /// `$pullAll` every listed value from an array field.
    pub fn pull_all(&mut self, field: &str, values: Vec<Bson>) -> &mut Self {
        self.state.update_operator("$pullAll", field, Bson::Array(values));
        self
    }

    /// `$rename` a field.
    pub fn rename_field(&mut self, old: &str, new: &str) -> &mut Self {
        self.state.update_operator("$rename", old, Bson::String(new.to_string()));
        self
    }
}
