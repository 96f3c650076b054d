use std::collections::HashMap;

use crate::{SchemaError, Table};

///
/// SchemaRegistry
///
/// Owns every [`Table`] known to the engine. There is no cross-table
/// sharing of property ids; each table assigns its own.
///

#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, Table>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&mut self, name: &str) -> Result<&mut Table, SchemaError> {
        if self.tables.contains_key(name) {
            return Err(SchemaError::TableAlreadyExists(name.to_string()));
        }
        self.tables.insert(name.to_string(), Table::new(name));
        Ok(self.tables.get_mut(name).expect("just inserted"))
    }

    /// Returns the table, creating it with no properties if absent. The
    /// ingest path (out of scope here) is expected to call this and then
    /// declare properties as events arrive.
    pub fn table_or_create(&mut self, name: &str) -> &mut Table {
        self.tables.entry(name.to_string()).or_insert_with(|| Table::new(name))
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn require_table(&self, name: &str) -> Result<&Table, SchemaError> {
        self.table(name).ok_or_else(|| SchemaError::TableNotFound(name.to_string()))
    }
}
