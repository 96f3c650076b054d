use std::collections::HashMap;

use sky_primitives::PropertyId;

use crate::{DataType, Property, SchemaError};

///
/// Table
///
/// A named namespace containing properties and (outside this crate) an
/// event log keyed by (object-id, timestamp). Property ids are assigned by
/// the table in declaration order and are immutable once assigned; a
/// second declaration under the same name must agree on data type and
/// transient flag or [`SchemaError`] is raised (spec.md §3 Invariants).
///

#[derive(Clone, Debug, Default)]
pub struct Table {
    name: String,
    by_id: HashMap<PropertyId, Property>,
    by_name: HashMap<String, PropertyId>,
    next_id: i32,
}

impl Table {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            next_id: 0,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a property, assigning it a fresh id. If a property with the
    /// same name already exists, returns its existing id as long as data
    /// type and transient flag agree; otherwise raises [`SchemaError`].
    pub fn declare_property(
        &mut self,
        name: &str,
        data_type: DataType,
        transient: bool,
    ) -> Result<PropertyId, SchemaError> {
        if let Some(&id) = self.by_name.get(name) {
            let existing = &self.by_id[&id];
            if existing.data_type != data_type {
                return Err(SchemaError::DataTypeMismatch {
                    table: self.name.clone(),
                    name: name.to_string(),
                    existing: existing.data_type.to_string(),
                    requested: data_type.to_string(),
                });
            }
            if existing.transient != transient {
                return Err(SchemaError::TransientMismatch {
                    table: self.name.clone(),
                    name: name.to_string(),
                    existing: existing.transient,
                    requested: transient,
                });
            }
            return Ok(id);
        }

        let id = PropertyId::new(self.next_id);
        self.next_id += 1;
        self.by_id.insert(
            id,
            Property {
                id,
                name: name.to_string(),
                transient,
                data_type,
            },
        );
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    #[must_use]
    pub fn property_by_id(&self, id: PropertyId) -> Option<&Property> {
        self.by_id.get(&id)
    }

    pub fn require_property(&self, name: &str) -> Result<&Property, SchemaError> {
        self.property(name).ok_or_else(|| SchemaError::PropertyNotFound {
            table: self.name.clone(),
            name: name.to_string(),
        })
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.by_id.values()
    }
}
