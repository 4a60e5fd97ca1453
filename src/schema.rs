//! Collection schema.
//!
//! A schema lists the collections a store manages and the template rows each
//! one starts with. Templates are only consulted while a store converges in
//! `setup`; they never change afterwards.

use crate::error::Result;
use crate::types::{to_record, CollectionName, Record};
use serde::Serialize;

/// A single collection declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionSpec {
    pub name: CollectionName,
    /// Rows placed in front of any persisted data on first setup.
    pub template: Vec<Record>,
}

/// Ordered set of collection declarations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    collections: Vec<CollectionSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a collection with an empty template.
    ///
    /// Declaring the same name twice keeps the first position and replaces
    /// the template.
    pub fn collection(self, name: &str) -> Result<Self> {
        self.with_template(name, Vec::new())
    }

    /// Declare a collection that is seeded with `rows`.
    pub fn seeded<T: Serialize>(self, name: &str, rows: &[T]) -> Result<Self> {
        let template = rows.iter().map(to_record).collect::<Result<Vec<_>>>()?;
        self.with_template(name, template)
    }

    fn with_template(mut self, name: &str, template: Vec<Record>) -> Result<Self> {
        let name = CollectionName::new(name)?;
        match self.collections.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.template = template,
            None => self.collections.push(CollectionSpec { name, template }),
        }
        Ok(self)
    }

    pub fn collections(&self) -> &[CollectionSpec] {
        &self.collections
    }

    pub fn names(&self) -> impl Iterator<Item = &CollectionName> {
        self.collections.iter().map(|c| &c.name)
    }

    pub fn get(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name.as_str() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde_json::json;

    #[test]
    fn test_schema_preserves_declaration_order() {
        let schema = Schema::new()
            .collection("students")
            .unwrap()
            .collection("assignments")
            .unwrap();

        let names: Vec<&str> = schema.names().map(CollectionName::as_str).collect();
        assert_eq!(names, vec!["students", "assignments"]);
        assert!(schema.contains("students"));
        assert!(!schema.contains("teachers"));
    }

    #[test]
    fn test_redeclare_replaces_template() {
        let schema = Schema::new()
            .collection("students")
            .unwrap()
            .seeded("students", &[json!({"studentNumber": "0", "name": "Demo"})])
            .unwrap();

        assert_eq!(schema.len(), 1);
        assert_eq!(schema.get("students").unwrap().template.len(), 1);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let result = Schema::new().collection("");
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_seed_rows_must_be_objects() {
        let result = Schema::new().seeded("numbers", &[1, 2]);
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }
}
