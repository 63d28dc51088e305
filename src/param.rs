//! Ordered param dictionaries.
//!
//! Params (and, one layer up, fields) preserve insertion order on the
//! wire, so the in-memory representation is an [`IndexMap`] rather than
//! a `HashMap`.

use indexmap::IndexMap;

use crate::identifier::Identifier;
use crate::value::ParamValue;

/// An ordered name → value dictionary, as carried by a single field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(IndexMap<Identifier, ParamValue>);

impl Params {
    /// Build an empty param dictionary.
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert a param, overwriting any prior value for the same name but
    /// keeping its original position (matches [`IndexMap::insert`]).
    pub fn insert(&mut self, name: Identifier, value: ParamValue) -> &mut Self {
        self.0.insert(name, value);
        self
    }

    /// Builder-style insert.
    pub fn with(mut self, name: Identifier, value: ParamValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a param by name.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k.as_str() == name).map(|(_, v)| v)
    }

    /// Number of params in the dictionary.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the params in insertion (wire) order.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &ParamValue)> {
        self.0.iter()
    }
}

impl FromIterator<(Identifier, ParamValue)> for Params {
    fn from_iter<T: IntoIterator<Item = (Identifier, ParamValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a Identifier, &'a ParamValue);
    type IntoIter = indexmap::map::Iter<'a, Identifier, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
