//! Canonical item codes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::records::{BudgetItem, ItemRef};

/// Canonical budget item key: uppercase, trimmed, naive singular.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemCode(String);

impl ItemCode {
    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads a code as serialized; the singular rule is not applied again.
impl<'de> Deserialize<'de> for ItemCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?.trim().to_uppercase();
        if code.is_empty() {
            return Err(serde::de::Error::custom("empty item code"));
        }
        Ok(Self(code))
    }
}

/// Budget item lookup, `id -> tipo`.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    by_id: HashMap<i64, String>,
}

impl ItemCatalog {
    /// Builds the catalog from the item table.
    pub fn new<'a>(items: impl IntoIterator<Item = &'a BudgetItem>) -> Self {
        Self {
            by_id: items
                .into_iter()
                .map(|item| (item.id, item.tipo.clone()))
                .collect(),
        }
    }

    /// Type name for an item id.
    #[must_use]
    pub fn type_name(&self, id: i64) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Number of known items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when no items are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Resolves a stored item reference to its canonical code.
///
/// Ids (numeric values or numeric text) go through the catalog; a miss
/// yields `None`. Anything else is taken as the type name itself.
#[must_use]
pub fn normalize_item(value: &ItemRef, catalog: &ItemCatalog) -> Option<ItemCode> {
    match value {
        ItemRef::Id(id) => canonical_item(catalog.type_name(*id)?),
        ItemRef::Name(text) => match text.trim().parse::<i64>() {
            Ok(id) => canonical_item(catalog.type_name(id)?),
            Err(_) => canonical_item(text),
        },
    }
}

/// Uppercases and trims `name`, then drops one trailing `S` when the result
/// is longer than three characters.
///
/// The singular rule is knowingly naive (`MATERIALES` becomes `MATERIALE`);
/// rows of every source go through it, so they still group together.
#[must_use]
pub fn canonical_item(name: &str) -> Option<ItemCode> {
    let mut code = name.trim().to_uppercase();
    if code.is_empty() {
        return None;
    }
    if code.chars().count() > 3 && code.ends_with('S') {
        code.pop();
    }
    Some(ItemCode(code))
}
