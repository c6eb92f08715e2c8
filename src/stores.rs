use crate::schema::Location;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A store code known to the registry.
///
/// Only [`StoreRegistry`] hands these out, so holding one means the store is
/// part of the reporting set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct StoreCode(String);

impl StoreCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreConfig {
    /// Human store code, matching the accounting location number (e.g. "8001").
    pub code: String,
    pub name: String,
    /// POS restaurant external id, when the store has POS data.
    #[serde(default)]
    pub pos_guid: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Store {
    pub code: StoreCode,
    pub name: String,
    pub pos_guid: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StoreRegistry {
    stores: BTreeMap<StoreCode, Store>,
    /// Upstream location id to location number.
    locations: HashMap<String, String>,
}

impl StoreRegistry {
    pub fn new(stores: &[StoreConfig], locations: &[Location]) -> Self {
        let stores = stores
            .iter()
            .map(|s| {
                let code = StoreCode(s.code.trim().to_string());
                (
                    code.clone(),
                    Store {
                        code,
                        name: s.name.clone(),
                        pos_guid: s.pos_guid.clone(),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();

        let locations = locations
            .iter()
            .filter_map(|loc| {
                loc.location_number
                    .as_ref()
                    .map(|number| (loc.location_id.clone(), number.trim().to_string()))
            })
            .collect::<HashMap<_, _>>();

        debug!(
            "Store registry: {} stores, {} upstream locations",
            stores.len(),
            locations.len()
        );

        Self { stores, locations }
    }

    /// Validated code for a raw store code, if the store is registered.
    pub fn code(&self, raw: &str) -> Option<StoreCode> {
        self.stores.get_key_value(raw.trim()).map(|(code, _)| code.clone())
    }

    /// Maps an upstream location id to a registered store.
    pub fn resolve_location(&self, location_id: &str) -> Option<StoreCode> {
        self.locations
            .get(location_id)
            .and_then(|number| self.code(number))
    }

    pub fn get(&self, code: &StoreCode) -> Option<&Store> {
        self.stores.get(code)
    }

    pub fn name<'a>(&'a self, code: &'a StoreCode) -> &'a str {
        self.stores
            .get(code)
            .map(|s| s.name.as_str())
            .unwrap_or_else(|| code.as_str())
    }

    /// Stores in code order.
    pub fn stores(&self) -> impl Iterator<Item = &Store> {
        self.stores.values()
    }

    pub fn codes(&self) -> impl Iterator<Item = &StoreCode> {
        self.stores.keys()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl std::borrow::Borrow<str> for StoreCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}
