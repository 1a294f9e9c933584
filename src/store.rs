//! [`ChildStore`] backed by the Zabbix API

use linkset::{ChildFilter, ChildId, ChildKind, ChildStore, StoreError, StoreResult};
use serde_json::{Map, Value, json};
use zabbix::{Client, ObjectKind};

/// Lists and deletes template children through a [`Client`]
pub struct ZabbixStore<'a> {
    client: &'a Client,
}

impl<'a> ZabbixStore<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }
}

/// API object kind for a child kind
pub fn object_kind(kind: ChildKind) -> ObjectKind {
    match kind {
        ChildKind::Item => ObjectKind::Item,
        ChildKind::Trigger => ObjectKind::Trigger,
        ChildKind::DiscoveryRule => ObjectKind::DiscoveryRule,
    }
}

/// `<kind>.get` parameters for a filter
fn list_params(filter: &ChildFilter<'_>) -> Value {
    let mut params = Map::new();
    params.insert("hostids".to_string(), json!(filter.parent.as_str()));
    if filter.inherited_only {
        params.insert("inherited".to_string(), json!(true));
    }
    Value::Object(params)
}

impl ChildStore for ZabbixStore<'_> {
    fn list(&self, kind: ChildKind, filter: &ChildFilter<'_>) -> StoreResult<Vec<ChildId>> {
        let ids = self
            .client
            .object_ids(object_kind(kind), list_params(filter))
            .map_err(|e| StoreError::new(e.to_string()))?;
        log::debug!(
            "{} {} on {} (inherited_only={})",
            ids.len(),
            kind.label(),
            filter.parent,
            filter.inherited_only
        );
        Ok(ids.into_iter().map(ChildId::from).collect())
    }

    fn delete(&self, kind: ChildKind, ids: &[ChildId]) -> StoreResult<Vec<ChildId>> {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        let confirmed = self
            .client
            .delete_objects(object_kind(kind), &ids)
            .map_err(|e| StoreError::new(e.to_string()))?;
        if confirmed.len() != ids.len() {
            log::warn!(
                "{}.delete confirmed {} of {} ids",
                object_kind(kind),
                confirmed.len(),
                ids.len()
            );
        }
        Ok(confirmed.into_iter().map(ChildId::from).collect())
    }
}
