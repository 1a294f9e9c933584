//! Object kinds addressed by the generic get/delete verbs

use std::fmt;

/// A Zabbix object type with `<kind>.get` and `<kind>.delete` methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Item,
    Trigger,
    DiscoveryRule,
    Graph,
    Dashboard,
}

impl ObjectKind {
    /// API namespace, the part before the dot in method names
    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Trigger => "trigger",
            Self::DiscoveryRule => "discoveryrule",
            Self::Graph => "graph",
            Self::Dashboard => "dashboard",
        }
    }

    /// Field holding the object id in `get` results
    pub fn id_field(&self) -> &'static str {
        match self {
            Self::Item | Self::DiscoveryRule => "itemid",
            Self::Trigger => "triggerid",
            Self::Graph => "graphid",
            Self::Dashboard => "dashboardid",
        }
    }

    /// Key holding the affected ids in `create`/`update`/`delete` results
    pub fn ids_key(&self) -> &'static str {
        match self {
            Self::Item => "itemids",
            Self::Trigger => "triggerids",
            Self::DiscoveryRule => "ruleids",
            Self::Graph => "graphids",
            Self::Dashboard => "dashboardids",
        }
    }

    pub fn method(&self, verb: &str) -> String {
        format!("{}.{}", self.api_name(), verb)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names() {
        assert_eq!(ObjectKind::DiscoveryRule.method("get"), "discoveryrule.get");
        assert_eq!(ObjectKind::Trigger.method("delete"), "trigger.delete");
    }

    #[test]
    fn test_discovery_rules_use_item_ids() {
        assert_eq!(ObjectKind::DiscoveryRule.id_field(), "itemid");
        assert_eq!(ObjectKind::DiscoveryRule.ids_key(), "ruleids");
    }
}
