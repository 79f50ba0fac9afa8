use std::collections::BTreeMap;

use crate::config::RavenConfig;

/// Built-in callable attribute names.
pub const DEFAULT_METHODS: &[&str] = &["geoip"];

/// Built-in plain attribute names.
pub const DEFAULT_PROPERTIES: &[&str] = &[
    "context",
    "geodata",
    "layout_manager",
    "matchdict",
    "matched_route",
    "root",
    "subpath",
    "traversed",
    "view_name",
    "virtual_root",
    "virtual_root_path",
];

/// How an attribute value is obtained from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Invoked with no arguments.
    Method,
    /// Read directly.
    Property,
}

/// The request attributes captured in a snapshot, sorted by name.
///
/// Built once at startup from the method and property name lists. A name
/// listed as both is a [`AttributeKind::Property`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeTable {
    entries: BTreeMap<String, AttributeKind>,
}

impl AttributeTable {
    /// Builds a table from explicit name lists.
    pub fn new<M, P>(methods: M, properties: P) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let mut entries = BTreeMap::new();
        for name in methods {
            entries.insert(name.into(), AttributeKind::Method);
        }
        for name in properties {
            entries.insert(name.into(), AttributeKind::Property);
        }
        Self { entries }
    }

    /// Builds the table from the built-in names plus the configured extras.
    pub fn from_config(config: &RavenConfig) -> Self {
        let methods = DEFAULT_METHODS
            .iter()
            .map(|name| (*name).to_owned())
            .chain(config.additional_request_methods.iter().cloned());
        let properties = DEFAULT_PROPERTIES
            .iter()
            .map(|name| (*name).to_owned())
            .chain(config.additional_request_properties.iter().cloned());
        Self::new(methods, properties)
    }

    /// Returns the kind of an attribute, `None` if it is not captured.
    pub fn kind(&self, name: &str) -> Option<AttributeKind> {
        self.entries.get(name).copied()
    }

    /// Iterates the attributes in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, AttributeKind)> {
        self.entries.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    /// Checks if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    #[test]
    fn test_names_are_sorted_and_deduplicated() {
        let table = AttributeTable::new(["zeta", "alpha", "zeta"], ["beta", "alpha"]);

        let names = table.iter().map(|(name, _)| name).collect::<Vec<_>>();

        assert_eq!(names, vec!["alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_property_membership_wins() {
        let table = AttributeTable::new(["charset", "geoip"], ["charset"]);

        assert_eq!(table.kind("charset"), Some(AttributeKind::Property));
        assert_eq!(table.kind("geoip"), Some(AttributeKind::Method));
        assert_eq!(table.kind("unknown"), None);
    }

    #[test]
    fn test_from_config_extends_defaults() {
        let properties = "charset adhoc_prop";
        let settings = Settings::new()
            .with("pyramid_raven.additional_request_methods", "adhoc_method")
            .with("pyramid_raven.additional_request_properties", properties);
        let config = RavenConfig::from_settings(&settings);

        let table = AttributeTable::from_config(&config);

        assert_eq!(
            table.len(),
            DEFAULT_METHODS.len() + DEFAULT_PROPERTIES.len() + 3
        );
        assert_eq!(table.kind("adhoc_method"), Some(AttributeKind::Method));
        assert_eq!(table.kind("adhoc_prop"), Some(AttributeKind::Property));
        assert_eq!(table.kind("geoip"), Some(AttributeKind::Method));
        assert_eq!(table.kind("matched_route"), Some(AttributeKind::Property));
    }
}
