//! Resource type → category lookup table.
//!
//! Vendor-specific type strings are normalized into one of the four
//! categories. A type with no entry is a configuration defect: the engine
//! refuses to provision it.

use std::collections::HashMap;

use dockyard_core::Category;

use crate::error::{StateError, StateResult};

const BUILTIN: &[(&str, Category)] = &[
    ("server", Category::Servers),
    ("compute", Category::Servers),
    ("compute-instance", Category::Servers),
    ("instance", Category::Servers),
    ("vm", Category::Servers),
    ("droplet", Category::Servers),
    ("ec2-instance", Category::Servers),
    ("web-service", Category::WebServices),
    ("webservice", Category::WebServices),
    ("app", Category::WebServices),
    ("static-site", Category::WebServices),
    ("vercel-project", Category::WebServices),
    ("domain", Category::Domains),
    ("dns-zone", Category::Domains),
    ("database", Category::Databases),
    ("postgres", Category::Databases),
    ("mysql", Category::Databases),
    ("redis", Category::Databases),
    ("rds-instance", Category::Databases),
];

/// Static lookup from resource type strings to categories.
#[derive(Debug, Clone)]
pub struct CategoryMap {
    entries: HashMap<String, Category>,
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CategoryMap {
    /// The built-in table of canonical names and common vendor aliases.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(name, category)| (normalize(name), *category))
            .collect();
        Self { entries }
    }

    /// An empty table (no type is mappable).
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Add or override entries.
    pub fn with_entries<'a>(
        mut self,
        entries: impl IntoIterator<Item = (&'a String, &'a Category)>,
    ) -> Self {
        for (name, category) in entries {
            self.entries.insert(normalize(name), *category);
        }
        self
    }

    pub fn insert(&mut self, resource_type: &str, category: Category) {
        self.entries.insert(normalize(resource_type), category);
    }

    /// Category for a resource type, or `UnmappableResourceType`.
    pub fn category_for(&self, resource_type: &str) -> StateResult<Category> {
        self.entries
            .get(&normalize(resource_type))
            .copied()
            .ok_or_else(|| StateError::UnmappableResourceType(resource_type.to_string()))
    }

    /// Check that every given type is mappable; fails on the first that is not.
    pub fn validate_all<'a>(
        &self,
        resource_types: impl IntoIterator<Item = &'a str>,
    ) -> StateResult<()> {
        for resource_type in resource_types {
            self.category_for(resource_type)?;
        }
        Ok(())
    }
}

/// Case-insensitive, `_` and `-` treated alike.
fn normalize(resource_type: &str) -> String {
    resource_type.trim().to_ascii_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn canonical_types_map_to_their_category() {
        let map = CategoryMap::builtin();
        assert_eq!(map.category_for("server").unwrap(), Category::Servers);
        assert_eq!(map.category_for("web-service").unwrap(), Category::WebServices);
        assert_eq!(map.category_for("domain").unwrap(), Category::Domains);
        assert_eq!(map.category_for("database").unwrap(), Category::Databases);
    }

    #[test]
    fn lookup_ignores_case_and_separator() {
        let map = CategoryMap::builtin();
        assert_eq!(map.category_for("EC2_Instance").unwrap(), Category::Servers);
        assert_eq!(map.category_for("web_service").unwrap(), Category::WebServices);
    }

    #[test]
    fn unknown_type_is_unmappable() {
        let map = CategoryMap::builtin();
        let err = map.category_for("quantum-annealer").unwrap_err();
        assert!(
            matches!(err, StateError::UnmappableResourceType(ref t) if t == "quantum-annealer")
        );
    }

    #[test]
    fn config_entries_extend_the_table() {
        let mut extra = BTreeMap::new();
        extra.insert("linode".to_string(), Category::Servers);
        let map = CategoryMap::builtin().with_entries(&extra);
        assert_eq!(map.category_for("linode").unwrap(), Category::Servers);
    }

    #[test]
    fn validate_all_reports_first_unmappable() {
        let map = CategoryMap::builtin();
        assert!(map.validate_all(["server", "domain"]).is_ok());
        let err = map.validate_all(["server", "gpu", "tpu"]).unwrap_err();
        assert!(matches!(err, StateError::UnmappableResourceType(ref t) if t == "gpu"));
    }

    #[test]
    fn empty_table_maps_nothing() {
        assert!(CategoryMap::empty().category_for("server").is_err());
    }
}
