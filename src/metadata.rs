use crate::cpl::CslStringList;
use crate::errors::{GdalError, Result};

/// Metadata items grouped by domain.
///
/// The default domain is the empty string. Domains keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataDomains {
    domains: Vec<(String, CslStringList)>,
}

impl MetadataDomains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the non-empty domains.
    pub fn domain_names(&self) -> Vec<String> {
        self.domains
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn domain(&self, domain: &str) -> Option<&CslStringList> {
        self.domains
            .iter()
            .find(|(name, _)| name == domain)
            .map(|(_, items)| items)
    }

    pub fn item(&self, key: &str, domain: &str) -> Option<&str> {
        self.domain(domain)?.fetch_name_value(key)
    }

    /// Sets an item without validating its key.
    ///
    /// Drivers use this for keys taken from files, which may contain
    /// characters [`CslStringList::set_name_value`] rejects.
    pub(crate) fn set_item(&mut self, key: &str, value: &str, domain: &str) {
        match self.domains.iter_mut().find(|(name, _)| name == domain) {
            Some((_, items)) => items.set_unchecked(key, value),
            None => {
                let mut items = CslStringList::new();
                items.set_unchecked(key, value);
                self.domains.push((domain.to_string(), items));
            }
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = MetadataEntry> + '_ {
        self.domains.iter().flat_map(|(domain, items)| {
            items.iter().map(move |(key, value)| MetadataEntry {
                domain: domain.clone(),
                key,
                value,
            })
        })
    }
}

/// A metadata item with its domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub domain: String,
    pub key: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(domain: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// General-Purpose Metadata API
///
/// Implemented by [`Dataset`](crate::Dataset) and [`RasterBand`](crate::raster::RasterBand).
/// Metadata is a set of `KEY=VALUE` items, grouped in named domains. Drivers use the
/// default domain `""` for free-form items (PNG text chunks) and `IMAGE_STRUCTURE`
/// for layout information such as `INTERLEAVE` or `NBITS`. ENVI header entries
/// are exposed in the `ENVI` domain.
pub trait Metadata {
    /// Snapshot of all metadata held by the object.
    fn metadata_store(&self) -> MetadataDomains;

    /// Stores `value` under `key` in `domain`.
    ///
    /// Keys must consist of alphanumeric characters and `_`.
    fn set_metadata_item(&mut self, key: &str, value: &str, domain: &str) -> Result<()>;

    /// For Datasets this is the file name, for bands the band name.
    fn description(&self) -> Result<String>;

    /// Names of the domains holding at least one item.
    fn metadata_domains(&self) -> Vec<String> {
        self.metadata_store().domain_names()
    }

    /// Items of `domain` as `KEY=VALUE` strings.
    fn metadata_domain(&self, domain: &str) -> Option<Vec<String>> {
        let store = self.metadata_store();
        let items = store.domain(domain)?;
        if items.is_empty() {
            return None;
        }
        Some(items.iter().map(|(k, v)| format!("{k}={v}")).collect())
    }

    fn metadata_item(&self, key: &str, domain: &str) -> Option<String> {
        self.metadata_store()
            .item(key, domain)
            .map(|value| value.to_string())
    }

    /// Every item of every domain.
    fn metadata(&self) -> Vec<MetadataEntry> {
        self.metadata_store().iter().collect()
    }
}

pub(crate) fn check_metadata_key(key: &str) -> Result<()> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(GdalError::BadArgument(format!(
            "Invalid characters in metadata key: '{key}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains() {
        let mut md = MetadataDomains::new();
        md.set_item("Title", "x", "");
        md.set_item("NBITS", "4", "IMAGE_STRUCTURE");
        md.set_item("title", "y", "");

        assert_eq!(md.domain_names(), vec!["", "IMAGE_STRUCTURE"]);
        assert_eq!(md.item("TITLE", ""), Some("y"));
        assert_eq!(md.item("NBITS", ""), None);
        assert_eq!(
            md.iter().collect::<Vec<_>>(),
            vec![
                MetadataEntry::new("", "Title", "y"),
                MetadataEntry::new("IMAGE_STRUCTURE", "NBITS", "4"),
            ]
        );
        assert!(check_metadata_key("Creation_Time").is_ok());
        assert!(check_metadata_key("a b").is_err());
    }
}
