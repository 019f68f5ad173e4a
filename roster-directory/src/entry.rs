use std::collections::HashMap;

use ldap3::SearchEntry;

/// Owned attribute set for one directory entry.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Entry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl Entry {
    /// First value of a single-valued attribute.
    pub fn single(&self, name: &str) -> Option<&str> {
        self.attrs
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of a potentially multi-valued attribute.
    pub fn values(&self, name: &str) -> Option<&Vec<String>> {
        self.attrs.get(name)
    }

    /// First attribute name starting with `prefix`. Range markers come
    /// back with the range embedded in the name, so exact lookup cannot
    /// find them.
    pub fn attr_starting_with(&self, prefix: &str) -> Option<&str> {
        self.attrs
            .keys()
            .find(|name| name.starts_with(prefix))
            .map(String::as_str)
    }
}

impl From<SearchEntry> for Entry {
    fn from(entry: SearchEntry) -> Self {
        let mut attrs = entry.attrs;
        // Values the server marked binary are carried over lossily.
        for (name, values) in entry.bin_attrs {
            attrs.entry(name).or_default().extend(
                values
                    .into_iter()
                    .map(|value| String::from_utf8_lossy(&value).into_owned()),
            );
        }
        Self {
            dn: entry.dn,
            attrs,
        }
    }
}
