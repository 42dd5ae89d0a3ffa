use verge_catalog::ResultSet;

/// A locally held copy of the catalog's default listing.
///
/// Searches that do not warrant a network call are answered from here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    items: ResultSet,
}

impl Snapshot {
    pub fn new(items: ResultSet) -> Self {
        Snapshot { items }
    }

    pub fn items(&self) -> &ResultSet {
        &self.items
    }

    /// Items whose name contains `text`, ignoring case, in snapshot order.
    ///
    /// Empty text matches every item.
    pub fn filter(&self, text: &str) -> ResultSet {
        let needle = text.to_lowercase();
        self.items
            .iter()
            .filter(|item| item.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}
