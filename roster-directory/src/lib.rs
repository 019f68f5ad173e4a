pub mod entry;
pub mod ldap;
pub mod user;

pub use entry::Entry;

use async_trait::async_trait;

use roster_slo::Result;

/// Search seam over the directory server.
///
/// `base` is relative to the configured base DN; the empty string
/// searches from the base DN itself. Scope is always subtree and all
/// attributes are requested, so ranged attribute names returned by the
/// server (`member;range=0-1499`) come back as-is.
#[async_trait]
pub trait Interface: Send + Sync {
    async fn search(&self, base: &str, filter: &str) -> Result<Vec<Entry>>;
}
