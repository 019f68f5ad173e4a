use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use roster_slo::{errors, Result};

use crate::{Entry, Interface};

/// Connection settings for the upstream directory server.
#[derive(Debug, Clone)]
pub struct LdapConfig {
    /// Scheme and host, e.g. `ldap://dir.example.com`.
    pub url: String,
    pub port: u16,
    pub base_dn: String,
    pub bind_dn: String,
    pub bind_password: String,
    pub conn_timeout_secs: u64,
}

/// Directory search backend over ldap3.
///
/// The bound handle is multiplexed; it is created lazily, cached, and
/// cloned per operation. A failed search drops the cached handle so the
/// next operation reconnects.
#[derive(Clone)]
pub struct LdapImpl {
    config: LdapConfig,
    conn: Arc<RwLock<Option<Ldap>>>,
}

impl LdapImpl {
    pub fn new(config: LdapConfig) -> Self {
        Self {
            config,
            conn: Arc::new(RwLock::new(None)),
        }
    }

    async fn get_connection(&self) -> Result<Ldap> {
        {
            let guard = self.conn.read().await;
            if let Some(conn) = guard.as_ref() {
                return Ok(conn.clone());
            }
        }

        let conn = self.create_connection().await?;

        let mut guard = self.conn.write().await;
        *guard = Some(conn.clone());

        Ok(conn)
    }

    async fn create_connection(&self) -> Result<Ldap> {
        let url = format!("{}:{}", self.config.url, self.config.port);
        debug!(url = %url, "connecting to directory server");

        let settings = LdapConnSettings::new().set_conn_timeout(
            Duration::from_secs(self.config.conn_timeout_secs),
        );
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(errors::any)?;

        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                warn!("directory connection driver error: {}", err);
            }
        });

        debug!(bind_dn = %self.config.bind_dn, "binding to directory server");
        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(errors::any)?;
        if result.rc == 49 {
            return Err(errors::anyhow(anyhow::anyhow!(
                "directory bind as {} rejected: invalid credentials",
                self.config.bind_dn,
            )));
        }
        if result.rc != 0 {
            return Err(errors::anyhow(anyhow::anyhow!(
                "directory bind as {} failed with code {}: {}",
                self.config.bind_dn,
                result.rc,
                result.text,
            )));
        }

        info!(url = %url, "directory connection established");
        Ok(ldap)
    }

    fn search_base(&self, base: &str) -> String {
        if base.is_empty() {
            self.config.base_dn.clone()
        } else {
            format!("{},{}", base, self.config.base_dn)
        }
    }
}

#[async_trait]
impl Interface for LdapImpl {
    #[tracing::instrument(skip(self))]
    async fn search(&self, base: &str, filter: &str) -> Result<Vec<Entry>> {
        let mut ldap = self.get_connection().await?;

        let result = match ldap
            .search(&self.search_base(base), Scope::Subtree, filter, vec!["*"])
            .await
        {
            Ok(result) => result,
            Err(err) => {
                self.conn.write().await.take();
                return Err(errors::any(err));
            }
        };
        let (entries, _) = result.success().map_err(errors::any)?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(Entry::from)
            .collect())
    }
}

/// Escapes a value for interpolation into a search filter (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}
