//! Site list lookup, fetched once per process.

use serde_json::Value;
use solaredge::{ApiError, Gateway};
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Sites beyond the first page are not listed.
pub const PAGE_SIZE: &str = "100";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct SiteDirectory {
    sites: Vec<Site>,
}

impl SiteDirectory {
    pub fn new(sites: Vec<Site>) -> Self {
        Self { sites }
    }

    /// Parse `{"sites": {"site": [{"id": .., "name": ..}]}}`.
    pub fn from_response(raw: &Value) -> Self {
        let sites = raw
            .pointer("/sites/site")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter_map(|site| {
                let name = site.get("name")?.as_str()?.to_string();
                let id = match site.get("id")? {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.clone(),
                    _ => return None,
                };
                Some(Site { name, id })
            })
            .collect();
        Self { sites }
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Duplicate names resolve to the last site carrying that name.
    pub fn lookup(&self, name: &str) -> Option<&Site> {
        self.sites.iter().rev().find(|s| s.name == name)
    }

    /// Distinct names in list order, for the selection box.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.sites.len());
        for site in &self.sites {
            if !names.contains(&site.name.as_str()) {
                names.push(&site.name);
            }
        }
        names
    }
}

/// Memoizes the first successful `sites/list` call.
#[derive(Debug, Default)]
pub struct SiteCache {
    cell: OnceCell<SiteDirectory>,
}

impl SiteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failed calls are not cached; the next request retries.
    pub async fn get(&self, gateway: &Gateway) -> Result<&SiteDirectory, ApiError> {
        self.cell
            .get_or_try_init(|| async {
                let raw = gateway
                    .call("sites/list", &[("size".to_string(), PAGE_SIZE.to_string())])
                    .await?;
                let directory = SiteDirectory::from_response(&raw);
                if directory.is_empty() {
                    warn!("site list is empty; check API key permissions");
                } else {
                    info!(sites = directory.sites.len(), "site list loaded");
                }
                Ok::<_, ApiError>(directory)
            })
            .await
    }
}
