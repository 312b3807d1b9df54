//! Site registry: resolves configured multisites into per-environment sync
//! maps for the selected sites.

use crate::config::{Config, MultisiteConfig};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Resolved addressing for one site in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMapping {
    pub normalized_name: String,
    /// `<name>.<target env>`
    pub remote_alias: String,
    /// Target environment equals the one named by the configured alias.
    pub remote_is_default: bool,
    /// `https://<host>` when a host is configured for the environment.
    pub remote_url: Option<String>,
    pub local_url: String,
    pub site_directory: String,
    pub site_id: u64,
    pub environment: String,
}

/// Which sites a command operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteSelection {
    All,
    Name(String),
    Ids(Vec<u64>),
}

impl SiteSelection {
    /// Build a selection from `--normalized-sitename` and `--site-ids`.
    pub fn from_options(name: Option<&str>, site_ids: Option<&str>) -> Result<Self> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let site_ids = site_ids.map(str::trim).filter(|s| !s.is_empty());

        match (name, site_ids) {
            (Some(_), Some(_)) => Err(Error::config(
                "You cannot use both --normalized-sitename and --site-ids",
            )),
            (Some(name), None) => Ok(SiteSelection::Name(name.to_string())),
            (None, Some(ids)) => {
                let ids = ids
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(|id| {
                        id.parse::<u64>()
                            .map_err(|_| Error::config(format!("Invalid site ID: {}", id)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(SiteSelection::Ids(ids))
            }
            (None, None) => Ok(SiteSelection::All),
        }
    }
}

/// Read-only view over the `[multisites]` configuration.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    multisites: BTreeMap<String, MultisiteConfig>,
}

impl SiteRegistry {
    pub fn new(multisites: BTreeMap<String, MultisiteConfig>) -> Result<Self> {
        let mut seen: BTreeMap<u64, &str> = BTreeMap::new();
        for (name, site) in &multisites {
            if let Some(site_id) = site.site_id {
                if let Some(other) = seen.insert(site_id, name) {
                    return Err(Error::config(format!(
                        "Site ID {} is used by both {} and {}",
                        site_id, other, name
                    )));
                }
            }
        }
        Ok(Self { multisites })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.multisites.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.multisites.is_empty()
    }

    /// Site IDs named by a selection, in selection order.
    pub fn selected_site_ids(&self, selection: &SiteSelection) -> Result<Vec<u64>> {
        match selection {
            SiteSelection::Name(name) => {
                let site = self.multisites.get(name).ok_or_else(|| {
                    Error::config(format!("Could not find normalized site name for {}", name))
                })?;
                site.site_id
                    .map(|id| vec![id])
                    .ok_or_else(|| Error::config(format!("Site ID not set for {}", name)))
            }
            SiteSelection::Ids(ids) => Ok(ids.clone()),
            SiteSelection::All => self
                .multisites
                .iter()
                .map(|(name, site)| {
                    site.site_id
                        .ok_or_else(|| Error::config(format!("Site ID not set for {}", name)))
                })
                .collect(),
        }
    }

    /// Resolve the selected sites against `target_env`.
    pub fn sync_maps(&self, target_env: &str, selection: &SiteSelection) -> Result<Vec<SiteMapping>> {
        if target_env.trim().is_empty() {
            return Err(Error::config("The target-env option is required."));
        }

        let selected = self.selected_site_ids(selection)?;
        let mut maps = Vec::with_capacity(selected.len());

        for (name, site) in &self.multisites {
            let Some(site_id) = site.site_id else {
                continue;
            };
            if !selected.contains(&site_id) {
                continue;
            }
            maps.push(Self::sync_map(name, site, site_id, target_env)?);
        }

        let missing: Vec<String> = selected
            .iter()
            .filter(|id| !maps.iter().any(|m| m.site_id == **id))
            .map(u64::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(Error::config(format!(
                "Could not find sync map for site IDs: {}",
                missing.join(", ")
            )));
        }

        Ok(maps)
    }

    fn sync_map(name: &str, site: &MultisiteConfig, site_id: u64, target_env: &str) -> Result<SiteMapping> {
        let (alias_name, default_env) = parse_remote_alias(&site.remote)?;

        Ok(SiteMapping {
            normalized_name: name.to_string(),
            remote_alias: format!("{}.{}", alias_name, target_env),
            remote_is_default: default_env == target_env,
            remote_url: site.uris.get(target_env).map(|host| format!("https://{}", host)),
            local_url: site.local.clone(),
            site_directory: site.site_dir.clone(),
            site_id,
            environment: target_env.to_string(),
        })
    }
}

/// Split a `<name>.<env>` drush alias.
pub fn parse_remote_alias(alias: &str) -> Result<(&str, &str)> {
    let alias = alias.strip_prefix('@').unwrap_or(alias);
    match alias.split_once('.') {
        Some((name, env)) if !name.is_empty() && !env.is_empty() && !env.contains('.') => {
            Ok((name, env))
        }
        _ => Err(Error::config(format!(
            "The remote alias should be in the format: mysite.envname, e.g. mysite.01live (got {})",
            alias
        ))),
    }
}
