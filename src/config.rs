//! Settings for synthesizing the CDN stack, read from a toml file:
//!
//! ```toml
//! stack_name = "supabase-cdn"
//! request_rate_limit = 1000
//! origin = "api.example.com"
//! # or: origin = { load_balancer = "ApiLoadBalancer" }
//! # or: origin = { load_balancer_dns_name = "my-alb.us-east-1.elb.amazonaws.com" }
//!
//! [[behaviors]]
//! path_pattern = "/storage/*"
//! origin = "storage.example.com"
//! ```

use std::path::{Path, PathBuf};

use aws_cfn_stack::{validate_stack_name, Stack};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{CdnError, CdnProps, LoadBalancerRef, OriginSelector, Result, SupabaseCdn};

pub const CONFIG_FILE_NAME: &str = "supabase-cdn.toml";
pub const DEFAULT_CONSTRUCT_ID: &str = "SupabaseCdn";
pub const STACK_DESCRIPTION: &str = "Supabase - CDN";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OriginConfig {
    Host(String),
    /// logical id of a load balancer in the same template
    LoadBalancer { load_balancer: String },
    LoadBalancerDns { load_balancer_dns_name: String },
}

impl From<OriginConfig> for OriginSelector {
    fn from(value: OriginConfig) -> Self {
        match value {
            OriginConfig::Host(host) => OriginSelector::Host(host),
            OriginConfig::LoadBalancer { load_balancer } => LoadBalancerRef::from_logical_id(&load_balancer).into(),
            OriginConfig::LoadBalancerDns { load_balancer_dns_name } => LoadBalancerRef::from_dns_name(load_balancer_dns_name).into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviorConfig {
    pub path_pattern: String,
    pub origin: OriginConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CdnConfig {
    /// derived from `id` when missing
    pub stack_name: Option<String>,
    #[serde(default = "default_id")]
    pub id: String,
    /// region to deploy to. CloudFront web ACLs only exist in us-east-1
    pub region: Option<String>,
    pub request_rate_limit: Option<u32>,
    pub origin: Option<OriginConfig>,
    #[serde(default)]
    pub behaviors: Vec<BehaviorConfig>,
}

fn default_id() -> String {
    DEFAULT_CONSTRUCT_ID.to_string()
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            stack_name: None,
            id: default_id(),
            region: None,
            request_rate_limit: None,
            origin: None,
            behaviors: vec![],
        }
    }
}

/// given a search dir, see if the config file exists in this dir,
/// and if so, return the path to it. If not found, back up 1 dir at a time
/// until a config file is found (limit 5 times)
pub fn find_config_file(mut search_dir: PathBuf) -> Option<PathBuf> {
    for _ in 0..5 {
        search_dir.push(CONFIG_FILE_NAME);
        if search_dir.is_file() {
            return Some(search_dir);
        }
        search_dir.pop();
        if !search_dir.pop() {
            break;
        }
    }
    None
}

impl CdnConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = ?path, "reading config");
        let contents = std::fs::read_to_string(path)
            .map_err(|source| CdnError::ConfigRead { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&contents)
    }

    pub fn stack_name(&self) -> Result<String> {
        let explicit = self.stack_name.as_deref().unwrap_or_default();
        Ok(validate_stack_name(&self.id, explicit)?)
    }

    pub fn props(&self) -> Result<CdnProps> {
        let origin = self.origin.clone()
            .ok_or_else(|| CdnError::config("an origin is required"))?;
        let request_rate_limit = self.request_rate_limit
            .ok_or_else(|| CdnError::config("request_rate_limit is required"))?;
        Ok(CdnProps { origin: origin.into(), request_rate_limit })
    }

    /// Builds the full stack: the CDN plus every extra behavior.
    pub fn build_stack(&self) -> Result<Stack> {
        let mut stack = Stack::new(self.stack_name()?);
        stack.description = Some(STACK_DESCRIPTION.to_string());
        let mut cdn = SupabaseCdn::new(&stack, &self.id, self.props()?)?;
        for behavior in self.behaviors.iter() {
            cdn.add_behavior(&behavior.path_pattern, behavior.origin.clone())?;
        }
        cdn.add_to_stack(&mut stack);
        info!(stack = %stack.name, resources = stack.resources.len(), behaviors = self.behaviors.len(), "built stack");
        Ok(stack)
    }
}
