use std::collections::HashSet;

use aws_cfn_stack::serde_json::{self, Value};
use aws_cfn_stack::Validated;
use cfn_resources::StrVal;

pub use cloud_front::distribution::{
    CacheBehavior, CacheBehaviorViewerProtocolPolicyEnum, CfnDistribution, CustomErrorResponse,
    CustomOriginConfig, CustomOriginConfigOriginProtocolPolicyEnum, DefaultCacheBehavior,
    DefaultCacheBehaviorViewerProtocolPolicyEnum, DistributionConfig,
    DistributionConfigHttpVersionEnum, Origin,
};

mod cache_policy;
pub use cache_policy::*;
mod response_headers_policy;
pub use response_headers_policy::*;

/// caching optimized:
/// https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-cache-policies.html#managed-cache-caching-optimized
pub const CACHING_OPTIMIZED_POLICY_ID: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";

/// forwards every header, cookie, and query string the viewer sent:
/// https://docs.aws.amazon.com/AmazonCloudFront/latest/DeveloperGuide/using-managed-origin-request-policies.html#managed-origin-request-policy-all-viewer
pub const ALL_VIEWER_ORIGIN_REQUEST_POLICY_ID: &str = "216adef6-5c7f-47e4-b989-5492eafa07d3";

/// the implicit pattern of the default behavior.
pub const DEFAULT_PATH_PATTERN: &str = "*";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BehaviorError {
    #[error("Only the default behavior can have a path pattern of '*'")]
    DefaultPattern,
    #[error("Path pattern must not be empty")]
    EmptyPattern,
    #[error("A behavior for path pattern '{0}' already exists. All paths in a distribution must be unique")]
    DuplicatePattern(String),
    #[error("Behavior targets origin '{0}' which is not part of the distribution")]
    UnknownOrigin(String),
}

/// The generated schema has a separate enum for the default and the
/// additional behaviors. This converts into both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewerProtocolPolicy {
    #[default]
    AllowAll,
    HttpsOnly,
    RedirectToHttps,
}

impl From<ViewerProtocolPolicy> for DefaultCacheBehaviorViewerProtocolPolicyEnum {
    fn from(value: ViewerProtocolPolicy) -> Self {
        match value {
            ViewerProtocolPolicy::AllowAll => Self::Allowall,
            ViewerProtocolPolicy::HttpsOnly => Self::Httpsonly,
            ViewerProtocolPolicy::RedirectToHttps => Self::Redirecttohttps,
        }
    }
}

impl From<ViewerProtocolPolicy> for CacheBehaviorViewerProtocolPolicyEnum {
    fn from(value: ViewerProtocolPolicy) -> Self {
        match value {
            ViewerProtocolPolicy::AllowAll => Self::Allowall,
            ViewerProtocolPolicy::HttpsOnly => Self::Httpsonly,
            ViewerProtocolPolicy::RedirectToHttps => Self::Redirecttohttps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Options,
    Put,
    Patch,
    Post,
    Delete,
}

impl Method {
    pub const ALLOW_ALL: &'static [Method] = &[
        Method::Get, Method::Head, Method::Options,
        Method::Put, Method::Patch, Method::Post, Method::Delete,
    ];
    pub const GET_HEAD: &'static [Method] = &[Method::Get, Method::Head];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

fn method_names(methods: &[Method]) -> Vec<String> {
    methods.iter().map(|m| m.as_str().to_string()).collect()
}

/// An origin that is not an S3 bucket, on the standard ports and TLSv1.2.
/// The id is assigned when the origin is registered on a distribution.
pub fn custom_origin(domain_name: StrVal, origin_protocol_policy: CustomOriginConfigOriginProtocolPolicyEnum) -> Origin {
    Origin {
        domain_name,
        custom_origin_config: Some(CustomOriginConfig {
            origin_protocol_policy,
            http_port: Some(80),
            https_port: Some(443),
            origin_ssl_protocols: Some(vec!["TLSv1.2".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `ttl` is how many seconds CloudFront caches the error for.
pub fn custom_error_response(error_code: u16, ttl: u32) -> CustomErrorResponse {
    CustomErrorResponse {
        error_code: error_code.into(),
        error_caching_min_ttl: Some(ttl.into()),
        ..Default::default()
    }
}

/// Everything about a behavior except where it routes to.
/// Shared between behaviors that only differ by path pattern and origin.
#[derive(Clone)]
pub struct BehaviorOptions {
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub allowed_methods: Vec<Method>,
    pub cached_methods: Vec<Method>,
    pub compress: bool,
    pub cache_policy_id: StrVal,
    pub origin_request_policy_id: Option<StrVal>,
    pub response_headers_policy_id: Option<StrVal>,
}

impl BehaviorOptions {
    pub fn default_behavior(&self, target_origin_id: &str) -> DefaultCacheBehavior {
        DefaultCacheBehavior {
            target_origin_id: target_origin_id.into(),
            viewer_protocol_policy: self.viewer_protocol_policy.into(),
            allowed_methods: Some(method_names(&self.allowed_methods)),
            cached_methods: Some(method_names(&self.cached_methods)),
            compress: Some(self.compress),
            cache_policy_id: Some(self.cache_policy_id.clone()),
            origin_request_policy_id: self.origin_request_policy_id.clone(),
            response_headers_policy_id: self.response_headers_policy_id.clone(),
            ..Default::default()
        }
    }

    pub fn behavior(&self, path_pattern: &str, target_origin_id: &str) -> CacheBehavior {
        CacheBehavior {
            path_pattern: path_pattern.into(),
            target_origin_id: target_origin_id.into(),
            viewer_protocol_policy: self.viewer_protocol_policy.into(),
            allowed_methods: Some(method_names(&self.allowed_methods)),
            cached_methods: Some(method_names(&self.cached_methods)),
            compress: Some(self.compress),
            cache_policy_id: Some(self.cache_policy_id.clone()),
            origin_request_policy_id: self.origin_request_policy_id.clone(),
            response_headers_policy_id: self.response_headers_policy_id.clone(),
            ..Default::default()
        }
    }
}

fn same_target(a: &Origin, b: &Origin) -> bool {
    let target = |o: &Origin| (
        serde_json::to_value(&o.domain_name).ok(),
        serde_json::to_value(&o.custom_origin_config).ok(),
    );
    target(a) == target(b)
}

/// Assembles a distribution one origin and behavior at a time.
/// Origins get the ids `origin0`, `origin1`, ... in the order they are registered.
#[derive(Default)]
pub struct Distribution {
    /// everything except the origins and the additional behaviors
    pub config: DistributionConfig,
    origins: Vec<(String, Origin)>,
    behaviors: Vec<(String, CacheBehavior)>,
}

impl Distribution {
    pub fn new(config: DistributionConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Adds the origin unless an origin pointing at the same target
    /// already exists. Returns the id behaviors should target.
    pub fn register_origin(&mut self, mut origin: Origin) -> String {
        if let Some((id, _)) = self.origins.iter().find(|(_, o)| same_target(o, &origin)) {
            return id.clone();
        }
        let id = format!("origin{}", self.origins.len());
        origin.id = id.clone().into();
        self.origins.push((id.clone(), origin));
        id
    }

    pub fn origin(&self, id: &str) -> Option<&Origin> {
        self.origins.iter().find(|(o, _)| o == id).map(|(_, o)| o)
    }

    pub fn origin_count(&self) -> usize {
        self.origins.len()
    }

    pub fn set_default_behavior(&mut self, target_origin_id: &str, options: &BehaviorOptions) -> Result<(), BehaviorError> {
        if self.origin(target_origin_id).is_none() {
            return Err(BehaviorError::UnknownOrigin(target_origin_id.to_string()));
        }
        self.config.default_cache_behavior = options.default_behavior(target_origin_id);
        Ok(())
    }

    fn check_path_pattern(&self, path_pattern: &str) -> Result<(), BehaviorError> {
        if path_pattern.is_empty() {
            return Err(BehaviorError::EmptyPattern);
        }
        if path_pattern == DEFAULT_PATH_PATTERN {
            return Err(BehaviorError::DefaultPattern);
        }
        if self.behavior(path_pattern).is_some() {
            return Err(BehaviorError::DuplicatePattern(path_pattern.to_string()));
        }
        Ok(())
    }

    /// Registers a behavior for `path_pattern` that routes to an
    /// already registered origin.
    pub fn add_behavior(
        &mut self,
        path_pattern: &str,
        target_origin_id: &str,
        options: &BehaviorOptions,
    ) -> Result<(), BehaviorError> {
        self.check_path_pattern(path_pattern)?;
        if self.origin(target_origin_id).is_none() {
            return Err(BehaviorError::UnknownOrigin(target_origin_id.to_string()));
        }
        self.behaviors.push((path_pattern.to_string(), options.behavior(path_pattern, target_origin_id)));
        Ok(())
    }

    /// Registers `origin` if needed and routes `path_pattern` to it.
    /// A rejected pattern leaves the distribution unchanged.
    pub fn route(&mut self, path_pattern: &str, origin: Origin, options: &BehaviorOptions) -> Result<String, BehaviorError> {
        self.check_path_pattern(path_pattern)?;
        let id = self.register_origin(origin);
        self.add_behavior(path_pattern, &id, options)?;
        Ok(id)
    }

    /// the additional behavior registered for exactly this pattern.
    pub fn behavior(&self, path_pattern: &str) -> Option<&CacheBehavior> {
        self.behaviors.iter().find(|(p, _)| p == path_pattern).map(|(_, b)| b)
    }

    pub fn path_patterns(&self) -> impl Iterator<Item = &str> {
        self.behaviors.iter().map(|(p, _)| p.as_str())
    }

    pub fn to_resource(&self) -> Validated<CfnDistribution> {
        let mut config = self.config.clone();
        let origins: Vec<Origin> = self.origins.iter().map(|(_, o)| o.clone()).collect();
        config.origins = Some(origins);
        if !self.behaviors.is_empty() {
            let behaviors: Vec<CacheBehavior> = self.behaviors.iter().map(|(_, b)| b.clone()).collect();
            config.cache_behaviors = Some(behaviors);
        }
        let distribution = CfnDistribution {
            distribution_config: config,
            ..Default::default()
        };
        Validated::new(distribution, validate_distribution)
    }
}

fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Checks the serialized distribution: origin ids are unique and every
/// behavior targets one of them, path patterns are unique, cached methods
/// are allowed, and error responses are distinct 4xx/5xx codes.
pub fn validate_distribution(props: &Value) -> Result<(), String> {
    let config = &props["DistributionConfig"];
    if let Some(comment) = config["Comment"].as_str() {
        if comment.chars().count() > 128 {
            return Err(format!("Distribution comment must be at most 128 characters. '{comment}' is too long"));
        }
    }
    let origins = match config["Origins"].as_array() {
        Some(origins) if !origins.is_empty() => origins,
        _ => return Err("Distribution must have at least one origin".into()),
    };
    let mut origin_ids = HashSet::new();
    for origin in origins {
        let id = origin["Id"].as_str().unwrap_or_default();
        if is_unset(origin.get("DomainName")) {
            return Err(format!("Origin '{id}' is missing a domain name"));
        }
        if !origin_ids.insert(id) {
            return Err(format!("Duplicate origin id '{id}'"));
        }
    }

    let default = &config["DefaultCacheBehavior"];
    if !is_unset(default.get("PathPattern")) {
        return Err("The default cache behavior must not have a path pattern".into());
    }
    let behaviors = config["CacheBehaviors"].as_array().map(Vec::as_slice).unwrap_or_default();
    let mut patterns = HashSet::new();
    for behavior in behaviors {
        let pattern = match behavior["PathPattern"].as_str() {
            Some("") | None => return Err(BehaviorError::EmptyPattern.to_string()),
            Some(DEFAULT_PATH_PATTERN) => return Err(BehaviorError::DefaultPattern.to_string()),
            Some(p) => p,
        };
        if !patterns.insert(pattern) {
            return Err(BehaviorError::DuplicatePattern(pattern.to_string()).to_string());
        }
    }
    for behavior in std::iter::once(default).chain(behaviors.iter()) {
        let target = behavior["TargetOriginId"].as_str().unwrap_or_default();
        if !origin_ids.contains(target) {
            return Err(BehaviorError::UnknownOrigin(target.to_string()).to_string());
        }
        if let (Some(allowed), Some(cached)) = (behavior["AllowedMethods"].as_array(), behavior["CachedMethods"].as_array()) {
            if cached.iter().any(|m| !allowed.contains(m)) {
                return Err(format!("Behavior targeting '{target}' caches methods it does not allow"));
            }
        }
    }

    let responses = config["CustomErrorResponses"].as_array().map(Vec::as_slice).unwrap_or_default();
    let mut error_codes = HashSet::new();
    for response in responses {
        let code = response["ErrorCode"].as_i64().unwrap_or_default();
        if !(400..=599).contains(&code) {
            return Err(format!("Custom error response code {code} must be between 400 and 599"));
        }
        if !error_codes.insert(code) {
            return Err(format!("Duplicate custom error response for {code}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_cfn_stack::{get_att, CfnResource};
    use serde_json::json;

    fn options() -> BehaviorOptions {
        BehaviorOptions {
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            allowed_methods: Method::ALLOW_ALL.to_vec(),
            cached_methods: Method::GET_HEAD.to_vec(),
            compress: true,
            cache_policy_id: CACHING_OPTIMIZED_POLICY_ID.into(),
            origin_request_policy_id: Some(ALL_VIEWER_ORIGIN_REQUEST_POLICY_ID.into()),
            response_headers_policy_id: None,
        }
    }

    fn https(domain: &str) -> Origin {
        custom_origin(domain.into(), CustomOriginConfigOriginProtocolPolicyEnum::Httpsonly)
    }

    fn distribution() -> Distribution {
        let mut distr = Distribution::new(DistributionConfig {
            enabled: true,
            ..Default::default()
        });
        let id = distr.register_origin(https("example.com"));
        distr.set_default_behavior(&id, &options()).unwrap();
        distr
    }

    fn config_of(distr: &Distribution) -> Value {
        distr.to_resource().properties()["DistributionConfig"].clone()
    }

    #[test]
    fn origins_are_registered_once_per_target() {
        let mut distr = Distribution::default();
        let a = distr.register_origin(https("a.com"));
        let b = distr.register_origin(https("b.com"));
        let a_again = distr.register_origin(https("a.com"));
        let a_http = distr.register_origin(custom_origin("a.com".into(), CustomOriginConfigOriginProtocolPolicyEnum::Httponly));
        assert_eq!(a, "origin0");
        assert_eq!(b, "origin1");
        assert_eq!(a_again, "origin0");
        assert_eq!(a_http, "origin2");
        assert_eq!(distr.origin_count(), 3);
        let policy = serde_json::to_value(&distr.origin("origin2").unwrap().custom_origin_config).unwrap();
        assert_eq!(policy["OriginProtocolPolicy"], "http-only");
    }

    #[test]
    fn add_behavior_rules() {
        let mut distr = distribution();
        assert_eq!(distr.add_behavior("*", "origin0", &options()), Err(BehaviorError::DefaultPattern));
        assert_eq!(distr.add_behavior("", "origin0", &options()), Err(BehaviorError::EmptyPattern));
        assert_eq!(distr.add_behavior("/x/*", "nope", &options()), Err(BehaviorError::UnknownOrigin("nope".into())));
        distr.add_behavior("/x/*", "origin0", &options()).unwrap();
        assert_eq!(
            distr.add_behavior("/x/*", "origin0", &options()),
            Err(BehaviorError::DuplicatePattern("/x/*".into())),
        );
        assert_eq!(distr.path_patterns().collect::<Vec<_>>(), vec!["/x/*"]);
        assert!(distr.behavior("/x/*").is_some());
        assert!(distr.to_resource().validate().is_ok());
        assert_eq!(
            distr.set_default_behavior("nope", &options()),
            Err(BehaviorError::UnknownOrigin("nope".into())),
        );
    }

    #[test]
    fn rejected_routes_leave_origins_alone() {
        let mut distr = distribution();
        assert_eq!(distr.route("/x/*", https("other.com"), &options()), Ok("origin1".to_string()));
        assert_eq!(
            distr.route("/x/*", https("third.com"), &options()),
            Err(BehaviorError::DuplicatePattern("/x/*".into())),
        );
        assert_eq!(distr.route("*", https("third.com"), &options()), Err(BehaviorError::DefaultPattern));
        assert_eq!(distr.origin_count(), 2);
        assert_eq!(distr.route("/y/*", https("example.com"), &options()), Ok("origin0".to_string()));
    }

    #[test]
    fn distribution_serializes_like_cloudformation() {
        let mut distr = distribution();
        distr.config.http_version = DistributionConfigHttpVersionEnum::Http2and3.into();
        distr.config.ipv6_enabled = true.into();
        distr.config.web_acl_id = Some(StrVal::Val(get_att("Acl", "Arn")));
        distr.config.custom_error_responses = Some(vec![custom_error_response(502, 10)]);
        let config = config_of(&distr);
        assert_eq!(config["Enabled"], true);
        assert_eq!(config["HttpVersion"], "http2and3");
        assert_eq!(config["IPV6Enabled"], true);
        assert_eq!(config["WebACLId"]["Fn::GetAtt"][0], "Acl");
        assert!(config.get("CacheBehaviors").map_or(true, Value::is_null));
        assert_eq!(config["CustomErrorResponses"][0]["ErrorCode"], 502);
        assert_eq!(config["CustomErrorResponses"][0]["ErrorCachingMinTTL"].as_f64(), Some(10.0));

        let origin = &config["Origins"][0];
        assert_eq!(origin["Id"], "origin0");
        assert_eq!(origin["DomainName"], "example.com");
        assert_eq!(origin["CustomOriginConfig"]["OriginProtocolPolicy"], "https-only");
        assert_eq!(origin["CustomOriginConfig"]["HTTPSPort"], 443);
        assert_eq!(origin["CustomOriginConfig"]["OriginSSLProtocols"], json!(["TLSv1.2"]));

        let default = &config["DefaultCacheBehavior"];
        assert!(is_unset(default.get("PathPattern")));
        assert_eq!(default["TargetOriginId"], "origin0");
        assert_eq!(default["ViewerProtocolPolicy"], "redirect-to-https");
        assert_eq!(default["AllowedMethods"], json!(["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"]));
        assert_eq!(default["CachedMethods"], json!(["GET", "HEAD"]));
        assert_eq!(default["Compress"], true);
        assert_eq!(default["CachePolicyId"], CACHING_OPTIMIZED_POLICY_ID);
        assert_eq!(default["OriginRequestPolicyId"], ALL_VIEWER_ORIGIN_REQUEST_POLICY_ID);
        assert!(is_unset(default.get("ResponseHeadersPolicyId")));
    }

    fn valid_config() -> Value {
        json!({
            "DistributionConfig": {
                "Enabled": true,
                "Origins": [{ "Id": "origin0", "DomainName": "example.com" }],
                "DefaultCacheBehavior": {
                    "TargetOriginId": "origin0",
                    "AllowedMethods": ["GET", "HEAD"],
                    "CachedMethods": ["GET", "HEAD"],
                },
                "CacheBehaviors": [{ "PathPattern": "/a", "TargetOriginId": "origin0" }],
                "CustomErrorResponses": [{ "ErrorCode": 502 }],
            }
        })
    }

    #[test]
    fn validation_catches_bad_configs() {
        assert!(validate_distribution(&valid_config()).is_ok());

        let mut props = valid_config();
        props["DistributionConfig"]["CacheBehaviors"] = json!([
            { "PathPattern": "/a", "TargetOriginId": "origin0" },
            { "PathPattern": "/a", "TargetOriginId": "origin0" },
        ]);
        assert!(validate_distribution(&props).unwrap_err().contains("'/a' already exists"));

        let mut props = valid_config();
        props["DistributionConfig"]["DefaultCacheBehavior"]["TargetOriginId"] = json!("missing");
        assert!(validate_distribution(&props).unwrap_err().contains("'missing'"));

        let mut props = valid_config();
        props["DistributionConfig"]["CustomErrorResponses"] = json!([{ "ErrorCode": 200 }]);
        assert!(validate_distribution(&props).is_err());

        let mut props = valid_config();
        props["DistributionConfig"]["Comment"] = json!("x".repeat(129));
        assert!(validate_distribution(&props).is_err());

        let mut props = valid_config();
        props["DistributionConfig"]["DefaultCacheBehavior"]["CachedMethods"] = json!(["GET", "POST"]);
        assert!(validate_distribution(&props).is_err());

        let mut props = valid_config();
        props["DistributionConfig"]["Origins"] = json!([]);
        assert!(validate_distribution(&props).is_err());

        assert!(Distribution::default().to_resource().validate().is_err());
    }
}
