use aws_cfn_stack::serde_json::Value;
use aws_cfn_stack::{get_att, get_ref, logical_id, StrVal, Stack, Validated};
use aws_cloudfront_distribution::{
    custom_error_response, BehaviorOptions, CfnCachePolicy, CfnResponseHeadersPolicy, Distribution,
    DistributionConfig, DistributionConfigHttpVersionEnum, Method, ViewerProtocolPolicy,
    ALL_VIEWER_ORIGIN_REQUEST_POLICY_ID, CACHING_OPTIMIZED_POLICY_ID,
};
use aws_wafv2::CfnWebACL;
use tracing::debug;

use crate::{firewall, policies, CdnError, OriginSelector, Result};

/// Served with the managed caching optimized policy instead of the API cache policy.
pub const STATIC_PATH_PATTERNS: [&str; 8] = [
    "*.css", "*.png", "*.jpg", "*.jpeg", "*.svg", "*.woff", "*.woff2", "*.js",
];

/// origin failures are cached briefly so an outage doesn't turn into a stampede.
pub const ERROR_STATUS_CODES: [u16; 5] = [500, 501, 502, 503, 504];
pub const ERROR_CACHING_TTL_SECS: u32 = 10;

/// policy names are limited to 128 characters, this leaves room for the suffix.
const POLICY_NAME_PREFIX_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct CdnProps {
    pub origin: OriginSelector,
    /// requests per client IP per 5 minute window
    pub request_rate_limit: u32,
}

/// CloudFormation logical ids of the resources a `SupabaseCdn` creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalIds {
    pub construct: String,
    pub web_acl: String,
    pub cache_policy: String,
    pub response_headers_policy: String,
    pub distribution: String,
}

impl LogicalIds {
    fn new(construct: &str) -> Self {
        Self {
            construct: construct.to_string(),
            web_acl: format!("{construct}WebAcl"),
            cache_policy: format!("{construct}CachePolicy"),
            response_headers_policy: format!("{construct}ResponseHeadersPolicy"),
            distribution: format!("{construct}Distribution"),
        }
    }
}

/// CloudFront distribution and WAF web ACL in front of a Supabase API.
pub struct SupabaseCdn {
    pub logical_ids: LogicalIds,
    pub web_acl: Validated<CfnWebACL>,
    pub cache_policy: Validated<CfnCachePolicy>,
    pub response_headers_policy: Validated<CfnResponseHeadersPolicy>,
    pub distribution: Distribution,
    /// used by the default behavior and every behavior added with `add_behavior`.
    pub default_behavior_options: BehaviorOptions,
}

/// cache policy names are account wide, so they are prefixed with the stack name.
fn policy_name(stack_name: &str, construct: &str, suffix: &str) -> String {
    let prefix = if stack_name.is_empty() {
        construct.to_string()
    } else {
        format!("{stack_name}-{construct}")
    };
    let prefix: String = prefix.chars().take(POLICY_NAME_PREFIX_CHARS).collect();
    format!("{prefix}-{suffix}")
}

impl SupabaseCdn {
    pub fn new(scope: &Stack, id: &str, props: CdnProps) -> Result<Self> {
        let construct = logical_id(&[id]);
        if construct.is_empty() {
            return Err(CdnError::config(format!("Construct id '{id}' must contain at least one alphanumeric character")));
        }
        let logical_ids = LogicalIds::new(&construct);
        debug!(id, origin = ?props.origin, "resolving origin");
        let origin = props.origin.resolve();

        let web_acl = firewall::web_acl(&construct, props.request_rate_limit);
        let cache_policy = policies::cache_policy(&policy_name(&scope.name, &construct, "CachePolicy"));
        let response_headers_policy = policies::response_headers_policy(
            &policy_name(&scope.name, &construct, "ResponseHeadersPolicy"),
        );

        let default_behavior_options = BehaviorOptions {
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            allowed_methods: Method::ALLOW_ALL.to_vec(),
            cached_methods: Method::GET_HEAD.to_vec(),
            compress: true,
            cache_policy_id: StrVal::Val(get_ref(&logical_ids.cache_policy)),
            origin_request_policy_id: Some(ALL_VIEWER_ORIGIN_REQUEST_POLICY_ID.into()),
            response_headers_policy_id: Some(StrVal::Val(get_ref(&logical_ids.response_headers_policy))),
        };
        let static_content_options = BehaviorOptions {
            cache_policy_id: CACHING_OPTIMIZED_POLICY_ID.into(),
            ..default_behavior_options.clone()
        };

        let construct_path = if scope.name.is_empty() {
            id.to_string()
        } else {
            format!("{}/{id}", scope.name)
        };
        let error_responses = ERROR_STATUS_CODES.iter()
            .map(|&code| custom_error_response(code, ERROR_CACHING_TTL_SECS))
            .collect();
        let mut distribution = Distribution::new(DistributionConfig {
            enabled: true,
            comment: Some(format!("Supabase - CDN ({construct_path}/Distribution)").into()),
            http_version: DistributionConfigHttpVersionEnum::Http2and3.into(),
            ipv6_enabled: true.into(),
            web_acl_id: Some(StrVal::Val(get_att(&logical_ids.web_acl, "Arn"))),
            custom_error_responses: Some(error_responses),
            ..Default::default()
        });
        let origin_id = distribution.register_origin(origin);
        distribution.set_default_behavior(&origin_id, &default_behavior_options)?;
        for pattern in STATIC_PATH_PATTERNS {
            distribution.add_behavior(pattern, &origin_id, &static_content_options)?;
        }

        Ok(Self {
            logical_ids,
            web_acl,
            cache_policy,
            response_headers_policy,
            distribution,
            default_behavior_options,
        })
    }

    /// Routes `path_pattern` to `origin` using the default behavior options.
    /// Fails if the pattern is `*` or already routed, leaving the distribution as it was.
    pub fn add_behavior<O: Into<OriginSelector>>(&mut self, path_pattern: &str, origin: O) -> Result<()> {
        let origin = origin.into().resolve();
        let origin_id = self.distribution.route(path_pattern, origin, &self.default_behavior_options)?;
        debug!(path_pattern, origin_id = %origin_id, "added behavior");
        Ok(())
    }

    pub fn web_acl_arn(&self) -> Value {
        get_att(&self.logical_ids.web_acl, "Arn")
    }

    pub fn distribution_domain_name(&self) -> Value {
        get_att(&self.logical_ids.distribution, "DomainName")
    }

    pub fn distribution_id(&self) -> Value {
        get_ref(&self.logical_ids.distribution)
    }

    /// Adds every resource to the stack, along with outputs for the
    /// distribution domain, distribution id, and web ACL arn.
    pub fn add_to_stack(self, stack: &mut Stack) {
        let construct = &self.logical_ids.construct;
        stack.add_output(format!("{construct}DomainName"), "Domain name of the CloudFront distribution", self.distribution_domain_name());
        stack.add_output(format!("{construct}DistributionId"), "Id of the CloudFront distribution", self.distribution_id());
        stack.add_output(format!("{construct}WebAclArn"), "Arn of the WAF web ACL", self.web_acl_arn());

        let distribution = self.distribution.to_resource();
        let ids = self.logical_ids;
        stack.add_resource(ids.web_acl, self.web_acl);
        stack.add_resource(ids.cache_policy, self.cache_policy);
        stack.add_resource(ids.response_headers_policy, self.response_headers_policy);
        stack.add_resource(ids.distribution, distribution);
    }
}
