use aws_cfn_stack::Validated;
use aws_cloudfront_distribution::{
    all_query_strings, header_allow_list, no_cookies, override_header,
    validated_cache_policy, validated_response_headers_policy, CachePolicyConfig, CfnCachePolicy,
    CfnResponseHeadersPolicy, CustomHeadersConfig, ParametersInCacheKeyAndForwardedToOrigin,
    ResponseHeadersPolicyConfig,
};

pub const POLICY_COMMENT: &str = "Policy for Supabase API";

pub const MIN_TTL_SECS: u32 = 0;
pub const MAX_TTL_SECS: u32 = 600;
pub const DEFAULT_TTL_SECS: u32 = 2;

/// responses differ per user and per project
pub const CACHE_KEY_HEADERS: &[&str] = &["Authorization", "Host"];

pub const SERVER_HEADER: &str = "server";
pub const SERVER_HEADER_VALUE: &str = "cloudfront";

/// Cache policy for API responses. Short lived, keyed on the caller
/// and every query string parameter.
pub fn cache_policy(name: &str) -> Validated<CfnCachePolicy> {
    validated_cache_policy(CfnCachePolicy {
        cache_policy_config: CachePolicyConfig {
            name: name.into(),
            comment: Some(POLICY_COMMENT.into()),
            min_ttl: MIN_TTL_SECS.into(),
            max_ttl: MAX_TTL_SECS.into(),
            default_ttl: DEFAULT_TTL_SECS.into(),
            parameters_in_cache_key_and_forwarded_to_origin: ParametersInCacheKeyAndForwardedToOrigin {
                cookies_config: no_cookies(),
                headers_config: header_allow_list(CACHE_KEY_HEADERS),
                query_strings_config: all_query_strings(),
                enable_accept_encoding_gzip: true.into(),
                enable_accept_encoding_brotli: true.into(),
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    })
}

/// Overwrites the `server` header so responses don't reveal what runs behind the edge.
pub fn response_headers_policy(name: &str) -> Validated<CfnResponseHeadersPolicy> {
    validated_response_headers_policy(CfnResponseHeadersPolicy {
        response_headers_policy_config: ResponseHeadersPolicyConfig {
            name: name.into(),
            comment: Some(POLICY_COMMENT.into()),
            custom_headers_config: Some(CustomHeadersConfig {
                items: vec![override_header(SERVER_HEADER, SERVER_HEADER_VALUE)],
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    })
}
