use aws_cfn_stack::serde_json::Value;
use aws_cfn_stack::Validated;

pub use cloud_front::cache_policy::{
    CachePolicyConfig, CfnCachePolicy, CookiesConfig, CookiesConfigCookieBehaviorEnum,
    HeadersConfig, HeadersConfigHeaderBehaviorEnum, ParametersInCacheKeyAndForwardedToOrigin,
    QueryStringsConfig, QueryStringsConfigQueryStringBehaviorEnum,
};

pub fn header_allow_list(headers: &[&str]) -> HeadersConfig {
    HeadersConfig {
        header_behavior: HeadersConfigHeaderBehaviorEnum::Whitelist,
        headers: Some(headers.iter().map(|h| h.to_string()).collect()),
        ..Default::default()
    }
}

pub fn all_query_strings() -> QueryStringsConfig {
    QueryStringsConfig {
        query_string_behavior: QueryStringsConfigQueryStringBehaviorEnum::All,
        ..Default::default()
    }
}

pub fn no_cookies() -> CookiesConfig {
    CookiesConfig {
        cookie_behavior: CookiesConfigCookieBehaviorEnum::None,
        ..Default::default()
    }
}

pub fn validated_cache_policy(policy: CfnCachePolicy) -> Validated<CfnCachePolicy> {
    Validated::new(policy, validate_cache_policy)
}

/// CloudFront policy names can only contain letters, numbers,
/// hyphens, and underscores, up to 128 characters.
pub(crate) fn validate_policy_name(name: &str) -> Result<(), String> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if name.is_empty() || name.len() > 128 || !name.chars().all(allowed) {
        return Err(format!("Invalid policy name '{name}'. Must be 1-128 letters, numbers, hyphens, or underscores"));
    }
    Ok(())
}

/// Checks the serialized cache policy: the name, TTL ordering, and that
/// the header behavior agrees with the header list.
pub fn validate_cache_policy(props: &Value) -> Result<(), String> {
    let config = &props["CachePolicyConfig"];
    validate_policy_name(config["Name"].as_str().unwrap_or_default())?;
    let ttl = |key: &str| config[key].as_f64().unwrap_or_default();
    let (min, default, max) = (ttl("MinTTL"), ttl("DefaultTTL"), ttl("MaxTTL"));
    if !(min <= default && default <= max) {
        return Err(format!("Cache policy TTLs must satisfy min <= default <= max. Got min={min}, default={default}, max={max}"));
    }
    let headers = &config["ParametersInCacheKeyAndForwardedToOrigin"]["HeadersConfig"];
    let has_headers = headers["Headers"].as_array().is_some_and(|h| !h.is_empty());
    match (headers["HeaderBehavior"].as_str(), has_headers) {
        (Some("whitelist"), false) => {
            return Err("Cache policy header allow list must name at least one header".into());
        }
        (Some("none"), true) => {
            return Err("Cache policy lists headers but does not include them in the cache key".into());
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_cfn_stack::serde_json::json;
    use aws_cfn_stack::CfnResource;

    fn policy(min_ttl: u32, default_ttl: u32, max_ttl: u32) -> Validated<CfnCachePolicy> {
        validated_cache_policy(CfnCachePolicy {
            cache_policy_config: CachePolicyConfig {
                name: "my-policy".into(),
                comment: Some("testing".into()),
                min_ttl: min_ttl.into(),
                default_ttl: default_ttl.into(),
                max_ttl: max_ttl.into(),
                parameters_in_cache_key_and_forwarded_to_origin: ParametersInCacheKeyAndForwardedToOrigin {
                    cookies_config: no_cookies(),
                    headers_config: header_allow_list(&["Authorization", "Host"]),
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

    #[test]
    fn serializes_like_cloudformation() {
        let policy = policy(0, 2, 600);
        assert_eq!(policy.type_string(), "AWS::CloudFront::CachePolicy");
        let value = policy.properties();
        let config = &value["CachePolicyConfig"];
        assert_eq!(config["Name"], "my-policy");
        assert_eq!(config["MinTTL"].as_f64(), Some(0.0));
        assert_eq!(config["DefaultTTL"].as_f64(), Some(2.0));
        assert_eq!(config["MaxTTL"].as_f64(), Some(600.0));
        let params = &config["ParametersInCacheKeyAndForwardedToOrigin"];
        assert_eq!(params["CookiesConfig"]["CookieBehavior"], "none");
        assert_eq!(params["HeadersConfig"]["HeaderBehavior"], "whitelist");
        assert_eq!(params["HeadersConfig"]["Headers"], json!(["Authorization", "Host"]));
        assert_eq!(params["QueryStringsConfig"]["QueryStringBehavior"], "all");
        assert_eq!(params["EnableAcceptEncodingGzip"], true);
        assert_eq!(params["EnableAcceptEncodingBrotli"], true);
    }

    #[test]
    fn ttl_ordering_is_enforced() {
        assert!(policy(0, 2, 600).validate().is_ok());
        assert!(policy(0, 0, 0).validate().is_ok());
        assert!(policy(3, 2, 600).validate().is_err());
        assert!(policy(0, 601, 600).validate().is_err());
    }

    #[test]
    fn header_behavior_must_match_header_list() {
        let config = |behavior: &str, headers: Value| json!({
            "CachePolicyConfig": {
                "Name": "p",
                "ParametersInCacheKeyAndForwardedToOrigin": {
                    "HeadersConfig": { "HeaderBehavior": behavior, "Headers": headers },
                },
            }
        });
        assert!(validate_cache_policy(&config("whitelist", json!(["Host"]))).is_ok());
        assert!(validate_cache_policy(&config("whitelist", json!([]))).is_err());
        assert!(validate_cache_policy(&config("none", json!(["Host"]))).is_err());
        assert!(validate_cache_policy(&config("none", Value::Null)).is_ok());
    }

    #[test]
    fn names_are_checked() {
        assert!(validate_policy_name("stack-Cdn_CachePolicy").is_ok());
        assert!(validate_policy_name("").is_err());
        assert!(validate_policy_name("has space").is_err());
        assert!(validate_policy_name(&"a".repeat(129)).is_err());
    }
}
