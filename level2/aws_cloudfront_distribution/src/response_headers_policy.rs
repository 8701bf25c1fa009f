use std::collections::HashSet;

use aws_cfn_stack::serde_json::Value;
use aws_cfn_stack::Validated;

pub use cloud_front::response_headers_policy::{
    CfnResponseHeadersPolicy, CustomHeader, CustomHeadersConfig, ResponseHeadersPolicyConfig,
};

use crate::cache_policy::validate_policy_name;

/// A header CloudFront adds to every response, replacing the one
/// the origin sent if there is one.
pub fn override_header(header: &str, value: &str) -> CustomHeader {
    CustomHeader {
        header: header.into(),
        value: value.into(),
        r#override: true,
        ..Default::default()
    }
}

pub fn validated_response_headers_policy(policy: CfnResponseHeadersPolicy) -> Validated<CfnResponseHeadersPolicy> {
    Validated::new(policy, validate_response_headers_policy)
}

/// Checks the serialized policy: the name, and that no custom header is set
/// twice. Header names are case insensitive.
pub fn validate_response_headers_policy(props: &Value) -> Result<(), String> {
    let config = &props["ResponseHeadersPolicyConfig"];
    validate_policy_name(config["Name"].as_str().unwrap_or_default())?;
    let items = match config["CustomHeadersConfig"]["Items"].as_array() {
        Some(items) => items,
        None => return Ok(()),
    };
    let mut seen = HashSet::new();
    for item in items {
        let header = item["Header"].as_str().unwrap_or_default();
        if header.is_empty() {
            return Err("Custom response headers must have a name".into());
        }
        if !seen.insert(header.to_ascii_lowercase()) {
            return Err(format!("Custom response header '{header}' is set more than once"));
        }
    }
    Ok(())
}
