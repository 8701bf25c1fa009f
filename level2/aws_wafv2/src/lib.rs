//! Helpers for building `AWS::WAFv2::WebACL` resources out of the
//! generated WAFv2 types, plus the checks CloudFormation would otherwise
//! only report at deploy time.

use std::collections::HashSet;

use aws_cfn_stack::serde_json::{self, Value};
use aws_cfn_stack::Validated;
use cfn_resources::ToOptStrVal;

pub use wafv2::web_acl::{
    AllowAction, BlockAction, CfnWebACL, DefaultAction, ExcludedRule, FieldIdentifier,
    ManagedRuleGroupConfig, ManagedRuleGroupConfigPayloadTypeEnum, ManagedRuleGroupStatement,
    OverrideAction, RateBasedStatement, RateBasedStatementAggregateKeyTypeEnum, Rule, RuleAction,
    Statement, VisibilityConfig, WebACLScopeEnum,
};

/// the smallest limit WAF accepts for a rate based statement.
pub const MIN_RATE_LIMIT: u32 = 10;
pub const MAX_RATE_LIMIT: u32 = 2_000_000_000;

pub const AWS_VENDOR: &str = "AWS";

/// sampled requests and cloudwatch metrics both on.
pub fn visibility(metric_name: &str) -> VisibilityConfig {
    VisibilityConfig {
        cloud_watch_metrics_enabled: true,
        metric_name: metric_name.into(),
        sampled_requests_enabled: true,
    }
}

/// a rule group maintained by AWS.
pub fn aws_managed_group(name: &str) -> ManagedRuleGroupStatement {
    ManagedRuleGroupStatement {
        vendor_name: AWS_VENDOR.into(),
        name: name.into(),
        ..Default::default()
    }
}

pub fn excluded_rules(names: &[&str]) -> Vec<ExcludedRule> {
    names.iter()
        .map(|name| ExcludedRule { name: (*name).into() })
        .collect()
}

pub fn field(identifier: &str) -> FieldIdentifier {
    FieldIdentifier { identifier: identifier.into() }
}

/// Account takeover prevention settings. Each setting is its own config entry.
pub fn login_configs(login_path: &str, username_field: &str, password_field: &str) -> Vec<ManagedRuleGroupConfig> {
    vec![
        ManagedRuleGroupConfig {
            login_path: login_path.to_str_val(),
            ..Default::default()
        },
        ManagedRuleGroupConfig {
            payload_type: Some(ManagedRuleGroupConfigPayloadTypeEnum::Json),
            ..Default::default()
        },
        ManagedRuleGroupConfig {
            username_field: Some(field(username_field)),
            ..Default::default()
        },
        ManagedRuleGroupConfig {
            password_field: Some(field(password_field)),
            ..Default::default()
        },
    ]
}

/// a rule group rule that keeps the group's own actions.
/// metrics are named after the rule.
pub fn managed_rule(name: &str, priority: u32, group: ManagedRuleGroupStatement) -> Rule {
    Rule {
        name: name.into(),
        priority: priority.into(),
        statement: Statement {
            managed_rule_group_statement: Some(group.into()),
            ..Default::default()
        }.into(),
        override_action: Some(OverrideAction {
            none: Some(serde_json::json!({})),
            ..Default::default()
        }),
        visibility_config: visibility(name),
        ..Default::default()
    }
}

/// blocks clients that send more than `limit` requests within a 5 minute window.
pub fn rate_based_rule(name: &str, priority: u32, limit: u32) -> Rule {
    let rate = RateBasedStatement {
        limit: limit.into(),
        aggregate_key_type: RateBasedStatementAggregateKeyTypeEnum::Ip,
        ..Default::default()
    };
    Rule {
        name: name.into(),
        priority: priority.into(),
        statement: Statement {
            rate_based_statement: Some(rate.into()),
            ..Default::default()
        }.into(),
        action: Some(RuleAction {
            block: Some(BlockAction::default()),
            ..Default::default()
        }),
        visibility_config: visibility(name),
        ..Default::default()
    }
}

/// A web ACL that allows whatever its rules don't block.
pub fn allow_by_default(scope: WebACLScopeEnum, metric_name: &str, rules: Vec<Rule>) -> Validated<CfnWebACL> {
    let acl = CfnWebACL {
        scope,
        default_action: DefaultAction {
            allow: Some(AllowAction::default()),
            ..Default::default()
        },
        rules: rules.into(),
        visibility_config: visibility(metric_name),
        ..Default::default()
    };
    Validated::new(acl, validate_web_acl)
}

pub fn validate_metric_name(metric_name: &str) -> Result<(), String> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || "_#:.-/".contains(c);
    if metric_name.is_empty() || metric_name.len() > 255 || !metric_name.chars().all(allowed) {
        return Err(format!("has invalid metric name '{metric_name}'"));
    }
    Ok(())
}

fn validate_rule(rule: &Value) -> Result<(), String> {
    let name = rule["Name"].as_str().unwrap_or_default();
    if name.is_empty() {
        return Err("Rule names must not be empty".into());
    }
    let metric_name = rule["VisibilityConfig"]["MetricName"].as_str().unwrap_or_default();
    validate_metric_name(metric_name).map_err(|e| format!("Rule '{name}' {e}"))?;

    let statement = &rule["Statement"];
    let is_rule_group = statement.get("ManagedRuleGroupStatement").is_some()
        || statement.get("RuleGroupReferenceStatement").is_some();
    let has_action = rule.get("Action").is_some_and(|a| !a.is_null());
    let has_override = rule.get("OverrideAction").is_some_and(|a| !a.is_null());
    match (is_rule_group, has_action, has_override) {
        (true, false, true) | (false, true, false) => {}
        (true, _, _) => {
            return Err(format!("Rule '{name}' references a rule group and must set only an override action"));
        }
        (false, _, _) => {
            return Err(format!("Rule '{name}' must set only an action"));
        }
    }
    if let Some(rate) = statement.get("RateBasedStatement") {
        let limit = rate["Limit"].as_i64().unwrap_or_default();
        if !(MIN_RATE_LIMIT as i64..=MAX_RATE_LIMIT as i64).contains(&limit) {
            return Err(format!("Rule '{name}' has rate limit {limit}. Must be between {MIN_RATE_LIMIT} and {MAX_RATE_LIMIT}"));
        }
    }
    Ok(())
}

/// Checks the serialized web ACL: metric names, unique rule names and
/// priorities, actions that fit the statement kind, and rate limit bounds.
pub fn validate_web_acl(props: &Value) -> Result<(), String> {
    let metric_name = props["VisibilityConfig"]["MetricName"].as_str().unwrap_or_default();
    validate_metric_name(metric_name).map_err(|e| format!("Web ACL {e}"))?;
    let rules = match props.get("Rules").and_then(Value::as_array) {
        Some(rules) => rules,
        None => return Ok(()),
    };
    let mut names = HashSet::new();
    let mut priorities = HashSet::new();
    for rule in rules {
        validate_rule(rule)?;
        let name = rule["Name"].as_str().unwrap_or_default();
        if !names.insert(name) {
            return Err(format!("Duplicate rule name '{name}'"));
        }
        let priority = rule["Priority"].as_i64().unwrap_or_default();
        if !priorities.insert(priority) {
            return Err(format!("Rule '{name}' reuses priority {priority}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_cfn_stack::CfnResource;
    use serde_json::json;

    fn cloudfront_acl(rules: Vec<Rule>) -> Validated<CfnWebACL> {
        allow_by_default(WebACLScopeEnum::Cloudfront, "acl", rules)
    }

    #[test]
    fn managed_rule_serializes_like_cloudformation() {
        let group = ManagedRuleGroupStatement {
            excluded_rules: Some(excluded_rules(&["SignalMissingCredential"])),
            managed_rule_group_configs: Some(login_configs("/login", "/email", "/password")),
            ..aws_managed_group("AWSManagedRulesATPRuleSet")
        };
        let value = serde_json::to_value(managed_rule("atp", 0, group)).unwrap();

        let group = &value["Statement"]["ManagedRuleGroupStatement"];
        assert_eq!(group["VendorName"], "AWS");
        assert_eq!(group["Name"], "AWSManagedRulesATPRuleSet");
        assert!(group.get("Version").map_or(true, Value::is_null));
        assert_eq!(group["ExcludedRules"][0]["Name"], "SignalMissingCredential");
        assert_eq!(group["ManagedRuleGroupConfigs"][0]["LoginPath"], "/login");
        assert_eq!(group["ManagedRuleGroupConfigs"][1]["PayloadType"], "JSON");
        assert_eq!(group["ManagedRuleGroupConfigs"][2]["UsernameField"]["Identifier"], "/email");
        assert_eq!(group["ManagedRuleGroupConfigs"][3]["PasswordField"]["Identifier"], "/password");
        assert_eq!(value["OverrideAction"]["None"], json!({}));
        assert!(value.get("Action").map_or(true, Value::is_null));
        assert_eq!(value["Priority"], 0);
        assert_eq!(value["VisibilityConfig"]["CloudWatchMetricsEnabled"], true);
        assert_eq!(value["VisibilityConfig"]["SampledRequestsEnabled"], true);
        assert_eq!(value["VisibilityConfig"]["MetricName"], "atp");
    }

    #[test]
    fn rate_rule_serializes_like_cloudformation() {
        let value = serde_json::to_value(rate_based_rule("RateRule", 1, 500)).unwrap();
        assert_eq!(value["Statement"]["RateBasedStatement"]["Limit"], 500);
        assert_eq!(value["Statement"]["RateBasedStatement"]["AggregateKeyType"], "IP");
        assert!(value["Action"]["Block"].is_object());
        assert!(value.get("OverrideAction").map_or(true, Value::is_null));
    }

    #[test]
    fn web_acl_properties() {
        let acl = cloudfront_acl(vec![rate_based_rule("RateRule", 1, 100)]);
        assert_eq!(acl.type_string(), "AWS::WAFv2::WebACL");
        let value = acl.properties();
        assert_eq!(value["Scope"], "CLOUDFRONT");
        assert!(value["DefaultAction"]["Allow"].is_object());
        assert_eq!(value["Rules"].as_array().unwrap().len(), 1);
        assert!(acl.validate().is_ok());
    }

    fn rate_rule_json(limit: i64) -> Value {
        json!({
            "Name": "RateRule",
            "Priority": 1,
            "Statement": { "RateBasedStatement": { "Limit": limit, "AggregateKeyType": "IP" } },
            "Action": { "Block": {} },
            "VisibilityConfig": { "MetricName": "RateRule" },
        })
    }

    fn managed_rule_json(name: &str, priority: i64) -> Value {
        json!({
            "Name": name,
            "Priority": priority,
            "Statement": { "ManagedRuleGroupStatement": { "VendorName": "AWS", "Name": "One" } },
            "OverrideAction": { "None": {} },
            "VisibilityConfig": { "MetricName": name },
        })
    }

    fn acl_json(rules: Vec<Value>) -> Value {
        json!({ "VisibilityConfig": { "MetricName": "acl" }, "Rules": rules })
    }

    #[test]
    fn rate_limit_bounds() {
        assert!(validate_web_acl(&acl_json(vec![rate_rule_json(MIN_RATE_LIMIT as i64)])).is_ok());
        assert!(validate_web_acl(&acl_json(vec![rate_rule_json(MAX_RATE_LIMIT as i64)])).is_ok());
        let err = validate_web_acl(&acl_json(vec![rate_rule_json(0)])).unwrap_err();
        assert!(err.contains("rate limit 0"));
        assert!(validate_web_acl(&acl_json(vec![rate_rule_json(MAX_RATE_LIMIT as i64 + 1)])).is_err());
        assert!(cloudfront_acl(vec![rate_based_rule("RateRule", 1, 0)]).validate().is_err());
    }

    #[test]
    fn priorities_and_names_must_be_unique() {
        let err = validate_web_acl(&acl_json(vec![managed_rule_json("a", 0), managed_rule_json("b", 0)])).unwrap_err();
        assert_eq!(err, "Rule 'b' reuses priority 0");

        let err = validate_web_acl(&acl_json(vec![managed_rule_json("a", 0), managed_rule_json("a", 1)])).unwrap_err();
        assert_eq!(err, "Duplicate rule name 'a'");
    }

    #[test]
    fn actions_must_match_statement_kind() {
        let mut managed = managed_rule_json("a", 0);
        managed["Action"] = json!({ "Block": {} });
        let err = validate_web_acl(&acl_json(vec![managed])).unwrap_err();
        assert!(err.contains("override action"));

        let mut rate = rate_rule_json(100);
        rate["OverrideAction"] = json!({ "Count": {} });
        let err = validate_web_acl(&acl_json(vec![rate])).unwrap_err();
        assert!(err.contains("only an action"));
    }

    #[test]
    fn metric_names_are_checked() {
        let mut rule = rate_rule_json(100);
        rule["VisibilityConfig"]["MetricName"] = json!("has space");
        assert!(validate_web_acl(&acl_json(vec![rule])).is_err());
        assert!(validate_web_acl(&json!({ "VisibilityConfig": { "MetricName": "" } })).is_err());
        assert!(validate_metric_name("AWS-AWSManagedRulesSQLiRuleSet").is_ok());
    }
}
