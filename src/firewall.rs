use aws_cfn_stack::{ToOptStrVal, Validated};
use aws_wafv2::{
    allow_by_default, aws_managed_group, excluded_rules, login_configs, managed_rule,
    rate_based_rule, CfnWebACL, ManagedRuleGroupStatement, Rule, WebACLScopeEnum,
};

pub const IP_REPUTATION_LIST: &str = "AWSManagedRulesAmazonIpReputationList";
pub const KNOWN_BAD_INPUTS: &str = "AWSManagedRulesKnownBadInputsRuleSet";
pub const SQLI: &str = "AWSManagedRulesSQLiRuleSet";
pub const BOT_CONTROL: &str = "AWSManagedRulesBotControlRuleSet";
pub const ACCOUNT_TAKEOVER_PREVENTION: &str = "AWSManagedRulesATPRuleSet";

pub const RATE_BASED_RULE: &str = "RateBasedRule";

/// the gotrue password grant endpoint
pub const LOGIN_PATH: &str = "/auth/v1/token";
pub const USERNAME_FIELD: &str = "/email";
pub const PASSWORD_FIELD: &str = "/password";

fn aws_managed_rule(priority: u32, group_name: &str, group: ManagedRuleGroupStatement) -> Rule {
    managed_rule(&format!("AWS-{group_name}"), priority, group)
}

/// The rules of the web ACL, in evaluation order.
/// `request_rate_limit` is per client IP per 5 minutes.
pub fn security_rules(request_rate_limit: u32) -> Vec<Rule> {
    let sqli = ManagedRuleGroupStatement {
        version: "Version_2.0".to_str_val(),
        ..aws_managed_group(SQLI)
    };
    let bot_control = ManagedRuleGroupStatement {
        excluded_rules: Some(excluded_rules(&["CategoryHttpLibrary", "SignalNonBrowserUserAgent"])),
        ..aws_managed_group(BOT_CONTROL)
    };
    let account_takeover = ManagedRuleGroupStatement {
        excluded_rules: Some(excluded_rules(&["SignalMissingCredential"])),
        managed_rule_group_configs: Some(login_configs(LOGIN_PATH, USERNAME_FIELD, PASSWORD_FIELD)),
        ..aws_managed_group(ACCOUNT_TAKEOVER_PREVENTION)
    };

    vec![
        aws_managed_rule(0, IP_REPUTATION_LIST, aws_managed_group(IP_REPUTATION_LIST)),
        aws_managed_rule(1, KNOWN_BAD_INPUTS, aws_managed_group(KNOWN_BAD_INPUTS)),
        aws_managed_rule(2, SQLI, sqli),
        aws_managed_rule(3, BOT_CONTROL, bot_control),
        aws_managed_rule(4, ACCOUNT_TAKEOVER_PREVENTION, account_takeover),
        rate_based_rule(RATE_BASED_RULE, 5, request_rate_limit),
    ]
}

/// A CloudFront scoped web ACL that allows whatever the rules don't block.
pub fn web_acl(metric_name: &str, request_rate_limit: u32) -> Validated<CfnWebACL> {
    allow_by_default(WebACLScopeEnum::Cloudfront, metric_name, security_rules(request_rate_limit))
}
