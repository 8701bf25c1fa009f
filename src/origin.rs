use aws_cfn_stack::serde_json::Value;
use aws_cfn_stack::{get_att, StrVal};
use aws_cloudfront_distribution::{custom_origin, CustomOriginConfigOriginProtocolPolicyEnum, Origin};

/// A load balancer the distribution forwards to.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancerRef {
    /// a literal dns name, or the intrinsic that resolves to one
    dns_name: Value,
}

impl LoadBalancerRef {
    /// a load balancer defined in the same template.
    pub fn from_logical_id(logical_id: &str) -> Self {
        Self { dns_name: get_att(logical_id, "DNSName") }
    }

    /// a load balancer that already exists outside of this stack.
    pub fn from_dns_name<S: Into<String>>(dns_name: S) -> Self {
        Self { dns_name: Value::String(dns_name.into()) }
    }

    pub fn dns_name(&self) -> &Value {
        &self.dns_name
    }

    fn domain_name(&self) -> StrVal {
        match &self.dns_name {
            Value::String(name) => name.as_str().into(),
            other => StrVal::Val(other.clone()),
        }
    }
}

/// Where uncached requests are sent.
///
/// The variant decides the protocol CloudFront uses towards the origin:
/// hosts are reached over https only, load balancers over http only.
#[derive(Debug, Clone, PartialEq)]
pub enum OriginSelector {
    Host(String),
    LoadBalancer(LoadBalancerRef),
}

impl From<&str> for OriginSelector {
    fn from(value: &str) -> Self {
        OriginSelector::Host(value.to_string())
    }
}

impl From<String> for OriginSelector {
    fn from(value: String) -> Self {
        OriginSelector::Host(value)
    }
}

impl From<LoadBalancerRef> for OriginSelector {
    fn from(value: LoadBalancerRef) -> Self {
        OriginSelector::LoadBalancer(value)
    }
}

impl OriginSelector {
    pub fn protocol_policy(&self) -> CustomOriginConfigOriginProtocolPolicyEnum {
        match self {
            OriginSelector::Host(_) => CustomOriginConfigOriginProtocolPolicyEnum::Httpsonly,
            OriginSelector::LoadBalancer(_) => CustomOriginConfigOriginProtocolPolicyEnum::Httponly,
        }
    }

    pub fn resolve(&self) -> Origin {
        let domain_name = match self {
            OriginSelector::Host(host) => host.as_str().into(),
            OriginSelector::LoadBalancer(lb) => lb.domain_name(),
        };
        custom_origin(domain_name, self.protocol_policy())
    }
}
