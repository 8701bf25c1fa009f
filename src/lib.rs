//! CloudFormation for a CDN in front of a Supabase API: a CloudFront
//! distribution, its cache and response header policies, and a WAF web ACL.
//!
//! ```ignore
//! let mut stack = Stack::new("supabase-cdn");
//! let mut cdn = SupabaseCdn::new(&stack, "Cdn", CdnProps {
//!     origin: "api.example.com".into(),
//!     request_rate_limit: 1000,
//! })?;
//! cdn.add_behavior("/storage/*", LoadBalancerRef::from_logical_id("StorageAlb"))?;
//! cdn.add_to_stack(&mut stack);
//! println!("{}", stack.to_json()?);
//! ```

pub use aws_cfn_stack;
pub use aws_cloudfront_distribution;
pub use aws_wafv2;

mod error;
pub use error::{CdnError, Result};

mod cdn;
pub use cdn::*;
pub mod config;
pub use config::CdnConfig;
pub mod firewall;
pub mod origin;
pub use origin::{LoadBalancerRef, OriginSelector};
pub mod policies;
