use std::collections::HashMap;

use aws_sdk_cloudformation::types::{Capability, OnFailure, Stack as StackDescription, StackStatus};
use tracing::{debug, info, warn};

use crate::{CfnError, Result, Stack};

/// CloudFront scoped resources (eg: WAF web ACLs) can only be created here.
pub const CLOUDFRONT_REGION: &str = "us-east-1";

/// Creates or updates the stack and waits until CloudFormation
/// reports a terminal status. Returns the stack outputs.
pub async fn deploy_stack(stack: &Stack) -> Result<HashMap<String, String>> {
    let saved = stack.to_saved_stack()?;
    let shared_config = aws_config::from_env().load().await;
    match shared_config.region() {
        Some(region) if region.as_ref() == CLOUDFRONT_REGION => {}
        region => {
            warn!(region = ?region, "CloudFront web ACLs must be deployed to {CLOUDFRONT_REGION}");
        }
    }
    let client = aws_sdk_cloudformation::Client::new(&shared_config);

    let mut outputs = HashMap::new();
    for (stack_name, template) in saved.template.iter() {
        info!(stack = %stack_name, resources = template.resources.len(), "deploying stack");
        let template_body = serde_json::to_string_pretty(template)?;
        create_or_update_stack(&client, stack_name, &template_body).await?;
        outputs.extend(wait_for_output(&client, stack_name).await?);
    }
    Ok(outputs)
}

pub async fn does_stack_exist(client: &aws_sdk_cloudformation::Client, name: &str) -> Result<bool> {
    match client.describe_stacks().stack_name(name).send().await {
        Ok(_) => Ok(true),
        Err(e) => {
            let e_str = format!("{:#?}", e);
            if e_str.contains("does not exist") {
                return Ok(false);
            }
            Err(CfnError::deploy(name, e_str))
        }
    }
}

/// Returns `Ok(None)` while the stack is still in progress.
pub async fn describe_stack(client: &aws_sdk_cloudformation::Client, name: &str) -> Result<Option<StackDescription>> {
    let described = client.describe_stacks().stack_name(name).send().await
        .map_err(|e| CfnError::deploy(name, format!("{:#?}", e)))?;
    let first = described.stacks()
        .and_then(|stacks| stacks.first())
        .ok_or_else(|| CfnError::deploy(name, format!("Stack {name} not found")))?;
    let status = first.stack_status()
        .ok_or_else(|| CfnError::deploy(name, format!("Stack {name} not found")))?;
    match status {
        StackStatus::CreateComplete |
        StackStatus::UpdateComplete |
        StackStatus::UpdateRollbackComplete |
        StackStatus::ImportComplete |
        StackStatus::ImportRollbackComplete => Ok(Some(first.clone())),

        StackStatus::CreateInProgress |
        StackStatus::DeleteInProgress |
        StackStatus::ImportInProgress |
        StackStatus::ImportRollbackInProgress |
        StackStatus::ReviewInProgress |
        StackStatus::RollbackInProgress |
        StackStatus::UpdateCompleteCleanupInProgress |
        StackStatus::UpdateInProgress |
        StackStatus::UpdateRollbackCompleteCleanupInProgress |
        StackStatus::UpdateRollbackInProgress => Ok(None),

        _ => {
            let reason = first.stack_status_reason().unwrap_or("Failed to get stack failure reason");
            Err(CfnError::deploy(name, reason))
        }
    }
}

pub async fn wait_for_output(client: &aws_sdk_cloudformation::Client, name: &str) -> Result<HashMap<String, String>> {
    loop {
        let dur = tokio::time::Duration::from_millis(700);
        tokio::time::sleep(dur).await;
        match describe_stack(client, name).await? {
            Some(stack) => {
                let mut out = HashMap::new();
                for output in stack.outputs().unwrap_or_default() {
                    if let (Some(key), Some(val)) = (output.output_key(), output.output_value()) {
                        out.insert(key.to_string(), val.to_string());
                    }
                }
                info!(stack = %name, "stack is ready");
                return Ok(out);
            }
            None => {
                debug!(stack = %name, "still waiting on stack");
            }
        }
    }
}

pub async fn create_or_update_stack(client: &aws_sdk_cloudformation::Client, name: &str, body: &str) -> Result<()> {
    if does_stack_exist(client, name).await? {
        info!(stack = %name, "updating stack");
        let updated = client
            .update_stack()
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .template_body(body)
            .send()
            .await;
        if let Err(e) = updated {
            let e_str = format!("{:#?}", e);
            if e_str.contains("No updates are to be performed") {
                info!(stack = %name, "stack is already up to date");
                return Ok(());
            }
            return Err(CfnError::deploy(name, e_str));
        }
    } else {
        info!(stack = %name, "creating stack");
        client
            .create_stack()
            .on_failure(OnFailure::Delete)
            .capabilities(Capability::CapabilityNamedIam)
            .capabilities(Capability::CapabilityIam)
            .stack_name(name)
            .template_body(body)
            .send()
            .await
            .map_err(|e| CfnError::deploy(name, format!("{:#?}", e)))?;
    }
    Ok(())
}
