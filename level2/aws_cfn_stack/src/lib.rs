use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use cfn_resources;
pub use cfn_resources::{get_att, get_ref, CfnResource, StrVal, ToOptStrVal};
pub use serde_json;

mod error;
pub use error::{CfnError, Result};

#[cfg(feature = "deploy")]
pub mod deploy;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Joins the given parts into a CloudFormation logical id.
/// Anything that is not ascii alphanumeric is dropped.
pub fn logical_id(parts: &[&str]) -> String {
    parts.iter()
        .flat_map(|p| p.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn is_valid_logical_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 255 && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// The literal string in a property, if it is not an intrinsic function.
pub fn literal(value: &StrVal) -> Option<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Checks run against a resource's serialized properties,
/// on top of the checks the resource type does itself.
pub type PropertiesCheck = fn(&serde_json::Value) -> std::result::Result<(), String>;

/// A resource paired with extra validation of its properties.
pub struct Validated<R> {
    pub resource: R,
    pub check: PropertiesCheck,
}

impl<R: CfnResource> Validated<R> {
    pub fn new(resource: R, check: PropertiesCheck) -> Self {
        Self { resource, check }
    }
}

impl<R: CfnResource> CfnResource for Validated<R> {
    fn type_string(&self) -> &'static str {
        self.resource.type_string()
    }

    fn properties(&self) -> serde_json::Value {
        self.resource.properties()
    }

    fn validate(&self) -> std::result::Result<(), String> {
        self.resource.validate()?;
        (self.check)(&self.resource.properties())
    }
}

pub struct Resource {
    pub name: String,
    pub properties: Box<dyn CfnResource>,
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("type", &self.properties.type_string())
            .finish()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, SavedResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, ResourceOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutput {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Value")]
    pub value: serde_json::Value,
}

impl Default for SavedTemplate {
    fn default() -> Self {
        Self {
            version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SavedStack {
    /// this is expected to only have 1 item.
    /// we structure it this way so that we can separate the stack name
    /// from the template
    pub template: BTreeMap<String, SavedTemplate>,
}

/// A named collection of resources that is synthesized into one template.
#[derive(Debug, Default)]
pub struct Stack {
    pub name: String,
    pub description: Option<String>,
    pub resources: Vec<Resource>,
    pub outputs: Vec<(String, ResourceOutput)>,
}

impl Stack {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn add_resource<S, R>(&mut self, name: S, properties: R)
        where S: Into<String>,
              R: CfnResource + 'static,
    {
        let resource = Resource {
            name: name.into(),
            properties: Box::new(properties) as _,
        };
        debug!(logical_id = %resource.name, ty = resource.properties.type_string(), "adding resource");
        self.resources.push(resource);
    }

    pub fn add_output<S: Into<String>, D: Into<String>>(&mut self, name: S, description: D, value: serde_json::Value) {
        let output = ResourceOutput {
            description: description.into(),
            value,
        };
        self.outputs.push((name.into(), output));
    }

    /// Validates every resource and collects them into a template.
    pub fn to_template(&self) -> Result<SavedTemplate> {
        let mut out_template = validate_resources_to_template(&self.resources)?;
        out_template.description = self.description.clone();
        for (name, output) in self.outputs.iter() {
            if !is_valid_logical_id(name) {
                return Err(CfnError::InvalidLogicalId(name.clone()));
            }
            if out_template.outputs.insert(name.clone(), output.clone()).is_some() {
                return Err(CfnError::DuplicateLogicalId(name.clone()));
            }
        }
        Ok(out_template)
    }

    pub fn to_saved_stack(&self) -> Result<SavedStack> {
        let stack_name = validate_stack_name(&self.name, "")?;
        let mut stack = SavedStack::default();
        stack.template.insert(stack_name, self.to_template()?);
        Ok(stack)
    }

    /// The template body as CloudFormation expects it.
    /// we make it pretty so if a user needs to look at the stack in Cfn console, it looks nice
    pub fn to_json(&self) -> Result<String> {
        let template = self.to_template()?;
        Ok(serde_json::to_string_pretty(&template)?)
    }
}

fn validate_resources_to_template(resources: &[Resource]) -> Result<SavedTemplate> {
    let mut out_template = SavedTemplate::default();
    for resource in resources.iter() {
        if !is_valid_logical_id(&resource.name) {
            return Err(CfnError::InvalidLogicalId(resource.name.clone()));
        }
        if let Err(e) = resource.properties.validate() {
            return Err(CfnError::validation(&resource.name, e));
        }
        let saved_resource = SavedResource {
            ty: resource.properties.type_string().to_string(),
            properties: resource.properties.properties(),
        };
        if out_template.resources.insert(resource.name.clone(), saved_resource).is_some() {
            return Err(CfnError::DuplicateLogicalId(resource.name.clone()));
        }
    }
    Ok(out_template)
}

/// Returns the stack name to deploy with. If `current_stack_name` is empty,
/// it is derived from `default_name`.
pub fn validate_stack_name(default_name: &str, current_stack_name: &str) -> Result<String> {
    let stack_name = if current_stack_name.is_empty() {
        default_name.replace("_", "-").chars().take(128).collect()
    } else {
        current_stack_name.to_string()
    };
    // A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
    // It must start with an alphabetical character and can't be longer than 128 characters.
    let restriction = "Must only consist of alphanumeric characters and hyphens, Must start with an alphabetical character, and cannot be longer than 128 characters.";
    let invalid = || CfnError::InvalidStackName { name: stack_name.clone(), restriction };
    match stack_name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(invalid()),
    }
    if stack_name.chars().any(|c| !c.is_ascii_alphanumeric() && c != '-') {
        return Err(invalid());
    }
    if stack_name.len() > 128 {
        return Err(invalid());
    }
    Ok(stack_name)
}
