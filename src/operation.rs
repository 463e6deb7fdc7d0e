//! The operation a validation call runs under.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Whether an object is being created or updated.
///
/// Ratcheting and immutability checks only apply on [`OperationType::Update`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    #[default]
    Create,
    Update,
}

/// The part of the request relevant to validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Subresource segments, e.g. `["status"]`. Empty for the root resource.
    #[serde(default)]
    pub subresources: Vec<String>,
}

impl Request {
    /// `"/"` for the root resource, `"/status"`, `"/scale"`, ...
    pub fn subresource_path(&self) -> String {
        format!("/{}", self.subresources.join("/"))
    }
}

/// Tags a validation call and carries the per-call settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(rename = "type")]
    pub op_type: OperationType,
    #[serde(default)]
    pub request: Request,
    /// Names of enabled options (feature gates, API-version switches, ...).
    #[serde(default)]
    pub options: BTreeSet<String>,
}

impl Operation {
    pub fn create() -> Self {
        Operation::default()
    }

    pub fn update() -> Self {
        Operation {
            op_type: OperationType::Update,
            ..Default::default()
        }
    }

    pub fn with_subresource(mut self, subresource: impl Into<String>) -> Self {
        self.request.subresources.push(subresource.into());
        self
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.insert(option.into());
        self
    }

    pub fn is_update(&self) -> bool {
        self.op_type == OperationType::Update
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.contains(option)
    }
}
