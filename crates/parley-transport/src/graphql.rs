use parley_types::{ErrorPolicy, Operation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TransportError};

/// Body of a GraphQL request, shared by both channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub variables: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl From<&Operation> for GraphQlRequest {
    fn from(operation: &Operation) -> Self {
        Self {
            query: operation.document.clone(),
            variables: operation.variables.clone(),
            operation_name: Some(operation.name.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQlError>>,
}

impl GraphQlResponse {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    /// Errors win over partial data; a response with neither is malformed
    pub fn into_result(self) -> Result<Value> {
        self.into_result_with(ErrorPolicy::None)
    }

    /// Under [`ErrorPolicy::All`] partial data survives its errors, which are
    /// logged; without data the errors still fail the call
    pub fn into_result_with(self, policy: ErrorPolicy) -> Result<Value> {
        let data = self.data.filter(|d| !d.is_null());
        let Some(errors) = self.errors.filter(|e| !e.is_empty()) else {
            return data.ok_or(TransportError::MissingData);
        };

        match (policy, data) {
            (ErrorPolicy::All, Some(data)) => {
                for error in &errors {
                    tracing::warn!(error = %error.message, "GraphQL error alongside partial data");
                }
                Ok(data)
            }
            _ => Err(TransportError::GraphQl(errors)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: None,
        }
    }
}
