use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::load::LoadError;

/// Client request selecting a load profile (WebSocket frame or HTTP body)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadRequest {
    /// Raw load type tag. A missing field decodes as the empty string.
    /// Capitalised spellings of the key are accepted too.
    #[serde(rename = "type", alias = "Type", alias = "TYPE", default)]
    pub kind: String,
}

impl LoadRequest {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    /// Classify the raw tag
    pub fn load_type(&self) -> Result<LoadType, LoadError> {
        self.kind.parse()
    }
}

/// Recognised load profiles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LoadType {
    /// One time unit, one reply
    Simple,
    /// A paced series of progress messages followed by a completion reply
    Medium,
}

impl LoadType {
    /// Tag name, also used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadType::Simple => "simple",
            LoadType::Medium => "medium",
        }
    }
}

impl FromStr for LoadType {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(LoadType::Simple),
            "medium" => Ok(LoadType::Medium),
            other => Err(LoadError::InvalidLoadType(other.to_string())),
        }
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single WebSocket text frame sent to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WsReply {
    pub message: String,
}

impl WsReply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn invalid_json() -> Self {
        Self::new(INVALID_JSON_MESSAGE)
    }

    pub fn invalid_load_type() -> Self {
        Self::new(INVALID_LOAD_TYPE_MESSAGE)
    }
}

pub const SIMPLE_COMPLETED_MESSAGE: &str = "Simple load test completed";
pub const MEDIUM_COMPLETED_MESSAGE: &str = "Medium load test completed";
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON format";
pub const INVALID_LOAD_TYPE_MESSAGE: &str = "Invalid load type";

/// Body of `POST /complex`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplexRequest {
    #[serde(alias = "Message", alias = "MESSAGE", default)]
    pub message: String,
}

/// Response of `POST /load-test-http`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTestResponse {
    pub message: String,
    /// Progress messages, only present for medium runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<String>>,
    pub processing_time: String,
    pub timestamp: String,
    pub status: ResponseStatus,
}

/// Response of `POST /complex`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexResponse {
    pub message: String,
    pub computation: u64,
    pub processing_time: String,
    pub timestamp: String,
    pub status: ResponseStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_request_parses_known_types() {
        let req: LoadRequest = serde_json::from_str(r#"{"type":"simple"}"#).unwrap();
        assert_eq!(req.load_type().unwrap(), LoadType::Simple);

        let req: LoadRequest = serde_json::from_str(r#"{"type":"medium"}"#).unwrap();
        assert_eq!(req.load_type().unwrap(), LoadType::Medium);
    }

    #[test]
    fn test_load_request_missing_type_is_invalid_not_malformed() {
        let req: LoadRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.kind, "");
        assert!(matches!(
            req.load_type(),
            Err(LoadError::InvalidLoadType(ref t)) if t.is_empty()
        ));
    }

    #[test]
    fn test_load_request_ignores_extra_fields() {
        let req: LoadRequest =
            serde_json::from_str(r#"{"type":"medium","client":"k6"}"#).unwrap();
        assert_eq!(req.load_type().unwrap(), LoadType::Medium);
    }

    #[test]
    fn test_load_request_rejects_wrong_field_type() {
        assert!(serde_json::from_str::<LoadRequest>(r#"{"type":5}"#).is_err());
        assert!(serde_json::from_str::<LoadRequest>("not json").is_err());
    }

    #[test]
    fn test_capitalised_keys_are_accepted() {
        let req: LoadRequest = serde_json::from_str(r#"{"Type":"simple"}"#).unwrap();
        assert_eq!(req.load_type().unwrap(), LoadType::Simple);

        let req: LoadRequest = serde_json::from_str(r#"{"TYPE":"medium"}"#).unwrap();
        assert_eq!(req.load_type().unwrap(), LoadType::Medium);

        let req: ComplexRequest = serde_json::from_str(r#"{"Message":"x"}"#).unwrap();
        assert_eq!(req.message, "x");
    }

    #[test]
    fn test_load_type_is_case_sensitive() {
        assert!("Simple".parse::<LoadType>().is_err());
        assert!("bogus".parse::<LoadType>().is_err());
    }

    #[test]
    fn test_ws_reply_wire_format() {
        let json = serde_json::to_string(&WsReply::invalid_load_type()).unwrap();
        assert_eq!(json, r#"{"message":"Invalid load type"}"#);
    }

    #[test]
    fn test_simple_response_omits_messages() {
        let response = LoadTestResponse {
            message: SIMPLE_COMPLETED_MESSAGE.to_string(),
            messages: None,
            processing_time: "1s".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            status: ResponseStatus::Success,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("messages").is_none());
        assert_eq!(value["status"], "success");
    }
}
