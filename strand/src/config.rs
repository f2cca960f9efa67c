use std::{collections::BTreeMap, path::Path};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A pipeline definition plus the requests to run through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Written into the response when a chain fails.
    pub error_response: Option<ErrorResponse>,
    #[serde(default)]
    pub all: Vec<StepConfig>,
    #[serde(default, rename = "use")]
    pub uses: Vec<StepConfig>,
    /// Method name (upper case) to its steps.
    #[serde(default)]
    pub routes: BTreeMap<String, Vec<StepConfig>>,
    #[serde(default)]
    pub requests: Vec<RequestConfig>,
    /// Dispatch every request at once instead of one after another.
    #[serde(default)]
    pub concurrent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default = "default_error_status")]
    pub status: u16,
    #[serde(default)]
    pub body: String,
}

const fn default_error_status() -> u16 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepConfig {
    /// Log and continue.
    Log { name: String },
    /// Set a response header and continue.
    SetHeader { name: String, value: String },
    /// Write the response and end the chain.
    Respond {
        #[serde(default = "default_respond_status")]
        status: u16,
        #[serde(default)]
        body: String,
    },
    /// Abort into the error handler.
    Fail { message: String },
    Panic { message: String },
    Delay { millis: u64 },
    /// End the chain without touching the response.
    Halt,
    /// Bound the inner step.
    Timeout { millis: u64, step: Box<StepConfig> },
}

const fn default_respond_status() -> u16 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub method: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub body: String,
}

fn default_path() -> String {
    "/".to_string()
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read(path)?;
        parse_from_slice(&content)
    }
}

/// Parse a scenario document. A document whose first non-blank byte is `{` is JSON,
/// anything else is TOML.
pub fn parse_from_slice<T: DeserializeOwned>(content: &[u8]) -> anyhow::Result<T> {
    let first = content.iter().copied().find(|b| !b.is_ascii_whitespace());
    if first == Some(b'{') {
        return Ok(serde_json::from_slice(content)?);
    }
    let text = std::str::from_utf8(content)?;
    Ok(toml::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_scenario() {
        let content = r#"
            concurrent = true

            [error_response]
            body = "oops"

            [[all]]
            kind = "log"
            name = "access"

            [[use]]
            kind = "set_header"
            name = "x-powered-by"
            value = "strand"

            [routes]
            GET = [
                { kind = "timeout", millis = 10, step = { kind = "delay", millis = 1 } },
                { kind = "respond", body = "hi" },
            ]
            POST = [{ kind = "halt" }]

            [[requests]]
            method = "GET"
        "#;
        let scenario: Scenario = parse_from_slice(content.as_bytes()).unwrap();
        assert!(scenario.concurrent);
        assert_eq!(scenario.error_response.as_ref().unwrap().status, 500);
        assert_eq!(scenario.uses.len(), 1);
        assert_eq!(
            scenario.routes["GET"][0],
            StepConfig::Timeout {
                millis: 10,
                step: Box::new(StepConfig::Delay { millis: 1 })
            }
        );
        assert_eq!(
            scenario.routes["GET"][1],
            StepConfig::Respond {
                status: 200,
                body: "hi".to_string()
            }
        );
        assert_eq!(scenario.routes["POST"], vec![StepConfig::Halt]);
        assert_eq!(scenario.requests[0].path, "/");
    }

    #[test]
    fn test_parse_json_scenario() {
        let content = br#"
            {
                "routes": { "DELETE": [{ "kind": "fail", "message": "read only" }] },
                "requests": [{ "method": "DELETE", "path": "/items/1" }]
            }
        "#;
        let scenario: Scenario = parse_from_slice(content).unwrap();
        assert!(!scenario.concurrent);
        assert!(scenario.error_response.is_none());
        assert!(scenario.all.is_empty());
        assert_eq!(
            scenario.routes["DELETE"],
            vec![StepConfig::Fail {
                message: "read only".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_rejects_invalid_documents() {
        assert!(parse_from_slice::<Scenario>(b"\xff\xfe = 1").is_err());
        assert!(parse_from_slice::<Scenario>(b"\n\t{ \"routes\": 3 }").is_err());
        // blank input is an empty TOML document
        let scenario: Scenario = parse_from_slice(b"  \n").unwrap();
        assert!(scenario.requests.is_empty());
    }
}
