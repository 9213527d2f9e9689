// ABOUTME: Environment variable value types with interpolation support.
// ABOUTME: Handles literal values and references resolved via process env or .env.

use super::env_file::DotEnv;
use crate::error::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    /// Resolve against the process environment, then `dotenv`, then the default.
    pub fn resolve(&self, dotenv: &DotEnv) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => {
                if let Ok(val) = std::env::var(var) {
                    return Ok(val);
                }
                dotenv
                    .get(var)
                    .map(str::to_string)
                    .or_else(|| default.clone())
                    .ok_or_else(|| Error::MissingEnvVar(var.clone()))
            }
        }
    }
}
