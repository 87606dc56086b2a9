use std::env;

/// Stages where destructive maintenance is refused, matched ignoring ASCII case.
const PROTECTED_STAGES: [&str; 3] = ["prod", "stage", "staging"];

/// Process-wide settings, read once at cold start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub table_name: String,
    pub stage: String,
    pub service: String,
    pub function_name: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            table_name: env::var("USER_TABLE_NAME").unwrap_or_else(|_| "users".to_string()),
            stage: env::var("STAGE").unwrap_or_else(|_| "dev".to_string()),
            service: env::var("SERVICE").unwrap_or_else(|_| "user-service".to_string()),
            function_name: env::var("AWS_LAMBDA_FUNCTION_NAME")
                .unwrap_or_else(|_| "local".to_string()),
        }
    }

    pub fn is_protected_stage(&self) -> bool {
        PROTECTED_STAGES
            .iter()
            .any(|stage| stage.eq_ignore_ascii_case(self.stage.trim()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: "users".to_string(),
            stage: "test".to_string(),
            service: "user-service".to_string(),
            function_name: "local".to_string(),
        }
    }
}
