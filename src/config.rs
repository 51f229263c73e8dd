use std::path::PathBuf;
use std::time::Duration;

use crate::validate::TextRules;

/// Runtime settings, read from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_base: String,
    pub timeout: Duration,
    pub archive_after_days: i64,
    pub text_rules: TextRules,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080/api".into(),
            timeout: Duration::from_secs(15),
            archive_after_days: 30,
            text_rules: TextRules::default(),
            data_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        }
        let d = Config::default();
        Self {
            api_base: std::env::var("LOSTFOUND_API_BASE").unwrap_or(d.api_base),
            timeout: Duration::from_secs(parse_env("LOSTFOUND_TIMEOUT_SECS", d.timeout.as_secs())),
            archive_after_days: parse_env("LOSTFOUND_ARCHIVE_AFTER_DAYS", d.archive_after_days),
            text_rules: TextRules {
                max_special: parse_env("LOSTFOUND_MAX_SPECIAL_CHARS", d.text_rules.max_special),
                max_repeat: parse_env("LOSTFOUND_MAX_REPEAT", d.text_rules.max_repeat),
                max_consonant_run: parse_env("LOSTFOUND_MAX_CONSONANT_RUN", d.text_rules.max_consonant_run),
            },
            data_dir: std::env::var("LOSTFOUND_DATA_DIR").ok().map(PathBuf::from),
        }
    }
}
