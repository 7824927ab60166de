use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::agent::DEFAULT_MAX_ITERATIONS;
use crate::tools::retriever::DEFAULT_TOP_K;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub dataset: DatasetConfig,
    pub output: OutputConfig,
    pub queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_iterations: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub archive: String,
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("APIFORGE_LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("APIFORGE_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("APIFORGE_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("APIFORGE_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("APIFORGE_LLM_API_KEY") {
            self.llm.api_key = v;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            dataset: DatasetConfig::default(),
            output: OutputConfig::default(),
            queries: default_queries(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            api_key: String::new(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: "./data/payment_api.csv".into(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "./out".into(),
            archive: "session.zip".into(),
        }
    }
}

fn default_queries() -> Vec<String> {
    vec![
        "How do I create a payment using Square?".into(),
        "How do I refund a completed payment?".into(),
        "How do I list recent payments for my account?".into(),
    ]
}
