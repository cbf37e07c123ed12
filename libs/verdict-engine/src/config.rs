// Language configuration management for the execution backend
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use verdict_common::types::Language;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    /// Language id understood by the Judge0 backend
    pub judge0_id: u32,
    pub file_extension: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone, Default)]
pub struct LanguageConfigManager {
    configs: HashMap<String, LanguageConfig>,
}

impl LanguageConfigManager {
    /// Load language configurations from languages.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .context("Failed to read languages.json")?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson = serde_json::from_str(content)
            .context("Failed to parse languages.json")?;

        let mut configs = HashMap::new();
        for lang in languages_json.languages {
            if lang.name.parse::<Language>().is_err() {
                bail!("Unknown language '{}' in languages.json", lang.name);
            }
            configs.insert(lang.name.clone(), lang);
        }

        Ok(Self { configs })
    }

    /// Load with default path (config/languages.json)
    pub fn load_default() -> Result<Self> {
        Self::load(Path::new("config/languages.json"))
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, language: &Language) -> Result<&LanguageConfig> {
        let lang_name = language.to_string();
        self.configs
            .get(&lang_name)
            .ok_or_else(|| anyhow::anyhow!("No configuration found for language: {}", lang_name))
    }

    /// Judge0 language id, falling back to the public Judge0 CE ids
    pub fn judge0_id(&self, language: &Language) -> u32 {
        if let Ok(config) = self.get_config(language) {
            return config.judge0_id;
        }

        match language {
            Language::C => 50,
            Language::Cpp => 54,
            Language::Java => 62,
            Language::Javascript => 63,
            Language::Python => 71,
        }
    }

    /// List all configured languages
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }
}
