use crate::{ConfigError, DEFAULT_HISTORY_CAPACITY};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    pub hidden_field_id: String,
    pub upload_url: String,
    pub placeholder: String,
    pub min_height: u32,
    pub max_image_size: usize,
    pub allowed_image_types: Vec<String>,
    pub history_capacity: usize,
    pub toolbar_selector: String,
    pub surface_selector: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            hidden_field_id: "hiddenContent".into(),
            upload_url: "/upload_image".into(),
            placeholder: "Start writing your content here...".into(),
            min_height: 400,
            max_image_size: 5_000_000,
            allowed_image_types: ["jpeg", "jpg", "png", "gif"].iter().map(|s| s.to_string()).collect(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            toolbar_selector: ".editor-toolbar".into(),
            surface_selector: ".editor-content".into(),
        }
    }
}

impl EditorConfig {
    /// Missing keys keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: EditorConfig = serde_json::from_str(raw)?;
        config.history_capacity = config.history_capacity.max(1);
        Ok(config)
    }

    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        self.allowed_image_types.iter().any(|t| t.eq_ignore_ascii_case(&ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EditorConfig::from_json(r#"{"uploadUrl":"/media","historyCapacity":0}"#).unwrap();
        assert_eq!(config.upload_url, "/media");
        assert_eq!(config.history_capacity, 1);
        assert_eq!(config.max_image_size, 5_000_000);
        assert!(config.allows_extension("PNG"));
        assert!(!config.allows_extension("bmp"));
    }
}
