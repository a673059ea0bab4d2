//! 命令行设置文件（JSON）。
//!
//! 文件缺失或内容损坏时回退到默认值，不阻断启动；命令行参数优先于文件。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutodrawSettings {
    #[serde(default)]
    pub max_dimension: Option<u32>,
    #[serde(default)]
    pub canvas_width: Option<u32>,
    #[serde(default)]
    pub canvas_height: Option<u32>,
}

pub fn load_settings_from_path(path: &Path) -> AutodrawSettings {
    if !path.exists() {
        return AutodrawSettings::default();
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            log::warn!("读取设置文件失败，使用默认设置: {}", err);
            return AutodrawSettings::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("解析设置文件失败，使用默认设置: {}", err);
            AutodrawSettings::default()
        }
    }
}

pub fn save_settings_to_path(path: &Path, settings: &AutodrawSettings) -> Result<(), AppError> {
    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| AppError::Settings(format!("cannot serialize settings: {}", e)))?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn unique_temp_dir() -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock error")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("pixel-autodraw-settings-test-{nanos}"));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn save_and_load_settings_roundtrip() {
        let dir = unique_temp_dir();
        let path = dir.join("settings.json");
        let settings = AutodrawSettings {
            max_dimension: Some(320),
            canvas_width: Some(1000),
            canvas_height: None,
        };

        save_settings_to_path(&path, &settings).expect("save settings");
        assert_eq!(load_settings_from_path(&path), settings);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn uses_camel_case_keys() {
        let parsed: AutodrawSettings =
            serde_json::from_str(r#"{"maxDimension": 128, "canvasHeight": 600}"#)
                .expect("parse settings");
        assert_eq!(parsed.max_dimension, Some(128));
        assert_eq!(parsed.canvas_height, Some(600));
        assert_eq!(parsed.canvas_width, None);
    }

    #[test]
    fn bad_or_missing_file_falls_back_to_default() {
        let dir = unique_temp_dir();
        let path = dir.join("settings.json");
        assert_eq!(load_settings_from_path(&path), AutodrawSettings::default());

        std::fs::write(&path, "not-json").expect("write invalid settings");
        assert_eq!(load_settings_from_path(&path), AutodrawSettings::default());

        let _ = std::fs::remove_dir_all(dir);
    }
}
