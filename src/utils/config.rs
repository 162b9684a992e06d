use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::path::PathBuf;

pub struct Config {
    /// Log target the level filter applies to.
    pub name: String,
    pub theme: String,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub log_to_stderr: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name: env!("CARGO_CRATE_NAME").to_string(),
            theme: String::from("default"),
            editor_mode: String::from("emacs"),
            logger_level: String::from("info"),
            logger_dir: Self::get_config_dir().join("logs"),
            log_to_stderr: false,
        }
    }
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/tide")
        } else {
            PathBuf::from("tmp")
        }
    }

    pub fn new() -> Self {
        // Development builds read .env.development instead of .env
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(theme) = env::var("TIDE_THEME") {
            config.theme = theme;
        }

        if let Ok(editor) = env::var("TIDE_EDITOR") {
            config.editor_mode = editor;
        }

        if let Ok(level) = env::var("TIDE_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("TIDE_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        if let Ok(flag) = env::var("TIDE_LOG_STDERR") {
            config.log_to_stderr = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.name, "tidesh");
        assert_eq!(config.get_edit_mode(), EditMode::Emacs);
        assert!(config.logger_dir.ends_with("logs"));
        assert!(!config.log_to_stderr);
    }

    #[test]
    fn test_edit_mode() {
        let config = Config {
            editor_mode: "VI".to_string(),
            ..Config::default()
        };
        assert_eq!(config.get_edit_mode(), EditMode::Vi);
    }
}
