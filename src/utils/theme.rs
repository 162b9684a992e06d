use colored::Colorize;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static MESSAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("welcome", "Welcome to tide."),
        (
            "help",
            "Pipes, redirections, && || ; and & work. Builtins: cd jobs fg bg stop kill exit.",
        ),
        ("exit", "Bye."),
        ("eof_signal", "EOF, leaving tide."),
        ("interrupt_signal", "Interrupted. Type `exit` to leave."),
        ("error", "error"),
        ("job_done", "done"),
    ])
});

pub struct Theme {
    pub prompt_symbol: String,
    pub success_symbol: String,
    pub error_symbol: String,
    pub prompt_style: Box<dyn Fn(String) -> String>,
    pub error_style: Box<dyn Fn(String) -> String>,
    pub warning_style: Box<dyn Fn(String) -> String>,
    pub success_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt_symbol: "~>".to_string(),
            success_symbol: "✓".green().to_string(),
            error_symbol: "✗".red().to_string(),
            prompt_style: Box::new(|s| s.bright_cyan().to_string()),
            error_style: Box::new(|s| s.bright_red().to_string()),
            warning_style: Box::new(|s| s.yellow().to_string()),
            success_style: Box::new(|s| s.bright_green().to_string()),
        }
    }
}

impl Theme {
    pub fn load_theme(theme_name: &str) -> Theme {
        match theme_name {
            "dark" => Theme {
                prompt_symbol: "≈>".to_string(),
                success_symbol: "✓".bright_blue().to_string(),
                error_symbol: "✗".red().to_string(),
                prompt_style: Box::new(|s| s.bright_purple().to_string()),
                error_style: Box::new(|s| s.red().to_string()),
                warning_style: Box::new(|s| s.bright_yellow().to_string()),
                success_style: Box::new(|s| s.blue().to_string()),
            },
            "plain" => Theme {
                prompt_symbol: "$".to_string(),
                success_symbol: "ok".to_string(),
                error_symbol: "!!".to_string(),
                prompt_style: Box::new(|s| s),
                error_style: Box::new(|s| s),
                warning_style: Box::new(|s| s),
                success_style: Box::new(|s| s),
            },
            _ => Theme::default(),
        }
    }

    pub fn get_message(&self, key: &str) -> String {
        MESSAGES.get(key).copied().unwrap_or(key).to_string()
    }

    /// `tide:<last path component> ~> `
    pub fn prompt(&self, cwd: &std::path::Path) -> String {
        let dir = cwd
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| cwd.display().to_string());
        (self.prompt_style)(format!("tide:{} {} ", dir, self.prompt_symbol))
    }
}
