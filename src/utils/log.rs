use crate::utils::config::Config;
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::process;

pub fn parse_level(level: &str) -> LevelFilter {
    match level {
        level if level.eq_ignore_ascii_case("off") => LevelFilter::Off,
        level if level.eq_ignore_ascii_case("error") => LevelFilter::Error,
        level if level.eq_ignore_ascii_case("warn") => LevelFilter::Warn,
        level if level.eq_ignore_ascii_case("info") => LevelFilter::Info,
        level if level.eq_ignore_ascii_case("debug") => LevelFilter::Debug,
        level if level.eq_ignore_ascii_case("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Logs go to `tide_<date>.log` in the configured directory and, if asked,
/// to stderr as well. Stdout stays reserved for command output. Without a
/// usable log file everything goes to stderr.
pub fn init_logger(config: &Config) {
    let level = parse_level(&config.logger_level);

    let mut writers: Vec<Box<dyn Write + Send + Sync>> = Vec::new();
    let file_error = match open_log_file(&config.logger_dir) {
        Ok(file) => {
            writers.push(Box::new(file));
            None
        }
        Err(e) => Some(e),
    };
    if config.log_to_stderr || file_error.is_some() {
        writers.push(Box::new(io::stderr()));
    }

    let installed = Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[PID:{}][{}] {} - {}",
                process::id(),
                record.level(),
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(MultiWriter { writers })))
        .filter(Some(&config.name), level)
        .filter(None, LevelFilter::Warn)
        .try_init();

    if let Some(e) = file_error {
        log::warn!(
            "cannot open log file in {}: {}",
            config.logger_dir.display(),
            e
        );
    }
    match installed {
        Ok(()) => log::debug!("log level set to {}", level),
        Err(e) => eprintln!("logger already initialised: {}", e),
    }
}

fn open_log_file(dir: &Path) -> io::Result<File> {
    fs::create_dir_all(dir)?;
    let date = Local::now().format("%Y-%m-%d");
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("tide_{}.log", date)))
}

struct MultiWriter {
    writers: Vec<Box<dyn Write + Send + Sync>>,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for writer in &mut self.writers {
            writer.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for writer in &mut self.writers {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("warn"), LevelFilter::Warn);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_log_file_is_dated() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        open_log_file(&nested).unwrap();
        let name = fs::read_dir(&nested)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .file_name();
        let name = name.to_string_lossy();
        assert!(name.starts_with("tide_") && name.ends_with(".log"));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_multi_writer_tees() {
        let dir = tempfile::tempdir().unwrap();
        let a = File::create(dir.path().join("a")).unwrap();
        let b = File::create(dir.path().join("b")).unwrap();
        let mut writer = MultiWriter {
            writers: vec![Box::new(a), Box::new(b)],
        };
        writer.write_all(b"line\n").unwrap();
        writer.flush().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a")).unwrap(), "line\n");
        assert_eq!(fs::read_to_string(dir.path().join("b")).unwrap(), "line\n");
    }
}
