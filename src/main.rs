use log::debug;
use std::process::ExitCode;

use tidesh::shell::Shell;
use tidesh::utils::config::Config;
use tidesh::utils::log::init_logger;
use tidesh::utils::theme::Theme;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = Config::new();
    init_logger(&config);
    debug!("config loaded, logging to {}", config.logger_dir.display());
    let theme = Theme::load_theme(&config.theme);

    let mut shell = Shell::new(&config, theme)?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let status = match args.as_slice() {
        [flag, line] if flag == "-c" => shell.run_line(line),
        [] => shell.run()?,
        _ => {
            eprintln!("usage: tide [-c <command line>]");
            2
        }
    };
    Ok(ExitCode::from(status.clamp(0, 255) as u8))
}
