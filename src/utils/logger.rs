use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Level filters: dependencies at Warn, this crate at Info (Debug when `verbose`), then any
/// `RUST_LOG` directives on top, so `RUST_LOG=filequeue=trace` or `RUST_LOG=lapin=debug` win.
fn filter_builder(verbose: bool, rust_log: Option<&str>) -> Builder {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Warn) // lapin is chatty
        .filter_module(env!("CARGO_PKG_NAME"), level);
    if let Some(directives) = rust_log.filter(|s| !s.trim().is_empty()) {
        builder.parse_filters(directives);
    }
    builder
}

/// Console logging with the filters from [`filter_builder`]. Safe to call more than once; later
/// calls are ignored.
pub fn setup_logging(verbose: bool) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let _ = filter_builder(verbose, rust_log.as_deref())
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        _ => "ERROR".red(),
                    };
                    let path = record.target().to_string().white();
                    format!(
                        "{} [{} {} {}] {}",
                        ts,
                        name.cyan(),
                        level_str,
                        path,
                        record.args()
                    )
                }
                Level::Debug | Level::Trace => {
                    format!("{} [{}] {}", ts, name.cyan(), record.args().to_string().dimmed())
                }
                Level::Info => format!("{} [{}] {}", ts, name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}
