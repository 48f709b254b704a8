use std::{env, fmt::Display};

use colored::{Color, Colorize};
use log::{Level, LevelFilter, SetLoggerError};

/// External crates only need to log warnings and errors
const EXTERNAL_LEVEL: LevelFilter = LevelFilter::Warn;
const DEFAULT_LEVEL: LevelFilter = LevelFilter::Info;

pub const DIMMED: Color = Color::BrightBlack;

/// Reads the level for gameshelf's own crates from `GAMESHELF_LOG`
pub fn level_from_env() -> LevelFilter {
    env::var("GAMESHELF_LOG")
        .ok()
        .and_then(|l| l.trim().parse().ok())
        .unwrap_or(DEFAULT_LEVEL)
}

pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {} {}",
                level_to_string(&record.level()),
                now.format("%H:%M:%S%.3f").to_string().color(DIMMED),
                target,
                message
            ))
        })
        .filter(move |meta| {
            let allowed = match Target::from_str(meta.target()) {
                Target::External(_) => EXTERNAL_LEVEL,
                _ => level,
            };

            meta.level() <= allowed
        })
        .chain(std::io::stdout())
        .apply()
}

#[derive(Debug, PartialEq)]
enum Target<'a> {
    External(&'a str),
    App(Option<&'a str>),
    Library(Option<&'a str>),
    Server(Option<&'a str>),
}

impl<'a> Target<'a> {
    fn from_str(target: &'a str) -> Self {
        let (module, path) = match target.split_once("::") {
            Some((module, path)) => (module, Some(path)),
            None => (target, None),
        };

        match module {
            "gameshelf" => Self::App(path),
            "gameshelf_library" => Self::Library(path),
            "gameshelf_server" => Self::Server(path),
            _ => Self::External(module),
        }
    }
}

impl Display for Target<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (tag, path) = match self {
            Target::External(x) => return write!(f, "{:<8}", x.clear()),
            Target::App(path) => ("APP".blue(), path),
            Target::Library(path) => ("LIBRARY".bright_purple(), path),
            Target::Server(path) => ("SERVER".bright_green(), path),
        };

        write!(f, "{:<8}", tag)?;

        match path {
            Some(path) => write!(f, "{}", format!("{:<16}", path).color(DIMMED)),
            None => write!(f, "{:<16}", ""),
        }
    }
}

fn level_to_string(level: &Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}
