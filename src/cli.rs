use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::domain::SiteType;
use crate::util::version::{APP_AUTHOR, APP_VERSION};

#[derive(Debug, Parser)]
#[command(name = "abyssal-loot-tracker", version = APP_VERSION, author = APP_AUTHOR)]
#[command(about = "Values pasted Abyssal loot and tracks profit per run", long_about = None)]
pub struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch the clipboard and record a run for every copied loot list
    Watch {
        /// Treat copies as full inventory snapshots and record the difference
        #[arg(short, long)]
        inventory: bool,
        /// Site played, e.g. "T5 Firestorm Cruiser" or "T3 Dark 3x Frigate"
        #[arg(short, long)]
        site: Option<SiteType>,
        #[arg(short, long)]
        comment: Option<String>,
    },
    /// Record one run from a file, or stdin when no file is given
    Capture {
        file: Option<PathBuf>,
        /// Inventory snapshot taken before the run; FILE is then the one taken after
        #[arg(long)]
        before: Option<PathBuf>,
        /// Run length in minutes, used for profit per hour
        #[arg(short, long, value_parser = parse_minutes)]
        minutes: Option<Duration>,
        #[arg(short, long)]
        site: Option<SiteType>,
        #[arg(short, long)]
        comment: Option<String>,
    },
    /// List recorded runs, newest first
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

fn parse_minutes(value: &str) -> Result<Duration, String> {
    let minutes: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("{value:?} is not a number of minutes"))?;
    if minutes <= 0.0 {
        return Err("minutes must be positive".into());
    }
    Duration::try_from_secs_f64(minutes * 60.0).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ShipClass, Weather};

    #[test]
    fn capture_arguments_parse() {
        let cli = Cli::try_parse_from([
            "abyssal-loot-tracker",
            "capture",
            "after.txt",
            "--before",
            "before.txt",
            "--minutes",
            "12.5",
            "--site",
            "T4 Gamma 2x Destroyer",
        ])
        .unwrap();

        match cli.command {
            Command::Capture {
                file,
                before,
                minutes,
                site,
                comment,
            } => {
                assert_eq!(file, Some(PathBuf::from("after.txt")));
                assert_eq!(before, Some(PathBuf::from("before.txt")));
                assert_eq!(minutes, Some(Duration::from_secs(750)));
                let site = site.unwrap();
                assert_eq!(site.tier, 4);
                assert_eq!(site.weather, Weather::Gamma);
                assert_eq!(site.ship, ShipClass::Destroyer);
                assert_eq!(site.ship_count, 2);
                assert_eq!(comment, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["abyssal-loot-tracker", "capture", "--minutes", "0"]).is_err());
        assert!(Cli::try_parse_from([
            "abyssal-loot-tracker",
            "watch",
            "--site",
            "T5 Dark 2x Cruiser"
        ])
        .is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["abyssal-loot-tracker", "history", "-v", "--limit", "5"])
            .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::History { limit: 5 }));
    }
}
