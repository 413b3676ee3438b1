use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::controller::DaemonConfig;
use crate::wallpaper::connectivity::DEFAULT_PROBE_URL;
use crate::wallpaper::url::DEFAULT_BASE_URL;
use crate::wallpaper::{Category, Resolution};

#[derive(Parser)]
#[command(name = "iowall", about = "Resolution-aware wallpaper fetcher")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the wallpaper controller daemon
    Daemon(DaemonArgs),

    /// Send an action to the running daemon
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Args)]
pub struct DaemonArgs {
    /// Image service base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// URL probed before each download
    #[arg(long, default_value = DEFAULT_PROBE_URL)]
    probe_url: String,

    /// Where saved wallpapers go [default: ~/Pictures/IoWall]
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Where temporary wallpapers go [default: system temp dir]
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Use WIDTHxHEIGHT instead of querying the display
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Apply with a shell command instead of the platform mechanism;
    /// `%f` is replaced by the image path, `;` separates commands
    #[arg(long)]
    apply_cmd: Option<String>,

    /// Connectivity probe timeout in seconds
    #[arg(long, default_value_t = 3)]
    probe_timeout_secs: u64,

    /// Download timeout in seconds
    #[arg(long, default_value_t = 10)]
    download_timeout_secs: u64,

    /// Do not fetch a random wallpaper at startup
    #[arg(long)]
    no_initial_change: bool,
}

impl DaemonArgs {
    pub fn into_config(self) -> DaemonConfig {
        DaemonConfig {
            base_url: self.base_url,
            probe_url: self.probe_url,
            save_dir: self.save_dir,
            artifact_dir: self.artifact_dir,
            resolution: self.resolution,
            apply_cmd: self.apply_cmd,
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            download_timeout: Duration::from_secs(self.download_timeout_secs),
            initial_change: !self.no_initial_change,
        }
    }
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// Fetch and apply a wallpaper (nature, city, tech, abstract, random)
    Change {
        #[arg(default_value = "random")]
        category: Category,

        /// Wait for the change to finish and report the outcome
        #[arg(long)]
        wait: bool,
    },

    /// Use 3840x2160 for subsequent fetches
    ForceHd,

    /// Copy the current wallpaper into the save directory
    Save,

    /// Delete the current temporary wallpaper file
    ClearCache,

    /// Show loading state, resolution and current wallpaper
    Status,

    /// Print loading changes, alerts and notifications as they happen
    Watch,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("iowall").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn daemon_defaults() {
        let Command::Daemon(args) = parse(&["daemon"]).command else {
            panic!("expected daemon");
        };
        let config = args.into_config();
        let defaults = DaemonConfig::default();
        assert_eq!(config.base_url, defaults.base_url);
        assert_eq!(config.probe_url, defaults.probe_url);
        assert_eq!(config.probe_timeout, defaults.probe_timeout);
        assert_eq!(config.download_timeout, defaults.download_timeout);
        assert_eq!(config.initial_change, defaults.initial_change);
        assert_eq!(config.resolution, None);
    }

    #[test]
    fn daemon_overrides() {
        let Command::Daemon(args) = parse(&[
            "daemon",
            "--resolution",
            "2560x1440",
            "--apply-cmd",
            "feh --bg-fill %f",
            "--no-initial-change",
        ])
        .command
        else {
            panic!("expected daemon");
        };
        let config = args.into_config();
        assert_eq!(config.resolution, Resolution::new(2560, 1440));
        assert_eq!(config.apply_cmd.as_deref(), Some("feh --bg-fill %f"));
        assert!(!config.initial_change);
    }

    #[test]
    fn change_defaults_to_random() {
        match parse(&["client", "change"]).command {
            Command::Client {
                action: ClientAction::Change { category, wait },
            } => {
                assert_eq!(category, Category::Random);
                assert!(!wait);
            }
            _ => panic!("expected change"),
        }
    }

    #[test]
    fn change_rejects_unknown_category() {
        assert!(Cli::try_parse_from(["iowall", "client", "change", "space"]).is_err());
    }
}
