use std::path::{Path, PathBuf};

use clap::{command, value_parser, Arg, ArgAction, ArgMatches, Command};
use config::{Config, Environment, File, FileFormat};
use indoc::indoc;
use miette::{Context, IntoDiagnostic};
use serde::Deserialize;

use crate::{
    mode::{Mode, DEFAULT_SCRIPT_URLS},
    outside::DownloadOptions,
    result::Result,
};

/// Prefix of the environment variables overriding the config file
const ENV_PREFIX: &str = "YTVIDS";
const DEFAULT_CONFIG_FILE: &str = "ytvids.toml";
const DEFAULT_OUT_DIR: &str = "/videos";

/// Build the command line interface
pub fn command() -> Command {
    command!()
        .about("Download videos and their subtitles with yt-dlp, skipping the ones already downloaded")
        .after_help(indoc! {"
            Settings are read, by increasing priority, from the built-in defaults,
            the config file, the YTVIDS_* environment variables (e.g. YTVIDS_OUT)
            and the command line.

            In script mode, the URLs are taken from the `urls` list of the config file.
        "})
        .arg(
            Arg::new("out")
                .long("out")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("The path to the output directory [default: /videos]"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_parser(["interactive", "script"])
                .help("Where to take the URLs from. Asked on startup if not set"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("The path to the TOML config file [default: ytvids.toml]"),
        )
        .arg(
            Arg::new("max_height")
                .long("max-height")
                .value_name("PIXELS")
                .value_parser(value_parser!(u32).range(1..))
                .help("The maximum height of the preferred mp4 video stream [default: 1080]"),
        )
        .arg(
            Arg::new("sub_langs")
                .long("sub-langs")
                .value_name("LANGS")
                .help("Comma-separated subtitle languages to download [default: en]"),
        )
        .arg(
            Arg::new("skip_unavailable")
                .long("skip-unavailable")
                .action(ArgAction::SetTrue)
                .help("Skip unavailable videos instead of stopping"),
        )
        .arg(
            Arg::new("shuffle")
                .long("shuffle")
                .action(ArgAction::SetTrue)
                .help("Randomize the order in which the videos are downloaded"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Log more details, repeat for even more"),
        )
}

/// The resolved settings of a run
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub out: PathBuf,
    pub mode: Option<Mode>,
    pub max_height: u32,
    pub sub_langs: String,
    pub skip_unavailable: bool,
    pub shuffle: bool,

    /// URLs downloaded in script mode
    pub urls: Vec<String>,
}

impl Settings {
    /// Merge the defaults, the config file, the environment and the command line
    pub fn load(matches: &ArgMatches) -> Result<Self> {
        Self::load_with_env(matches, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(matches: &ArgMatches, env: Environment) -> Result<Self> {
        let config_file = matches
            .get_one::<PathBuf>("config")
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let mode = matches.get_one::<String>("mode").cloned();
        let out = matches
            .get_one::<PathBuf>("out")
            .map(|p| p.to_string_lossy().into_owned());
        let max_height = matches.get_one::<u32>("max_height").map(|&h| i64::from(h));
        let sub_langs = matches.get_one::<String>("sub_langs").cloned();
        let flag = |id: &str| matches.get_flag(id).then_some(true);

        let defaults = DownloadOptions::default();

        Config::builder()
            .set_default("out", DEFAULT_OUT_DIR)
            .and_then(|b| b.set_default("max_height", i64::from(defaults.max_height)))
            .and_then(|b| b.set_default("sub_langs", defaults.sub_langs))
            .and_then(|b| b.set_default("skip_unavailable", false))
            .and_then(|b| b.set_default("shuffle", false))
            .and_then(|b| b.set_default("urls", DEFAULT_SCRIPT_URLS.to_vec()))
            .into_diagnostic()
            .wrap_err("Could not set default settings")?
            .add_source(
                File::from(config_file)
                    .format(FileFormat::Toml)
                    // Only the implicit config file may be missing
                    .required(matches.contains_id("config")),
            )
            .add_source(env.try_parsing(true).list_separator(",").with_list_parse_key("urls"))
            .set_override_option("out", out)
            .and_then(|b| b.set_override_option("mode", mode))
            .and_then(|b| b.set_override_option("max_height", max_height))
            .and_then(|b| b.set_override_option("sub_langs", sub_langs))
            .and_then(|b| b.set_override_option("skip_unavailable", flag("skip_unavailable")))
            .and_then(|b| b.set_override_option("shuffle", flag("shuffle")))
            .and_then(|b| b.build())
            .and_then(|config| config.try_deserialize::<Settings>())
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not load settings from {}", config_file.display()))
            .map_err(Into::into)
    }

    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            max_height: self.max_height,
            sub_langs: self.sub_langs.clone(),
        }
    }
}

/// Log level selected by the number of `-v` flags
pub fn log_level(matches: &ArgMatches) -> tracing::Level {
    match matches.get_count("verbose") {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}
