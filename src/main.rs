mod cli;
mod downloader;
mod io;
mod logging;
mod mode;
mod outside;
mod result;

use std::process::ExitCode;

use tracing::{debug, info};

use crate::{
    cli::Settings,
    downloader::Downloader,
    mode::{Mode, INVALID_MODE_MESSAGE},
    outside::Ytdl,
    result::{Error, Result},
};

/// Exit status of a run stopped by an invalid mode selection
const INVALID_MODE_EXIT_CODE: u8 = 1;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = failure_code(&err);
            match err {
                Error::InvalidMode(_) => println!("{INVALID_MODE_MESSAGE}"),
                err => eprintln!("{:?}", miette::Report::from(err)),
            }
            ExitCode::from(code)
        }
    }
}

fn failure_code(err: &Error) -> u8 {
    match err {
        Error::InvalidMode(_) => INVALID_MODE_EXIT_CODE,
        _ => 1,
    }
}

fn run() -> Result<()> {
    // Initialize the environment & CLI
    let matches = cli::command().get_matches();
    logging::init_logging(cli::log_level(&matches))?;
    let settings = Settings::load(&matches)?;
    debug!("Settings: {settings:?}");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    let mode = match settings.mode {
        Some(mode) => mode,
        None => Mode::prompt(&mut stdin.lock(), &mut stdout)?,
    };
    info!("Running in {mode} mode");

    let ytdl = Ytdl::new(settings.download_options())?;
    debug!("Using {}", ytdl.program());

    // Make sure the output directory exists before checking its content
    io::create_output_dir(&settings.out)?;

    let mut urls = match mode {
        Mode::Interactive => mode::read_urls(&mut stdin.lock(), &mut stdout)?,
        Mode::Script => settings.urls.clone(),
    };
    info!("{} videos to process", urls.len());

    if settings.shuffle {
        debug!("Shuffling the videos download order");
        fastrand::shuffle(&mut urls);
    }

    let summary = Downloader::new(&ytdl, &settings.out, settings.skip_unavailable).run(&urls)?;

    info!(
        "All videos processed: {} downloaded, {} already present, {} unavailable",
        summary.downloaded, summary.already_present, summary.unavailable
    );
    Ok(())
}
