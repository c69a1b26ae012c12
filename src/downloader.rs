use std::path::Path;

use tracing::{debug, error, info};

use crate::{
    io::video_exists,
    outside::VideoDownloader,
    result::{Error, Result},
};

/// What happened to a single URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Downloaded,
    AlreadyPresent,
    Unavailable,
}

/// Count of each [`Outcome`] over a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub downloaded: usize,
    pub already_present: usize,
    pub unavailable: usize,
}

impl Summary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Downloaded => self.downloaded += 1,
            Outcome::AlreadyPresent => self.already_present += 1,
            Outcome::Unavailable => self.unavailable += 1,
        }
    }
}

/// Download videos and their subtitles one after the other into a directory
pub struct Downloader<'a> {
    video_dl: &'a dyn VideoDownloader,
    out_dir: &'a Path,
    skip_unavailable: bool,
}

impl<'a> Downloader<'a> {
    pub fn new(video_dl: &'a dyn VideoDownloader, out_dir: &'a Path, skip_unavailable: bool) -> Self {
        Self {
            video_dl,
            out_dir,
            skip_unavailable,
        }
    }

    /// Process every URL in order, stopping at the first error
    pub fn run<S: AsRef<str>>(&self, urls: &[S]) -> Result<Summary> {
        let mut summary = Summary::default();

        for (i, url) in urls.iter().enumerate() {
            let url = url.as_ref();
            debug!("Processing URL {}/{}: {url}", i + 1, urls.len());

            summary.record(self.process(url)?);
        }

        Ok(summary)
    }

    /// Download the video then its subtitles, unless the video is already present
    pub fn process(&self, url: &str) -> Result<Outcome> {
        match self.download_if_missing(url) {
            Err(Error::UnavailableStream) if self.skip_unavailable => {
                error!("Video {url} is unavailable. Skipping it");
                Ok(Outcome::Unavailable)
            }
            res => res,
        }
    }

    fn download_if_missing(&self, url: &str) -> Result<Outcome> {
        if video_exists(self.video_dl, url, self.out_dir)? {
            info!("Video already exists: {url}");
            return Ok(Outcome::AlreadyPresent);
        }

        info!("Downloading video {url}");
        self.video_dl.download_video(url, self.out_dir)?;

        info!("Downloading subtitles of {url}");
        self.video_dl.download_subtitles(url, self.out_dir)?;

        Ok(Outcome::Downloaded)
    }
}
