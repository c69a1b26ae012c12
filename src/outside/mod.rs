mod command;
mod ytdl;

pub use ytdl::{DownloadOptions, VideoDownloader, Ytdl};
