use std::path::Path;

use miette::{Context, IntoDiagnostic};

use crate::{outside::VideoDownloader, result::Result};

/// Create the output directory and its parents if they do not exist yet
pub fn create_output_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not create out directory {}", path.display()))?;
    Ok(())
}

/// Check whether any entry of the directory has a name starting with the prefix.
///
/// Non UTF-8 names are compared after a lossy conversion.
pub fn has_file_with_prefix(dir: &Path, prefix: &str) -> Result<bool> {
    let entries = dir
        .read_dir()
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not read directory {}", dir.display()))?;

    for entry in entries {
        let entry = entry
            .into_diagnostic()
            .wrap_err("Could not read directory entry")?;
        if entry.file_name().to_string_lossy().starts_with(prefix) {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Check whether the video behind the URL seems to already be in the directory.
///
/// The video files are named by their title, so any file starting with it counts.
/// A video without title, or with an empty one, is never considered present.
pub fn video_exists(downloader: &dyn VideoDownloader, url: &str, dir: &Path) -> Result<bool> {
    let title = downloader
        .get_title(url)
        .map_err(|err| err.wrap_err_with(|| format!("Could not get the title of {url}")))?;

    match title {
        Some(title) if !title.is_empty() => has_file_with_prefix(dir, &title),
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;
    use crate::result::bail;

    struct TitleOnly(Option<&'static str>);

    impl VideoDownloader for TitleOnly {
        fn get_title(&self, _url: &str) -> Result<Option<String>> {
            Ok(self.0.map(str::to_owned))
        }

        fn download_video(&self, _url: &str, _out_dir: &Path) -> Result<()> {
            bail("not used")
        }

        fn download_subtitles(&self, _url: &str, _out_dir: &Path) -> Result<()> {
            bail("not used")
        }
    }

    #[test]
    fn output_dir_creation_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested").join("videos");

        create_output_dir(&out).unwrap();
        assert!(out.is_dir());

        File::create(out.join("kept.mp4")).unwrap();
        create_output_dir(&out).unwrap();
        assert!(out.join("kept.mp4").exists());
    }

    #[test]
    fn prefix_matches_any_extension() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("Rust in 100 Seconds.en.vtt")).unwrap();

        assert!(has_file_with_prefix(tmp.path(), "Rust in 100 Seconds").unwrap());
        assert!(!has_file_with_prefix(tmp.path(), "Go in 100 Seconds").unwrap());
    }

    #[test]
    fn empty_or_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!has_file_with_prefix(tmp.path(), "anything").unwrap());
        assert!(has_file_with_prefix(&tmp.path().join("missing"), "anything").is_err());
    }

    #[test]
    fn video_exists_uses_the_title() {
        let tmp = tempfile::tempdir().unwrap();
        File::create(tmp.path().join("My Video.mp4")).unwrap();

        let url = "https://example.com/watch?v=1";
        assert!(video_exists(&TitleOnly(Some("My Video")), url, tmp.path()).unwrap());
        assert!(!video_exists(&TitleOnly(Some("Other")), url, tmp.path()).unwrap());
        assert!(!video_exists(&TitleOnly(None), url, tmp.path()).unwrap());
        assert!(!video_exists(&TitleOnly(Some("")), url, tmp.path()).unwrap());
    }
}
