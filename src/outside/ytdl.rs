use std::{
    ffi::OsString,
    path::Path,
    process::{Command, Output},
    sync::OnceLock,
};

use miette::{miette, Context, IntoDiagnostic};
use regex::Regex;

use super::command::{assert_success_command, run_command, Capture, YT_DL, YT_DLP};
use crate::result::{bail, Error, Result};

/// Output naming template, relative to the output directory
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Container every downloaded video ends up in
const VIDEO_CONTAINER: &str = "mp4";

/// Format of the downloaded subtitles
const SUBTITLE_FORMAT: &str = "vtt";

/// Interface for downloading videos, their subtitles and their metadata
pub trait VideoDownloader {
    /// Get the title of the video, as used to name the downloaded files.
    ///
    /// Return `None` if the program did not report any title.
    fn get_title(&self, url: &str) -> Result<Option<String>>;

    /// Download the video into the output directory.
    fn download_video(&self, url: &str, out_dir: &Path) -> Result<()>;

    /// Download the video subtitles into the output directory, without the video itself.
    fn download_subtitles(&self, url: &str, out_dir: &Path) -> Result<()>;
}

/// Options forwarded to the external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Maximum height of the preferred mp4 video stream
    pub max_height: u32,

    /// Comma-separated list of subtitle languages
    pub sub_langs: String,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            max_height: 1080,
            sub_langs: "en".to_owned(),
        }
    }
}

impl DownloadOptions {
    /// The format selector: best mp4 video under the maximum height (or any best video)
    /// merged with the best audio, falling back to the best single file.
    pub fn format_selector(&self) -> String {
        format!(
            "(bestvideo[height<={}][ext={VIDEO_CONTAINER}]/bestvideo)+bestaudio/best",
            self.max_height
        )
    }
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program,
/// or [youtube-dl](https://github.com/ytdl-org/youtube-dl) when the former is missing
#[derive(Debug)]
pub struct Ytdl {
    program: &'static str,
    options: DownloadOptions,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new(options: DownloadOptions) -> Result<Self> {
        if assert_success_command(YT_DLP, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self {
                program: YT_DLP,
                options,
            })
        } else if assert_success_command(YT_DL, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self {
                program: YT_DL,
                options,
            })
        } else {
            bail("Neither yt-dlp nor youtube-dl found")
        }
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    /// Run the command and check if it failed with saying the stream is unavailable.
    /// In that case, return [`Error::UnavailableStream`].
    ///
    /// In other cases, return the output handle.
    fn run_check_availability<F>(&self, f: F, capture: Capture) -> Result<Output>
    where
        F: FnOnce(&mut Command) -> &mut Command,
    {
        let res = run_command(self.program, f, capture | Capture::STDERR)?;

        let stderr = String::from_utf8_lossy(&res.stderr);
        if is_unavailable(&stderr) {
            Err(Error::UnavailableStream)
        } else {
            Ok(res)
        }
    }

    /// Run the command and fail if it did not succeed, reporting its stderr
    fn run_to_success(&self, args: Vec<OsString>, url: &str) -> Result<()> {
        let res =
            self.run_check_availability(|cmd| cmd.args(args).arg("--").arg(url), Capture::empty())?;

        if res.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&res.stderr);
            bail(format!(
                "{} did run but was not successful. Here is its stderr: {}",
                self.program,
                stderr.trim()
            ))
        }
    }
}

impl VideoDownloader for Ytdl {
    fn get_title(&self, url: &str) -> Result<Option<String>> {
        let res = self.run_check_availability(
            |cmd| {
                cmd.arg("-q")
                    .arg("--no-warnings")
                    .arg("--skip-download")
                    // One document even for playlists, titled like the downloaded files
                    .arg("--dump-single-json")
                    .arg("--")
                    .arg(url)
            },
            Capture::STDOUT,
        )?;

        if !res.status.success() {
            let stderr = String::from_utf8_lossy(&res.stderr);
            return bail(format!(
                "Could not extract the video information: {}",
                stderr.trim()
            ));
        }

        let output = String::from_utf8_lossy(&res.stdout);
        parse_title(&output)
    }

    fn download_video(&self, url: &str, out_dir: &Path) -> Result<()> {
        self.run_to_success(video_args(out_dir, &self.options), url)
            .map_err(|err| err.wrap_err_with(|| format!("Could not download video {url}")))
    }

    fn download_subtitles(&self, url: &str, out_dir: &Path) -> Result<()> {
        self.run_to_success(subtitle_args(out_dir, &self.options), url)
            .map_err(|err| err.wrap_err_with(|| format!("Could not download subtitles of {url}")))
    }
}

/// Build the `-o` output template argument for the output directory
fn output_template(out_dir: &Path) -> OsString {
    out_dir.join(OUTPUT_TEMPLATE).into_os_string()
}

/// Arguments to download the video, merged and converted to mp4
fn video_args(out_dir: &Path, options: &DownloadOptions) -> Vec<OsString> {
    vec![
        "-f".into(),
        options.format_selector().into(),
        "--merge-output-format".into(),
        VIDEO_CONTAINER.into(),
        // Convert whatever was downloaded into the wanted container
        "--recode-video".into(),
        VIDEO_CONTAINER.into(),
        "-o".into(),
        output_template(out_dir),
    ]
}

/// Arguments to download the subtitles only, both manual and automatic ones
fn subtitle_args(out_dir: &Path, options: &DownloadOptions) -> Vec<OsString> {
    vec![
        "--write-sub".into(),
        "--write-auto-sub".into(),
        "--skip-download".into(),
        "--sub-format".into(),
        SUBTITLE_FORMAT.into(),
        "--sub-lang".into(),
        options.sub_langs.as_str().into(),
        "-o".into(),
        output_template(out_dir),
    ]
}

/// Extract the title from the JSON info dump of a video
fn parse_title(output: &str) -> Result<Option<String>> {
    let json = serde_json::from_str::<serde_json::Value>(output)
        .into_diagnostic()
        .wrap_err("Could not parse json")?;
    let json = json
        .as_object()
        .ok_or_else(|| miette!("JSON is not an object"))?;

    Ok(json
        .get("title")
        .and_then(|title| title.as_str())
        .map(str::to_owned))
}

/// Whether the program stderr reports the video as unavailable
fn is_unavailable(stderr: &str) -> bool {
    static UNAVAILABLE_RE: OnceLock<Regex> = OnceLock::new();

    let re = UNAVAILABLE_RE
        .get_or_init(|| Regex::new(r"(?i)^ERROR:.*unavailable").expect("valid regex"));
    stderr.lines().any(|line| re.is_match(line))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use indoc::indoc;

    use super::*;

    fn to_strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_format_prefers_1080p_mp4() {
        assert_eq!(
            DownloadOptions::default().format_selector(),
            "(bestvideo[height<=1080][ext=mp4]/bestvideo)+bestaudio/best"
        );
    }

    #[test]
    fn video_args_merge_and_name_by_title() {
        let out = PathBuf::from("/videos");
        let args = to_strings(video_args(&out, &DownloadOptions::default()));

        let pos = |s: &str| args.iter().position(|a| a == s).unwrap();
        assert_eq!(args[pos("--merge-output-format") + 1], "mp4");
        assert_eq!(args[pos("--recode-video") + 1], "mp4");
        assert_eq!(
            PathBuf::from(&args[pos("-o") + 1]),
            out.join("%(title)s.%(ext)s")
        );
        assert!(!args.contains(&"--skip-download".to_owned()));
    }

    #[test]
    fn subtitle_args_skip_the_video() {
        let options = DownloadOptions {
            max_height: 720,
            sub_langs: "en,fr".to_owned(),
        };
        let args = to_strings(subtitle_args(Path::new("/videos"), &options));

        let pos = |s: &str| args.iter().position(|a| a == s).unwrap();
        assert!(args.contains(&"--skip-download".to_owned()));
        assert!(args.contains(&"--write-sub".to_owned()));
        assert!(args.contains(&"--write-auto-sub".to_owned()));
        assert_eq!(args[pos("--sub-format") + 1], "vtt");
        assert_eq!(args[pos("--sub-lang") + 1], "en,fr");
    }

    #[test]
    fn title_is_read_from_json() {
        let title = parse_title(r#"{"id": "abc", "title": "Rust in 100 Seconds"}"#).unwrap();
        assert_eq!(title.as_deref(), Some("Rust in 100 Seconds"));
    }

    #[test]
    fn playlist_document_uses_its_own_title() {
        let json = indoc! {r#"
            {
                "_type": "playlist",
                "title": "Rust Tutorials",
                "entries": [{"title": "Entry 1"}, {"title": "Entry 2"}]
            }
        "#};
        assert_eq!(parse_title(json).unwrap().as_deref(), Some("Rust Tutorials"));
    }

    #[test]
    fn subtitle_options_are_known_to_both_programs() {
        // youtube-dl only knows the singular spellings, yt-dlp keeps them as aliases
        let args = to_strings(subtitle_args(Path::new("/videos"), &DownloadOptions::default()));
        for plural in ["--write-subs", "--write-auto-subs", "--sub-langs"] {
            assert!(!args.contains(&plural.to_owned()), "{plural} is yt-dlp only");
        }
    }

    #[test]
    fn missing_title_is_none() {
        assert_eq!(parse_title(r#"{"id": "abc"}"#).unwrap(), None);
        assert_eq!(parse_title(r#"{"title": 42}"#).unwrap(), None);
        assert!(parse_title("[]").is_err());
        assert!(parse_title("not json").is_err());
    }

    #[test]
    fn unavailable_errors_are_detected() {
        assert!(is_unavailable(
            "[youtube] abc: Downloading webpage\nERROR: [youtube] abc: Video unavailable"
        ));
        assert!(!is_unavailable("WARNING: video unavailable in your country"));
        assert!(!is_unavailable("ERROR: Unable to download webpage"));
    }
}
