use std::{
    fmt::Display,
    io::{BufRead, Write},
};

use miette::{Context, IntoDiagnostic};
use serde::Deserialize;

use crate::result::{Error, Result};

/// Line that ends the interactive URL input, compared case-insensitively
const END_SENTINEL: &str = "done";

pub const MODE_PROMPT: &str = "Enter mode (1 for interactive, 2 for script): ";
pub const INVALID_MODE_MESSAGE: &str =
    "Invalid mode. Please enter '1' for interactive or '2' for script.";

/// Videos downloaded in script mode when the configuration does not list any
pub const DEFAULT_SCRIPT_URLS: [&str; 2] = [
    "https://www.youtube.com/watch?v=-pSf9_MgsZ4&ab_channel=Fireship",
    "https://www.youtube.com/watch?v=b1aBzAE-IFY",
];

/// Where the URLs to download come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// URLs typed on the standard input
    Interactive,

    /// A fixed list of URLs
    Script,
}

impl Mode {
    /// Parse the answer to [`MODE_PROMPT`]
    pub fn from_selection(input: &str) -> Result<Self> {
        match input.trim() {
            "1" => Ok(Self::Interactive),
            "2" => Ok(Self::Script),
            other => Err(Error::InvalidMode(other.to_owned())),
        }
    }

    /// Ask the user which mode to run
    pub fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Self> {
        let answer = prompt_line(input, output, MODE_PROMPT)?.unwrap_or_default();
        Self::from_selection(&answer)
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Interactive => write!(f, "interactive"),
            Mode::Script => write!(f, "script"),
        }
    }
}

/// Print the prompt and read one line, without its line ending.
/// Return `None` at the end of the input.
fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> Result<Option<String>> {
    write!(output, "{prompt}")
        .and_then(|_| output.flush())
        .into_diagnostic()
        .wrap_err("Could not write the prompt")?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .into_diagnostic()
        .wrap_err("Could not read from the input")?;

    if read == 0 {
        Ok(None)
    } else {
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
    }
}

/// Read URLs one per line until the `done` sentinel or the end of the input.
///
/// Blank lines are ignored.
pub fn read_urls<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Vec<String>> {
    writeln!(
        output,
        "Interactive Mode: Enter video URLs (one per line). Type '{END_SENTINEL}' when finished."
    )
    .into_diagnostic()?;

    let mut urls = Vec::new();
    while let Some(line) = prompt_line(input, output, "Video URL: ")? {
        let url = line.trim();
        if url.eq_ignore_ascii_case(END_SENTINEL) {
            break;
        }
        if !url.is_empty() {
            urls.push(url.to_owned());
        }
    }

    Ok(urls)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn selection_numbers() {
        assert_eq!(Mode::from_selection("1").unwrap(), Mode::Interactive);
        assert_eq!(Mode::from_selection(" 2 \n").unwrap(), Mode::Script);
    }

    #[test]
    fn invalid_selection() {
        for input in ["", "3", "interactive", "12"] {
            match Mode::from_selection(input) {
                Err(Error::InvalidMode(_)) => {}
                other => panic!("unexpected result for {input:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn mode_names() {
        assert_eq!(Mode::Script.to_string(), "script");
    }

    #[test]
    fn prompt_reads_the_answer() {
        let mut input = Cursor::new("2\n");
        let mut output = Vec::new();

        assert_eq!(Mode::prompt(&mut input, &mut output).unwrap(), Mode::Script);
        assert_eq!(String::from_utf8(output).unwrap(), MODE_PROMPT);
    }

    #[test]
    fn prompt_without_answer_is_invalid() {
        let mut input = Cursor::new("");
        let res = Mode::prompt(&mut input, &mut Vec::new());
        assert!(matches!(res, Err(Error::InvalidMode(_))));
    }

    #[test]
    fn urls_until_done() {
        let mut input = Cursor::new("https://a\n\n  https://b  \nDONE\nhttps://c\n");
        let urls = read_urls(&mut input, &mut Vec::new()).unwrap();
        assert_eq!(urls, ["https://a", "https://b"]);
    }

    #[test]
    fn urls_until_end_of_input() {
        let mut input = Cursor::new("https://a\r\nhttps://b");
        let mut output = Vec::new();
        let urls = read_urls(&mut input, &mut output).unwrap();
        assert_eq!(urls, ["https://a", "https://b"]);

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Interactive Mode:"));
        assert_eq!(output.matches("Video URL: ").count(), 3);
    }
}
