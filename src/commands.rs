use std::error::Error as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use crate::diagnostics;
use crate::engine::{EngineChoice, Outcome, RecognitionResult, SpeechEngine, TranscriptionRequest};
use crate::language::Language;
use crate::settings::Settings;
use crate::streaming::default_backend;

#[derive(Debug, Parser)]
#[command(name = "lok-stt", version, about = "Offline speech-to-text with a silent fallback")]
pub struct Cli {
    /// Audio file to transcribe.
    #[arg(value_name = "PATH", required_unless_present_any = ["input", "diagnose"])]
    pub path: Option<PathBuf>,

    /// Audio file to transcribe, as a flag.
    #[arg(long, value_name = "PATH", conflicts_with = "path")]
    pub input: Option<PathBuf>,

    /// Language hint, e.g. `en`, `hi-IN`, `ta`.
    #[arg(long, default_value = "en")]
    pub lang: String,

    #[arg(long, value_enum, default_value_t = EngineChoice::Streaming)]
    pub engine: EngineChoice,

    /// Log environment checks and exit.
    #[arg(long)]
    pub diagnose: bool,
}

impl Cli {
    pub fn input_path(&self) -> Option<&Path> {
        self.input.as_deref().or(self.path.as_deref())
    }
}

pub fn dispatch(cli: Cli) -> ExitCode {
    let language = Language::parse(&cli.lang);
    if !language.is_known() {
        log::info!("Unrecognised language hint '{}'; passing it through", cli.lang);
    }
    let settings = Settings::from_env(&language);

    if cli.diagnose {
        diagnostics::run_startup_checks(&settings, default_backend().as_ref());
        return ExitCode::SUCCESS;
    }

    let Some(input) = cli.input_path() else {
        eprintln!("no input file given");
        return ExitCode::from(2);
    };

    let engine = SpeechEngine::new(settings);
    let request = TranscriptionRequest {
        input: input.to_path_buf(),
        language,
        engine: cli.engine,
    };
    report(engine.transcribe(&request))
}

/// Writes the outcome to stdout/stderr and maps it to the process exit code.
pub fn report(outcome: Outcome) -> ExitCode {
    let code = write_outcome(outcome, &mut io::stdout().lock(), &mut io::stderr().lock());
    ExitCode::from(code)
}

/// The result line goes to `out` only when the exit code is 0; failures
/// write to `err` alone.
pub fn write_outcome<O: Write, E: Write>(outcome: Outcome, out: &mut O, err: &mut E) -> u8 {
    let code = outcome.exit_code();

    if let Some(result) = outcome.response() {
        let written = result
            .to_json()
            .map_err(io::Error::from)
            .and_then(|line| writeln!(out, "{line}"));
        return match written {
            Ok(()) => code,
            Err(e) => {
                log::error!("Could not write result: {}", e);
                1
            }
        };
    }

    let written = match outcome {
        Outcome::Failed { error, partial } => {
            let mut source = error.source();
            while let Some(cause) = source {
                log::error!("  caused by: {}", cause);
                source = cause.source();
            }
            match RecognitionResult::with_partial(partial).to_json() {
                Ok(line) => writeln!(err, "{line}"),
                Err(_) => writeln!(err, "{error}"),
            }
        }
        Outcome::Fatal(e) => {
            writeln!(err, "Error: {e}").and_then(|()| writeln!(err, "{}", e.user_message()))
        }
        _ => Ok(()),
    };
    if let Err(e) = written {
        log::error!("Could not write error report: {}", e);
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::AsrError;
    use crate::engine::{EngineKind, UnavailableReason};

    #[test]
    fn positional_and_flag_inputs() {
        let cli = Cli::parse_from(["lok-stt", "clip.wav"]);
        assert_eq!(cli.input_path(), Some(Path::new("clip.wav")));
        assert_eq!(cli.engine, EngineChoice::Streaming);
        assert_eq!(cli.lang, "en");

        let cli = Cli::parse_from(["lok-stt", "--input", "a.webm", "--lang", "hi", "--engine", "auto"]);
        assert_eq!(cli.input_path(), Some(Path::new("a.webm")));
        assert_eq!(cli.engine, EngineChoice::Auto);
        assert_eq!(cli.lang, "hi");
    }

    #[test]
    fn input_is_required_unless_diagnosing() {
        assert!(Cli::try_parse_from(["lok-stt"]).is_err());
        assert!(Cli::try_parse_from(["lok-stt", "--diagnose"]).is_ok());
        assert!(Cli::try_parse_from(["lok-stt", "a.wav", "--input", "b.wav"]).is_err());
    }

    #[test]
    fn unknown_engine_is_rejected() {
        assert!(Cli::try_parse_from(["lok-stt", "a.wav", "--engine", "cloud"]).is_err());
    }

    fn written(outcome: Outcome) -> (u8, String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let code = write_outcome(outcome, &mut out, &mut err);
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn soft_fallback_prints_canonical_line_on_stdout() {
        let (code, out, err) = written(Outcome::NoEngine(UnavailableReason::ModelNotConfigured));
        assert_eq!(code, 0);
        assert_eq!(out, "{\"text\":\"\",\"partial\":\"\"}\n");
        assert!(err.is_empty());
    }

    #[test]
    fn transcript_goes_to_stdout() {
        let (code, out, err) = written(Outcome::Transcribed {
            result: RecognitionResult::with_text("namaste"),
            engine: EngineKind::Streaming,
        });
        assert_eq!(code, 0);
        assert_eq!(out, "{\"text\":\"namaste\",\"partial\":\"\"}\n");
        assert!(err.is_empty());
    }

    #[test]
    fn runtime_failure_writes_only_to_stderr() {
        let (code, out, err) = written(Outcome::Failed {
            error: AsrError::Decoder("decoder crashed".into()).into(),
            partial: "Decoder failed: decoder crashed".into(),
        });
        assert_eq!(code, 1);
        assert!(out.is_empty());
        let line: serde_json::Value = serde_json::from_str(err.trim()).unwrap();
        assert_eq!(line["text"], "");
        assert_eq!(line["partial"], "Decoder failed: decoder crashed");
    }

    #[test]
    fn fatal_load_prints_remediation_to_stderr() {
        let (code, out, err) = written(Outcome::Fatal(AsrError::NotConfigured));
        assert_eq!(code, 1);
        assert!(out.is_empty());
        assert!(err.contains("No batch model configured"));
        assert!(err.contains("STT_BATCH_MODEL_DIR"));
    }
}
