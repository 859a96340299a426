use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::answer_key::{DEFAULT_ANSWER_COLUMN, DEFAULT_QUESTION_COLUMN, KeyColumns};
use crate::grading::MatchMode;
use crate::recognizer::OcrSettings;

#[derive(Parser, Debug)]
#[command(
    name = "word-grader",
    version,
    about = "Grade recognized vocabulary-test answers against spreadsheet answer keys"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Grade(GradeArgs),
    Keys(KeysArgs),
    Recognize(RecognizeArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct KeyColumnArgs {
    #[arg(long = "key", required = true)]
    pub keys: Vec<PathBuf>,

    #[arg(long, default_value = DEFAULT_QUESTION_COLUMN)]
    pub question_column: String,

    #[arg(long, default_value = DEFAULT_ANSWER_COLUMN)]
    pub answer_column: String,
}

impl KeyColumnArgs {
    pub fn columns(&self) -> KeyColumns {
        KeyColumns {
            question: self.question_column.clone(),
            answer: self.answer_column.clone(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RecognizerKind {
    Auto,
    Text,
    Ocr,
}

impl RecognizerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Text => "text",
            Self::Ocr => "ocr",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OcrMode {
    Off,
    Auto,
    Force,
}

impl OcrMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::Force => "force",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RecognizerArgs {
    #[arg(long, value_enum, default_value_t = RecognizerKind::Auto)]
    pub recognizer: RecognizerKind,

    #[arg(long, value_enum, default_value_t = OcrMode::Auto)]
    pub ocr_mode: OcrMode,

    #[arg(long, default_value = "eng+kor")]
    pub ocr_lang: String,

    #[arg(long, default_value_t = 40)]
    pub ocr_min_text_chars: usize,
}

impl RecognizerArgs {
    pub fn ocr_settings(&self) -> OcrSettings {
        OcrSettings {
            lang: self.ocr_lang.clone(),
            mode: self.ocr_mode,
            min_text_chars: self.ocr_min_text_chars,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct GradeArgs {
    #[command(flatten)]
    pub key: KeyColumnArgs,

    #[arg(long = "document")]
    pub documents: Vec<PathBuf>,

    #[arg(long)]
    pub document_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = MatchMode::Line)]
    pub match_mode: MatchMode,

    #[command(flatten)]
    pub recognizer: RecognizerArgs,

    #[arg(long, default_value_t = 0)]
    pub document_timeout_ms: u64,

    #[arg(long, default_value = ".cache/word-grader")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_store: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct KeysArgs {
    #[command(flatten)]
    pub key: KeyColumnArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RecognizeArgs {
    #[arg(long)]
    pub document: PathBuf,

    #[command(flatten)]
    pub recognizer: RecognizerArgs,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/word-grader")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}
