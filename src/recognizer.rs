//! Recognizer collaborators that turn an uploaded artifact into [`RecognizedDocument`] text.
//!
//! OCR shells out to `tesseract`, and PDFs go through `pdftotext` / `pdftoppm`. The tool probe
//! lives in a process-wide [`OcrEngine`] that is initialized at most once and only when an OCR
//! recognizer is first requested.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cli::{OcrMode, RecognizerKind};
use crate::grading::non_whitespace_char_count;
use crate::model::{RecognizedDocument, ToolVersions};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];
const TEXT_EXTENSIONS: &[&str] = &["txt"];

static OCR_ENGINE: OnceCell<OcrEngine> = OnceCell::new();

pub trait Recognizer {
    fn name(&self) -> &'static str;

    fn recognize(&self, path: &Path) -> Result<RecognizedDocument>;
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub lang: String,
    pub mode: OcrMode,
    pub min_text_chars: usize,
}

/// Handle to the external OCR toolchain, probed once per process.
#[derive(Debug)]
pub struct OcrEngine {
    versions: ToolVersions,
}

impl OcrEngine {
    pub fn shared() -> &'static OcrEngine {
        OCR_ENGINE.get_or_init(Self::probe)
    }

    /// The engine if some recognizer already needed it; never triggers a probe.
    pub fn initialized() -> Option<&'static OcrEngine> {
        OCR_ENGINE.get()
    }

    fn probe() -> Self {
        let versions = ToolVersions {
            tesseract: command_version_optional("tesseract", &["--version"]),
            pdftotext: command_version_optional("pdftotext", &["-v"]),
            pdftoppm: command_version_optional("pdftoppm", &["-v"]),
        };

        info!(
            tesseract = %versions.tesseract.as_deref().unwrap_or("unavailable"),
            pdftotext = %versions.pdftotext.as_deref().unwrap_or("unavailable"),
            pdftoppm = %versions.pdftoppm.as_deref().unwrap_or("unavailable"),
            "probed OCR toolchain"
        );

        Self { versions }
    }

    pub fn versions(&self) -> &ToolVersions {
        &self.versions
    }

    fn can_ocr_pdf_pages(&self) -> bool {
        self.versions.tesseract.is_some() && self.versions.pdftoppm.is_some()
    }

    pub fn ocr_image(&self, image_path: &Path, lang: &str) -> Result<String> {
        if self.versions.tesseract.is_none() {
            bail!(
                "tesseract is unavailable; cannot recognize {}",
                image_path.display()
            );
        }

        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(lang)
            .output()
            .with_context(|| format!("failed to execute tesseract for {}", image_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "tesseract returned non-zero exit status for {}: {}",
                image_path.display(),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .replace('\u{0000}', "")
            .trim()
            .to_string())
    }

    pub fn pdf_text_layer(&self, pdf_path: &Path) -> Result<Vec<String>> {
        if self.versions.pdftotext.is_none() {
            bail!(
                "pdftotext is unavailable; cannot read {}",
                pdf_path.display()
            );
        }

        let output = Command::new("pdftotext")
            .arg("-enc")
            .arg("UTF-8")
            .arg("-layout")
            .arg(pdf_path)
            .arg("-")
            .output()
            .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftotext returned non-zero exit status for {}: {}",
                pdf_path.display(),
                stderr.trim()
            );
        }

        Ok(split_text_layer_pages(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    pub fn ocr_pdf_page(&self, pdf_path: &Path, page_number: usize, lang: &str) -> Result<String> {
        let output_root = temp_render_root(pdf_path, page_number);
        let png_path = PathBuf::from(format!("{}.png", output_root.display()));

        let output = Command::new("pdftoppm")
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg("-singlefile")
            .arg("-r")
            .arg("300")
            .arg("-png")
            .arg(pdf_path)
            .arg(&output_root)
            .output()
            .with_context(|| format!("failed to execute pdftoppm for {}", pdf_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftoppm returned non-zero exit status for {} page {}: {}",
                pdf_path.display(),
                page_number,
                stderr.trim()
            );
        }

        if !png_path.exists() {
            bail!(
                "pdftoppm did not produce expected image for {} page {}",
                pdf_path.display(),
                page_number
            );
        }

        let text = self.ocr_image(&png_path, lang);
        let _ = fs::remove_file(&png_path);
        text
    }
}

/// Reads already-recognized UTF-8 text; form feeds mark page boundaries.
pub struct PlainTextRecognizer;

impl Recognizer for PlainTextRecognizer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn recognize(&self, path: &Path) -> Result<RecognizedDocument> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(RecognizedDocument::from_text(
            String::from_utf8_lossy(&raw).replace('\u{0000}', ""),
        ))
    }
}

pub struct OcrRecognizer {
    engine: &'static OcrEngine,
    settings: OcrSettings,
}

impl OcrRecognizer {
    pub fn new(engine: &'static OcrEngine, settings: OcrSettings) -> Self {
        Self { engine, settings }
    }

    fn recognize_pdf(&self, pdf_path: &Path) -> Result<RecognizedDocument> {
        let mut pages = self.engine.pdf_text_layer(pdf_path)?;
        let candidates =
            collect_ocr_candidates(&pages, self.settings.mode, self.settings.min_text_chars);

        if candidates.is_empty() {
            return Ok(RecognizedDocument::from_pages(pages));
        }

        if !self.engine.can_ocr_pdf_pages() {
            if matches!(self.settings.mode, OcrMode::Force) {
                bail!(
                    "OCR mode 'force' requested for {} but pdftoppm/tesseract are unavailable",
                    pdf_path.display()
                );
            }
            warn!(
                path = %pdf_path.display(),
                pages = candidates.len(),
                "OCR unavailable; keeping text layer"
            );
            return Ok(RecognizedDocument::from_pages(pages));
        }

        for page_number in candidates {
            let page_index = page_number.saturating_sub(1);
            match self
                .engine
                .ocr_pdf_page(pdf_path, page_number, &self.settings.lang)
            {
                Ok(ocr_text) => {
                    if non_whitespace_char_count(&ocr_text) == 0
                        && matches!(self.settings.mode, OcrMode::Auto)
                    {
                        warn!(path = %pdf_path.display(), page = page_number, "OCR text was empty in auto mode");
                        continue;
                    }
                    debug!(path = %pdf_path.display(), page = page_number, "replaced page with OCR text");
                    if let Some(page) = pages.get_mut(page_index) {
                        *page = ocr_text;
                    }
                }
                Err(error) => {
                    if matches!(self.settings.mode, OcrMode::Force) {
                        return Err(error).with_context(|| {
                            format!(
                                "failed OCR extraction for {} page {}",
                                pdf_path.display(),
                                page_number
                            )
                        });
                    }
                    warn!(
                        path = %pdf_path.display(),
                        page = page_number,
                        error = %error,
                        "OCR fallback failed; keeping text layer"
                    );
                }
            }
        }

        Ok(RecognizedDocument::from_pages(pages))
    }
}

impl Recognizer for OcrRecognizer {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn recognize(&self, path: &Path) -> Result<RecognizedDocument> {
        let extension = lowercase_extension(path);
        if extension.as_deref() == Some("pdf") {
            return self.recognize_pdf(path);
        }

        if extension
            .as_deref()
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
        {
            let text = self.engine.ocr_image(path, &self.settings.lang)?;
            return Ok(RecognizedDocument::from_pages(vec![text]));
        }

        bail!("unsupported document type for OCR: {}", path.display())
    }
}

/// Picks the recognizer for one document. OCR is only probed when it is actually needed.
pub fn recognizer_for(
    kind: RecognizerKind,
    path: &Path,
    settings: &OcrSettings,
) -> Box<dyn Recognizer> {
    let use_text = match kind {
        RecognizerKind::Text => true,
        RecognizerKind::Ocr => false,
        RecognizerKind::Auto => lowercase_extension(path)
            .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str())),
    };

    if use_text {
        Box::new(PlainTextRecognizer)
    } else {
        Box::new(OcrRecognizer::new(OcrEngine::shared(), settings.clone()))
    }
}

pub fn is_supported_document(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| {
        ext == "pdf" || IMAGE_EXTENSIONS.contains(&ext.as_str()) || TEXT_EXTENSIONS.contains(&ext.as_str())
    })
}

/// Lists supported documents directly inside `dir`, sorted by path.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();

    let entries = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        if is_supported_document(&path) {
            documents.push(path);
        }
    }

    documents.sort();
    Ok(documents)
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn split_text_layer_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while pages.last().is_some_and(|page| page.trim().is_empty()) {
        pages.pop();
    }

    pages
}

fn collect_ocr_candidates(pages: &[String], ocr_mode: OcrMode, min_text_chars: usize) -> Vec<usize> {
    match ocr_mode {
        OcrMode::Off => Vec::new(),
        OcrMode::Force => (1..=pages.len()).collect(),
        OcrMode::Auto => pages
            .iter()
            .enumerate()
            .filter(|(_, page)| non_whitespace_char_count(page) < min_text_chars)
            .map(|(index, _)| index + 1)
            .collect(),
    }
}

fn temp_render_root(pdf_path: &Path, page_number: usize) -> PathBuf {
    let safe_stem = pdf_path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("pdf")
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character
            } else {
                '_'
            }
        })
        .collect::<String>();

    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    std::env::temp_dir().join(format!(
        "word_grader_ocr_{}_{}_{}_{}",
        safe_stem,
        std::process::id(),
        page_number,
        stamp
    ))
}

pub fn command_version_optional(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}
