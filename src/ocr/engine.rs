use anyhow::{anyhow, Context, Result};
use image::{GrayImage, RgbaImage};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

use super::preprocess::Preprocessing;
use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::automation::capability::TextExtractor;

/// A line of OCR text with its mean word confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    pub confidence: f32,
}

/// Text extractor backed by the Tesseract command line tool.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
}

impl TesseractExtractor {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>) -> Self {
        Self {
            executable,
            tessdata,
        }
    }

    /// Locates an installed Tesseract.
    pub fn locate() -> Result<Self> {
        let executable = find_tesseract_executable()?;
        let tessdata = find_tessdata_dir();
        match &tessdata {
            Some(dir) => tracing::info!(
                "Tesseract: {} (tessdata: {})",
                executable.display(),
                dir.display()
            ),
            None => tracing::info!(
                "Tesseract: {} (default tessdata)",
                executable.display()
            ),
        }
        Ok(Self::new(executable, tessdata))
    }

    /// Runs Tesseract on an already preprocessed image as a single text line.
    pub fn recognize_lines(&self, img: &GrayImage) -> Result<Vec<OcrLine>> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();
        let tsv = TsvOutput::new(format!("{}.tsv", output_base));

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg(&output_base);
        if let Some(dir) = &self.tessdata {
            command.arg("--tessdata-dir").arg(dir);
        }
        let output = command
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg("7") // single text line
            .arg("tsv")
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(parse_tsv_output(&tsv.read()?))
    }
}

/// The `.tsv` file Tesseract writes next to the output base. Removed on drop,
/// whether or not the run succeeded.
struct TsvOutput {
    path: PathBuf,
}

impl TsvOutput {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<String> {
        std::fs::read_to_string(self.path())
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))
    }
}

impl Drop for TsvOutput {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

impl TextExtractor for TesseractExtractor {
    fn recognize_text(
        &mut self,
        image: &RgbaImage,
        preprocessing: &Preprocessing,
    ) -> Result<Vec<String>> {
        let prepared = preprocessing.apply(image);
        let lines = self.recognize_lines(&prepared)?;
        for line in &lines {
            tracing::debug!("OCR line '{}' (conf {:.1})", line.text, line.confidence);
        }
        Ok(lines.into_iter().map(|line| line.text).collect())
    }
}

/// Parses Tesseract TSV output into lines, in reading order.
///
/// Words are grouped by (block, paragraph, line). Rows with negative
/// confidence or empty text are ignored.
fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut words: Vec<&str> = Vec::new();
    let mut conf_sum = 0.0f32;

    let mut flush = |words: &mut Vec<&str>, conf_sum: &mut f32| {
        if !words.is_empty() {
            lines.push(OcrLine {
                text: words.join(" "),
                confidence: *conf_sum / words.len() as f32,
            });
        }
        words.clear();
        *conf_sum = 0.0;
    };

    // header row first
    for row in tsv.lines().skip(1) {
        // level, page_num, block_num, par_num, line_num, word_num,
        // left, top, width, height, conf, text
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        let level: i32 = fields[0].parse().unwrap_or(-1);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        if current_key != Some(key) {
            flush(&mut words, &mut conf_sum);
            current_key = Some(key);
        }
        words.push(text);
        conf_sum += conf;
    }
    flush(&mut words, &mut conf_sum);

    lines
}
