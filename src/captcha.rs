use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

use image::{DynamicImage, GrayImage, ImageFormat};
use tracing::{debug, warn};
use viuer::Config as ViuerConfig;

use crate::config::{CaptchaConfig, CaptchaMode};
use crate::error::{StudyError, StudyResult};
use crate::ui;

/// Turns the portal's captcha image into the digits to submit.
pub trait CaptchaSolver {
    fn name(&self) -> &'static str;
    fn solve(&mut self, image: &[u8]) -> StudyResult<String>;
}

pub fn solver_for(config: &CaptchaConfig) -> Box<dyn CaptchaSolver> {
    let tesseract = TesseractSolver::new(&config.tesseract_path, config.threshold);
    let manual = ManualSolver::new(config.threshold);
    match config.mode {
        CaptchaMode::Tesseract => Box::new(tesseract),
        CaptchaMode::Manual => Box::new(manual),
        CaptchaMode::Auto => {
            if tesseract.is_available() {
                Box::new(tesseract)
            } else {
                debug!(program = %config.tesseract_path, "tesseract unavailable, prompting instead");
                Box::new(manual)
            }
        }
    }
}

/// Grayscale, then every pixel darker than `threshold` becomes black and
/// the rest white. Strips the noise dots the portal sprinkles in.
pub fn binarize(image_bytes: &[u8], threshold: u8) -> StudyResult<GrayImage> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|err| StudyError::Captcha(format!("undecodable captcha image: {err}")))?;
    let mut gray = decoded.to_luma8();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] < threshold { 0 } else { 255 };
    }
    Ok(gray)
}

pub fn encode_png(image: &GrayImage) -> StudyResult<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|err| StudyError::Captcha(format!("failed to encode captcha: {err}")))?;
    Ok(buf)
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|ch| ch.is_ascii_digit()).collect()
}

fn require_code(raw: &str, solver: &str) -> StudyResult<String> {
    let code = digits_only(raw);
    if code.is_empty() {
        return Err(StudyError::Captcha(format!(
            "{solver} could not read the captcha (got {:?})",
            raw.trim()
        )));
    }
    Ok(code)
}

pub struct TesseractSolver {
    program: String,
    threshold: u8,
}

impl TesseractSolver {
    pub fn new(program: &str, threshold: u8) -> Self {
        Self {
            program: program.to_string(),
            threshold,
        }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn recognize(&self, png: &[u8]) -> std::io::Result<String> {
        let mut child = Command::new(&self.program)
            .args([
                "stdin",
                "stdout",
                "--psm",
                "7",
                "-c",
                "tessedit_char_whitelist=0123456789",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(png)?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl CaptchaSolver for TesseractSolver {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn solve(&mut self, image: &[u8]) -> StudyResult<String> {
        let png = encode_png(&binarize(image, self.threshold)?)?;
        let raw = self
            .recognize(&png)
            .map_err(|err| StudyError::Captcha(format!("tesseract failed: {err}")))?;
        require_code(&raw, self.name())
    }
}

/// Shows the captcha in the terminal and asks the user to type it.
pub struct ManualSolver {
    threshold: u8,
}

impl ManualSolver {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }
}

impl CaptchaSolver for ManualSolver {
    fn name(&self) -> &'static str {
        "manual entry"
    }

    fn solve(&mut self, image: &[u8]) -> StudyResult<String> {
        let png = encode_png(&binarize(image, self.threshold)?)?;
        let mut file = tempfile::Builder::new()
            .prefix("hebgb-captcha-")
            .suffix(".png")
            .tempfile()
            .map_err(|err| StudyError::Captcha(format!("failed to stage captcha image: {err}")))?;
        file.write_all(&png)
            .and_then(|_| file.flush())
            .map_err(|err| StudyError::Captcha(format!("failed to stage captcha image: {err}")))?;

        let conf = ViuerConfig {
            absolute_offset: false,
            width: Some(24),
            ..Default::default()
        };
        if let Err(err) = viuer::print_from_file(file.path(), &conf) {
            warn!(error = %err, "terminal image preview unavailable");
            ui::warn(&format!("Captcha image saved at {}", file.path().display()));
        }

        let raw = ui::prompt("Enter the captcha digits: ")
            .map_err(|err| StudyError::Captcha(format!("failed to read captcha input: {err}")))?;
        require_code(&raw, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn sample_png() -> Vec<u8> {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([20]));
        img.put_pixel(1, 0, Luma([149]));
        img.put_pixel(2, 0, Luma([150]));
        encode_png(&img).expect("encode")
    }

    #[test]
    fn binarize_splits_at_threshold() {
        let out = binarize(&sample_png(), 150).expect("binarize");
        let values: Vec<u8> = out.pixels().map(|p| p.0[0]).collect();
        assert_eq!(values, vec![0, 0, 255]);
    }

    #[test]
    fn garbage_bytes_are_a_captcha_error() {
        let err = binarize(b"not an image", 150).expect_err("should fail");
        assert!(matches!(err, StudyError::Captcha(_)));
    }

    #[test]
    fn recognized_text_keeps_digits_only() {
        assert_eq!(digits_only(" 12 3a4\n"), "1234");
        assert_eq!(require_code("0815\n", "t").expect("code"), "0815");
        assert!(matches!(
            require_code(" \n", "t"),
            Err(StudyError::Captcha(_))
        ));
    }

    #[test]
    fn missing_tesseract_binary_is_not_available() {
        let solver = TesseractSolver::new("hebgb-no-such-tesseract-binary", 150);
        assert!(!solver.is_available());
    }

    #[test]
    fn missing_tesseract_binary_fails_solve() {
        let mut solver = TesseractSolver::new("hebgb-no-such-tesseract-binary", 150);
        let err = solver.solve(&sample_png()).expect_err("no binary");
        assert!(matches!(err, StudyError::Captcha(_)));
    }
}
