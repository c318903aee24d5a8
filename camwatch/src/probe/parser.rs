//! Probe output parsing
//!
//! Extracts pixel formats, discrete resolutions and frame rates from the text
//! printed by `v4l2-ctl`. Tool output is untrusted: every function here is
//! total and returns an empty collection when nothing recognisable is found.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::probe::result::{CapabilityProbeResult, PixelFormat};

/// Frame rates at or above this value are treated as noise
pub const MAX_FRAME_RATE: f64 = 500.0;

// A number must not be glued to a preceding digit or dot, so that
// "30.000.000 fps" yields nothing instead of a fragment.
const NUM: &str = r"(?:^|[^\d.])(\d+(?:\.\d+)?)";

static FPS_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"(?i){NUM}\s*fps\b")));

static HZ_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"(?i){NUM}\s*hz\b")));

static FRAMES_PER_SECOND: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"(?i){NUM}\s*frames?\s+per\s+second\b")));

static FRAME_RATE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)frame\s*rate\s*[:=]?\s*(\d+(?:\.\d+)?)"));

static AT_RATE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\d+\s*[x×]\s*\d+\s*@\s*(\d+(?:\.\d+)?)"));

static BRACKET_INTERVAL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\[\s*(\d+)\s*/\s*(\d+)\s*\]"));

static SECONDS_INTERVAL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)(?:^|[^\d./])(\d+)\s*/\s*(\d+)\s*s\b"));

// Boundaries are checked in code: the regex crate has no lookaround, and a
// consumed separator would hide the next value on the same line.
static RESOLUTION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(\d+)\s*[xX×*]\s*(\d+)"));

static PIXEL_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)(?:pixel\s*format\s*:|\[\d+\]\s*:)[ \t]*'([^'\n]*)'(?:[ \t]*\(([^)\n]*)\))?")
});

static DRIVER_NAME: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?im)^[ \t]*driver[ \t]+name[ \t]*:[ \t]*(.+?)[ \t]*$"));

static CARD_TYPE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?im)^[ \t]*card[ \t]+type[ \t]*:[ \t]*(.+?)[ \t]*$"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static probe pattern must compile")
}

fn glued_to_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn glued_to_number(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

fn char_before(line: &str, at: usize) -> Option<char> {
    line[..at].chars().next_back()
}

fn char_after(line: &str, at: usize) -> Option<char> {
    line[at..].chars().next()
}

/// Known FourCC descriptions
const KNOWN_FORMATS: &[(&str, &str)] = &[
    ("YUYV", "YUYV 4:2:2"),
    ("MJPG", "Motion-JPEG"),
    ("JPEG", "JFIF JPEG"),
    ("H264", "H.264"),
    ("HEVC", "HEVC"),
    ("H265", "H.265"),
    ("UYVY", "UYVY 4:2:2"),
    ("NV12", "Y/CbCr 4:2:0"),
    ("NV21", "Y/CrCb 4:2:0"),
    ("YU12", "Planar YUV 4:2:0"),
    ("YV12", "Planar YVU 4:2:0"),
    ("RGB3", "24-bit RGB 8-8-8"),
    ("BGR3", "24-bit BGR 8-8-8"),
    ("GREY", "8-bit Greyscale"),
    ("Y16", "16-bit Greyscale"),
];

/// Description for a FourCC code, if the code is well known
pub fn describe_format(code: &str) -> Option<&'static str> {
    KNOWN_FORMATS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, description)| *description)
}

/// Extract the distinct frame rates mentioned in `output`
pub fn extract_frame_rates(output: &str) -> BTreeSet<String> {
    let mut rates = BTreeSet::new();

    for line in output.lines() {
        for pattern in [&*FPS_SUFFIX, &*HZ_SUFFIX, &*FRAMES_PER_SECOND, &*FRAME_RATE_LABEL, &*AT_RATE] {
            for caps in pattern.captures_iter(line) {
                let Some(value) = caps.get(1) else {
                    continue;
                };
                if char_after(line, value.end()).is_some_and(glued_to_number) {
                    continue;
                }
                if let Ok(rate) = value.as_str().parse::<f64>() {
                    push_rate(&mut rates, rate);
                }
            }
        }

        for pattern in [&*BRACKET_INTERVAL, &*SECONDS_INTERVAL] {
            for caps in pattern.captures_iter(line) {
                let numerator = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
                let denominator = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
                if let (Some(num), Some(den)) = (numerator, denominator) {
                    if num > 0.0 {
                        push_rate(&mut rates, den / num);
                    }
                }
            }
        }
    }

    rates
}

fn push_rate(rates: &mut BTreeSet<String>, rate: f64) {
    if let Some(normalized) = normalize_rate(rate) {
        rates.insert(normalized);
    }
}

/// Canonical string for a frame rate, `None` when outside `(0, MAX_FRAME_RATE)`
pub fn normalize_rate(rate: f64) -> Option<String> {
    if !rate.is_finite() || rate <= 0.0 || rate >= MAX_FRAME_RATE {
        return None;
    }
    let rounded = (rate * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        Some(format!("{}", rounded as u64))
    } else {
        Some(format!("{}", rounded))
    }
}

/// Extract discrete resolutions as canonical `WxH`, first-seen order
pub fn extract_resolutions(output: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut resolutions = Vec::new();

    for line in output.lines() {
        let lower = line.to_ascii_lowercase();
        if lower.contains("size:") && !lower.contains("discrete") {
            // Continuous and stepwise ranges are not concrete modes
            continue;
        }

        for caps in RESOLUTION.captures_iter(line) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if char_before(line, whole.start()).is_some_and(glued_to_word)
                || char_after(line, whole.end()).is_some_and(glued_to_word)
            {
                continue;
            }
            let width = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
            let height = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
            let (Some(width), Some(height)) = (width, height) else {
                continue;
            };
            if width == 0 || height == 0 {
                continue;
            }
            let resolution = format!("{}x{}", width, height);
            if seen.insert(resolution.clone()) {
                resolutions.push(resolution);
            }
        }
    }

    resolutions
}

/// Extract pixel formats in first-seen order, duplicates collapsed
pub fn extract_formats(output: &str) -> Vec<PixelFormat> {
    let mut seen = HashSet::new();
    let mut formats = Vec::new();

    for caps in PIXEL_FORMAT.captures_iter(output) {
        let Some(code) = caps.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        if code.is_empty() || code.len() > 4 || !code.chars().all(|c| c.is_ascii_graphic()) {
            continue;
        }
        if !seen.insert(code.to_string()) {
            continue;
        }

        let description = caps
            .get(2)
            .map(|m| m.as_str().trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .or_else(|| describe_format(code).map(str::to_string))
            .unwrap_or_else(|| code.to_string());

        formats.push(PixelFormat::new(code, description));
    }

    formats
}

/// Extract `(card name, driver)` from `--info` output
pub fn extract_device_info(output: &str) -> (String, String) {
    (first_capture(&CARD_TYPE, output), first_capture(&DRIVER_NAME, output))
}

fn first_capture(pattern: &Regex, output: &str) -> String {
    pattern
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Parse complete tool output into a probe result
pub fn parse_probe_output(device_path: &str, output: &str) -> CapabilityProbeResult {
    let formats = extract_formats(output);
    let resolutions = extract_resolutions(output);
    let frame_rates = sort_rates(extract_frame_rates(output));
    let (device_name, driver) = extract_device_info(output);

    CapabilityProbeResult::success(device_path, formats, resolutions, frame_rates)
        .with_identity(device_name, driver)
}

/// Order rates highest first so repeated probes yield identical vectors
pub fn sort_rates(rates: BTreeSet<String>) -> Vec<String> {
    let mut rates: Vec<String> = rates.into_iter().collect();
    rates.sort_by(|a, b| {
        let a = a.parse::<f64>().unwrap_or(0.0);
        let b = b.parse::<f64>().unwrap_or(0.0);
        b.total_cmp(&a)
    });
    rates
}
