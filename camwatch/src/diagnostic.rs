//! One-shot device diagnostic for the `--diagnostic` flag

use std::fmt::Write;

use colored::Colorize;
use serde::Serialize;

use crate::app::options::MonitorOptions;
use crate::errors::MonitorError;
use crate::hardware::camera::enumerate_device_nodes;
use crate::probe::prober::{Prober, V4l2CtlProber};
use crate::probe::result::CapabilityProbeResult;

/// Snapshot of what the monitor would see right now
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub device_dir: String,
    pub probe_tool: String,
    pub hotplug_support: bool,
    pub enumeration_error: Option<String>,
    pub devices: Vec<CapabilityProbeResult>,
}

/// List the device nodes in range and probe each once
pub async fn collect_diagnostic(options: &MonitorOptions, prober: &dyn Prober) -> DiagnosticReport {
    let mut report = DiagnosticReport {
        device_dir: options.device_dir.display().to_string(),
        probe_tool: options.probe_tool.clone(),
        hotplug_support: cfg!(feature = "udev"),
        enumeration_error: None,
        devices: Vec::new(),
    };

    match enumerate_device_nodes(&options.device_dir, &options.device_range).await {
        Ok(nodes) => {
            for (_, path) in nodes {
                report.devices.push(prober.probe(&path).await);
            }
        }
        Err(e) => report.enumeration_error = Some(e.to_string()),
    }
    report
}

/// Human readable, coloured rendering of a report
pub fn render_diagnostic(report: &DiagnosticReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "camwatch diagnostic".bold());
    let _ = writeln!(out, "  device dir:  {}", report.device_dir);
    let _ = writeln!(out, "  probe tool:  {}", report.probe_tool);
    let hotplug = if report.hotplug_support {
        "udev".green()
    } else {
        "unavailable (polling only)".yellow()
    };
    let _ = writeln!(out, "  hot-plug:    {}", hotplug);

    if let Some(error) = &report.enumeration_error {
        let _ = writeln!(out, "  {} {}", "enumeration failed:".red().bold(), error);
        return out;
    }
    if report.devices.is_empty() {
        let _ = writeln!(out, "  {}", "no video devices found".yellow());
        return out;
    }

    for device in &report.devices {
        let status = if device.detected {
            "ok".green().bold()
        } else if device.accessible {
            "no capabilities".yellow().bold()
        } else {
            "unavailable".red().bold()
        };
        let name = if device.device_name.is_empty() {
            "unknown"
        } else {
            device.device_name.as_str()
        };
        let _ = writeln!(out, "  {} [{}] {} ({:?})", device.device_path, status, name, device.duration);

        if device.detected {
            let formats: Vec<&str> = device.formats.iter().map(|f| f.code.as_str()).collect();
            let _ = writeln!(out, "      formats:     {}", formats.join(", "));
            let _ = writeln!(out, "      resolutions: {}", device.resolutions.join(", "));
            let _ = writeln!(out, "      frame rates: {}", device.frame_rates.join(", "));
        }
        if let Some(error) = &device.error {
            let _ = writeln!(out, "      error: {}", error.trim().dimmed());
        }
    }
    out
}

/// Probe every device once and print the summary
pub async fn run_diagnostic(options: &MonitorOptions) -> Result<(), MonitorError> {
    options.validate()?;
    let prober = V4l2CtlProber::new(options.probe_tool.clone(), options.probe_timeout);
    let report = collect_diagnostic(options, &prober).await;
    print!("{}", render_diagnostic(&report));

    match report.enumeration_error {
        Some(error) => Err(MonitorError::EnumerationError(error)),
        None => Ok(()),
    }
}
