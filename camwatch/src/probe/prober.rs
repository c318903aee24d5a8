//! Device capability prober

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::probe::parser::parse_probe_output;
use crate::probe::result::CapabilityProbeResult;

/// Stderr fragments that mean the device could not be opened or queried
const INACCESSIBLE_MARKERS: &[&str] = &[
    "busy",
    "no such device",
    "no such file",
    "permission denied",
    "cannot open device",
    "failed to open",
    "inappropriate ioctl",
];

/// Capability prober trait for testability
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe a device node. Never fails: problems are reported inside the result.
    async fn probe(&self, device_path: &str) -> CapabilityProbeResult;
}

/// Prober backed by the `v4l2-ctl` command line tool
#[derive(Debug, Clone)]
pub struct V4l2CtlProber {
    tool: String,
    timeout: Duration,
}

impl V4l2CtlProber {
    pub fn new(tool: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tool: tool.into(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command(&self, device_path: &str) -> Command {
        let mut command = Command::new(&self.tool);
        command
            .args(["--device", device_path, "--info", "--list-formats-ext"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl Default for V4l2CtlProber {
    fn default() -> Self {
        Self::new("v4l2-ctl", Duration::from_secs(2))
    }
}

#[async_trait]
impl Prober for V4l2CtlProber {
    async fn probe(&self, device_path: &str) -> CapabilityProbeResult {
        let started = Instant::now();

        let child = match self.command(device_path).spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!("Failed to spawn {} for {}: {}", self.tool, device_path, e);
                let mut result = CapabilityProbeResult::failure(
                    device_path,
                    false,
                    format!("failed to run {}: {}", self.tool, e),
                );
                result.duration = started.elapsed();
                return result;
            }
        };

        // Dropping the future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let mut result = CapabilityProbeResult::failure(
                    device_path,
                    false,
                    format!("probe I/O error: {}", e),
                );
                result.duration = started.elapsed();
                return result;
            }
            Err(_) => {
                let elapsed = started.elapsed();
                debug!("Probe of {} timed out after {:?}", device_path, elapsed);
                let mut result = CapabilityProbeResult::failure(
                    device_path,
                    false,
                    format!("timeout: probe exceeded {:?}", self.timeout),
                );
                result.timeout_context = Some(format!(
                    "{} --device {} did not finish within {:?} (elapsed {:?}); child killed",
                    self.tool, device_path, self.timeout, elapsed
                ));
                result.duration = elapsed;
                return result;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut result = interpret_output(device_path, output.status.success(), output.status.code(), &stdout, &stderr);
        result.duration = started.elapsed();
        result
    }
}

/// Turn raw tool output into a probe result
pub fn interpret_output(
    device_path: &str,
    success: bool,
    exit_code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> CapabilityProbeResult {
    let stderr = stderr.trim();

    if !success {
        let error = if stderr.is_empty() {
            match exit_code {
                Some(code) => format!("probe exited with status {}", code),
                None => "probe terminated by signal".to_string(),
            }
        } else {
            stderr.to_string()
        };
        debug!("Probe of {} failed: {}", device_path, error);
        return CapabilityProbeResult::failure(device_path, false, error);
    }

    if is_inaccessible(stderr) {
        debug!("Probe of {} reported an inaccessible device: {}", device_path, stderr);
        return CapabilityProbeResult::failure(device_path, false, stderr);
    }

    let result = parse_probe_output(device_path, stdout);
    if !result.detected {
        debug!("Probe of {} produced no recognisable capability data", device_path);
    }
    result
}

fn is_inaccessible(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    INACCESSIBLE_MARKERS.iter().any(|marker| lower.contains(marker))
}
