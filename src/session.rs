//! One install run: bridge events in, UI callbacks out.

use tracing::{debug, warn};

use crate::bridge::{
    strip_ansi, BridgeError, BridgeEvent, BridgeHandle, CommandLine, ExitResult, ProcessBridge,
};

const INSTALLED_MARKER: &str = "Successfully installed";

/// What the UI wants done with a surfaced prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptReply {
    /// Write this line to the installer.
    Answer(String),
    /// Stop the installer.
    Cancel,
    /// Do nothing; the UI forwards input on its own.
    Ignore,
}

/// Status derived from installer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallNotice {
    Warning(String),
    Installed,
}

/// Front end driven by [`run_install`].
pub trait InstallUi {
    /// Called once the installer is running, before any output.
    fn started(&mut self, _handle: &BridgeHandle) {}

    fn output(&mut self, text: &str);

    fn prompt(&mut self, prompt: &str) -> PromptReply;

    fn notice(&mut self, _notice: &InstallNotice) {}
}

/// Watches installer output for errors and the success line.
#[derive(Debug, Default)]
pub struct InstallMonitor {
    installed: bool,
    warnings: Vec<String>,
    /// End of the previous chunk, so a marker split across reads still matches.
    tail: String,
}

impl InstallMonitor {
    pub fn observe(&mut self, text: &str) -> Option<InstallNotice> {
        let clean = strip_ansi(text);
        let joined = format!("{}{}", self.tail, clean);
        self.tail = last_chars(&clean, INSTALLED_MARKER.len());

        if clean.contains("Error") || clean.to_lowercase().contains("failed") {
            let warning = clean.trim().to_string();
            self.warnings.push(warning.clone());
            return Some(InstallNotice::Warning(warning));
        }
        if !self.installed && joined.contains(INSTALLED_MARKER) {
            self.installed = true;
            return Some(InstallNotice::Installed);
        }
        None
    }

    pub fn installed(&self) -> bool {
        self.installed
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

fn last_chars(text: &str, n: usize) -> String {
    let skip = text.chars().count().saturating_sub(n);
    text.chars().skip(skip).collect()
}

#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub exit: ExitResult,
    pub installed: bool,
    pub warnings: Vec<String>,
}

impl InstallOutcome {
    pub fn success(&self) -> bool {
        self.exit.success()
    }
}

/// Start `command` on `bridge` and relay it to `ui` until the process exits.
pub fn run_install(
    bridge: &ProcessBridge,
    command: &CommandLine,
    ui: &mut dyn InstallUi,
) -> Result<InstallOutcome, BridgeError> {
    let (handle, events) = bridge.start(command)?;
    ui.started(&handle);

    let mut monitor = InstallMonitor::default();
    let mut exit = None;
    for event in events.iter() {
        match event {
            BridgeEvent::Output(text) => {
                ui.output(&text);
                if let Some(notice) = monitor.observe(&text) {
                    ui.notice(&notice);
                }
            }
            BridgeEvent::PromptDetected(prompt) => match ui.prompt(&prompt) {
                PromptReply::Answer(answer) => {
                    if let Err(e) = handle.send_reply(&answer) {
                        warn!(error = %e, "reply not delivered");
                    }
                }
                PromptReply::Cancel => {
                    debug!("install cancelled from prompt");
                    if let Err(e) = handle.terminate() {
                        debug!(error = %e, "terminate after cancel");
                    }
                }
                PromptReply::Ignore => {}
            },
            BridgeEvent::Exit(result) => {
                exit = Some(result);
                break;
            }
        }
    }

    Ok(InstallOutcome {
        exit: exit.unwrap_or(ExitResult {
            exit_code: None,
            terminated_by_signal: false,
        }),
        installed: monitor.installed,
        warnings: monitor.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_lines_become_warnings() {
        let mut m = InstallMonitor::default();
        assert_eq!(
            m.observe("\x1b[31mError: package not found\x1b[0m\r\n"),
            Some(InstallNotice::Warning("Error: package not found".to_string()))
        );
        assert!(matches!(m.observe("Download FAILED"), Some(InstallNotice::Warning(_))));
        assert_eq!(m.warnings().len(), 2);
    }

    #[test]
    fn success_line_is_reported_once() {
        let mut m = InstallMonitor::default();
        assert_eq!(m.observe("Resolving..."), None);
        assert_eq!(
            m.observe("Successfully installed @acme/weather"),
            Some(InstallNotice::Installed)
        );
        assert_eq!(m.observe("Successfully installed @acme/weather"), None);
        assert!(m.installed());
    }

    #[test]
    fn success_marker_split_across_chunks() {
        let mut m = InstallMonitor::default();
        assert_eq!(m.observe("... Successfully ins"), None);
        assert_eq!(m.observe("talled x\r\n"), Some(InstallNotice::Installed));
    }

    #[test]
    fn last_chars_handles_multibyte() {
        assert_eq!(last_chars("héllo", 3), "llo");
        assert_eq!(last_chars("é", 5), "é");
    }
}
