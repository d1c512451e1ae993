#![cfg(unix)]

use std::collections::VecDeque;

use mcp_installer::{
    run_install, CommandLine, InstallNotice, InstallUi, ProcessBridge, PromptReply,
};

#[derive(Default)]
struct ScriptedUi {
    replies: VecDeque<PromptReply>,
    prompts: Vec<String>,
    notices: Vec<InstallNotice>,
    output: String,
}

impl ScriptedUi {
    fn with_replies(replies: impl IntoIterator<Item = PromptReply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl InstallUi for ScriptedUi {
    fn output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn prompt(&mut self, prompt: &str) -> PromptReply {
        self.prompts.push(prompt.to_string());
        self.replies.pop_front().unwrap_or(PromptReply::Cancel)
    }

    fn notice(&mut self, notice: &InstallNotice) {
        self.notices.push(notice.clone());
    }
}

#[test]
fn answered_install_is_reported_installed() {
    let mut ui = ScriptedUi::with_replies([PromptReply::Answer("sk-1".to_string())]);
    let outcome = run_install(
        &ProcessBridge::default(),
        &CommandLine::shell(r#"printf "? API key: "; read k; echo "Successfully installed $k""#),
        &mut ui,
    )
    .unwrap();

    assert_eq!(ui.prompts, vec!["API key:"]);
    assert!(outcome.installed);
    assert!(outcome.success());
    assert!(ui.notices.contains(&InstallNotice::Installed));
    assert!(ui.output.contains("Successfully installed sk-1"));
}

#[test]
fn cancel_terminates_the_installer() {
    let mut ui = ScriptedUi::with_replies([PromptReply::Cancel]);
    let outcome = run_install(
        &ProcessBridge::default(),
        &CommandLine::shell(r#"printf "? Token: "; read t; echo "Successfully installed""#),
        &mut ui,
    )
    .unwrap();

    assert!(outcome.exit.terminated_by_signal);
    assert!(!outcome.installed);
    assert!(!outcome.success());
    assert!(ui.output.contains("Operation cancelled by user"));
}

#[test]
fn error_output_is_collected_as_warning() {
    let mut ui = ScriptedUi::default();
    let outcome = run_install(
        &ProcessBridge::default(),
        &CommandLine::shell(r#"echo "Error: package not found"; exit 2"#),
        &mut ui,
    )
    .unwrap();

    assert_eq!(outcome.exit.exit_code, Some(2));
    assert!(!outcome.installed);
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.contains("Error: package not found")));
    assert!(ui.prompts.is_empty());
}

#[test]
fn spawn_failure_is_returned() {
    let mut ui = ScriptedUi::default();
    let result = run_install(
        &ProcessBridge::default(),
        &CommandLine::argv(["/nonexistent/npx", "-y"]),
        &mut ui,
    );
    assert!(result.is_err());
    assert!(ui.output.is_empty());
}
