//! Prompt arbitration: decides which output chunks are new, actionable
//! prompts and which are progress noise, redraws or auto-answerable
//! confirmations.

use tracing::debug;

use super::text::{normalize, strip_ansi};

/// Tunables for prompt detection.
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// A chunk is only a prompt candidate if its normalised text contains this.
    pub prompt_marker: char,
    /// Lower-case phrases that identify a restart/confirmation prompt.
    pub auto_decline_phrases: Vec<String>,
    /// Reply written for a restart/confirmation prompt (newline appended).
    pub auto_decline_answer: String,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            prompt_marker: '?',
            auto_decline_phrases: vec![
                "would you like to restart".to_string(),
                "(y/n)".to_string(),
                "restart the claude app".to_string(),
            ],
            auto_decline_answer: "n".to_string(),
        }
    }
}

/// Prompt state of one child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptState {
    /// True iff a prompt was surfaced and no reply has been sent since.
    pub awaiting_input: bool,
    /// Base text of the last surfaced prompt.
    pub last_prompt: Option<String>,
}

/// Outcome of evaluating one output chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Not a prompt candidate.
    Ignored,
    /// Same base prompt as the one surfaced last; suppressed.
    Duplicate,
    /// A restart/confirmation prompt that was already answered once.
    AlreadyAnswered,
    /// Write this answer to the child without involving the caller.
    AutoAnswer(String),
    /// A new distinct prompt for the caller.
    Prompt(String),
}

#[derive(Debug, Default)]
pub struct PromptArbiter {
    config: ArbiterConfig,
    state: PromptState,
    restart_handled: bool,
    /// Last reply as written, expected back as one echoed line.
    pending_echo: Option<String>,
}

impl PromptArbiter {
    pub fn new(config: ArbiterConfig) -> Self {
        Self {
            config,
            state: PromptState::default(),
            restart_handled: false,
            pending_echo: None,
        }
    }

    pub fn state(&self) -> &PromptState {
        &self.state
    }

    pub fn awaiting_input(&self) -> bool {
        self.state.awaiting_input
    }

    /// Evaluate a raw output chunk. A `Prompt` verdict moves the state to
    /// awaiting input.
    pub fn evaluate(&mut self, chunk: &str) -> Verdict {
        if self.state.awaiting_input {
            return Verdict::Ignored;
        }

        let text = strip_ansi(chunk);
        let mut visible = text.as_str();
        if let Some(echo) = self.pending_echo.take() {
            match after_echo(&text, &echo) {
                Some(rest) => visible = rest,
                // Only blank chunks may precede the echo; anything else means
                // the terminal is not echoing.
                None if text.trim().is_empty() => self.pending_echo = Some(echo),
                None => {}
            }
        }
        let clean = normalize(visible);
        if !clean.contains(self.config.prompt_marker) {
            return Verdict::Ignored;
        }
        debug!(raw = ?chunk, cleaned = ?clean, "prompt candidate");

        let lowered = clean.to_lowercase();
        if self
            .config
            .auto_decline_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
        {
            if self.restart_handled {
                return Verdict::AlreadyAnswered;
            }
            self.restart_handled = true;
            return Verdict::AutoAnswer(self.config.auto_decline_answer.clone());
        }

        let without_marker = clean.strip_prefix("? ").unwrap_or(&clean);
        let base = without_marker
            .split('\n')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        if self.state.last_prompt.as_deref() == Some(base.as_str()) {
            debug!(prompt = %base, "duplicate prompt ignored");
            return Verdict::Duplicate;
        }

        self.state.last_prompt = Some(base.clone());
        self.state.awaiting_input = true;
        self.pending_echo = None;
        Verdict::Prompt(base)
    }

    /// Record that a reply was written. Consumption by the child is not checked.
    pub fn reply_sent(&mut self, reply: &str) {
        self.state.awaiting_input = false;
        let echo = reply.trim();
        self.pending_echo = (!echo.is_empty()).then(|| echo.to_string());
    }
}

/// The text following an echoed reply, if `text` opens with the reply as a
/// whole line.
fn after_echo<'a>(text: &'a str, echo: &str) -> Option<&'a str> {
    let rest = text.trim_start().strip_prefix(echo)?;
    (rest.is_empty() || rest.starts_with(['\r', '\n'])).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arbiter() -> PromptArbiter {
        PromptArbiter::new(ArbiterConfig::default())
    }

    #[test]
    fn plain_progress_is_ignored() {
        let mut a = arbiter();
        assert_eq!(a.evaluate("Resolving packages...\r\n"), Verdict::Ignored);
        assert!(!a.awaiting_input());
    }

    #[test]
    fn question_mark_only_inside_escape_is_not_a_candidate() {
        let mut a = arbiter();
        assert_eq!(a.evaluate("\x1b[?25lInstalling"), Verdict::Ignored);
    }

    #[test]
    fn inquirer_prompt_is_surfaced_without_marker() {
        let mut a = arbiter();
        let verdict = a.evaluate("\x1b[32m?\x1b[39m \x1b[1mEnter your API key:\x1b[22m ");
        assert_eq!(verdict, Verdict::Prompt("Enter your API key:".to_string()));
        assert!(a.awaiting_input());
        assert_eq!(a.state().last_prompt.as_deref(), Some("Enter your API key:"));
    }

    #[test]
    fn nothing_is_surfaced_while_awaiting_input() {
        let mut a = arbiter();
        assert!(matches!(a.evaluate("? First?"), Verdict::Prompt(_)));
        assert_eq!(a.evaluate("? Second?"), Verdict::Ignored);
        assert_eq!(a.evaluate("? Third?"), Verdict::Ignored);
    }

    #[test]
    fn redraw_of_same_prompt_after_reply_is_duplicate() {
        let mut a = arbiter();
        assert!(matches!(a.evaluate("? Token:"), Verdict::Prompt(_)));
        a.reply_sent("x");
        assert!(!a.awaiting_input());
        assert_eq!(a.evaluate("\x1b[2K\x1b[G? Token:  "), Verdict::Duplicate);
        assert!(!a.awaiting_input());
    }

    #[test]
    fn alternating_prompts_are_both_resurfaced() {
        let mut a = arbiter();
        assert!(matches!(a.evaluate("? A?"), Verdict::Prompt(_)));
        a.reply_sent("x");
        assert!(matches!(a.evaluate("? B?"), Verdict::Prompt(_)));
        a.reply_sent("x");
        assert_eq!(a.evaluate("? A?"), Verdict::Prompt("A?".to_string()));
    }

    #[test]
    fn restart_prompt_is_answered_once() {
        let mut a = arbiter();
        let chunk = "Would you like to restart the Claude app? (y/n)";
        assert_eq!(a.evaluate(chunk), Verdict::AutoAnswer("n".to_string()));
        assert!(!a.awaiting_input());
        assert_eq!(a.evaluate(chunk), Verdict::AlreadyAnswered);
        assert_eq!(a.state().last_prompt, None);
    }

    #[test]
    fn yes_no_marker_alone_triggers_auto_answer() {
        let mut a = arbiter();
        assert_eq!(
            a.evaluate("? Continue anyway? (Y/N)"),
            Verdict::AutoAnswer("n".to_string())
        );
    }

    #[test]
    fn at_most_one_prompt_between_replies() {
        let chunks = ["? One?", "? One?", "? Two?", "noise", "? Three?"];
        let mut a = arbiter();
        let surfaced = chunks
            .iter()
            .filter(|c| matches!(a.evaluate(c), Verdict::Prompt(_)))
            .count();
        assert_eq!(surfaced, 1);
    }

    #[test]
    fn echoed_reply_is_not_mistaken_for_a_prompt() {
        let mut a = arbiter();
        assert!(matches!(a.evaluate("? Server name:"), Verdict::Prompt(_)));
        a.reply_sent("what?");
        assert_eq!(a.evaluate("what?\r\n"), Verdict::Ignored);
        assert_eq!(
            a.evaluate("? Port number:"),
            Verdict::Prompt("Port number:".to_string())
        );
    }

    #[test]
    fn echo_merged_with_next_prompt_is_stripped() {
        let mut a = arbiter();
        assert!(matches!(a.evaluate("? Key:"), Verdict::Prompt(_)));
        a.reply_sent("abc");
        assert_eq!(
            a.evaluate("abc\r\n? Region:"),
            Verdict::Prompt("Region:".to_string())
        );
    }

    #[test]
    fn prompt_starting_with_reply_text_is_kept_when_not_echoed() {
        let mut a = arbiter();
        assert!(matches!(a.evaluate("? Kind:"), Verdict::Prompt(_)));
        a.reply_sent("Server");
        assert_eq!(
            a.evaluate("? Server name for the weather API?"),
            Verdict::Prompt("Server name for the weather API?".to_string())
        );
    }

    #[test]
    fn unechoed_reply_is_forgotten_after_other_output() {
        let mut a = arbiter();
        assert!(matches!(a.evaluate("? Kind:"), Verdict::Prompt(_)));
        a.reply_sent("Port");
        assert_eq!(a.evaluate("Saving settings...\r\n"), Verdict::Ignored);
        assert_eq!(
            a.evaluate("Port\r\n? Host?"),
            Verdict::Prompt("Port ? Host?".to_string())
        );
    }

    #[test]
    fn blank_chunk_before_echo_keeps_it_pending() {
        let mut a = arbiter();
        assert!(matches!(a.evaluate("? Key:"), Verdict::Prompt(_)));
        a.reply_sent("why?");
        assert_eq!(a.evaluate("\x1b[?25h"), Verdict::Ignored);
        assert_eq!(a.evaluate("why?\r\n"), Verdict::Ignored);
    }

    #[test]
    fn custom_marker_is_respected() {
        let mut a = PromptArbiter::new(ArbiterConfig {
            prompt_marker: ':',
            ..ArbiterConfig::default()
        });
        assert_eq!(a.evaluate("Enter name: "), Verdict::Prompt("Enter name:".to_string()));
    }
}
