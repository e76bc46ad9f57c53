//! Yes/no decisions the pipelines need from the operator. The core asks a
//! `Decider`; only the terminal implementation touches stdin.

use console::Term;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub enum Question<'a> {
    /// The install directory for `spec` already exists.
    Overwrite { spec: &'a str, dir: &'a Path },
    /// `spec` is not installed; install it before activating?
    InstallMissing { spec: &'a str },
    /// The installed directory has no PHP executable; reinstall it?
    ReinstallIncomplete { spec: &'a str, dir: &'a Path },
}

impl std::fmt::Display for Question<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Question::Overwrite { spec, dir } => {
                write!(f, "PHP {} is already installed at {}. Overwrite it?", spec, dir.display())
            }
            Question::InstallMissing { spec } => {
                write!(f, "PHP {} is not installed. Install it now?", spec)
            }
            Question::ReinstallIncomplete { spec, dir } => write!(
                f,
                "{} has no PHP executable, the installation may be incomplete. Reinstall PHP {}?",
                dir.display(),
                spec
            ),
        }
    }
}

pub trait Decider {
    fn confirm(&self, question: &Question<'_>) -> bool;
}

/// Answers every question the same way, for `--yes` and for tests.
pub struct Fixed(pub bool);

impl Decider for Fixed {
    fn confirm(&self, question: &Question<'_>) -> bool {
        tracing::info!("{} {}", question, if self.0 { "yes" } else { "no" });
        self.0
    }
}

pub struct TerminalDecider {
    term: Term,
}

impl Default for TerminalDecider {
    fn default() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Decider for TerminalDecider {
    fn confirm(&self, question: &Question<'_>) -> bool {
        if !self.term.is_term() {
            tracing::warn!("{} Not a terminal, assuming no (pass --yes to accept)", question);
            return false;
        }
        if self.term.write_str(&format!("{} (y/n): ", question)).is_err() {
            return false;
        }
        match self.term.read_line() {
            Ok(answer) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                tracing::warn!("Could not read answer: {}", e);
                false
            }
        }
    }
}
