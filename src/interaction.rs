//! Terminal interaction: prompts and spinners.

use crate::error::{SemLayerError, SemResult};
use console::{style, Term};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Source of interactive answers.
pub trait InputProvider {
    /// Show an informational line ahead of a prompt.
    fn header(&self, text: &str) -> SemResult<()>;

    fn prompt(&self, prompt: &str, default: Option<&str>) -> SemResult<String>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerInput;

impl InputProvider for DialoguerInput {
    fn header(&self, text: &str) -> SemResult<()> {
        Term::stderr()
            .write_line(&style(text).bold().to_string())
            .map_err(|err| SemLayerError::configuration(format!("Failed to write to terminal: {err}"), None))
    }

    fn prompt(&self, prompt: &str, default: Option<&str>) -> SemResult<String> {
        let mut input = Input::<String>::new().with_prompt(prompt);
        if let Some(value) = default {
            input = input.default(value.to_string());
        }
        input
            .interact_text()
            .map_err(|err| SemLayerError::configuration(format!("Failed to read input: {err}"), None))
    }
}

/// Wraps a blocking call with some indication of activity.
pub trait ProgressReporter {
    fn run<T, F: FnOnce() -> T>(&self, message: &str, f: F) -> T;
}

/// Spinner on stderr; hidden automatically when stderr is not a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinnerProgress;

impl SpinnerProgress {
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }
}

impl ProgressReporter for SpinnerProgress {
    fn run<T, F: FnOnce() -> T>(&self, message: &str, f: F) -> T {
        let spinner = Self::spinner(message);
        let result = f();
        spinner.finish_and_clear();
        result
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn run<T, F: FnOnce() -> T>(&self, _message: &str, f: F) -> T {
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporters_return_inner_result() {
        assert_eq!(SilentProgress.run("working", || 41 + 1), 42);
        let hidden = SpinnerProgress.run("working", || "done");
        assert_eq!(hidden, "done");
    }
}
