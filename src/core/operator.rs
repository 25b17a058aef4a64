//! The person at the bench.
//!
//! Some checks cannot be decided by software alone: whether a camera shows a
//! live picture, whether a tone was audible, which pen drive to write to. Tests
//! ask through the [`Operator`] trait so the same test runs at a console, in an
//! unattended batch, or against a scripted operator in tests.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use colored::*;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::core::error::{DiagError, Result};

/// Answer to a yes/no question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    /// Nobody answered: unattended run, or the operator skipped the question.
    Unattended,
}

/// Why a key capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEnd {
    /// The operator finished (Ctrl+D) or the handler asked to stop.
    Finished,
    /// The operator aborted (Ctrl+C).
    Aborted,
    TimedOut,
}

pub trait Operator: Send + Sync {
    /// Whether anyone will answer prompts.
    fn is_attended(&self) -> bool;

    /// Shows a line of text.
    fn message(&self, text: &str);

    fn confirm(&self, prompt: &str) -> Result<Confirmation>;

    /// Picks one of `options`; `None` when the operator declines.
    fn choose(&self, prompt: &str, options: &[String]) -> Result<Option<usize>>;

    /// Free-text answer; `None` on empty input.
    fn prompt_text(&self, prompt: &str) -> Result<Option<String>>;

    /// Feeds raw key presses to `on_key` until it returns `false`, the operator
    /// presses Ctrl+D / Ctrl+C, or `timeout` elapses.
    fn capture_keys(
        &self,
        timeout: Duration,
        on_key: &mut dyn FnMut(KeyEvent) -> bool,
    ) -> Result<CaptureEnd>;
}

/// Operator at an interactive terminal.
pub struct ConsoleOperator;

impl ConsoleOperator {
    fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        print!("{} ", prompt);
        io::stdout().flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }

        let line = line.trim();
        Ok((!line.is_empty()).then(|| line.to_string()))
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

impl Operator for ConsoleOperator {
    fn is_attended(&self) -> bool {
        true
    }

    fn message(&self, text: &str) {
        // Raw mode does not translate "\n", so always return the carriage.
        for line in text.lines() {
            print!("{}\r\n", line);
        }
        let _ = io::stdout().flush();
    }

    fn confirm(&self, prompt: &str) -> Result<Confirmation> {
        loop {
            let answer = self.read_line(&format!("{} {}", prompt, "[y]es / [n]o / [s]kip:".dimmed()))?;
            match answer.as_deref().map(str::to_ascii_lowercase).as_deref() {
                Some("y") | Some("yes") => return Ok(Confirmation::Yes),
                Some("n") | Some("no") => return Ok(Confirmation::No),
                Some("s") | Some("skip") | None => return Ok(Confirmation::Unattended),
                Some(_) => println!("{}", "Please answer y, n or s.".yellow()),
            }
        }
    }

    fn choose(&self, prompt: &str, options: &[String]) -> Result<Option<usize>> {
        if options.is_empty() {
            return Ok(None);
        }

        println!("{}", prompt);
        for (i, option) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, option);
        }

        loop {
            let Some(answer) = self.read_line(&format!("Choice [1-{}, empty to cancel]:", options.len()))? else {
                return Ok(None);
            };
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(Some(n - 1)),
                _ => println!("{}", "Invalid choice.".yellow()),
            }
        }
    }

    fn prompt_text(&self, prompt: &str) -> Result<Option<String>> {
        self.read_line(prompt)
    }

    fn capture_keys(
        &self,
        timeout: Duration,
        on_key: &mut dyn FnMut(KeyEvent) -> bool,
    ) -> Result<CaptureEnd> {
        let _guard = RawModeGuard::enter()?;
        let started = Instant::now();

        loop {
            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Ok(CaptureEnd::TimedOut);
            }

            if !event::poll(remaining)? {
                continue;
            }

            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            if key.modifiers.contains(KeyModifiers::CONTROL) {
                match key.code {
                    KeyCode::Char('c') => return Ok(CaptureEnd::Aborted),
                    KeyCode::Char('d') => return Ok(CaptureEnd::Finished),
                    _ => {}
                }
            }

            if !on_key(key) {
                return Ok(CaptureEnd::Finished);
            }
        }
    }
}

/// Operator for batch runs: never asks, never waits.
pub struct UnattendedOperator;

impl Operator for UnattendedOperator {
    fn is_attended(&self) -> bool {
        false
    }

    fn message(&self, text: &str) {
        log::debug!("{}", text);
    }

    fn confirm(&self, _prompt: &str) -> Result<Confirmation> {
        Ok(Confirmation::Unattended)
    }

    fn choose(&self, _prompt: &str, options: &[String]) -> Result<Option<usize>> {
        Ok((!options.is_empty()).then_some(0))
    }

    fn prompt_text(&self, _prompt: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn capture_keys(
        &self,
        _timeout: Duration,
        _on_key: &mut dyn FnMut(KeyEvent) -> bool,
    ) -> Result<CaptureEnd> {
        Err(DiagError::Unsupported("no operator at the console".to_string()))
    }
}

/// Operator that replays prepared answers.
pub struct ScriptedOperator {
    confirmations: Mutex<VecDeque<Confirmation>>,
    choices: Mutex<VecDeque<Option<usize>>>,
    texts: Mutex<VecDeque<String>>,
    keys: Mutex<Vec<KeyEvent>>,
    capture_end: CaptureEnd,
    messages: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self {
            confirmations: Mutex::new(VecDeque::new()),
            choices: Mutex::new(VecDeque::new()),
            texts: Mutex::new(VecDeque::new()),
            keys: Mutex::new(Vec::new()),
            capture_end: CaptureEnd::Finished,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn confirm_with(self, answer: Confirmation) -> Self {
        if let Ok(mut queue) = self.confirmations.lock() {
            queue.push_back(answer);
        }
        self
    }

    pub fn choose_with(self, choice: Option<usize>) -> Self {
        if let Ok(mut queue) = self.choices.lock() {
            queue.push_back(choice);
        }
        self
    }

    pub fn answer_with(self, text: &str) -> Self {
        if let Ok(mut queue) = self.texts.lock() {
            queue.push_back(text.to_string());
        }
        self
    }

    /// Keys fed to the next capture, and how that capture ends once they run out.
    pub fn press_keys(mut self, keys: Vec<KeyEvent>, end: CaptureEnd) -> Self {
        self.keys = Mutex::new(keys);
        self.capture_end = end;
        self
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Default for ScriptedOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for ScriptedOperator {
    fn is_attended(&self) -> bool {
        true
    }

    fn message(&self, text: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(text.to_string());
        }
    }

    fn confirm(&self, prompt: &str) -> Result<Confirmation> {
        self.message(prompt);
        Ok(self
            .confirmations
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(Confirmation::Unattended))
    }

    fn choose(&self, prompt: &str, options: &[String]) -> Result<Option<usize>> {
        self.message(prompt);
        let choice = self.choices.lock().ok().and_then(|mut q| q.pop_front());
        Ok(choice.unwrap_or((!options.is_empty()).then_some(0)))
    }

    fn prompt_text(&self, prompt: &str) -> Result<Option<String>> {
        self.message(prompt);
        Ok(self.texts.lock().ok().and_then(|mut q| q.pop_front()))
    }

    fn capture_keys(
        &self,
        _timeout: Duration,
        on_key: &mut dyn FnMut(KeyEvent) -> bool,
    ) -> Result<CaptureEnd> {
        let keys = self.keys.lock().map(|mut k| std::mem::take(&mut *k)).unwrap_or_default();
        for key in keys {
            if !on_key(key) {
                return Ok(CaptureEnd::Finished);
            }
        }
        Ok(self.capture_end)
    }
}
