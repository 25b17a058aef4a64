//! Line-driven interactive session.
//!
//! Lists the tests with their last status and reads one command per line:
//! a test number or name, `a` (all), `h` (hardware), `i` (identification),
//! `r` (report), `s` (summary) or `q` (quit).

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use colored::*;
use log::warn;

use crate::core::config::ReportFormat;
use crate::core::error::Result;
use crate::core::runner::{Session, TestEntry};
use crate::core::test::TestStatus;
use crate::report::{hardware_sections, Identification, ReportGenerator};

/// Where menu lines come from.
pub trait LineInput {
    /// Appends one line to `buf`; `Ok(0)` at end of input.
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize>;
}

impl<R: BufRead> LineInput for R {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        BufRead::read_line(self, buf)
    }
}

/// Reads the console one line at a time through stdin's own buffer, taking
/// the lock only for the read. Tests prompt on the same stdin between lines.
pub struct StdinLines;

impl LineInput for StdinLines {
    fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        io::stdin().read_line(buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    Run(&'static str),
    RunAll,
    Hardware,
    Identification,
    Report,
    Summary,
    Help,
    Quit,
    Unknown(String),
}

/// Parses one menu line; `None` for a blank line.
pub fn parse_command(line: &str, tests: &[TestEntry]) -> Option<MenuCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Ok(n) = line.parse::<usize>() {
        return Some(match n.checked_sub(1).and_then(|i| tests.get(i)) {
            Some(entry) => MenuCommand::Run(entry.name),
            None => MenuCommand::Unknown(line.to_string()),
        });
    }

    let lower = line.to_lowercase();
    let command = match lower.as_str() {
        "a" | "all" => MenuCommand::RunAll,
        "h" | "hardware" => MenuCommand::Hardware,
        "i" | "id" | "identification" => MenuCommand::Identification,
        "r" | "report" => MenuCommand::Report,
        "s" | "summary" => MenuCommand::Summary,
        "?" | "help" => MenuCommand::Help,
        "q" | "quit" | "exit" => MenuCommand::Quit,
        name => match tests.iter().find(|t| t.name == name || t.title.to_lowercase() == name) {
            Some(entry) => MenuCommand::Run(entry.name),
            None => MenuCommand::Unknown(line.to_string()),
        },
    };
    Some(command)
}

fn status_label(status: Option<TestStatus>) -> ColoredString {
    match status {
        Some(TestStatus::Passed) => "PASS".green(),
        Some(TestStatus::Failed) => "FAIL".red(),
        Some(TestStatus::Partial) => "PARTIAL".yellow(),
        Some(TestStatus::Skipped) => "SKIPPED".blue(),
        None => "not run".dimmed(),
    }
}

pub struct Menu<'s> {
    session: &'s mut Session,
    report_dir: PathBuf,
    report_format: ReportFormat,
}

impl<'s> Menu<'s> {
    pub fn new(session: &'s mut Session, report_dir: PathBuf, report_format: ReportFormat) -> Self {
        Self {
            session,
            report_dir,
            report_format,
        }
    }

    /// Runs until `q` or end of input.
    pub fn run<R: LineInput, W: Write>(&mut self, input: &mut R, out: &mut W) -> Result<()> {
        self.draw(out)?;

        loop {
            write!(out, "{} ", "hwdiag>".bold())?;
            out.flush()?;

            let Some(line) = read_line(input)? else {
                writeln!(out)?;
                break;
            };
            let Some(command) = parse_command(&line, &self.session.tests()) else {
                self.draw(out)?;
                continue;
            };

            match command {
                MenuCommand::Quit => break,
                MenuCommand::Help => self.draw(out)?,
                MenuCommand::Unknown(text) => {
                    writeln!(out, "{} '{}'. Type ? for help.", "Unknown command".yellow(), text)?
                }
                MenuCommand::Identification => self.edit_identification(input, out)?,
                MenuCommand::Hardware => self.show_hardware(out)?,
                MenuCommand::Summary => self.show_summary(out)?,
                MenuCommand::Run(name) => {
                    if self.ensure_identification(input, out)? {
                        self.session.run_test(name)?;
                    }
                }
                MenuCommand::RunAll => {
                    if self.ensure_identification(input, out)? {
                        let names = self.session.config().enabled_tests.clone();
                        self.session.run_selected(&names)?;
                    }
                }
                MenuCommand::Report => {
                    if self.ensure_identification(input, out)? {
                        self.write_report(out)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn draw<W: Write>(&self, out: &mut W) -> Result<()> {
        let config = self.session.config();
        writeln!(out)?;
        writeln!(out, "{}", "HARDWARE DIAGNOSTICS".bold())?;
        writeln!(
            out,
            "Technician: {}   Workbench: {}",
            config.technician.as_deref().unwrap_or("-"),
            config.workbench_id.as_deref().unwrap_or("-")
        )?;
        writeln!(out)?;

        for (i, entry) in self.session.tests().iter().enumerate() {
            let marker = if entry.interactive { "*" } else { " " };
            writeln!(
                out,
                "  {}) {:<14}{} {}",
                i + 1,
                entry.title,
                marker,
                status_label(self.session.last_status(entry.name))
            )?;
        }

        writeln!(out)?;
        writeln!(out, "  [a] run all   [h] hardware   [i] identification")?;
        writeln!(out, "  [r] report    [s] summary    [q] quit")?;
        writeln!(out, "  {}", "* needs an operator at the bench".dimmed())?;
        Ok(())
    }

    fn ensure_identification<R: LineInput, W: Write>(&mut self, input: &mut R, out: &mut W) -> Result<bool> {
        let config = self.session.config();
        if !config.require_identification || Identification::from_config(config).is_complete() {
            return Ok(true);
        }

        writeln!(out, "{}", "Technician and workbench are required first.".yellow())?;
        self.edit_identification(input, out)?;
        Ok(Identification::from_config(self.session.config()).is_complete())
    }

    fn edit_identification<R: LineInput, W: Write>(&mut self, input: &mut R, out: &mut W) -> Result<()> {
        let technician = ask(input, out, "Technician name", self.session.config().technician.as_deref())?;
        let workbench = ask(input, out, "Workbench ID", self.session.config().workbench_id.as_deref())?;

        let config = self.session.config_mut();
        if technician.is_some() {
            config.technician = technician;
        }
        if workbench.is_some() {
            config.workbench_id = workbench;
        }
        Ok(())
    }

    fn show_hardware<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let hardware = self.session.hardware();
        for section in hardware_sections(hardware) {
            writeln!(out, "{}", section.title.bold())?;
            for (label, value) in &section.rows {
                writeln!(out, "  {:<18} {}", label, value)?;
            }
        }
        Ok(())
    }

    fn show_summary<W: Write>(&self, out: &mut W) -> Result<()> {
        let summary = self.session.summary();
        if summary.total == 0 {
            writeln!(out, "No tests were run yet.")?;
            return Ok(());
        }

        for result in self.session.latest_results() {
            writeln!(out, "  {:<14} {} {}", result.title, status_label(Some(result.status)), result.message)?;
        }
        writeln!(
            out,
            "{} run, {} passed, {} failed, {} partial, {} skipped ({:.1}% success)",
            summary.total, summary.passed, summary.failed, summary.partial, summary.skipped, summary.success_rate
        )?;
        Ok(())
    }

    fn write_report<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.session.hardware();
        let report = ReportGenerator::for_session(self.session);
        match report.write(&self.report_dir, self.report_format) {
            Ok(path) => writeln!(out, "Report saved to {}", path.display())?,
            Err(e) => {
                warn!("Report failed: {}", e);
                writeln!(out, "{} {}", "Could not write the report:".red(), e)?;
            }
        }
        Ok(())
    }
}

fn read_line<R: LineInput>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Prompts with the current value; a blank answer keeps it.
fn ask<R: LineInput, W: Write>(input: &mut R, out: &mut W, label: &str, current: Option<&str>) -> Result<Option<String>> {
    match current {
        Some(value) => write!(out, "{} [{}]: ", label, value)?,
        None => write!(out, "{}: ", label)?,
    }
    out.flush()?;

    Ok(read_line(input)?.filter(|answer| !answer.is_empty()))
}
