//! Process plumbing for the OS management queries.
//!
//! Everything the tool learns about Windows hardware comes from PowerShell
//! (`Get-CimInstance`, `Get-PnpDevice`, `Get-Tpm`, ...) or from small system
//! utilities such as `netsh`. The [`Shell`] trait is the seam between the
//! collectors/tests and the operating system, so the same code runs against a
//! [`ScriptedShell`] in tests.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::error::{DiagError, Result};

/// Output captured from a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output (exit code 1) with the given stderr.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            status: Some(1),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external programs on behalf of collectors and tests.
pub trait Shell: Send + Sync {
    /// Whether the host answers Windows management queries.
    fn is_windows(&self) -> bool;

    /// Runs `program` with `args` and captures its output.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Runs a PowerShell script and returns its trimmed stdout.
    ///
    /// A non-zero exit status is an error carrying stderr.
    fn powershell(&self, script: &str) -> Result<String> {
        let output = self.run(
            "powershell",
            &["-NoProfile", "-NonInteractive", "-Command", script],
        )?;

        if !output.success() {
            let message = output.stderr.trim();
            return Err(DiagError::CommandFailed {
                program: "powershell".to_string(),
                message: if message.is_empty() {
                    format!("exit status {:?}", output.status)
                } else {
                    message.to_string()
                },
            });
        }

        Ok(output.stdout.trim().to_string())
    }
}

/// Runs a PowerShell script ending in `ConvertTo-Json` and decodes the rows.
pub fn powershell_json<T: DeserializeOwned>(shell: &dyn Shell, script: &str) -> Result<Vec<T>> {
    let stdout = shell.powershell(script)?;
    one_or_many(&stdout)
}

/// Decodes `ConvertTo-Json` output, which is a bare object for a single row
/// and an array otherwise. Empty output means no rows.
pub fn one_or_many<T: DeserializeOwned>(json: &str) -> Result<Vec<T>> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(json)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(DiagError::from))
            .collect(),
        value => Ok(vec![serde_json::from_value(value)?]),
    }
}

/// Checks whether the current process holds administrator rights.
pub fn is_elevated(shell: &dyn Shell) -> bool {
    if !shell.is_windows() {
        return false;
    }

    const SCRIPT: &str = "([Security.Principal.WindowsPrincipal][Security.Principal.WindowsIdentity]::GetCurrent()).IsInRole([Security.Principal.WindowsBuiltInRole]::Administrator)";

    match shell.powershell(SCRIPT) {
        Ok(out) => out.eq_ignore_ascii_case("true"),
        Err(e) => {
            debug!("Elevation check failed: {}", e);
            false
        }
    }
}

/// Shell backed by real processes.
pub struct SystemShell {
    timeout: Duration,
}

impl SystemShell {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn spawn(&self, program: &str, args: &[&str]) -> std::io::Result<Child> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command.spawn()
    }
}

impl Default for SystemShell {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Shell for SystemShell {
    fn is_windows(&self) -> bool {
        cfg!(windows)
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!("Running {} {:?}", program, args);

        let mut child = self.spawn(program, args).map_err(|e| DiagError::CommandFailed {
            program: program.to_string(),
            message: e.to_string(),
        })?;

        // Drain both pipes on their own threads so a chatty child cannot block on a full pipe.
        let stdout_reader = child.stdout.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(DiagError::Timeout(program.to_string()));
            }
            thread::sleep(Duration::from_millis(20));
        };

        let stdout = stdout_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        Ok(CommandOutput {
            status: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

/// Shell that answers from canned outputs.
///
/// Each response is keyed by a needle; the first registered needle that occurs
/// in the full command line wins. Commands without a response fail.
pub struct ScriptedShell {
    windows: bool,
    responses: Vec<(String, CommandOutput)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedShell {
    /// A scripted Windows host.
    pub fn windows() -> Self {
        Self {
            windows: true,
            responses: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A scripted non-Windows host.
    pub fn other() -> Self {
        Self {
            windows: false,
            ..Self::windows()
        }
    }

    /// Answers commands containing `needle` with `stdout`.
    pub fn respond(mut self, needle: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.responses.push((needle.into(), CommandOutput::ok(stdout)));
        self
    }

    /// Fails commands containing `needle` with `stderr`.
    pub fn fail(mut self, needle: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.responses.push((needle.into(), CommandOutput::failed(stderr)));
        self
    }

    /// Command lines seen so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl Shell for ScriptedShell {
    fn is_windows(&self) -> bool {
        self.windows
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let line = format!("{} {}", program, args.join(" "));
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        self.responses
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .ok_or_else(|| DiagError::CommandFailed {
                program: program.to_string(),
                message: "no scripted response".to_string(),
            })
    }
}
