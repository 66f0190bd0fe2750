//! Codegen Module for the Relay tag rewriter
//!
//! Launches the external artifact generator (`relay-compiler` by
//! default) as a child process and relays its output with a colored
//! command prefix. Two modes: one-shot (run to completion, propagate the
//! exit code) and watch (resolve readiness when the generator prints a
//! known marker, then leave it running for the life of the dev server).

use std::fmt;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;

use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Lines the generator prints once an initial watch build finishes.
/// Matching is substring-based; the generator decorates these with
/// timestamps and counters.
pub const WATCH_READY_MARKERS: &[&str] = &[
    "Compilation completed",
    "Watching for changes to graphql",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOptions {
    /// Executable (or shell command line) to run, e.g. `relay-compiler`.
    pub codegen_command: String,
    /// Forwarded as `--config <path>` when present.
    #[serde(default)]
    pub config_path: Option<String>,
    /// Forwarded as a trailing project-name argument (multi-project
    /// configs only).
    #[serde(default)]
    pub project: Option<String>,
    /// Appends `--watch` and switches to marker-based readiness.
    #[serde(default)]
    pub watch: bool,
}

#[derive(Debug)]
pub enum LaunchError {
    /// The child process could not be started at all.
    Spawn { command: String, message: String },
    /// A one-shot run finished with a non-zero exit code.
    ProcessExit { command: String, code: i32 },
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::Spawn { command, message } => {
                write!(f, "failed to launch `{}`: {}", command, message)
            }
            LaunchError::ProcessExit { command, code } => {
                write!(f, "`{}` exited with code {}", command, code)
            }
        }
    }
}

impl std::error::Error for LaunchError {}

/// Launch the generator.
///
/// One-shot mode blocks until the process exits and returns `None` on
/// success. Watch mode blocks only until a readiness marker appears on
/// stdout, then hands the still-running child back to the caller, who
/// owns its lifetime from there.
pub fn launch_codegen(options: &LaunchOptions) -> Result<Option<Child>, LaunchError> {
    let command_line = build_command_line(options);

    let mut child = shell_command(&command_line)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| LaunchError::Spawn {
            command: command_line.clone(),
            message: e.to_string(),
        })?;

    let prefix = format!("[{}]", options.codegen_command);
    let (ready_tx, ready_rx) = mpsc::channel::<()>();

    if let Some(stdout) = child.stdout.take() {
        let prefix = prefix.clone();
        let watch = options.watch;
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                println!("{} {}", prefix.green(), line);
                if watch && WATCH_READY_MARKERS.iter().any(|marker| line.contains(marker)) {
                    // Receiver may be gone if the caller stopped waiting.
                    let _ = ready_tx.send(());
                }
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let prefix = prefix.clone();
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                eprintln!("{} {}", prefix.red(), line);
            }
        });
    }

    if options.watch {
        // Block until the initial build completes or the child dies. A
        // dead child drops the sender and unblocks the recv with an error.
        match ready_rx.recv() {
            Ok(()) => Ok(Some(child)),
            Err(_) => {
                let code = child
                    .wait()
                    .map(|status| status.code().unwrap_or(-1))
                    .unwrap_or(-1);
                Err(LaunchError::ProcessExit {
                    command: command_line,
                    code,
                })
            }
        }
    } else {
        let status = child.wait().map_err(|e| LaunchError::Spawn {
            command: command_line.clone(),
            message: e.to_string(),
        })?;
        if status.success() {
            Ok(None)
        } else {
            Err(LaunchError::ProcessExit {
                command: command_line,
                code: status.code().unwrap_or(-1),
            })
        }
    }
}

fn build_command_line(options: &LaunchOptions) -> String {
    let mut parts = vec![options.codegen_command.clone()];
    if let Some(config) = &options.config_path {
        parts.push("--config".to_string());
        parts.push(config.clone());
    }
    if options.watch {
        parts.push("--watch".to_string());
    }
    if let Some(project) = &options.project {
        parts.push("--project".to_string());
        parts.push(project.clone());
    }
    parts.join(" ")
}

/// Run through the platform shell so the command may be a full shell
/// line (`yarn relay-compiler`, env prefixes, and so on).
#[cfg(not(windows))]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line);
    cmd
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command_line);
    cmd
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
