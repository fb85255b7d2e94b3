use crate::error::KdeDevError;
use crate::Context;
use std::io::{self, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Buffer stdout/stderr for inspection.
    Capture,
    /// Inherit the terminal so long-running output shows up live.
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub mode: RunMode,
    pub stdin: Option<Vec<u8>>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            mode: RunMode::Capture,
            stdin: None,
        }
    }

    /// Runs `program` through sudo.
    pub fn sudo(program: impl Into<String>) -> Self {
        Self::new("sudo").arg(program)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn streamed(mut self) -> Self {
        self.mode = RunMode::Stream;
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Error text for reports; some tools (distrobox among them) print
    /// failures on stdout.
    pub fn diagnostic_text(&self) -> String {
        let stderr = self.stderr_text();
        if stderr.is_empty() {
            String::from_utf8_lossy(&self.stdout).trim().to_string()
        } else {
            stderr
        }
    }
}

pub trait CommandRunner {
    fn run(&self, command: &ExternalCommand) -> Result<CommandOutput, io::Error>;
}

pub struct SystemRunner;

fn status_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(if status.success() { 0 } else { 1 })
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ExternalCommand) -> Result<CommandOutput, io::Error> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        match command.mode {
            RunMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
                cmd.stdin(if command.stdin.is_some() {
                    Stdio::piped()
                } else {
                    Stdio::null()
                });
                let mut child = cmd.spawn()?;
                let pipe = child.stdin.take();
                // Feed stdin while stdout/stderr drain, so large input cannot
                // fill both pipes and stall the child.
                let output = thread::scope(|scope| {
                    let writer = match (&command.stdin, pipe) {
                        (Some(input), Some(mut pipe)) => {
                            Some(scope.spawn(move || pipe.write_all(input)))
                        }
                        _ => None,
                    };
                    let output = child.wait_with_output()?;
                    if let Some(writer) = writer {
                        let written = writer
                            .join()
                            .map_err(|_| io::Error::other("stdin writer panicked"))?;
                        // A child that exits without reading reports through its status.
                        match written {
                            Err(err) if err.kind() != io::ErrorKind::BrokenPipe => {
                                return Err(err);
                            }
                            _ => {}
                        }
                    }
                    Ok::<_, io::Error>(output)
                })?;
                Ok(CommandOutput {
                    status_code: status_code(output.status),
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
            RunMode::Stream => {
                let status = cmd.status()?;
                Ok(CommandOutput {
                    status_code: status_code(status),
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                })
            }
        }
    }
}

/// Runs `command`, turning a non-zero exit into `CommandFailed` when `check` is set.
/// An interrupt that arrived while the child ran wins over its exit status.
pub fn execute<R: CommandRunner>(
    ctx: &Context,
    runner: &R,
    command: &ExternalCommand,
    check: bool,
) -> Result<CommandOutput, KdeDevError> {
    if ctx.interrupt.is_raised() {
        return Err(KdeDevError::Interrupted);
    }
    let rendered = command.render();
    let output = runner.run(command).map_err(|source| KdeDevError::Spawn {
        command: rendered.clone(),
        source,
    })?;
    if ctx.interrupt.is_raised() {
        return Err(KdeDevError::Interrupted);
    }
    if check && !output.success() {
        return Err(KdeDevError::CommandFailed {
            command: rendered,
            status_code: output.status_code,
            stderr: output.diagnostic_text(),
        });
    }
    Ok(output)
}


#[cfg(test)]
mod tests {
    use super::testing::MockRunner;
    use super::*;
    use crate::test_context;
    use tempfile::tempdir;

    #[test]
    fn render_joins_program_and_args() {
        let cmd = ExternalCommand::sudo("chown")
            .args(["1000:1000", "/a", "/b"]);
        assert_eq!(cmd.render(), "sudo chown 1000:1000 /a /b");
        assert_eq!(cmd.mode, RunMode::Capture);
        assert_eq!(
            ExternalCommand::new("podman").streamed().mode,
            RunMode::Stream
        );
    }

    #[test]
    fn checked_failure_reports_command_and_stderr() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let runner = MockRunner::default();
        runner.push_status(125, "Error: no such container kde-dev\n");

        let cmd = ExternalCommand::new("podman")
            .args(["container", "start", "kde-dev"]);
        let err = execute(&ctx, &runner, &cmd, true).expect_err("should fail");
        match err {
            KdeDevError::CommandFailed {
                command,
                status_code,
                stderr,
            } => {
                assert_eq!(command, "podman container start kde-dev");
                assert_eq!(status_code, 125);
                assert_eq!(stderr, "Error: no such container kde-dev");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn failure_without_stderr_reports_stdout() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let runner = MockRunner::default();
        runner.push_output(CommandOutput {
            status_code: 1,
            stdout: b"Error: An error occurred\n".to_vec(),
            stderr: Vec::new(),
        });

        let cmd = ExternalCommand::new("distrobox").arg("create");
        let err = execute(&ctx, &runner, &cmd, true).expect_err("should fail");
        assert!(err
            .to_string()
            .ends_with("error output: Error: An error occurred"));
    }

    #[test]
    fn unchecked_failure_is_returned() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let runner = MockRunner::default();
        runner.push_status(1, "already unlocked");

        let cmd = ExternalCommand::sudo("bootc").arg("usr-overlay");
        let output = execute(&ctx, &runner, &cmd, false).expect("unchecked");
        assert!(!output.success());
        assert_eq!(output.stderr_text(), "already unlocked");
    }

    #[test]
    fn spawn_failure_names_command() {
        struct NotFoundRunner;
        impl CommandRunner for NotFoundRunner {
            fn run(&self, _command: &ExternalCommand) -> Result<CommandOutput, io::Error> {
                Err(io::Error::new(io::ErrorKind::NotFound, "not found"))
            }
        }

        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cmd = ExternalCommand::new("distrobox").arg("create");
        let err = execute(&ctx, &NotFoundRunner, &cmd, true).expect_err("spawn");
        assert!(err
            .to_string()
            .contains("failed to run command `distrobox create`"));
    }

    #[test]
    fn interrupt_during_command_wins() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let runner = MockRunner::default();
        ctx.interrupt.raise();

        let cmd = ExternalCommand::new("podman").arg("exec");
        let err = execute(&ctx, &runner, &cmd, true).expect_err("interrupted");
        assert!(err.is_interrupted());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn system_runner_pipes_stdin_and_captures_stdout() {
        let cmd = ExternalCommand::new("cat")
            .stdin("chown -f -R $USER:$USER /tmp/.X11-unix");
        let output = SystemRunner.run(&cmd).expect("cat");
        assert!(output.success());
        assert_eq!(output.stdout, b"chown -f -R $USER:$USER /tmp/.X11-unix");
    }

    #[test]
    fn system_runner_streams_stdin_larger_than_a_pipe_buffer() {
        let input = vec![b'x'; 1024 * 1024];
        let cmd = ExternalCommand::new("cat").stdin(input.clone());
        let output = SystemRunner.run(&cmd).expect("cat");
        assert!(output.success());
        assert_eq!(output.stdout.len(), input.len());
    }

    #[test]
    fn system_runner_keeps_status_when_child_ignores_stdin() {
        let cmd = ExternalCommand::new("sh")
            .args(["-c", "exit 4"])
            .stdin(vec![b'x'; 1024 * 1024]);
        let output = SystemRunner.run(&cmd).expect("sh");
        assert_eq!(output.status_code, 4);
    }

    #[test]
    fn system_runner_reports_exit_code() {
        let cmd = ExternalCommand::new("sh")
            .args(["-c", "echo oops >&2; exit 3"]);
        let output = SystemRunner.run(&cmd).expect("sh");
        assert_eq!(output.status_code, 3);
        assert_eq!(output.stderr_text(), "oops");
    }
}
