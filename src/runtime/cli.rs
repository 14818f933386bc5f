use std::io::{self, BufRead, BufReader, Lines, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use log::{debug, trace};

use super::ContainerRuntime;
use crate::error::RuntimeError;
use crate::pull::{PullMessage, PullStream};
use crate::reference::ImageReference;

/// Docker-compatible command line clients.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Engine {
    Docker,
    Podman,
}

impl Engine {
    pub fn program(self) -> &'static str {
        match self {
            Engine::Docker => "docker",
            Engine::Podman => "podman",
        }
    }
}

/// [`ContainerRuntime`] backed by the `docker` (or `podman`) CLI.
///
/// Every operation is one invocation of the client. Streaming operations keep
/// the child process alive behind the returned stream and reap it when the
/// stream ends or is dropped.
pub struct CliRuntime {
    program: String,
}

impl CliRuntime {
    pub fn new(engine: Engine) -> Result<Self, RuntimeError> {
        Self::with_program(engine.program())
    }

    /// Uses an arbitrary client binary, checking that `<program> --version` works.
    pub fn with_program(program: impl Into<String>) -> Result<Self, RuntimeError> {
        let runtime = Self {
            program: program.into(),
        };
        let version = runtime.run_command(&["--version"])?;
        debug!("Using {}", version.trim());
        Ok(runtime)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(args).stdin(Stdio::null());
        command
    }

    fn run_command(&self, args: &[&str]) -> Result<String, RuntimeError> {
        trace!("Running {} {}", self.program, args.join(" "));
        let output = self
            .command(args)
            .output()
            .map_err(|source| RuntimeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                program: self.program.clone(),
                command: args.join(" "),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn spawn_streaming(&self, args: &[&str]) -> Result<(ChildProcess, ChildStdout), RuntimeError> {
        trace!("Spawning {} {}", self.program, args.join(" "));
        let mut child = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            RuntimeError::Stream(io::Error::other("child stdout was not captured"))
        })?;
        let stderr = match child.stderr.take() {
            Some(pipe) => Some(spawn_stderr_reader(pipe)?),
            None => None,
        };

        let process = ChildProcess {
            program: self.program.clone(),
            command: args.join(" "),
            child,
            stderr,
            reaped: false,
        };
        Ok((process, stdout))
    }
}

impl ContainerRuntime for CliRuntime {
    fn name(&self) -> &str {
        &self.program
    }

    fn pull_image(&self, reference: &ImageReference) -> Result<PullStream, RuntimeError> {
        let image = reference.to_string();
        let (process, stdout) = self.spawn_streaming(&["pull", image.as_str()])?;
        Ok(Box::new(PullLines {
            lines: BufReader::new(stdout).lines(),
            process,
            done: false,
        }))
    }

    fn create_container(
        &self,
        name: &str,
        image: &str,
        command: &[&str],
    ) -> Result<String, RuntimeError> {
        let mut args = vec!["create", "--name", name];
        if let Some((entrypoint, rest)) = command.split_first() {
            args.extend(["--entrypoint", *entrypoint, image]);
            args.extend(rest);
        } else {
            args.push(image);
        }

        let stdout = self.run_command(&args)?;
        // Warnings may precede the id; the id is always the last line.
        let id = stdout.lines().last().unwrap_or_default().trim().to_string();
        if id.is_empty() {
            return Err(RuntimeError::Reported(format!(
                "{} create returned no container id",
                self.program
            )));
        }
        Ok(id)
    }

    fn export_container(&self, container_id: &str) -> Result<Box<dyn Read>, RuntimeError> {
        let (process, stdout) = self.spawn_streaming(&["export", container_id])?;
        Ok(Box::new(ExportStream {
            stdout,
            process,
            finished: false,
        }))
    }

    fn remove_container(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.run_command(&["rm", "--force", container_id])?;
        Ok(())
    }
}

/// Drains stderr alongside stdout so a chatty client never blocks on a full pipe.
fn spawn_stderr_reader(mut pipe: ChildStderr) -> Result<JoinHandle<String>, RuntimeError> {
    let handle = thread::Builder::new()
        .name("runtime-stderr".to_string())
        .spawn(move || {
            let mut stderr = String::new();
            // Best effort: the exit status is what decides success.
            let _ = pipe.read_to_string(&mut stderr);
            stderr
        })?;
    Ok(handle)
}

/// A running client invocation that is killed and reaped on drop unless it
/// already finished.
struct ChildProcess {
    program: String,
    command: String,
    child: Child,
    stderr: Option<JoinHandle<String>>,
    reaped: bool,
}

impl ChildProcess {
    fn finish(&mut self) -> Result<(), RuntimeError> {
        let status = self.child.wait()?;
        self.reaped = true;

        let stderr = self
            .stderr
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if !status.success() {
            return Err(RuntimeError::CommandFailed {
                program: self.program.clone(),
                command: self.command.clone(),
                status,
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Ok(None) = self.child.try_wait() {
            debug!("Stopping unfinished `{} {}`", self.program, self.command);
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Lazily yields one progress message per line of `pull` output.
struct PullLines {
    lines: Lines<BufReader<ChildStdout>>,
    process: ChildProcess,
    done: bool,
}

impl Iterator for PullLines {
    type Item = Result<PullMessage, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match self.lines.next() {
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => return Some(Ok(PullMessage::status(line.trim()))),
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(RuntimeError::Stream(err)));
                }
                None => {
                    self.done = true;
                    return match self.process.finish() {
                        Ok(()) => None,
                        Err(RuntimeError::CommandFailed { stderr, status, .. }) => {
                            let message = if stderr.is_empty() {
                                format!("pull exited with {}", status)
                            } else {
                                stderr
                            };
                            Some(Ok(PullMessage::error(message)))
                        }
                        Err(err) => Some(Err(err)),
                    };
                }
            }
        }
    }
}

/// Tar bytes from `export`; a failing exit status surfaces at end of stream.
struct ExportStream {
    stdout: ChildStdout,
    process: ChildProcess,
    finished: bool,
}

impl Read for ExportStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }

        let read = self.stdout.read(buf)?;
        if read == 0 && !buf.is_empty() {
            self.finished = true;
            self.process.finish().map_err(io::Error::other)?;
        }
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_programs() {
        assert_eq!(Engine::Docker.program(), "docker");
        assert_eq!(Engine::Podman.program(), "podman");
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let result = CliRuntime::with_program("image-puller-no-such-runtime");
        assert!(matches!(result, Err(RuntimeError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_reports_command_failure() {
        let result = CliRuntime::with_program("false");
        assert!(matches!(result, Err(RuntimeError::CommandFailed { .. })));
    }
}

#[cfg(all(test, feature = "docker"))]
mod docker_tests {
    use super::*;
    use std::io;

    #[test]
    fn test_docker_pull_create_export_remove() {
        let runtime = CliRuntime::new(Engine::Docker).expect("docker should be available");
        let reference = ImageReference::parse("hello-world:latest").unwrap();

        for message in runtime.pull_image(&reference).unwrap() {
            let message = message.unwrap();
            assert!(message.error_message().is_none(), "pull failed: {:?}", message);
        }

        let name = format!("image-puller-test-{}", uuid::Uuid::new_v4());
        let id = runtime
            .create_container(&name, "hello-world:latest", &["ls"])
            .unwrap();
        assert!(!id.is_empty());

        let mut stream = runtime.export_container(&id).unwrap();
        let copied = io::copy(&mut stream, &mut io::sink()).unwrap();
        assert!(copied > 0);

        runtime.remove_container(&id).unwrap();
    }
}
