use std::{ffi::OsStr, process::Stdio};

use camino::Utf8Path;
use tokio::{
    io::{self, AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{InstallError, IoContext, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkLevel {
    Debug,
    Info,
}

/// Forwards each line a child writes to the log, prefixed.
#[derive(Debug, Clone, Copy)]
pub struct Sink {
    level: SinkLevel,
    prefix: &'static str,
}

impl Sink {
    pub const fn debug(prefix: &'static str) -> Self {
        Self {
            level: SinkLevel::Debug,
            prefix,
        }
    }

    pub const fn info(prefix: &'static str) -> Self {
        Self {
            level: SinkLevel::Info,
            prefix,
        }
    }

    fn emit(&self, line: &str) {
        match self.level {
            SinkLevel::Debug => debug!("{}{}", self.prefix, line),
            SinkLevel::Info => info!("{}{}", self.prefix, line),
        }
    }
}

/// Logs every line until EOF. Lines are raw bytes, so non-UTF-8 output is
/// logged lossily instead of ending the pump and leaving the child to SIGPIPE.
async fn pump<R: AsyncRead + Unpin>(reader: R, sink: Sink) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => return,
            Ok(_) => {
                let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                sink.emit(&String::from_utf8_lossy(line));
            }
            Err(e) => {
                debug!("{}read failed, discarding the rest: {}", sink.prefix, e);
                if let Err(e) = io::copy(&mut reader, &mut io::sink()).await {
                    debug!("{}drain failed: {}", sink.prefix, e);
                }
                return;
            }
        }
    }
}

/// An external program run to completion with its output routed to the log.
pub struct Tool {
    program: String,
    command: Command,
    stdout: Sink,
    stderr: Sink,
}

impl Tool {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            command: Command::new(program),
            stdout: Sink::debug(""),
            stderr: Sink::debug(""),
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.command.arg(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command.args(args);
        self
    }

    pub fn current_dir<P: AsRef<Utf8Path>>(mut self, dir: P) -> Self {
        self.command.current_dir(dir.as_ref());
        self
    }

    pub fn stdout(mut self, sink: Sink) -> Self {
        self.stdout = sink;
        self
    }

    pub fn stderr(mut self, sink: Sink) -> Self {
        self.stderr = sink;
        self
    }

    /// Runs the program, failing on a non-zero exit.
    ///
    /// The child is killed as soon as `cancel` fires.
    pub async fn run(mut self, cancel: &CancellationToken, context: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled {
                context: context.to_string(),
            });
        }

        debug!("Running {:?}", self.command.as_std());

        self.command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = self
            .command
            .spawn()
            .io_context(|| format!("{context}: spawning {}", self.program))?;

        let pumps: Vec<JoinHandle<()>> = [
            child.stdout.take().map(|out| tokio::spawn(pump(out, self.stdout))),
            child.stderr.take().map(|err| tokio::spawn(pump(err, self.stderr))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let status = tokio::select! {
            status = child.wait() => status.io_context(|| format!("{context}: waiting for {}", self.program))?,
            () = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    debug!("Failed to kill {}: {}", self.program, e);
                }
                for pump in pumps {
                    pump.abort();
                }

                return Err(InstallError::Cancelled {
                    context: context.to_string(),
                });
            }
        };

        for pump in pumps {
            // Pump tasks never panic; a join error only means they were aborted.
            let _ = pump.await;
        }

        if !status.success() {
            return Err(InstallError::ToolFailed {
                context: context.to_string(),
                program: self.program,
                status,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[tokio::test]
    async fn successful_tool_returns_ok() {
        let cancel = CancellationToken::new();

        Tool::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .run(&cancel, "echoing")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_utf8_output_does_not_break_the_pipe() {
        let cancel = CancellationToken::new();

        // A stopped reader would SIGPIPE the loop below and turn `exit 0` into a failure.
        Tool::new("sh")
            .args([
                "-c",
                "printf 'caf\\351\\n'; printf 'err \\377\\n' >&2; sleep 0.2; \
                 i=0; while [ $i -lt 20000 ]; do echo line $i; i=$((i+1)); done; exit 0",
            ])
            .run(&cancel, "latin-1 output")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_is_tool_failure() {
        let cancel = CancellationToken::new();

        let err = Tool::new("sh")
            .args(["-c", "exit 3"])
            .run(&cancel, "exiting")
            .await
            .unwrap_err();

        match err {
            InstallError::ToolFailed {
                context,
                program,
                status,
            } => {
                assert_eq!(context, "exiting");
                assert_eq!(program, "sh");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let cancel = CancellationToken::new();

        let err = Tool::new("fabcomp-no-such-program")
            .run(&cancel, "spawning")
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Io { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn cancellation_kills_running_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = Tool::new("sleep")
            .arg("30")
            .run(&cancel, "sleeping")
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Cancelled { .. }), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_spawn() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = Tool::new("fabcomp-no-such-program")
            .run(&cancel, "skipped")
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Cancelled { .. }), "{err:?}");
    }
}
