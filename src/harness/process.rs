//! A live harness subprocess and the protocol exchange over its pipes.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use wait_timeout::ChildExt;

use crate::classify::CapturedOutput;
use crate::config::HarnessConfig;
use crate::harness::protocol::{self, ProtocolError, ResponseLine};
use crate::models::TestCase;

/// How long to wait for a killed or exiting harness before giving up on
/// its status.
const REAP_GRACE: Duration = Duration::from_secs(5);

/// One spawned harness instance with piped stdin/stdout.
pub struct HarnessProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    tests_served: usize,
}

impl HarnessProcess {
    pub fn spawn(config: &HarnessConfig) -> Result<Self> {
        let mut child = Command::new(&config.executable)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| {
                format!("Failed to spawn harness: {}", config.executable.display())
            })?;
        let stdin = child.stdin.take().context("Harness has no stdin pipe")?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .context("Harness has no stdout pipe")?;
        Ok(HarnessProcess {
            child,
            stdin,
            stdout,
            tests_served: 0,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Tests this instance has completed, for the bounce policy.
    pub fn tests_served(&self) -> usize {
        self.tests_served
    }

    pub fn is_alive(&mut self) -> bool {
        self.child.try_wait().map(|s| s.is_none()).unwrap_or(false)
    }

    /// Submit one test and read its response to the end-of-test sentinel.
    ///
    /// A harness death mid-test is not an error: it comes back as a
    /// captured result with `crashed` set, because the run continues with
    /// a fresh process. Desync and user interrupt are errors since both
    /// end the run.
    pub fn run_test(&mut self, test: &TestCase) -> Result<CapturedOutput, ProtocolError> {
        let request = protocol::request_line(test);
        if self.stdin.write_all(request.as_bytes()).is_err()
            || self.stdin.flush().is_err()
        {
            // Pipe gone: the harness died between tests.
            return self.stream_ended(Vec::new(), None, false);
        }

        let mut text_lines: Vec<String> = Vec::new();
        let mut image_hash: Option<String> = None;
        let mut timed_out = false;

        loop {
            let mut line = String::new();
            let read = self.stdout.read_line(&mut line)?;
            if read == 0 {
                return self.stream_ended(text_lines, image_hash, timed_out);
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            match protocol::parse_response_line(trimmed) {
                ResponseLine::EndOfTest => break,
                ResponseLine::UrlEcho(uri) => {
                    if uri != test.uri {
                        return Err(ProtocolError::Desynchronized {
                            expected: test.uri.clone(),
                            actual: uri.to_string(),
                        });
                    }
                }
                ResponseLine::ImageHash(hash) => image_hash = Some(hash.to_string()),
                ResponseLine::TimedOut => timed_out = true,
                ResponseLine::Output(text) => text_lines.push(text.to_string()),
            }
        }

        self.tests_served += 1;
        Ok(CapturedOutput {
            text: join_lines(text_lines),
            image_hash,
            crashed: false,
            timed_out,
        })
    }

    fn stream_ended(
        &mut self,
        text_lines: Vec<String>,
        image_hash: Option<String>,
        timed_out: bool,
    ) -> Result<CapturedOutput, ProtocolError> {
        let status = self.reap()?;
        if exited_on_interrupt(&status) {
            return Err(ProtocolError::Interrupted);
        }
        Ok(CapturedOutput {
            text: join_lines(text_lines),
            image_hash,
            crashed: true,
            timed_out,
        })
    }

    fn reap(&mut self) -> std::io::Result<ExitStatus> {
        match self.child.wait_timeout(REAP_GRACE)? {
            Some(status) => Ok(status),
            None => {
                let _ = self.child.kill();
                self.child.wait()
            }
        }
    }

    /// Kill the instance and reap it. Used for bounces, cancellation and
    /// queue exhaustion.
    pub fn stop(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait_timeout(REAP_GRACE);
    }
}

fn join_lines(lines: Vec<String>) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

fn exited_on_interrupt(status: &ExitStatus) -> bool {
    status.signal() == Some(Signal::SIGINT as i32)
}
