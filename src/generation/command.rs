use super::{GenerationError, GenerationRequest, TextGenerator};
use std::io::{self, ErrorKind, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long a generator may run before it is killed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Delegates generation to an external command.
///
/// The prompt is written to the command's stdin and its stdout is taken as the
/// generated text. The level id and allowed characters are also exported as
/// `TENFINGER_LEVEL` and `TENFINGER_ALLOWED` for scripts that build their own prompt.
/// Credentials and network access are the command's concern. A command that runs past
/// its timeout is killed and reported as [`GenerationError::TimedOut`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Splits a configured command line into program and arguments.
    pub fn from_command_line(parts: &[String]) -> Result<Self, GenerationError> {
        match parts.split_first() {
            Some((program, args)) if !program.trim().is_empty() => {
                Ok(Self::new(program.clone(), args.to_vec()))
            }
            _ => Err(GenerationError::InvalidRequest(
                "generator command line is empty".to_string(),
            )),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Polls `child` until it exits; kills and reaps it once the timeout passes.
    fn wait_with_deadline(&self, child: &mut Child) -> Result<ExitStatus, GenerationError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                // already exited between the poll and the kill
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(
                    program = %self.program,
                    timeout = ?self.timeout,
                    "generator timed out, killed"
                );
                return Err(GenerationError::TimedOut(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn join<T>(handle: JoinHandle<io::Result<T>>) -> Result<T, GenerationError> {
    handle
        .join()
        .map_err(|_| io::Error::other("generator pipe thread panicked"))?
        .map_err(GenerationError::from)
}

impl TextGenerator for CommandGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let allowed: String = request.allowed.iter().collect();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("TENFINGER_LEVEL", request.level_id.to_string())
            .env("TENFINGER_ALLOWED", allowed)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        // pipes are serviced off this thread so a silent command cannot block the deadline
        let stdin = child.stdin.take();
        let prompt = request.prompt();
        let writer = thread::spawn(move || -> io::Result<()> {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            // the command may exit without reading its input
            match stdin.write_all(prompt.as_bytes()) {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        });

        let stdout = child.stdout.take();
        let reader = thread::spawn(move || -> io::Result<Vec<u8>> {
            let mut buf = Vec::new();
            if let Some(mut stdout) = stdout {
                stdout.read_to_end(&mut buf)?;
            }
            Ok(buf)
        });

        // on timeout the pipe threads are left to finish once the pipes close
        let status = self.wait_with_deadline(&mut child)?;
        join(writer)?;
        let stdout = join(reader)?;

        if !status.success() {
            return Err(GenerationError::Remote {
                code: status.code().unwrap_or(-1),
            });
        }

        let text = String::from_utf8(stdout)
            .map_err(|e| GenerationError::ParseFailure(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(GenerationError::InvalidResponse(
                "generator produced no text".to_string(),
            ));
        }

        Ok(text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::lesson::catalog;
    use assert_matches::assert_matches;

    fn request() -> GenerationRequest {
        GenerationRequest::for_level(catalog().level(1))
    }

    fn sh(script: &str) -> CommandGenerator {
        CommandGenerator::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn test_stdout_is_returned() {
        let text = sh("echo 'a sad lad'").generate(&request()).unwrap();
        assert_eq!(text.trim(), "a sad lad");
    }

    #[test]
    fn test_prompt_is_written_to_stdin() {
        let generator = CommandGenerator::new("cat", vec![]);
        let text = generator.generate(&request()).unwrap();
        assert_eq!(text, request().prompt());
    }

    #[test]
    fn test_level_is_exported_to_environment() {
        let text = sh("printf '%s|%s' \"$TENFINGER_LEVEL\" \"$TENFINGER_ALLOWED\"")
            .generate(&request())
            .unwrap();
        assert_eq!(text, "1| ;adfjkls");
    }

    #[test]
    fn test_non_zero_exit_is_remote_error() {
        assert_matches!(
            sh("exit 3").generate(&request()),
            Err(GenerationError::Remote { code: 3 })
        );
    }

    #[test]
    fn test_blank_output_is_invalid_response() {
        assert_matches!(
            sh("printf '  \\n'").generate(&request()),
            Err(GenerationError::InvalidResponse(_))
        );
    }

    #[test]
    fn test_non_utf8_output_is_parse_failure() {
        assert_matches!(
            sh("printf '\\377\\376'").generate(&request()),
            Err(GenerationError::ParseFailure(_))
        );
    }

    #[test]
    fn test_missing_program_is_transport_error() {
        let generator = CommandGenerator::new("tenfinger-no-such-generator", vec![]);
        assert_matches!(
            generator.generate(&request()),
            Err(GenerationError::Transport(_))
        );
    }

    #[test]
    fn test_hung_command_is_killed_after_timeout() {
        let generator = sh("cat >/dev/null; sleep 30").with_timeout(Duration::from_millis(200));
        let started = Instant::now();

        assert_matches!(
            generator.generate(&request()),
            Err(GenerationError::TimedOut(t)) if t == Duration::from_millis(200)
        );
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_command_that_ignores_stdin_within_timeout() {
        let generator = sh("sleep 0.1; echo lad").with_timeout(Duration::from_secs(10));
        assert_eq!(generator.generate(&request()).unwrap().trim(), "lad");
    }

    #[test]
    fn test_from_command_line() {
        let parts = vec!["gen".to_string(), "--fast".to_string()];
        let generator = CommandGenerator::from_command_line(&parts).unwrap();

        assert_eq!(generator.program(), "gen");
        assert_eq!(generator.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(generator, CommandGenerator::new("gen", vec!["--fast".into()]));
    }

    #[test]
    fn test_empty_command_line_is_invalid_request() {
        assert_matches!(
            CommandGenerator::from_command_line(&[]),
            Err(GenerationError::InvalidRequest(_))
        );
        assert_matches!(
            CommandGenerator::from_command_line(&["  ".to_string()]),
            Err(GenerationError::InvalidRequest(_))
        );
    }
}
