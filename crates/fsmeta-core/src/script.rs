//! AppleScript construction and execution.
//!
//! Programs are built from a [`ScriptTemplate`] with `{{name}}`
//! placeholders. Every bound value is emitted as a quoted AppleScript string
//! literal with `\`, `"` and control characters escaped, so caller-supplied
//! text can never end the literal early and change the program.
//!
//! The program then runs through a [`ScriptBridge`]. [`OsaScript`] is the
//! real bridge: it pipes the program into `osascript -`.

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::{ChildStdin, Command, Output, Stdio};
use std::sync::mpsc;
use std::time::Duration;

/// A rendered AppleScript program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleScript {
    source: String,
}

impl AppleScript {
    /// Program text, ready to hand to the bridge.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Errors building a script from a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptBuildError {
    /// A placeholder in the template has no value bound to it
    #[error("No value bound for script placeholder {{{{{0}}}}}")]
    MissingParameter(String),

    /// A `{{` without a matching `}}`
    #[error("Unterminated placeholder in script template")]
    Unterminated,
}

/// Static AppleScript text with `{{name}}` placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptTemplate {
    text: &'static str,
}

impl ScriptTemplate {
    /// Wrap template text.
    pub const fn new(text: &'static str) -> Self {
        Self { text }
    }

    /// Substitute each placeholder with the quoted literal of its value.
    ///
    /// Bindings not referenced by the template are ignored.
    pub fn render(&self, params: &[(&str, &str)]) -> Result<AppleScript, ScriptBuildError> {
        let mut source = String::with_capacity(self.text.len());
        let mut rest = self.text;

        while let Some(start) = rest.find("{{") {
            source.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or(ScriptBuildError::Unterminated)?;
            let name = after[..end].trim();

            let value = params
                .iter()
                .find_map(|(key, value)| (*key == name).then_some(*value))
                .ok_or_else(|| ScriptBuildError::MissingParameter(name.to_string()))?;
            source.push_str(&quote(value));

            rest = &after[end + 2..];
        }
        source.push_str(rest);

        Ok(AppleScript { source })
    }
}

/// Quote `value` as an AppleScript string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Failure reported by a scripting bridge.
///
/// Only the human-readable description survives; error numbers and
/// partial results are dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{description}")]
pub struct BridgeError {
    /// Localized description of what went wrong
    pub description: String,
}

impl BridgeError {
    /// Create an error from a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// Something that can run AppleScript and return its textual result.
pub trait ScriptBridge {
    /// Run `script`, returning the result as text on success.
    fn run(&self, script: &AppleScript) -> Result<String, BridgeError>;
}

impl<B: ScriptBridge + ?Sized> ScriptBridge for &B {
    fn run(&self, script: &AppleScript) -> Result<String, BridgeError> {
        (**self).run(script)
    }
}

/// Runs scripts through the `osascript` command.
///
/// With no timeout the call blocks for as long as `osascript` does,
/// including while the Finder waits on an automation permission prompt.
#[derive(Debug, Clone)]
pub struct OsaScript {
    program: OsString,
    timeout: Option<Duration>,
}

impl Default for OsaScript {
    fn default() -> Self {
        Self {
            program: OsString::from("osascript"),
            timeout: None,
        }
    }
}

impl OsaScript {
    /// Bridge using the `osascript` found on `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different interpreter binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Kill the interpreter if it has not finished after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn program_display(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn wait_error(&self, e: &io::Error) -> BridgeError {
        BridgeError::new(format!("failed to wait for {}: {e}", self.program_display()))
    }

    fn execute(&self, script: &AppleScript) -> Result<Output, BridgeError> {
        let mut child = Command::new(&self.program)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                BridgeError::new(format!("failed to launch {}: {e}", self.program_display()))
            })?;

        // Feed stdin from its own thread so a child that never reads cannot
        // stall us before the timeout starts
        let writer = spawn_stdin_writer(child.stdin.take(), script.source().as_bytes().to_vec());

        let output = match self.timeout {
            None => child.wait_with_output().map_err(|e| self.wait_error(&e))?,
            Some(timeout) => {
                let (tx, rx) = mpsc::channel();
                let child_id = child.id();
                std::thread::spawn(move || {
                    let _ = tx.send(child.wait_with_output());
                });

                match rx.recv_timeout(timeout) {
                    Ok(result) => result.map_err(|e| self.wait_error(&e))?,
                    Err(_) => {
                        // The writer sees EPIPE once the child is gone
                        kill(child_id);
                        tracing::warn!("{} timed out after {:?}", self.program_display(), timeout);
                        return Err(BridgeError::new(format!("script timed out after {timeout:?}")));
                    }
                }
            }
        };

        let written = writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
        if let Err(e) = written {
            // A failing child explains itself on stderr; a succeeding one never got the script
            if output.status.success() {
                return Err(BridgeError::new(format!(
                    "failed to send script to {}: {e}",
                    self.program_display()
                )));
            }
            tracing::debug!("failed to write script to {}: {}", self.program_display(), e);
        }

        Ok(output)
    }
}

/// Write `source` to the child's stdin and close it.
fn spawn_stdin_writer(
    stdin: Option<ChildStdin>,
    source: Vec<u8>,
) -> std::thread::JoinHandle<io::Result<()>> {
    std::thread::spawn(move || {
        if let Some(mut stdin) = stdin {
            stdin.write_all(&source)?;
        }
        Ok(())
    })
}

impl ScriptBridge for OsaScript {
    fn run(&self, script: &AppleScript) -> Result<String, BridgeError> {
        tracing::debug!(program = %self.program_display(), "running AppleScript");
        let output = self.execute(script)?;

        if output.status.success() {
            let mut result = String::from_utf8_lossy(&output.stdout).into_owned();
            if result.ends_with('\n') {
                result.pop();
            }
            return Ok(result);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let description = error_description(&stderr);
        tracing::debug!(status = %output.status, %description, "AppleScript failed");
        if description.is_empty() {
            Err(BridgeError::new(format!(
                "{} exited with {}",
                self.program_display(),
                output.status
            )))
        } else {
            Err(BridgeError::new(description))
        }
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn kill(pid: u32) {
    // SAFETY: pid came from Child::id() of a process we spawned.
    unsafe {
        libc::kill(i32::try_from(pid).unwrap_or(-1), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill(_pid: u32) {}

/// Reduce `osascript` stderr to the error's description.
///
/// `0:58: execution error: Finder got an error: Can’t get file "x". (-1728)`
/// becomes `Finder got an error: Can’t get file "x".`
pub fn error_description(stderr: &str) -> String {
    let mut text = stderr.trim();

    // "start:end: " source range prefix
    if let Some((range, rest)) = text.split_once(": ")
        && !range.is_empty()
        && range.split(':').all(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    {
        text = rest;
    }

    for label in ["execution error: ", "syntax error: "] {
        if let Some(rest) = text.strip_prefix(label) {
            text = rest;
            break;
        }
    }

    // Trailing " (-1728)" error number
    if let Some(open) = text.rfind(" (")
        && let Some(code) = text[open + 2..].strip_suffix(')')
        && code.strip_prefix('-').unwrap_or(code).bytes().all(|b| b.is_ascii_digit())
        && !code.is_empty()
    {
        text = &text[..open];
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain() {
        assert_eq!(quote("hello"), "\"hello\"");
        assert_eq!(quote(""), "\"\"");
    }

    #[test]
    fn test_quote_escapes_metacharacters() {
        assert_eq!(quote(r#"has " quote"#), r#""has \" quote""#);
        assert_eq!(quote(r"back\slash"), r#""back\\slash""#);
        assert_eq!(quote("two\nlines\ttab"), r#""two\nlines\ttab""#);
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let template = ScriptTemplate::new("set c of {{ path }} to {{comment}}");
        let script = template
            .render(&[("path", "/tmp/a"), ("comment", "say \"hi\""), ("unused", "x")])
            .unwrap();
        assert_eq!(script.source(), r#"set c of "/tmp/a" to "say \"hi\"""#);
    }

    #[test]
    fn test_render_injection_stays_inside_literal() {
        let template = ScriptTemplate::new("get comment of {{path}}");
        let hostile = "\" & (do shell script \"rm -rf ~\") & \"";
        let script = template.render(&[("path", hostile)]).unwrap();
        // Exactly one unescaped quote pair: the literal's own delimiters
        let unescaped = script
            .source()
            .char_indices()
            .filter(|&(i, c)| c == '"' && !script.source()[..i].ends_with('\\'))
            .count();
        assert_eq!(unescaped, 2);
    }

    #[test]
    fn test_render_errors() {
        assert_eq!(
            ScriptTemplate::new("x {{missing}}").render(&[]),
            Err(ScriptBuildError::MissingParameter("missing".into()))
        );
        assert_eq!(
            ScriptTemplate::new("x {{open").render(&[("open", "v")]),
            Err(ScriptBuildError::Unterminated)
        );
    }

    #[test]
    fn test_render_without_placeholders() {
        let script = ScriptTemplate::new("return 1").render(&[]).unwrap();
        assert_eq!(script.source(), "return 1");
    }

    #[test]
    fn test_error_description_execution_error() {
        let stderr = "0:58: execution error: Finder got an error: Can’t get file \"x\". (-1728)\n";
        assert_eq!(error_description(stderr), "Finder got an error: Can’t get file \"x\".");
    }

    #[test]
    fn test_error_description_syntax_error() {
        let stderr = "12:19: syntax error: Expected end of line but found identifier. (-2741)";
        assert_eq!(
            error_description(stderr),
            "Expected end of line but found identifier."
        );
    }

    #[test]
    fn test_error_description_keeps_unstructured_text() {
        assert_eq!(error_description("something broke"), "something broke");
        assert_eq!(error_description("note (see docs)"), "note (see docs)");
        assert_eq!(error_description("   \n"), "");
    }

    #[test]
    fn test_missing_program_reports_launch_failure() {
        let bridge = OsaScript::new().with_program("/nonexistent/osascript-12345");
        let script = ScriptTemplate::new("return 1").render(&[]).unwrap();
        let err = bridge.run(&script).unwrap_err();
        assert!(err.description.starts_with("failed to launch /nonexistent/osascript-12345"));
    }

    #[cfg(unix)]
    mod fake_interpreter {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};
        use tempfile::TempDir;

        fn write_script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-osascript");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn script() -> AppleScript {
            ScriptTemplate::new("get comment of {{path}}")
                .render(&[("path", "/tmp/file")])
                .unwrap()
        }

        #[test]
        fn test_success_returns_stdout_without_newline() {
            let dir = TempDir::new().unwrap();
            let program = write_script(dir.path(), "cat > /dev/null\necho 'a comment'");
            let result = OsaScript::new().with_program(&program).run(&script()).unwrap();
            assert_eq!(result, "a comment");
        }

        #[test]
        fn test_script_arrives_on_stdin() {
            let dir = TempDir::new().unwrap();
            let program = write_script(dir.path(), "cat");
            let result = OsaScript::new().with_program(&program).run(&script()).unwrap();
            assert_eq!(result, "get comment of \"/tmp/file\"");
        }

        #[test]
        fn test_failure_returns_description() {
            let dir = TempDir::new().unwrap();
            let program = write_script(
                dir.path(),
                "cat > /dev/null\necho '0:40: execution error: File not found. (-43)' >&2\nexit 1",
            );
            let err = OsaScript::new().with_program(&program).run(&script()).unwrap_err();
            assert_eq!(err.description, "File not found.");
        }

        #[test]
        fn test_silent_failure_reports_status() {
            let dir = TempDir::new().unwrap();
            let program = write_script(dir.path(), "cat > /dev/null\nexit 3");
            let err = OsaScript::new().with_program(&program).run(&script()).unwrap_err();
            assert!(err.description.contains("exited with"));
        }

        #[test]
        fn test_timeout_kills_interpreter() {
            let dir = TempDir::new().unwrap();
            let program = write_script(dir.path(), "exec sleep 10");
            let err = OsaScript::new()
                .with_program(&program)
                .with_timeout(Duration::from_millis(200))
                .run(&script())
                .unwrap_err();
            assert!(err.description.starts_with("script timed out"));
        }

        fn large_script() -> AppleScript {
            let comment = "x".repeat(256 * 1024);
            ScriptTemplate::new("set comment of {{path}} to {{comment}}")
                .render(&[("path", "/tmp/file"), ("comment", comment.as_str())])
                .unwrap()
        }

        #[test]
        fn test_timeout_covers_unread_large_script() {
            let dir = TempDir::new().unwrap();
            let program = write_script(dir.path(), "exec sleep 10");
            let started = std::time::Instant::now();
            let err = OsaScript::new()
                .with_program(&program)
                .with_timeout(Duration::from_millis(200))
                .run(&large_script())
                .unwrap_err();
            assert!(err.description.starts_with("script timed out"));
            assert!(started.elapsed() < Duration::from_secs(5));
        }

        #[test]
        fn test_unread_script_is_not_success() {
            let dir = TempDir::new().unwrap();
            let program = write_script(dir.path(), "exit 0");
            let err = OsaScript::new()
                .with_program(&program)
                .run(&large_script())
                .unwrap_err();
            assert!(err.description.starts_with("failed to send script"));
        }
    }
}
