//! Out-of-process plugins: one child process per call
use crate::error::{Result as RflaunchResult, RflaunchError};
use crate::protocol::{self, JsonRpcAction, JsonRpcRequest};
use crate::query::Query;
use crate::result::PluginResult;
use log::{debug, error, warn};
use serde_json::Value;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Program plus leading arguments used to start the plugin.
#[derive(Debug, Clone)]
pub struct PluginCommand {
    pub program: PathBuf,
    pub leading_args: Vec<OsString>,
}

impl PluginCommand {
    pub fn executable(path: &Path) -> Self {
        Self {
            program: path.to_path_buf(),
            leading_args: Vec::new(),
        }
    }

    /// `python -B <script>`; `-B` keeps the interpreter from writing bytecode
    /// next to the plugin.
    pub fn python(interpreter: &str, script: &Path) -> Self {
        Self {
            program: PathBuf::from(interpreter),
            leading_args: vec![OsString::from("-B"), script.as_os_str().to_os_string()],
        }
    }
}

/// Captured output of one finished plugin process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct ProcessRuntime {
    plugin_id: String,
    command: PluginCommand,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessRuntime {
    pub fn new(
        plugin_id: &str,
        command: PluginCommand,
        working_dir: &Path,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            command,
            working_dir: working_dir.to_path_buf(),
            timeout,
        }
    }

    pub fn query(&self, query: &Query) -> RflaunchResult<Vec<PluginResult>> {
        let request = JsonRpcRequest::query(query.search());
        match self.call(&request)? {
            Some(output) => protocol::parse_query_response(&self.plugin_id, &output),
            None => Ok(Vec::new()),
        }
    }

    pub fn load_context_menu(&self, result: &PluginResult) -> RflaunchResult<Vec<PluginResult>> {
        let context_data = result.context_data.clone().unwrap_or(Value::Null);
        let request = JsonRpcRequest::context_menu(context_data);
        match self.call(&request)? {
            Some(output) => protocol::parse_query_response(&self.plugin_id, &output),
            None => Ok(Vec::new()),
        }
    }

    /// Re-invokes the plugin for a previously returned action. The answer may
    /// be a follow-up request for the host.
    pub fn callback(&self, action: &JsonRpcAction) -> RflaunchResult<Option<JsonRpcRequest>> {
        let request = JsonRpcRequest::callback(action);
        match self.call(&request)? {
            Some(output) => protocol::parse_callback_response(&self.plugin_id, &output),
            None => Ok(None),
        }
    }

    /// Runs one request. `Ok(None)` means the plugin produced nothing usable
    /// on stdout (or could not be started); details are logged.
    fn call(&self, request: &JsonRpcRequest) -> RflaunchResult<Option<String>> {
        let argument = request.to_argument()?;
        debug!(
            "Calling plugin {} method '{}' via {}",
            self.plugin_id,
            request.method,
            self.command.program.display()
        );

        let output = match self.run(&argument) {
            Ok(output) => output,
            Err(err @ RflaunchError::Spawn { .. }) => {
                error!("Plugin {}: {err}", self.plugin_id);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        if !output.stdout.trim().is_empty() {
            if !output.status.success() {
                warn!(
                    "Plugin {} exited with {} but produced output",
                    self.plugin_id, output.status
                );
            }
            return Ok(Some(output.stdout));
        }

        if !output.stderr.trim().is_empty() {
            error!(
                "Plugin {} wrote to stderr: {}",
                self.plugin_id,
                output.stderr.trim()
            );
        } else {
            debug!("Plugin {} produced no output", self.plugin_id);
        }
        Ok(None)
    }

    fn run(&self, argument: &str) -> RflaunchResult<ProcessOutput> {
        let mut cmd = Command::new(&self.command.program);
        cmd
            .args(&self.command.leading_args)
            .arg(argument)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|source| RflaunchError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;

        wait_with_output(child, self.timeout).map_err(|err| err.into_error(&self.plugin_id))
    }
}

#[derive(Debug)]
enum WaitError {
    TimedOut(Duration),
    Io(std::io::Error),
}

impl WaitError {
    /// Both cases are failures of this plugin's invocation.
    fn into_error(self, plugin_id: &str) -> RflaunchError {
        match self {
            WaitError::TimedOut(limit) => RflaunchError::Timeout {
                plugin_id: plugin_id.to_string(),
                millis: limit.as_millis() as u64,
            },
            WaitError::Io(e) => RflaunchError::plugin(plugin_id, e),
        }
    }
}

/// Drains both pipes on helper threads so a chatty child cannot block on a
/// full pipe, and kills the child once `timeout` has elapsed.
fn wait_with_output(mut child: Child, timeout: Option<Duration>) -> Result<ProcessOutput, WaitError> {
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => return Err(WaitError::Io(e)),
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(WaitError::TimedOut(limit));
            }
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = join_reader(stdout_reader);
    let stderr = join_reader(stderr_reader);
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn wait_failures_are_invocation_errors() {
        let io = WaitError::Io(std::io::Error::from(std::io::ErrorKind::Interrupted)).into_error("web");
        assert_eq!(io.kind(), ErrorKind::Invocation);
        assert!(io.to_string().contains("'web'"));

        let timeout = WaitError::TimedOut(Duration::from_millis(250)).into_error("web");
        assert_eq!(timeout.kind(), ErrorKind::Invocation);
        assert!(matches!(timeout, RflaunchError::Timeout { millis: 250, .. }));
    }
}
