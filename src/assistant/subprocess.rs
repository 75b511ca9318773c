//! Assistant transport backed by a CLI subprocess.

use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::assistant::{AssistantRequest, AssistantTransport};
use crate::error::AssistantError;
use crate::waiter::{Signal, SignalBus};

/// Hard limit on a single assistant process. Callers usually stop waiting
/// much earlier; this only reaps runaway processes.
const PROCESS_TIMEOUT_SECS: u64 = 300;

/// Runs a configured command line with the prompt appended as the last
/// argument, and publishes its stdout on the signal bus under the request id.
///
/// `send` returns as soon as the process has started. Exit failures are
/// logged and publish nothing, which the waiting side sees as a timeout.
pub struct CommandTransport {
    program: String,
    args: Vec<String>,
    bus: SignalBus,
}

impl CommandTransport {
    /// Parse a whitespace-separated command line such as `claude -p`.
    pub fn new(command_line: &str, bus: SignalBus) -> Result<Self, AssistantError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(AssistantError::EmptyCommand)?;

        Ok(Self {
            program,
            args: parts.collect(),
            bus,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check that the program resolves on PATH.
    pub fn check_installed(&self) -> Result<(), AssistantError> {
        which::which(&self.program)
            .map(|_| ())
            .map_err(|_| AssistantError::NotInstalled(self.program.clone()))
    }
}

#[async_trait]
impl AssistantTransport for CommandTransport {
    async fn send(&self, id: String, request: AssistantRequest) -> Result<(), AssistantError> {
        let prompt = request.prompt();

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(AssistantError::SpawnFailed)?;

        debug!("Started assistant process for {}", id);

        let bus = self.bus.clone();
        tokio::spawn(async move {
            let output = match timeout(
                Duration::from_secs(PROCESS_TIMEOUT_SECS),
                child.wait_with_output(),
            )
            .await
            {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    warn!("Assistant process {} failed: {}", id, e);
                    return;
                }
                Err(_) => {
                    warn!(
                        "Assistant process {} killed after {}s",
                        id, PROCESS_TIMEOUT_SECS
                    );
                    return;
                }
            };

            match parse_output(&output) {
                Ok(content) => {
                    let delivered = bus.publish(Signal::new(id.clone(), content));
                    debug!("Published {} to {} listener(s)", id, delivered);
                }
                Err(e) => warn!("Assistant process {} produced no response: {}", id, e),
            }
        });

        Ok(())
    }
}

/// Assistant CLI JSON envelope, as printed with `--output-format json`.
#[derive(serde::Deserialize)]
struct CliEnvelope {
    result: String,
    #[serde(default)]
    is_error: bool,
}

/// Turn process output into response text, unwrapping a JSON envelope when
/// present and falling back to raw stdout otherwise.
fn parse_output(output: &Output) -> Result<String, AssistantError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code().unwrap_or(-1);
        return Err(AssistantError::NonZeroExit { code, stderr });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    parse_response(&stdout)
}

fn parse_response(stdout: &str) -> Result<String, AssistantError> {
    match serde_json::from_str::<CliEnvelope>(stdout) {
        Ok(envelope) if envelope.is_error => Err(AssistantError::Reported(envelope.result)),
        Ok(envelope) => Ok(envelope.result),
        Err(_) => Ok(stdout.trim_end().to_string()),
    }
}
