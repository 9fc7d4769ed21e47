//! Playwright browser automation
//!
//! A single Node process runs `bridge.js`, which owns one browser, context
//! and page for the whole run. Requests and responses are newline-delimited
//! JSON on the child's stdin/stdout; stderr is forwarded to tracing.

use std::path::Path;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopflow_common::Locator;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

/// How long the bridge may take to launch a browser
const STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Slack added on top of the engine timeout before a request is abandoned
const RESPONSE_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::InvalidConfig(format!("unknown browser: {other}"))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub default_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            default_timeout_ms: 4000,
        }
    }
}

/// One request to the bridge
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Goto { url: &'a str },
    Url,
    Fill { selector: String, value: &'a str },
    Select { selector: String, option: &'a str },
    Check { selector: String, value: Option<&'a str> },
    Click { selector: String },
    SetInputFiles { selector: String, path: String },
    Count { selector: String },
    Visible { selector: String },
    InnerText { selector: String },
    HasText { text: &'a str },
    ClearCookies,
    Screenshot { path: String },
    Close,
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    #[serde(flatten)]
    command: BridgeCommand<'a>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

/// Playwright browser handle
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
    io: Mutex<BridgeIo>,
    child: Mutex<Option<Child>>,
    /// Keeps the bridge script on disk for the lifetime of the process
    _script_dir: tempfile::TempDir,
}

impl PlaywrightHandle {
    /// Spawn the bridge and wait until the browser is up
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("shopflow-bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        info!(
            "Launching {} ({})",
            config.browser.as_str(),
            if config.headless { "headless" } else { "headed" }
        );

        let mut child = TokioCommand::new("node")
            .arg(&script_path)
            .env("SHOPFLOW_BRIDGE_CONFIG", serde_json::to_string(&BridgeConfig::from(&config))?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Bridge(format!("failed to spawn node: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "shopflow::bridge", "{}", line);
                }
            });
        }

        let mut stdout = BufReader::new(stdout).lines();
        tokio::time::timeout(STARTUP_TIMEOUT, wait_ready(&mut stdout))
            .await
            .map_err(|_| E2eError::Timeout("browser bridge startup".to_string()))??;

        debug!("Playwright bridge ready");

        Ok(Self {
            config,
            io: Mutex::new(BridgeIo {
                stdin,
                stdout,
                next_id: 0,
            }),
            child: Mutex::new(Some(child)),
            _script_dir: script_dir,
        })
    }

    /// Check if Playwright is installed
    pub fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["--no-install", "playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    async fn request(&self, command: BridgeCommand<'_>) -> E2eResult<Value> {
        let mut io = self.io.lock().await;
        io.next_id += 1;
        let id = io.next_id;

        let mut line = serde_json::to_string(&BridgeRequest { id, command })?;
        // request bodies carry passwords; log the id only
        debug!(id, "bridge request");
        line.push('\n');
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        let budget = Duration::from_millis(self.config.default_timeout_ms) + RESPONSE_GRACE;
        let response = tokio::time::timeout(budget, read_response(&mut io.stdout, id))
            .await
            .map_err(|_| E2eError::Timeout(format!("bridge response to request {id}")))??;

        if response.ok {
            Ok(response.value)
        } else {
            Err(E2eError::Playwright(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

#[derive(Serialize)]
struct BridgeConfig {
    browser: &'static str,
    headless: bool,
    viewport_width: u32,
    viewport_height: u32,
    default_timeout_ms: u64,
}

impl From<&PlaywrightConfig> for BridgeConfig {
    fn from(config: &PlaywrightConfig) -> Self {
        Self {
            browser: config.browser.as_str(),
            headless: config.headless,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            default_timeout_ms: config.default_timeout_ms,
        }
    }
}

async fn wait_ready(stdout: &mut Lines<BufReader<ChildStdout>>) -> E2eResult<()> {
    while let Some(line) = stdout.next_line().await? {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&line) {
            if map.get("ready").and_then(Value::as_bool) == Some(true) {
                return Ok(());
            }
        }
        debug!(target: "shopflow::bridge", "{}", line);
    }
    Err(E2eError::Bridge("bridge exited before it was ready".to_string()))
}

async fn read_response(
    stdout: &mut Lines<BufReader<ChildStdout>>,
    id: u64,
) -> E2eResult<BridgeResponse> {
    while let Some(line) = stdout.next_line().await? {
        match serde_json::from_str::<BridgeResponse>(&line) {
            Ok(response) if response.id == id => return Ok(response),
            Ok(stale) => debug!(id = stale.id, "discarding stale bridge response"),
            Err(_) => debug!(target: "shopflow::bridge", "{}", line),
        }
    }
    Err(E2eError::Bridge("bridge exited".to_string()))
}

fn as_bool(value: Value) -> E2eResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| E2eError::Bridge(format!("expected boolean, got {value}")))
}

#[async_trait]
impl Driver for PlaywrightHandle {
    fn name(&self) -> &str {
        self.config.browser.as_str()
    }

    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Goto { url }).await.map(|_| ())
    }

    async fn current_url(&self) -> E2eResult<String> {
        match self.request(BridgeCommand::Url).await? {
            Value::String(url) => Ok(url),
            other => Err(E2eError::Bridge(format!("expected url string, got {other}"))),
        }
    }

    async fn fill(&self, target: &Locator, value: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Fill {
            selector: target.to_playwright(),
            value,
        })
        .await
        .map(|_| ())
    }

    async fn select_option(&self, target: &Locator, option: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Select {
            selector: target.to_playwright(),
            option,
        })
        .await
        .map(|_| ())
    }

    async fn check(&self, target: &Locator, value: Option<&str>) -> E2eResult<()> {
        self.request(BridgeCommand::Check {
            selector: target.to_playwright(),
            value,
        })
        .await
        .map(|_| ())
    }

    async fn click(&self, target: &Locator) -> E2eResult<()> {
        self.request(BridgeCommand::Click {
            selector: target.to_playwright(),
        })
        .await
        .map(|_| ())
    }

    async fn set_input_files(&self, target: &Locator, file: &Path) -> E2eResult<()> {
        let path = std::fs::canonicalize(file)?;
        self.request(BridgeCommand::SetInputFiles {
            selector: target.to_playwright(),
            path: path.to_string_lossy().to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn count(&self, target: &Locator) -> E2eResult<usize> {
        let value = self
            .request(BridgeCommand::Count {
                selector: target.to_playwright(),
            })
            .await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| E2eError::Bridge(format!("expected count, got {value}")))
    }

    async fn is_visible(&self, target: &Locator) -> E2eResult<bool> {
        as_bool(
            self.request(BridgeCommand::Visible {
                selector: target.to_playwright(),
            })
            .await?,
        )
    }

    async fn inner_text(&self, target: &Locator) -> E2eResult<Option<String>> {
        match self
            .request(BridgeCommand::InnerText {
                selector: target.to_playwright(),
            })
            .await?
        {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(text)),
            other => Err(E2eError::Bridge(format!("expected text, got {other}"))),
        }
    }

    async fn has_text(&self, text: &str) -> E2eResult<bool> {
        as_bool(self.request(BridgeCommand::HasText { text }).await?)
    }

    async fn clear_cookies(&self) -> E2eResult<()> {
        self.request(BridgeCommand::ClearCookies).await.map(|_| ())
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.request(BridgeCommand::Screenshot {
            path: path.to_string_lossy().to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn close(&self) -> E2eResult<()> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = self.request(BridgeCommand::Close).await {
            debug!("bridge close request failed: {}", e);
        }

        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(Ok(status)) => {
                debug!("bridge exited with {}", status);
                return Ok(());
            }
            Ok(Err(e)) => warn!("waiting for bridge failed: {}", e),
            Err(_) => warn!("bridge did not exit, terminating"),
        }

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(Duration::from_millis(500), child.wait())
                        .await
                        .is_ok()
                {
                    return Ok(());
                }
            }
        }

        // Force kill if still running
        child.kill().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_from_str() {
        assert_eq!("Firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert_eq!("chrome".parse::<Browser>().unwrap(), Browser::Chromium);
        assert!("lynx".parse::<Browser>().is_err());
    }

    #[test]
    fn test_request_wire_format() {
        let request = BridgeRequest {
            id: 7,
            command: BridgeCommand::Check {
                selector: Locator::css(r#"input[type="radio"]"#).to_playwright(),
                value: Some("Mrs"),
            },
        };
        let json: Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["op"], "check");
        assert_eq!(json["selector"], r#"css=input[type="radio"]"#);
        assert_eq!(json["value"], "Mrs");

        let json = serde_json::to_value(BridgeRequest {
            id: 8,
            command: BridgeCommand::ClearCookies,
        })
        .unwrap();
        assert_eq!(json["op"], "clear_cookies");
    }

    #[test]
    fn test_response_parsing() {
        let ok: BridgeResponse =
            serde_json::from_str(r#"{"id":3,"ok":true,"value":2}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.value, Value::from(2));

        let err: BridgeResponse =
            serde_json::from_str(r#"{"id":4,"ok":false,"error":"Timeout 4000ms exceeded"}"#)
                .unwrap();
        assert!(!err.ok);
        assert_eq!(err.error.as_deref(), Some("Timeout 4000ms exceeded"));
    }

    #[test]
    fn test_bridge_script_handles_every_op() {
        for op in [
            "goto:", "url:", "fill:", "select:", "check:", "click:", "set_input_files:",
            "count:", "visible:", "inner_text:", "has_text:", "clear_cookies:", "screenshot:",
            "close:",
        ] {
            assert!(BRIDGE_SCRIPT.contains(op), "bridge.js lacks handler {op}");
        }
    }
}
