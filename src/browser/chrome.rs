//! Headless Chromium page renderer.
//!
//! Launches a Chromium-family browser with a throw-away profile, drives it
//! over the DevTools protocol and waits for the page to settle:
//!
//! 1. `Page.navigate` (fails on `errorText`)
//! 2. `load` lifecycle event for the new loader
//! 3. `networkIdle` lifecycle event (optional)
//! 4. `MathJax.startup.promise`, when the page defines one (optional)
//! 5. a fixed grace delay
//!
//! Each wait is bounded by [`SettleConfig::timeout`]; exceeding it is a
//! navigation error.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cdp::CdpConnection;
use super::locate::{locate_chrome, CHROME_ENV};
use crate::config::{Granularity, SettleConfig};
use crate::error::{CheckError, Result};
use crate::page::{MarkupSource, PageRenderer, RawHost, SettledPage, TextSource};

const DEVTOOLS_PREFIX: &str = "DevTools listening on ";

/// Resolves once MathJax has finished its startup typeset; `false` when the
/// page does not use MathJax.
const MATHJAX_READY: &str = r"(() => {
  const mj = window.MathJax;
  if (mj && mj.startup && mj.startup.promise) {
    return mj.startup.promise.then(() => true, () => true);
  }
  return false;
})()";

/// Browser launch options.
#[derive(Debug, Clone, Default)]
pub struct ChromeOptions {
    /// Executable to launch; located automatically when `None`.
    pub executable: Option<PathBuf>,
    /// Extra command-line switches (e.g. `--no-sandbox` in containers).
    pub extra_args: Vec<String>,
}

/// A running headless browser.
pub struct ChromeRenderer {
    conn: Arc<Mutex<CdpConnection>>,
    child: Mutex<Child>,
    profile_dir: PathBuf,
    settle: SettleConfig,
}

impl ChromeRenderer {
    /// Launch the browser and connect to its DevTools endpoint.
    pub async fn launch(options: ChromeOptions, settle: SettleConfig) -> Result<Self> {
        let executable = options.executable.or_else(locate_chrome).ok_or_else(|| {
            CheckError::Browser(format!(
                "no Chromium-based browser found; install one, set {CHROME_ENV} or pass --chrome"
            ))
        })?;

        let profile_dir = std::env::temp_dir().join(format!("mathcheck-{}", Uuid::new_v4()));
        let args = launch_args(&profile_dir, &options.extra_args);

        info!("Launching {}", executable.display());
        debug!("Browser args: {:?}", args);

        let mut child = Command::new(&executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CheckError::Browser(format!("failed to launch {}: {e}", executable.display()))
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CheckError::Browser("browser stderr not captured".into()))?;

        let ws_url = tokio::time::timeout(settle.timeout, devtools_url(stderr))
            .await
            .map_err(|_| CheckError::Browser("timed out waiting for the DevTools endpoint".into()))??;

        let conn = CdpConnection::connect(&ws_url)
            .await
            .map_err(|e| CheckError::browser(&e))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            child: Mutex::new(child),
            profile_dir,
            settle,
        })
    }

    /// Ask the browser to close and wait for it to exit.
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut conn = self.conn.lock().await;
            if let Err(e) = conn
                .call("Browser.close", json!({}), None, self.settle.timeout)
                .await
            {
                debug!("Browser.close: {e:#}");
            }
            let _ = conn.close().await;
        }

        let mut child = self.child.lock().await;
        if tokio::time::timeout(Duration::from_secs(5), child.wait()).await.is_err() {
            warn!("Browser did not exit, killing it");
            child.kill().await?;
        }

        // the browser has exited, nothing writes to the profile any more
        remove_profile(&self.profile_dir).await?;
        debug!("Removed profile {}", self.profile_dir.display());
        Ok(())
    }
}

impl Drop for ChromeRenderer {
    fn drop(&mut self) {
        // fallback when shutdown() was skipped; the child may still be exiting
        let _ = self.child.get_mut().start_kill();
        let _ = std::fs::remove_dir_all(&self.profile_dir);
    }
}

/// Remove a profile directory. A directory that is already gone is fine.
async fn remove_profile(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn settle(&self, url: &str) -> Result<Box<dyn SettledPage>> {
        let timeout = self.settle.timeout;
        let mut conn = self.conn.lock().await;

        let target = conn
            .call("Target.createTarget", json!({ "url": "about:blank" }), None, timeout)
            .await
            .map_err(|e| CheckError::browser(&e))?;
        let target_id = string_field(&target, "targetId")?;

        let attached = conn
            .call(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                None,
                timeout,
            )
            .await
            .map_err(|e| CheckError::browser(&e))?;
        let session = string_field(&attached, "sessionId")?;

        for (method, params) in [
            ("Page.enable", json!({})),
            ("Page.setLifecycleEventsEnabled", json!({ "enabled": true })),
        ] {
            conn.call(method, params, Some(&session), timeout)
                .await
                .map_err(|e| CheckError::browser(&e))?;
        }
        // lifecycle replay for about:blank
        conn.clear_events();

        info!("Navigating to {}", url);
        let nav = conn
            .call("Page.navigate", json!({ "url": url }), Some(&session), timeout)
            .await
            .map_err(|e| CheckError::navigation(url, format!("{e:#}")))?;

        if let Some(error) = nav.get("errorText").and_then(Value::as_str) {
            if !error.is_empty() {
                return Err(CheckError::navigation(url, error));
            }
        }

        // same-document navigations have no loader and nothing to wait for
        if let Some(loader) = nav.get("loaderId").and_then(Value::as_str) {
            wait_lifecycle(&mut conn, &session, loader, "load", url, timeout).await?;
            debug!("Load event fired");
            if self.settle.wait_for_network_idle {
                wait_lifecycle(&mut conn, &session, loader, "networkIdle", url, timeout).await?;
                debug!("Network idle");
            }
        }

        if self.settle.await_mathjax {
            let ready = tokio::time::timeout(
                timeout,
                evaluate(&mut conn, &session, MATHJAX_READY, true, timeout),
            )
            .await
            .map_err(|_| CheckError::navigation(url, "timed out waiting for MathJax startup"))??;
            if ready == Value::Bool(true) {
                debug!("MathJax startup finished");
            }
        }

        drop(conn);
        tokio::time::sleep(self.settle.grace).await;
        info!("Page settled: {}", url);

        Ok(Box::new(ChromePage {
            conn: Arc::clone(&self.conn),
            session,
            timeout,
        }))
    }
}

/// A settled browser tab.
struct ChromePage {
    conn: Arc<Mutex<CdpConnection>>,
    session: String,
    timeout: Duration,
}

impl ChromePage {
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let mut conn = self.conn.lock().await;
        evaluate(&mut conn, &self.session, expression, false, self.timeout).await
    }
}

#[async_trait]
impl TextSource for ChromePage {
    async fn text_units(&self, scope: &str, granularity: Granularity) -> Result<Option<Vec<String>>> {
        let value = self.evaluate(&text_units_script(scope, granularity)?).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl MarkupSource for ChromePage {
    async fn host_markup(&self, scope: &str, hosts: &str) -> Result<Option<Vec<RawHost>>> {
        let value = self.evaluate(&host_markup_script(scope, hosts)?).await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn launch_args(profile_dir: &Path, extra: &[String]) -> Vec<String> {
    let mut args: Vec<String> = [
        "--headless=new",
        "--disable-gpu",
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-extensions",
        "--hide-scrollbars",
        "--mute-audio",
        "--remote-debugging-port=0",
    ]
    .iter()
    .map(std::string::ToString::to_string)
    .collect();
    args.push(format!("--user-data-dir={}", profile_dir.display()));
    args.extend(extra.iter().cloned());
    args.push("about:blank".to_string());
    args
}

/// The `ws://` URL from a `DevTools listening on ...` stderr line.
fn parse_devtools_line(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix(DEVTOOLS_PREFIX)
        .map(str::trim)
        .filter(|url| url.starts_with("ws://"))
}

async fn devtools_url(stderr: ChildStderr) -> Result<String> {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await? {
            Some(line) => {
                if let Some(url) = parse_devtools_line(&line) {
                    let url = url.to_string();
                    tokio::spawn(drain_stderr(lines));
                    return Ok(url);
                }
                debug!(target: "chrome", "{}", line);
            }
            None => {
                return Err(CheckError::Browser(
                    "browser exited before opening the DevTools endpoint".into(),
                ))
            }
        }
    }
}

/// Keep reading so the browser never blocks on a full pipe.
async fn drain_stderr(mut lines: Lines<BufReader<ChildStderr>>) {
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "chrome", "{}", line);
    }
}

async fn wait_lifecycle(
    conn: &mut CdpConnection,
    session: &str,
    loader: &str,
    name: &str,
    url: &str,
    timeout: Duration,
) -> Result<()> {
    conn.wait_event(
        |event| {
            event.is("Page.lifecycleEvent", session)
                && event.params.get("name").and_then(Value::as_str) == Some(name)
                && event.params.get("loaderId").and_then(Value::as_str) == Some(loader)
        },
        timeout,
    )
    .await
    .map_err(|e| CheckError::navigation(url, format!("waiting for {name}: {e:#}")))?;
    Ok(())
}

async fn evaluate(
    conn: &mut CdpConnection,
    session: &str,
    expression: &str,
    await_promise: bool,
    timeout: Duration,
) -> Result<Value> {
    let response = conn
        .call(
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "returnByValue": true,
                "awaitPromise": await_promise,
            }),
            Some(session),
            timeout,
        )
        .await
        .map_err(|e| CheckError::browser(&e))?;
    evaluation_value(response)
}

/// Unwrap a `Runtime.evaluate` result, turning a thrown exception into an
/// error.
fn evaluation_value(mut response: Value) -> Result<Value> {
    if let Some(details) = response.get("exceptionDetails") {
        let message = details
            .pointer("/exception/description")
            .or_else(|| details.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("script threw");
        return Err(CheckError::Protocol(message.to_string()));
    }
    Ok(response
        .pointer_mut("/result/value")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

fn string_field(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CheckError::Protocol(format!("response has no `{field}`")))
}

fn text_units_script(scope: &str, granularity: Granularity) -> Result<String> {
    let scope = serde_json::to_string(scope)?;
    let strict = granularity == Granularity::SingleTextChild;
    Ok(format!(
        r"(() => {{
  const root = document.querySelector({scope});
  if (!root) return null;
  const strict = {strict};
  return Array.from(root.querySelectorAll('*'))
    .filter(el => !el.closest('script, style, noscript, template'))
    .filter(el => !strict || (el.childNodes.length === 1 && el.childNodes[0].nodeType === Node.TEXT_NODE))
    .map(el => el.innerText ?? el.textContent ?? '');
}})()"
    ))
}

fn host_markup_script(scope: &str, hosts: &str) -> Result<String> {
    let scope = serde_json::to_string(scope)?;
    let hosts = serde_json::to_string(hosts)?;
    Ok(format!(
        r"(() => {{
  const root = document.querySelector({scope});
  if (!root) return null;
  const hosts = {hosts};
  return Array.from(root.querySelectorAll(hosts))
    .filter(el => !el.closest('script, style, noscript, template'))
    .filter(el => {{
      const outer = el.parentElement && el.parentElement.closest(hosts);
      return !(outer && outer !== root && root.contains(outer));
    }})
    .map(el => ({{ markup: el.innerHTML, shadow: el.shadowRoot ? el.shadowRoot.innerHTML : null }}));
}})()"
    ))
}
