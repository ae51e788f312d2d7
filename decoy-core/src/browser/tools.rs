use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::accessibility::GetFullAxTreeParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams};
use chromiumoxide::page::ScreenshotParams;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::DecoyConfig;

use super::error::{AutomationError, AutomationResult};
use super::guard::{ExecutionGuard, GuardPolicy};
use super::metrics::SessionMetrics;
use super::session::SessionManager;
use super::simulate::InputSimulator;

/// The named operations exposed over the dispatch boundary. Every handler
/// runs through the execution guard; the guard alone decides whether the
/// session survives a failure.
#[derive(Debug)]
pub struct BrowserTools {
    config: Arc<DecoyConfig>,
    sessions: Arc<Mutex<SessionManager>>,
    guard: ExecutionGuard,
}

impl BrowserTools {
    pub fn new(config: DecoyConfig) -> Self {
        let config = Arc::new(config);
        let sessions = Arc::new(Mutex::new(SessionManager::new(Arc::clone(&config))));
        let guard = ExecutionGuard::new(
            Arc::clone(&sessions),
            GuardPolicy::from_section(&config.guard),
        );
        Self {
            config,
            sessions,
            guard,
        }
    }

    pub fn session_manager(&self) -> Arc<Mutex<SessionManager>> {
        Arc::clone(&self.sessions)
    }

    pub async fn metrics(&self) -> SessionMetrics {
        self.sessions.lock().await.metrics()
    }

    /// Closes the session without going through the guard. Used at process
    /// shutdown; failures are logged inside `SessionManager::close`.
    pub async fn shutdown(&self) {
        self.sessions.lock().await.close().await;
    }

    /// Navigates and then behaves like a reader on the landed page.
    pub async fn navigate(&self, url: &str) -> AutomationResult<String> {
        let sessions = Arc::clone(&self.sessions);
        let config = Arc::clone(&self.config);
        let url = url.to_string();
        self.guard
            .execute("navigate", move |_| {
                let sessions = Arc::clone(&sessions);
                let config = Arc::clone(&config);
                let url = url.clone();
                async move {
                    let mut mgr = sessions.lock().await;
                    let session = mgr
                        .ensure(config.chromium.headless, config.session.profile_selection)
                        .await?;
                    let page = session.page().clone();
                    let profile = session.profile();
                    let params = NavigateParams::builder()
                        .url(url.clone())
                        .build()
                        .map_err(AutomationError::Configuration)?;
                    page.goto(params).await?;
                    page.wait_for_navigation().await?;
                    mgr.clear_snapshot_cache();
                    mgr.metrics_mut().record_navigation();
                    let mut sim = InputSimulator::new(
                        profile.viewport_width,
                        profile.viewport_height,
                        config.simulation.clone(),
                    );
                    sim.page_interaction(&page).await?;
                    let title = page.get_title().await?.unwrap_or_default();
                    info!(url = %url, title = %title, "navigation complete");
                    Ok(format!("navigated to {url} ({title})"))
                }
            })
            .await
    }

    /// Human-paced click on the first element matching `selector`.
    pub async fn click(&self, selector: &str) -> AutomationResult<String> {
        let sessions = Arc::clone(&self.sessions);
        let config = Arc::clone(&self.config);
        let selector = selector.to_string();
        self.guard
            .execute("click", move |_| {
                let sessions = Arc::clone(&sessions);
                let config = Arc::clone(&config);
                let selector = selector.clone();
                async move {
                    let mut mgr = sessions.lock().await;
                    let session = mgr
                        .ensure(config.chromium.headless, config.session.profile_selection)
                        .await?;
                    let page = session.page().clone();
                    let profile = session.profile();
                    let element = page
                        .find_element(selector.clone())
                        .await
                        .map_err(|_| AutomationError::ElementNotFound(selector.clone()))?;
                    let mut sim = InputSimulator::new(
                        profile.viewport_width,
                        profile.viewport_height,
                        config.simulation.clone(),
                    );
                    sim.click_with_approach(&page, &element).await?;
                    mgr.clear_snapshot_cache();
                    mgr.metrics_mut().record_click();
                    Ok(format!("clicked {selector}"))
                }
            })
            .await
    }

    /// Clicks into the field, clears it, and types `text` with a human
    /// cadence.
    pub async fn type_text(&self, selector: &str, text: &str) -> AutomationResult<String> {
        let sessions = Arc::clone(&self.sessions);
        let config = Arc::clone(&self.config);
        let selector = selector.to_string();
        let text = text.to_string();
        self.guard
            .execute("type", move |_| {
                let sessions = Arc::clone(&sessions);
                let config = Arc::clone(&config);
                let selector = selector.clone();
                let text = text.clone();
                async move {
                    let mut mgr = sessions.lock().await;
                    let session = mgr
                        .ensure(config.chromium.headless, config.session.profile_selection)
                        .await?;
                    let page = session.page().clone();
                    let profile = session.profile();
                    let element = page
                        .find_element(selector.clone())
                        .await
                        .map_err(|_| AutomationError::ElementNotFound(selector.clone()))?;
                    let mut sim = InputSimulator::new(
                        profile.viewport_width,
                        profile.viewport_height,
                        config.simulation.clone(),
                    );
                    sim.click_with_approach(&page, &element).await?;
                    sim.typed_entry(&page, &element, &text).await?;
                    mgr.clear_snapshot_cache();
                    mgr.metrics_mut().record_click();
                    mgr.metrics_mut()
                        .record_keystrokes(text.chars().count() as u64);
                    Ok(format!("typed {} characters into {selector}", text.chars().count()))
                }
            })
            .await
    }

    /// PNG capture of the page, or of one element, as base64.
    pub async fn screenshot(&self, selector: Option<&str>) -> AutomationResult<String> {
        let sessions = Arc::clone(&self.sessions);
        let config = Arc::clone(&self.config);
        let selector = selector.map(str::to_string);
        self.guard
            .execute("screenshot", move |_| {
                let sessions = Arc::clone(&sessions);
                let config = Arc::clone(&config);
                let selector = selector.clone();
                async move {
                    let mut mgr = sessions.lock().await;
                    let session = mgr
                        .ensure(config.chromium.headless, config.session.profile_selection)
                        .await?;
                    let page = session.page().clone();
                    let bytes = match &selector {
                        Some(sel) => {
                            let element = page
                                .find_element(sel.clone())
                                .await
                                .map_err(|_| AutomationError::ElementNotFound(sel.clone()))?;
                            element.screenshot(CaptureScreenshotFormat::Png).await?
                        }
                        None => {
                            page.screenshot(
                                ScreenshotParams::builder()
                                    .format(CaptureScreenshotFormat::Png)
                                    .build(),
                            )
                            .await?
                        }
                    };
                    mgr.metrics_mut().record_screenshot();
                    Ok(BASE64.encode(bytes))
                }
            })
            .await
    }

    /// Accessibility tree of the current page as pretty JSON. The result is
    /// cached until navigation, a click, or a session teardown invalidates
    /// it.
    pub async fn snapshot(&self) -> AutomationResult<String> {
        let sessions = Arc::clone(&self.sessions);
        let config = Arc::clone(&self.config);
        self.guard
            .execute("snapshot", move |_| {
                let sessions = Arc::clone(&sessions);
                let config = Arc::clone(&config);
                async move {
                    let mut mgr = sessions.lock().await;
                    if let Some(cached) = mgr.snapshot_cache() {
                        return serde_json::to_string_pretty(cached)
                            .map_err(|err| AutomationError::Configuration(err.to_string()));
                    }
                    let session = mgr
                        .ensure(config.chromium.headless, config.session.profile_selection)
                        .await?;
                    let page = session.page().clone();
                    let response = page
                        .execute(GetFullAxTreeParams::builder().build())
                        .await?;
                    let nodes = serde_json::to_value(&response.result.nodes)
                        .map_err(|err| AutomationError::Configuration(err.to_string()))?;
                    let rendered = serde_json::to_string_pretty(&nodes)
                        .map_err(|err| AutomationError::Configuration(err.to_string()))?;
                    mgr.cache_snapshot(nodes);
                    mgr.metrics_mut().record_snapshot();
                    Ok(rendered)
                }
            })
            .await
    }

    /// Runs the composite page-interaction choreography on the current page.
    pub async fn interact(&self) -> AutomationResult<String> {
        let sessions = Arc::clone(&self.sessions);
        let config = Arc::clone(&self.config);
        self.guard
            .execute("interact", move |_| {
                let sessions = Arc::clone(&sessions);
                let config = Arc::clone(&config);
                async move {
                    let mut mgr = sessions.lock().await;
                    let session = mgr
                        .ensure(config.chromium.headless, config.session.profile_selection)
                        .await?;
                    let page = session.page().clone();
                    let profile = session.profile();
                    let mut sim = InputSimulator::new(
                        profile.viewport_width,
                        profile.viewport_height,
                        config.simulation.clone(),
                    );
                    sim.page_interaction(&page).await?;
                    Ok("page interaction complete".to_string())
                }
            })
            .await
    }

    /// Forces a fresh session with a newly selected fingerprint.
    pub async fn rotate_session(&self) -> AutomationResult<String> {
        let sessions = Arc::clone(&self.sessions);
        let config = Arc::clone(&self.config);
        self.guard
            .execute("rotate_session", move |_| {
                let sessions = Arc::clone(&sessions);
                let config = Arc::clone(&config);
                async move {
                    let mut mgr = sessions.lock().await;
                    let session = mgr
                        .acquire(config.chromium.headless, config.session.profile_selection)
                        .await?;
                    Ok(format!("rotated to profile {}", session.profile().name))
                }
            })
            .await
    }
}
