use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DecoyConfig;

use super::error::{AutomationError, AutomationResult};
use super::metrics::SessionMetrics;
use super::profiles::{self, DeviceProfile, ProfileSelection};

/// The single live browser/page pair plus the fingerprint it presents.
#[derive(Debug)]
pub struct Session {
    browser: Browser,
    page: Page,
    profile: &'static DeviceProfile,
    handler_task: JoinHandle<()>,
    user_data_dir: PathBuf,
}

impl Session {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }
}

/// Exclusive owner of the one browser session the process may hold.
///
/// Constructed once and shared behind a mutex with every tool handler; the
/// design assumes the dispatch boundary serializes invocations, so two
/// concurrent `acquire` calls racing each other is a documented hazard, not
/// a supported mode.
#[derive(Debug)]
pub struct SessionManager {
    config: Arc<DecoyConfig>,
    session: Option<Session>,
    rotation_index: usize,
    snapshot_cache: Option<serde_json::Value>,
    metrics: SessionMetrics,
}

impl SessionManager {
    pub fn new(config: Arc<DecoyConfig>) -> Self {
        Self {
            config,
            session: None,
            rotation_index: 0,
            snapshot_cache: None,
            metrics: SessionMetrics::default(),
        }
    }

    pub fn config(&self) -> &DecoyConfig {
        &self.config
    }

    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics.clone()
    }

    pub fn metrics_mut(&mut self) -> &mut SessionMetrics {
        &mut self.metrics
    }

    pub fn snapshot_cache(&self) -> Option<&serde_json::Value> {
        self.snapshot_cache.as_ref()
    }

    pub fn cache_snapshot(&mut self, snapshot: serde_json::Value) {
        self.snapshot_cache = Some(snapshot);
    }

    pub fn clear_snapshot_cache(&mut self) {
        self.snapshot_cache = None;
    }

    /// Rotates to a freshly fingerprinted session. Any live session is closed
    /// first; there is no reuse across acquisitions.
    pub async fn acquire(
        &mut self,
        headless: bool,
        selection: ProfileSelection,
    ) -> AutomationResult<&Session> {
        self.close().await;
        let profile = self.select_profile(selection);
        let user_data_dir = self.allocate_user_data_dir()?;
        let chromium_config = self.build_chromium_config(profile, headless, &user_data_dir)?;
        info!(
            profile = profile.name,
            ua = profile.user_agent,
            width = profile.viewport_width,
            height = profile.viewport_height,
            headless,
            "launching fingerprinted browser session"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| AutomationError::SessionCreation(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "browser handler reported error");
                }
            }
        });

        let page = match browser.new_page(CreateTargetParams::new("about:blank")).await {
            Ok(page) => page,
            Err(err) => {
                handler_task.abort();
                return Err(AutomationError::SessionCreation(format!(
                    "failed to open page: {err}"
                )));
            }
        };

        if let Err(err) = Self::configure_page(&page, profile).await {
            handler_task.abort();
            return Err(AutomationError::SessionCreation(format!(
                "failed to apply fingerprint: {err}"
            )));
        }

        self.metrics.record_session_open();
        Ok(self.session.insert(Session {
            browser,
            page,
            profile,
            handler_task,
            user_data_dir,
        }))
    }

    /// Reuses the live session when one exists, otherwise acquires a fresh
    /// one. Element-level tools go through this so a navigate/click/type
    /// sequence stays on one page.
    pub async fn ensure(
        &mut self,
        headless: bool,
        selection: ProfileSelection,
    ) -> AutomationResult<&Session> {
        if self.session.is_none() {
            self.acquire(headless, selection).await?;
        }
        self.session
            .as_ref()
            .ok_or_else(|| AutomationError::SessionCreation("session missing after acquire".into()))
    }

    /// Idempotent teardown. Safe to call with no session, and safe to call
    /// while an abandoned operation still holds a clone of the page.
    pub async fn close(&mut self) {
        self.snapshot_cache = None;
        if let Some(mut session) = self.session.take() {
            info!(profile = session.profile.name, "closing browser session");
            if let Err(err) = session.browser.close().await {
                warn!(error = %err, "failed to close browser gracefully");
            }
            session.handler_task.abort();
            if let Err(err) = std::fs::remove_dir_all(&session.user_data_dir) {
                debug!(
                    path = %session.user_data_dir.display(),
                    error = %err,
                    "failed to remove session scratch dir"
                );
            }
            self.metrics.record_session_close();
        }
    }

    fn select_profile(&mut self, selection: ProfileSelection) -> &'static DeviceProfile {
        match selection {
            ProfileSelection::Random => profiles::random_profile(),
            ProfileSelection::RoundRobin => {
                let profile = profiles::profile_by_index(self.rotation_index);
                self.rotation_index = (self.rotation_index + 1) % profiles::catalog_len();
                profile
            }
        }
    }

    fn allocate_user_data_dir(&self) -> AutomationResult<PathBuf> {
        let base = self
            .config
            .session
            .user_data_base
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("decoy-profiles"));
        let dir = base.join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn build_chromium_config(
        &self,
        profile: &DeviceProfile,
        headless: bool,
        user_data_dir: &Path,
    ) -> AutomationResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder()
            .user_data_dir(user_data_dir)
            .viewport(ChromiumViewport {
                width: profile.viewport_width,
                height: profile.viewport_height,
                device_scale_factor: Some(profile.device_scale_factor),
                emulating_mobile: profile.has_touch,
                is_landscape: profile.viewport_width >= profile.viewport_height,
                has_touch: profile.has_touch,
            });

        if let Some(executable) = &self.config.chromium.executable_path {
            builder = builder.chrome_executable(executable);
        }
        if !headless {
            builder = builder.with_head();
        }
        if !self.config.chromium.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(timeout) = self.config.chromium.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(timeout));
        }

        let mut args = vec![
            format!("--user-agent={}", profile.user_agent),
            format!("--lang={}", profile.locale),
            format!("--accept-lang={}", profile.accept_language),
            format!(
                "--window-size={},{}",
                profile.viewport_width, profile.viewport_height
            ),
        ];
        if self.config.chromium.disable_gpu {
            args.push("--disable-gpu".into());
        }
        if self.config.flags.mute_audio {
            args.push("--mute-audio".into());
        }
        if self.config.flags.no_first_run {
            args.push("--no-first-run".into());
        }
        if self.config.flags.disable_automation_controlled {
            args.push("--disable-blink-features=AutomationControlled".into());
        }
        args.extend(self.config.flags.extra_args.iter().cloned());

        builder = builder.args(args);
        builder.build().map_err(AutomationError::Configuration)
    }

    async fn configure_page(page: &Page, profile: &DeviceProfile) -> AutomationResult<()> {
        let params = SetUserAgentOverrideParams::builder()
            .user_agent(profile.user_agent)
            .accept_language(profile.accept_language)
            .platform(profile.platform)
            .build()
            .map_err(AutomationError::Configuration)?;
        page.set_user_agent(params).await?;

        let identity_script = identity_override_script(profile);
        page.evaluate_on_new_document(
            AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(identity_script)
                .build()
                .map_err(AutomationError::Configuration)?,
        )
        .await?;

        if let (Some(vendor), Some(renderer)) = (profile.webgl_vendor, profile.webgl_renderer) {
            page.evaluate_on_new_document(
                AddScriptToEvaluateOnNewDocumentParams::builder()
                    .source(webgl_override_script(vendor, renderer))
                    .build()
                    .map_err(AutomationError::Configuration)?,
            )
            .await?;
        }

        page.execute(
            SetTimezoneOverrideParams::builder()
                .timezone_id(profile.timezone)
                .build()
                .map_err(AutomationError::Configuration)?,
        )
        .await?;

        Ok(())
    }
}

fn identity_override_script(profile: &DeviceProfile) -> String {
    let user_agent = profile.user_agent;
    let platform = profile.platform;
    let locale = profile.locale;
    let color_depth = profile.color_depth;
    let max_touch_points = if profile.has_touch { 5 } else { 0 };
    format!(
        r#"
        (() => {{
            Object.defineProperty(navigator, 'userAgent', {{ get: () => '{user_agent}' }});
            Object.defineProperty(navigator, 'platform', {{ get: () => '{platform}' }});
            Object.defineProperty(navigator, 'language', {{ get: () => '{locale}' }});
            Object.defineProperty(navigator, 'languages', {{ get: () => ['{locale}', 'en'] }});
            Object.defineProperty(navigator, 'maxTouchPoints', {{ get: () => {max_touch_points} }});
            Object.defineProperty(screen, 'colorDepth', {{ get: () => {color_depth} }});
            try {{
                delete Navigator.prototype.webdriver;
            }} catch (_) {{}}
            Object.defineProperty(navigator, 'webdriver', {{ get: () => undefined }});
        }})();
        "#
    )
}

fn webgl_override_script(vendor: &str, renderer: &str) -> String {
    format!(
        r#"
        (() => {{
            const spoofParam = (proto) => {{
                if (!proto || !proto.getParameter) {{
                    return;
                }}
                const original = proto.getParameter;
                proto.getParameter = function(param) {{
                    if (param === 37445) {{
                        return '{vendor}';
                    }}
                    if (param === 37446) {{
                        return '{renderer}';
                    }}
                    return original.apply(this, arguments);
                }};
            }};
            spoofParam(WebGLRenderingContext?.prototype);
            spoofParam(WebGL2RenderingContext?.prototype);
        }})();
        "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(DecoyConfig::default()))
    }

    #[test]
    fn round_robin_walks_the_catalog_in_order() {
        let mut mgr = manager();
        let first_cycle: Vec<_> = (0..profiles::catalog_len())
            .map(|_| mgr.select_profile(ProfileSelection::RoundRobin).name)
            .collect();
        let second_cycle: Vec<_> = (0..profiles::catalog_len())
            .map(|_| mgr.select_profile(ProfileSelection::RoundRobin).name)
            .collect();
        assert_eq!(first_cycle, second_cycle);
        assert_eq!(first_cycle[0], profiles::profile_by_index(0).name);
    }

    #[tokio::test]
    async fn close_without_session_is_a_no_op() {
        let mut mgr = manager();
        mgr.cache_snapshot(serde_json::json!({"nodes": []}));
        mgr.close().await;
        mgr.close().await;
        assert!(!mgr.has_session());
        assert!(mgr.snapshot_cache().is_none());
        assert_eq!(mgr.metrics().sessions_closed, 0);
    }

    #[test]
    fn identity_script_covers_navigator_surface() {
        let profile = profiles::profile_by_index(0);
        let script = identity_override_script(profile);
        assert!(script.contains(profile.user_agent));
        assert!(script.contains(profile.platform));
        assert!(script.contains("webdriver"));
    }

    #[test]
    fn webgl_script_targets_unmasked_parameters() {
        let script = webgl_override_script("Vendor Co", "Renderer 9000");
        assert!(script.contains("37445"));
        assert!(script.contains("37446"));
        assert!(script.contains("Vendor Co"));
    }
}
