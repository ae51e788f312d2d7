use std::f64::consts::PI;
use std::time::Duration;

use rand::rngs::ThreadRng;
use rand::{thread_rng, Rng};
use tokio::time::Instant;
use tracing::{debug, warn};

use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType,
};
use chromiumoxide::element::Element;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;

use crate::config::SimulationSection;

use super::error::{AutomationError, AutomationResult};
use super::timing::TimingModel;

const MODIFIER_CTRL: i64 = 2;

/// Characters a typist naturally hesitates after.
pub fn is_pause_char(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, ',' | '.' | '?' | '!' | ';' | ':')
}

#[derive(Debug, Clone)]
pub struct KeyStep {
    pub ch: char,
    pub delay_ms: f64,
    pub pause_class: bool,
}

/// Per-invocation typing cadence: one speed draw, then a per-character delay
/// with hesitation doubling and jitter.
#[derive(Debug, Clone)]
pub struct TypingPlan {
    pub base_delay_ms: f64,
    pub steps: Vec<KeyStep>,
}

/// Synthesizes pointer trajectories, typing cadence, scrolling, and the
/// composite post-navigation interaction, all paced through [`TimingModel`].
/// One simulator serves one session; nothing here may run concurrently with
/// another behavior against the same page.
#[derive(Debug)]
pub struct InputSimulator {
    config: SimulationSection,
    timing: TimingModel,
    rng: ThreadRng,
    viewport_width: u32,
    viewport_height: u32,
}

impl InputSimulator {
    pub fn new(viewport_width: u32, viewport_height: u32, config: SimulationSection) -> Self {
        Self {
            config,
            timing: TimingModel::new(),
            rng: thread_rng(),
            viewport_width,
            viewport_height,
        }
    }

    /// Clears the field, then types `text` character by character with a
    /// human cadence. Raw key dispatch is preferred; high-level text
    /// insertion is the per-character fallback.
    pub async fn typed_entry(
        &mut self,
        page: &Page,
        element: &Element,
        text: &str,
    ) -> AutomationResult<()> {
        let plan = self.typing_plan(text);
        self.clear_field(page, element).await;
        element.focus().await?;
        for step in &plan.steps {
            if let Err(err) = self.press_char(page, step.ch).await {
                debug!(ch = %step.ch, error = %err, "key dispatch failed, falling back to text insertion");
                element.type_str(step.ch.to_string()).await?;
            }
            let delay = step.delay_ms.round() as u64;
            self.timing.pause(delay, delay + 50).await;
        }
        let [min, max] = self.config.typing_closing_pause_ms;
        self.timing.pause(min, max).await;
        Ok(())
    }

    pub fn typing_plan(&mut self, text: &str) -> TypingPlan {
        let [min_cpm, max_cpm] = self.config.typing_cadence_cpm;
        let speed = self.rng.gen_range(min_cpm..=max_cpm).max(1) as f64;
        let base_delay_ms = 60_000.0 / speed;
        let [jitter_min, jitter_max] = self.config.typing_jitter;
        let steps = text
            .chars()
            .map(|ch| {
                let pause_class = is_pause_char(ch);
                let mut factor = self.rng.gen_range(jitter_min..=jitter_max);
                if pause_class {
                    factor *= self.config.pause_char_factor;
                }
                KeyStep {
                    ch,
                    delay_ms: base_delay_ms * factor,
                    pause_class,
                }
            })
            .collect();
        TypingPlan {
            base_delay_ms,
            steps,
        }
    }

    /// Moves the cursor to a core-biased point inside the element's bounding
    /// box along a jittered multi-step path and returns the landing point.
    pub async fn move_to_element(
        &mut self,
        page: &Page,
        element: &Element,
    ) -> AutomationResult<Point> {
        let bbox = element.bounding_box().await.map_err(|err| {
            AutomationError::ElementNotFound(format!("element has no bounding box: {err}"))
        })?;
        let target = self.target_point(bbox.x, bbox.y, bbox.width, bbox.height);
        let start = self.viewport_point();
        let [min, max] = self.config.pointer_step_pause_ms;
        for point in self.pointer_path(start, target) {
            page.move_mouse(point).await?;
            self.timing.pause(min, max).await;
        }
        Ok(target)
    }

    /// Approach, hesitate, click, settle.
    pub async fn click_with_approach(
        &mut self,
        page: &Page,
        element: &Element,
    ) -> AutomationResult<()> {
        self.move_to_element(page, element).await?;
        let [min, max] = self.config.click_hesitation_ms;
        self.timing.pause(min, max).await;
        element.click().await?;
        let [min, max] = self.config.click_settle_ms;
        self.timing.pause(min, max).await;
        Ok(())
    }

    /// Wanders the cursor across the viewport until `total` wall-clock time
    /// has elapsed, not for a fixed number of moves.
    pub async fn idle_scan(&mut self, page: &Page, total: Duration) -> AutomationResult<()> {
        let started = Instant::now();
        let [speed_min, speed_max] = self.config.scan_move_delay_ms;
        while started.elapsed() < total {
            let point = self.viewport_point();
            page.move_mouse(point).await?;
            let speed = self.rng.gen_range(speed_min..=speed_max);
            self.timing.pause(speed, speed + 30).await;
        }
        Ok(())
    }

    /// Emits 2-4 smooth scrolls, mostly downward, paced like a reader.
    pub async fn scroll_sequence(&mut self, page: &Page) -> AutomationResult<()> {
        let [min, max] = self.config.scroll_pause_ms;
        for delta in self.scroll_plan() {
            let js = format!("window.scrollBy({{ top: {delta}, behavior: 'smooth' }});");
            page.evaluate(js.as_str()).await?;
            self.timing.pause(min, max).await;
        }
        Ok(())
    }

    pub fn scroll_plan(&mut self) -> Vec<f64> {
        let [min_events, max_events] = self.config.scroll_events;
        let count = self.rng.gen_range(min_events..=max_events) as usize;
        let viewport = self.viewport_height as f64;
        (0..count)
            .map(|_| {
                let magnitude = (0.75 + self.rng.gen::<f64>() * 0.5) * viewport;
                if self.rng.gen_bool(self.config.scroll_down_bias) {
                    magnitude
                } else {
                    -magnitude
                }
            })
            .collect()
    }

    /// Default post-navigation choreography: read, scan, scroll, scan, read.
    pub async fn page_interaction(&mut self, page: &Page) -> AutomationResult<()> {
        self.timing.pause(1_000, 2_000).await;
        let scan = self.rng.gen_range(1_000..=2_000);
        self.idle_scan(page, Duration::from_millis(scan)).await?;
        self.scroll_sequence(page).await?;
        let scan = self.rng.gen_range(500..=1_000);
        self.idle_scan(page, Duration::from_millis(scan)).await?;
        self.timing.pause(1_500, 3_000).await;
        Ok(())
    }

    /// Interpolated path from `start` to `target`. Jitter follows a
    /// `sin(progress * pi)` envelope: zero at both endpoints, widest at the
    /// midpoint.
    pub fn pointer_path(&mut self, start: Point, target: Point) -> Vec<Point> {
        let [min_steps, max_steps] = self.config.pointer_steps;
        let steps = self.rng.gen_range(min_steps..=max_steps).max(1) as usize;
        let amp = self.config.pointer_jitter_px;
        let mut points = Vec::with_capacity(steps + 1);
        for idx in 0..=steps {
            let progress = idx as f64 / steps as f64;
            let envelope = (progress * PI).sin();
            let jitter_x = envelope * self.rng.gen_range(-amp..=amp);
            let jitter_y = envelope * self.rng.gen_range(-amp..=amp);
            points.push(Point::new(
                start.x + (target.x - start.x) * progress + jitter_x,
                start.y + (target.y - start.y) * progress + jitter_y,
            ));
        }
        points
    }

    /// Uniform point biased into the central 25-75% band of the box.
    pub fn target_point(&mut self, x: f64, y: f64, width: f64, height: f64) -> Point {
        Point::new(
            x + width * (0.25 + self.rng.gen::<f64>() * 0.5),
            y + height * (0.25 + self.rng.gen::<f64>() * 0.5),
        )
    }

    /// Stand-in for the unknown current cursor position.
    pub fn viewport_point(&mut self) -> Point {
        Point::new(
            self.rng.gen_range(0.0..self.viewport_width as f64),
            self.rng.gen_range(0.0..self.viewport_height as f64),
        )
    }

    async fn clear_field(&mut self, page: &Page, element: &Element) {
        let cleared = element
            .call_js_fn(
                "function() { this.value = ''; this.dispatchEvent(new Event('input', { bubbles: true })); }",
                false,
            )
            .await;
        match cleared {
            Ok(_) => return,
            Err(err) => {
                debug!(error = %err, "direct value clear failed, trying select-all");
            }
        }
        if let Err(err) = self.select_all_delete(page, element).await {
            warn!(error = %err, "could not clear field before typing");
        }
    }

    async fn select_all_delete(&mut self, page: &Page, element: &Element) -> AutomationResult<()> {
        element.focus().await?;
        self.key_event(page, DispatchKeyEventType::KeyDown, "a", MODIFIER_CTRL)
            .await?;
        self.key_event(page, DispatchKeyEventType::KeyUp, "a", MODIFIER_CTRL)
            .await?;
        self.key_event(page, DispatchKeyEventType::KeyDown, "Delete", 0)
            .await?;
        self.key_event(page, DispatchKeyEventType::KeyUp, "Delete", 0)
            .await?;
        Ok(())
    }

    async fn press_char(&self, page: &Page, ch: char) -> AutomationResult<()> {
        let params = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .text(ch.to_string())
            .build()
            .map_err(AutomationError::Configuration)?;
        page.execute(params).await?;
        Ok(())
    }

    async fn key_event(
        &self,
        page: &Page,
        kind: DispatchKeyEventType,
        key: &str,
        modifiers: i64,
    ) -> AutomationResult<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key.to_string());
        if modifiers != 0 {
            builder = builder.modifiers(modifiers);
        }
        let params = builder.build().map_err(AutomationError::Configuration)?;
        page.execute(params).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator() -> InputSimulator {
        InputSimulator::new(1280, 800, SimulationSection::default())
    }

    #[test]
    fn typing_plan_preserves_text_and_cadence_bounds() {
        let mut sim = simulator();
        let plan = sim.typing_plan("Hello, world!");
        let typed: String = plan.steps.iter().map(|s| s.ch).collect();
        assert_eq!(typed, "Hello, world!");
        // 200..500 cpm maps to 120..300 ms per character.
        assert!(plan.base_delay_ms >= 120.0 && plan.base_delay_ms <= 300.0);
    }

    #[test]
    fn pause_characters_are_observably_slower() {
        let mut sim = simulator();
        for _ in 0..100 {
            let plan = sim.typing_plan("Hello, world!");
            for step in &plan.steps {
                if step.pause_class {
                    assert!(
                        step.delay_ms >= 1.5 * plan.base_delay_ms,
                        "pause char '{}' too fast: {} vs base {}",
                        step.ch,
                        step.delay_ms,
                        plan.base_delay_ms
                    );
                } else {
                    assert!(step.delay_ms <= 1.25 * plan.base_delay_ms);
                }
            }
        }
    }

    #[test]
    fn comma_and_space_flagged_as_pause_chars() {
        assert!(is_pause_char(','));
        assert!(is_pause_char(' '));
        assert!(is_pause_char('!'));
        assert!(!is_pause_char('H'));
        assert!(!is_pause_char('9'));
    }

    #[test]
    fn pointer_path_jitter_is_pinned_at_endpoints() {
        let mut sim = simulator();
        let start = Point::new(10.0, 20.0);
        let target = Point::new(900.0, 600.0);
        for _ in 0..200 {
            let path = sim.pointer_path(start, target);
            // 5..=10 interpolation steps yields 6..=11 points.
            assert!(path.len() >= 6 && path.len() <= 11);
            let steps = path.len() - 1;
            for (idx, point) in path.iter().enumerate() {
                let progress = idx as f64 / steps as f64;
                let expected_x = start.x + (target.x - start.x) * progress;
                let expected_y = start.y + (target.y - start.y) * progress;
                let bound = 10.0 * (progress * PI).sin() + 1e-6;
                assert!(
                    (point.x - expected_x).abs() <= bound,
                    "x deviation {} exceeds envelope {} at step {}",
                    (point.x - expected_x).abs(),
                    bound,
                    idx
                );
                assert!((point.y - expected_y).abs() <= bound);
            }
            // Endpoints carry no jitter at all.
            assert!((path[0].x - start.x).abs() < 1e-9);
            assert!((path[0].y - start.y).abs() < 1e-9);
            assert!((path[steps].x - target.x).abs() < 1e-6);
            assert!((path[steps].y - target.y).abs() < 1e-6);
        }
    }

    #[test]
    fn target_point_lands_in_core_band() {
        let mut sim = simulator();
        for _ in 0..500 {
            let point = sim.target_point(100.0, 50.0, 200.0, 80.0);
            assert!(point.x >= 150.0 && point.x <= 250.0);
            assert!(point.y >= 70.0 && point.y <= 110.0);
        }
    }

    #[test]
    fn scroll_plan_respects_count_and_magnitude() {
        let mut sim = simulator();
        let viewport = 800.0;
        let mut downs = 0u32;
        let mut ups = 0u32;
        for _ in 0..500 {
            let plan = sim.scroll_plan();
            assert!(plan.len() >= 2 && plan.len() <= 4);
            for delta in plan {
                let magnitude = delta.abs();
                assert!(magnitude >= 0.75 * viewport && magnitude <= 1.25 * viewport);
                if delta > 0.0 {
                    downs += 1;
                } else {
                    ups += 1;
                }
            }
        }
        assert!(downs > ups, "downward bias missing: {downs} vs {ups}");
        assert!(ups > 0, "upward scrolls should still occur");
    }

    #[test]
    fn viewport_point_stays_inside_viewport() {
        let mut sim = simulator();
        for _ in 0..500 {
            let point = sim.viewport_point();
            assert!(point.x >= 0.0 && point.x < 1280.0);
            assert!(point.y >= 0.0 && point.y < 800.0);
        }
    }
}
