use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One fixed fingerprint the browser can present. Entries are immutable
/// catalog data; fields must stay internally consistent (a touch-capable
/// profile carries a mobile platform string).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub user_agent: &'static str,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: &'static str,
    pub timezone: &'static str,
    pub platform: &'static str,
    pub webgl_vendor: Option<&'static str>,
    pub webgl_renderer: Option<&'static str>,
    pub accept_language: &'static str,
    pub device_scale_factor: f64,
    pub color_depth: u32,
    pub has_touch: bool,
}

/// How the session manager picks a profile for a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSelection {
    Random,
    RoundRobin,
}

static CATALOG: &[DeviceProfile] = &[
    DeviceProfile {
        name: "windows-chrome",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport_width: 1920,
        viewport_height: 1080,
        locale: "en-US",
        timezone: "America/New_York",
        platform: "Win32",
        webgl_vendor: Some("Google Inc. (NVIDIA)"),
        webgl_renderer: Some("ANGLE (NVIDIA, NVIDIA GeForce RTX 3060 Direct3D11 vs_5_0 ps_5_0, D3D11)"),
        accept_language: "en-US,en;q=0.9",
        device_scale_factor: 1.0,
        color_depth: 24,
        has_touch: false,
    },
    DeviceProfile {
        name: "windows-chrome-laptop",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        viewport_width: 1536,
        viewport_height: 864,
        locale: "en-US",
        timezone: "America/Chicago",
        platform: "Win32",
        webgl_vendor: Some("Google Inc. (Intel)"),
        webgl_renderer: Some("ANGLE (Intel, Intel(R) Iris(R) Xe Graphics Direct3D11 vs_5_0 ps_5_0, D3D11)"),
        accept_language: "en-US,en;q=0.9",
        device_scale_factor: 1.25,
        color_depth: 24,
        has_touch: false,
    },
    DeviceProfile {
        name: "macos-chrome",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport_width: 1440,
        viewport_height: 900,
        locale: "en-US",
        timezone: "America/Los_Angeles",
        platform: "MacIntel",
        webgl_vendor: Some("Google Inc. (Apple)"),
        webgl_renderer: Some("ANGLE (Apple, ANGLE Metal Renderer: Apple M1, Unspecified Version)"),
        accept_language: "en-US,en;q=0.9",
        device_scale_factor: 2.0,
        color_depth: 30,
        has_touch: false,
    },
    DeviceProfile {
        name: "macos-chrome-fr",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        viewport_width: 1680,
        viewport_height: 1050,
        locale: "fr-FR",
        timezone: "Europe/Paris",
        platform: "MacIntel",
        webgl_vendor: Some("Google Inc. (Apple)"),
        webgl_renderer: Some("ANGLE (Apple, ANGLE Metal Renderer: Apple M2, Unspecified Version)"),
        accept_language: "fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7",
        device_scale_factor: 2.0,
        color_depth: 30,
        has_touch: false,
    },
    DeviceProfile {
        name: "linux-chrome",
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport_width: 1920,
        viewport_height: 1080,
        locale: "en-GB",
        timezone: "Europe/London",
        platform: "Linux x86_64",
        webgl_vendor: Some("Google Inc. (Intel)"),
        webgl_renderer: Some("ANGLE (Intel, Mesa Intel(R) UHD Graphics 630 (CFL GT2), OpenGL 4.6)"),
        accept_language: "en-GB,en;q=0.9",
        device_scale_factor: 1.0,
        color_depth: 24,
        has_touch: false,
    },
    DeviceProfile {
        name: "windows-chrome-de",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        viewport_width: 2560,
        viewport_height: 1440,
        locale: "de-DE",
        timezone: "Europe/Berlin",
        platform: "Win32",
        webgl_vendor: Some("Google Inc. (AMD)"),
        webgl_renderer: Some("ANGLE (AMD, AMD Radeon RX 6700 XT Direct3D11 vs_5_0 ps_5_0, D3D11)"),
        accept_language: "de-DE,de;q=0.9,en;q=0.8",
        device_scale_factor: 1.0,
        color_depth: 24,
        has_touch: false,
    },
    DeviceProfile {
        name: "android-pixel",
        user_agent: "Mozilla/5.0 (Linux; Android 14; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
        viewport_width: 412,
        viewport_height: 915,
        locale: "en-US",
        timezone: "America/Denver",
        platform: "Linux armv8l",
        webgl_vendor: Some("Google Inc. (ARM)"),
        webgl_renderer: Some("ANGLE (ARM, Mali-G710 MC10, OpenGL ES 3.2)"),
        accept_language: "en-US,en;q=0.9",
        device_scale_factor: 2.625,
        color_depth: 24,
        has_touch: true,
    },
    DeviceProfile {
        name: "android-galaxy",
        user_agent: "Mozilla/5.0 (Linux; Android 13; SM-S911B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Mobile Safari/537.36",
        viewport_width: 360,
        viewport_height: 780,
        locale: "en-GB",
        timezone: "Europe/London",
        platform: "Linux armv8l",
        webgl_vendor: Some("Google Inc. (Qualcomm)"),
        webgl_renderer: Some("ANGLE (Qualcomm, Adreno (TM) 740, OpenGL ES 3.2)"),
        accept_language: "en-GB,en;q=0.9",
        device_scale_factor: 3.0,
        color_depth: 24,
        has_touch: true,
    },
];

pub fn catalog() -> &'static [DeviceProfile] {
    CATALOG
}

pub fn catalog_len() -> usize {
    CATALOG.len()
}

/// Uniform pick from the catalog.
pub fn random_profile() -> &'static DeviceProfile {
    let mut rng = rand::thread_rng();
    CATALOG
        .choose(&mut rng)
        .unwrap_or(&CATALOG[0])
}

/// Deterministic pick, periodic in the catalog length. The caller keeps the
/// rotation counter; see `SessionManager`.
pub fn profile_by_index(index: usize) -> &'static DeviceProfile {
    &CATALOG[index % CATALOG.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_selection_is_periodic() {
        for i in 0..catalog_len() * 2 {
            assert_eq!(
                profile_by_index(i).name,
                profile_by_index(i + catalog_len()).name
            );
        }
    }

    #[test]
    fn random_profile_comes_from_catalog() {
        for _ in 0..50 {
            let profile = random_profile();
            assert!(catalog().iter().any(|p| p.name == profile.name));
        }
    }

    #[test]
    fn touch_profiles_use_mobile_platforms() {
        for profile in catalog() {
            if profile.has_touch {
                assert!(
                    profile.platform.contains("arm"),
                    "touch profile {} should report a mobile platform",
                    profile.name
                );
                assert!(profile.user_agent.contains("Mobile"));
            }
        }
    }

    #[test]
    fn catalog_entries_are_internally_consistent() {
        for profile in catalog() {
            assert!(!profile.user_agent.is_empty());
            assert!(profile.viewport_width > 0 && profile.viewport_height > 0);
            assert!(profile.device_scale_factor > 0.0);
            assert!(profile.accept_language.starts_with(&profile.locale[..2]));
        }
    }
}
