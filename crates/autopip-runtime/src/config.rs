//! Runtime configuration: timings and per-site element locators.
//!
//! Loaded from TOML; every field has a default, so an empty file (or no
//! file) yields the built-in YouTube / Bilibili profiles.

use std::path::{Path, PathBuf};
use std::time::Duration;

use autopip_core::{BackoffPolicy, LinearBackoff, QuirkClass};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ─── Timings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub visibility_debounce_ms: u64,
    pub mutation_debounce_ms: u64,
    /// Wait after an in-page navigation before re-deciding.
    pub navigation_settle_ms: u64,
    pub settle_standard_ms: u64,
    pub settle_focus_kick_ms: u64,
    pub settle_unknown_ms: u64,
    pub locate_retries: u32,
    pub locate_step_ms: u64,
    pub locate_max_delay_ms: u64,
    pub enter_base_delay_ms: u64,
    pub enter_growth: f64,
    pub enter_max_attempts: u32,
    pub enter_max_delay_ms: u64,
    /// Background monitor period; 0 disables it.
    pub monitor_interval_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        let enter = BackoffPolicy::default();
        let locate = LinearBackoff::default();
        Self {
            visibility_debounce_ms: 200,
            mutation_debounce_ms: 250,
            navigation_settle_ms: 1_000,
            settle_standard_ms: 50,
            settle_focus_kick_ms: 250,
            settle_unknown_ms: 150,
            locate_retries: locate.retries,
            locate_step_ms: locate.step_ms,
            locate_max_delay_ms: locate.max_delay_ms,
            enter_base_delay_ms: enter.base_delay_ms,
            enter_growth: enter.growth,
            enter_max_attempts: enter.max_attempts,
            enter_max_delay_ms: enter.max_delay_ms,
            monitor_interval_ms: 500,
        }
    }
}

impl Timings {
    pub fn visibility_debounce(&self) -> Duration {
        Duration::from_millis(self.visibility_debounce_ms)
    }

    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }

    /// Settling delay between a hidden decision and the enter request.
    pub fn settle_for(&self, quirk: QuirkClass) -> Duration {
        let ms = match quirk {
            QuirkClass::Standard => self.settle_standard_ms,
            QuirkClass::RequiresFocusKick => self.settle_focus_kick_ms,
            QuirkClass::Unknown => self.settle_unknown_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn monitor_interval(&self) -> Option<Duration> {
        (self.monitor_interval_ms > 0).then(|| Duration::from_millis(self.monitor_interval_ms))
    }

    pub fn enter_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base_delay_ms: self.enter_base_delay_ms,
            growth: self.enter_growth,
            max_delay_ms: self.enter_max_delay_ms,
            max_attempts: self.enter_max_attempts,
        }
    }

    pub fn locate_policy(&self) -> LinearBackoff {
        LinearBackoff {
            step_ms: self.locate_step_ms,
            max_delay_ms: self.locate_max_delay_ms,
            retries: self.locate_retries,
        }
    }
}

// ─── Site Profiles ───────────────────────────────────────────────

/// Ordered element locators for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    /// Matched as a substring of the page host name.
    pub host_match: String,
    /// Tried in order; first match wins.
    pub selectors: Vec<String>,
    /// In-page navigation event emitted by the site's router, if any.
    #[serde(default)]
    pub navigation_event: Option<String>,
}

impl SiteProfile {
    /// Profile for hosts no configured profile matches.
    pub fn generic() -> Self {
        Self {
            name: "generic".into(),
            host_match: String::new(),
            selectors: vec!["video".into()],
            navigation_event: None,
        }
    }

    pub fn matches(&self, host_name: &str) -> bool {
        !self.host_match.is_empty() && host_name.contains(&self.host_match)
    }
}

fn builtin_sites() -> Vec<SiteProfile> {
    vec![
        SiteProfile {
            name: "youtube".into(),
            host_match: "youtube.com".into(),
            selectors: vec![".html5-main-video".into(), "video".into()],
            navigation_event: Some("yt-navigate-finish".into()),
        },
        SiteProfile {
            name: "bilibili".into(),
            host_match: "bilibili.com".into(),
            selectors: vec![".bilibili-player-video video".into(), "video".into()],
            navigation_event: None,
        },
    ]
}

// ─── Top Level ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutopipConfig {
    #[serde(default)]
    pub timings: Timings,
    #[serde(default = "builtin_sites")]
    pub sites: Vec<SiteProfile>,
}

impl Default for AutopipConfig {
    fn default() -> Self {
        Self {
            timings: Timings::default(),
            sites: builtin_sites(),
        }
    }
}

impl AutopipConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timings;
        if t.enter_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "timings.enter_max_attempts must be at least 1".into(),
            ));
        }
        if t.enter_growth.is_nan() || t.enter_growth <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "timings.enter_growth must be greater than 1.0, got {}",
                t.enter_growth
            )));
        }
        if !t.enter_policy().escalates() {
            return Err(ConfigError::Invalid(format!(
                "timings: enter backoff must grow on every retry; raise enter_max_delay_ms \
                 or lower enter_max_attempts (base {} ms, growth {}, cap {} ms, {} attempts)",
                t.enter_base_delay_ms, t.enter_growth, t.enter_max_delay_ms, t.enter_max_attempts
            )));
        }
        if t.locate_step_ms == 0 {
            return Err(ConfigError::Invalid(
                "timings.locate_step_ms must be non-zero".into(),
            ));
        }
        if let Some(site) = self.sites.iter().find(|s| s.selectors.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "site {:?} has no selectors",
                site.name
            )));
        }
        Ok(())
    }

    /// First profile matching `host_name`, else the generic profile.
    pub fn profile_for(&self, host_name: &str) -> SiteProfile {
        self.sites
            .iter()
            .find(|s| s.matches(host_name))
            .cloned()
            .unwrap_or_else(SiteProfile::generic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = AutopipConfig::from_toml("").expect("valid");
        assert_eq!(config, AutopipConfig::default());
        assert_eq!(config.sites.len(), 2);
    }

    #[test]
    fn partial_timings_override() {
        let config = AutopipConfig::from_toml(
            r#"
            [timings]
            enter_max_attempts = 5
            visibility_debounce_ms = 50
            "#,
        )
        .expect("valid");
        assert_eq!(config.timings.enter_max_attempts, 5);
        assert_eq!(config.timings.visibility_debounce(), Duration::from_millis(50));
        assert_eq!(config.timings.navigation_settle_ms, 1_000);
    }

    #[test]
    fn custom_sites_replace_builtins() {
        let config = AutopipConfig::from_toml(
            r#"
            [[sites]]
            name = "vimeo"
            host_match = "vimeo.com"
            selectors = [".vp-video video", "video"]
            "#,
        )
        .expect("valid");
        assert_eq!(config.sites.len(), 1);
        let profile = config.profile_for("player.vimeo.com");
        assert_eq!(profile.name, "vimeo");
        assert_eq!(profile.navigation_event, None);
    }

    #[test]
    fn profile_lookup_by_host() {
        let config = AutopipConfig::default();
        let yt = config.profile_for("www.youtube.com");
        assert_eq!(yt.selectors[0], ".html5-main-video");
        assert_eq!(yt.navigation_event.as_deref(), Some("yt-navigate-finish"));
        assert_eq!(config.profile_for("www.bilibili.com").name, "bilibili");
        assert_eq!(config.profile_for("example.org"), SiteProfile::generic());
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = AutopipConfig::from_toml("[timings]\nenter_max_attempts = 0").expect_err("invalid");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_non_growing_backoff() {
        let err = AutopipConfig::from_toml("[timings]\nenter_growth = 1.0").expect_err("invalid");
        assert!(err.to_string().contains("enter_growth"));
    }

    #[test]
    fn rejects_backoff_flattened_by_cap() {
        // Defaults cap at 8000 ms: the seventh wait would repeat the sixth.
        let err = AutopipConfig::from_toml("[timings]\nenter_max_attempts = 8").expect_err("invalid");
        assert!(err.to_string().contains("enter backoff must grow"));

        let err = AutopipConfig::from_toml("[timings]\nenter_base_delay_ms = 0").expect_err("invalid");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let raised = "[timings]\nenter_max_attempts = 8\nenter_max_delay_ms = 60000";
        assert!(AutopipConfig::from_toml(raised).is_ok());
    }

    #[test]
    fn rejects_site_without_selectors() {
        let toml = r#"
            [[sites]]
            name = "empty"
            host_match = "example.org"
            selectors = []
        "#;
        assert!(AutopipConfig::from_toml(toml).is_err());
    }

    #[test]
    fn parse_error_surfaces() {
        let err = AutopipConfig::from_toml("[timings\n").expect_err("bad toml");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("autopip.toml");
        std::fs::write(&path, "[timings]\nmonitor_interval_ms = 0\n").expect("write");
        let config = AutopipConfig::load(&path).expect("load");
        assert_eq!(config.timings.monitor_interval(), None);

        let missing = AutopipConfig::load(&dir.path().join("missing.toml")).expect_err("missing");
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn settle_depends_on_quirk() {
        let t = Timings::default();
        assert_eq!(t.settle_for(QuirkClass::Standard), Duration::from_millis(50));
        assert_eq!(
            t.settle_for(QuirkClass::RequiresFocusKick),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn serializes_back_to_toml() {
        let text = toml::to_string_pretty(&AutopipConfig::default()).expect("serialize");
        let back = AutopipConfig::from_toml(&text).expect("reparse");
        assert_eq!(back, AutopipConfig::default());
    }
}
