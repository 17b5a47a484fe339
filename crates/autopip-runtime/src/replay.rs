//! Scenario replay: drives the real runtime against a [`SimHost`] with a
//! timed script of page events and scripted host responses.

use std::sync::Arc;
use std::time::Duration;

use autopip_core::{ControllerState, PlaybackSnapshot, RawCapabilities};
use autopip_host::{PipRejection, SimElement, SimHost, sim::SIM_USER_AGENT};
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep_until};

use crate::config::{AutopipConfig, ConfigError};
use crate::AutoPip;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub pip_supported: bool,
    #[serde(default = "default_true")]
    pub start_visible: bool,
    #[serde(default)]
    pub elements: Vec<ScenarioElement>,
    #[serde(default)]
    pub enter_results: Vec<ScriptedResult>,
    #[serde(default)]
    pub exit_results: Vec<ScriptedResult>,
    pub steps: Vec<Step>,
    /// Quiet time after the last step before teardown.
    #[serde(default = "default_tail_ms")]
    pub tail_ms: u64,
    #[serde(default)]
    pub expect: Expectation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioElement {
    pub id: u64,
    pub selector: String,
    #[serde(default = "default_true")]
    pub playing: bool,
}

impl ScenarioElement {
    fn build(&self) -> Arc<SimElement> {
        let playback = if self.playing {
            PlaybackSnapshot::playing_at(42.0)
        } else {
            PlaybackSnapshot::paused_at(42.0)
        };
        SimElement::new(self.id, playback)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: StepAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    Hide,
    Show,
    Navigate,
    Click,
    MediaSession,
    UserEnter { id: u64 },
    UserExit,
    Insert(ScenarioElement),
    Replace(ScenarioElement),
    Remove { id: u64 },
    Pause { id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedResult {
    Ok,
    NotAllowed,
    NotSupported,
    InvalidState,
    Security,
}

impl ScriptedResult {
    fn into_result(self) -> Result<(), PipRejection> {
        match self {
            Self::Ok => Ok(()),
            Self::NotAllowed => Err(PipRejection::NotAllowed),
            Self::NotSupported => Err(PipRejection::NotSupported("scripted".into())),
            Self::InvalidState => Err(PipRejection::InvalidState("scripted".into())),
            Self::Security => Err(PipRejection::Security),
        }
    }
}

/// Expected outcome; unset fields are not checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Expectation {
    pub enter_requests: Option<u32>,
    pub exit_requests: Option<u32>,
    pub host_pip_active: Option<bool>,
    pub pip_element: Option<u64>,
    pub state: Option<ControllerState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub scenario: String,
    pub enter_requests: u32,
    pub exit_requests: u32,
    pub host_pip_active: bool,
    pub pip_element: Option<u64>,
    pub live_subscriptions: usize,
    pub final_state: ControllerState,
}

impl ReplayReport {
    /// Mismatches against `expect`, one line each.
    pub fn check(&self, expect: &Expectation) -> Vec<String> {
        let mut failures = Vec::new();
        let mut cmp = |name: &str, expected: Option<String>, actual: String| {
            if let Some(e) = expected {
                if e != actual {
                    failures.push(format!("{name}: expected {e}, got {actual}"));
                }
            }
        };
        cmp(
            "enter_requests",
            expect.enter_requests.map(|v| v.to_string()),
            self.enter_requests.to_string(),
        );
        cmp(
            "exit_requests",
            expect.exit_requests.map(|v| v.to_string()),
            self.exit_requests.to_string(),
        );
        cmp(
            "host_pip_active",
            expect.host_pip_active.map(|v| v.to_string()),
            self.host_pip_active.to_string(),
        );
        cmp(
            "pip_element",
            expect.pip_element.map(|v| v.to_string()),
            self.pip_element.map(|v| v.to_string()).unwrap_or_else(|| "none".into()),
        );
        cmp(
            "state",
            expect.state.as_ref().map(|s| format!("{s:?}")),
            format!("{:?}", self.final_state),
        );
        failures
    }
}

fn default_host() -> String {
    "www.youtube.com".into()
}

fn default_user_agent() -> String {
    SIM_USER_AGENT.into()
}

fn default_true() -> bool {
    true
}

fn default_tail_ms() -> u64 {
    3_000
}

impl Scenario {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    fn build_host(&self) -> Arc<SimHost> {
        let host = SimHost::new(self.host.clone())
            .with_capabilities(RawCapabilities {
                pip_enabled: self.pip_supported,
                document_pip_available: false,
                user_agent: self.user_agent.clone(),
            })
            .with_visible(self.start_visible);
        for el in &self.elements {
            host.insert_element(el.selector.clone(), el.build());
        }
        host.script_enter(self.enter_results.iter().map(|r| r.into_result()));
        host.script_exit(self.exit_results.iter().map(|r| r.into_result()));
        Arc::new(host)
    }
}

fn apply(host: &SimHost, action: &StepAction) {
    match action {
        StepAction::Hide => host.set_visible(false),
        StepAction::Show => host.set_visible(true),
        StepAction::Navigate => host.navigate(),
        StepAction::Click => host.click_video(),
        StepAction::MediaSession => host.media_session_enter(),
        StepAction::UserEnter { id } => host.user_enters_pip(*id),
        StepAction::UserExit => host.user_exits_pip(),
        StepAction::Insert(el) => host.insert_element(el.selector.clone(), el.build()),
        StepAction::Replace(el) => host.replace_element(&el.selector, el.build()),
        StepAction::Remove { id } => host.remove_element(*id),
        StepAction::Pause { id } => {
            if let Some(el) = host.element(*id) {
                el.set_playback(PlaybackSnapshot::paused_at(42.0));
            }
        }
    }
}

/// Run `scenario` to completion on the current runtime.
pub async fn run_scenario(
    scenario: &Scenario,
    config: &AutopipConfig,
) -> Result<ReplayReport, ConfigError> {
    let host = scenario.build_host();
    let pip = AutoPip::launch(Arc::clone(&host), config)?;
    let start = Instant::now();

    let mut steps: Vec<&Step> = scenario.steps.iter().collect();
    steps.sort_by_key(|s| s.at_ms);
    for step in steps {
        sleep_until(start + Duration::from_millis(step.at_ms)).await;
        apply(&host, &step.action);
    }
    tokio::time::sleep(Duration::from_millis(scenario.tail_ms)).await;

    let final_state = pip.teardown().await;
    Ok(ReplayReport {
        scenario: scenario.name.clone(),
        enter_requests: host.enter_requests(),
        exit_requests: host.exit_requests(),
        host_pip_active: host.pip_element().is_some(),
        pip_element: host.pip_element(),
        live_subscriptions: host.subscriber_count(),
        final_state,
    })
}
