//! Stage documents and the deployment-to-battlefield phase machine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::scene::{Scene, SceneCommand};

/// Scene name a stage event must invoke to open a dialog.
pub const CHAT_INVOKE: &str = "chat";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDocument {
    pub stage_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub map_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stage_event: Vec<StageEvent>,
}

impl StageDocument {
    pub fn events(&self, trigger: StageTrigger) -> impl Iterator<Item = &StageEvent> {
        self.stage_event
            .iter()
            .filter(move |event| event.trigger == trigger)
    }

    /// Theater commands launched once units are deployed.
    pub fn post_deploy_commands(&self) -> Vec<SceneCommand> {
        self.events(StageTrigger::PostDeploy)
            .filter_map(StageEvent::command)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    pub trigger: StageTrigger,
    pub invoke: String,
    pub content: String,
}

impl StageEvent {
    /// Only `chat` invocations are understood; they stack the chat scene.
    pub fn command(&self) -> Option<SceneCommand> {
        (self.invoke == CHAT_INVOKE).then(|| SceneCommand::stack(Scene::Chat, &*self.content))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StageTrigger {
    PostDeploy,
    #[serde(other)]
    #[strum(disabled)]
    Other,
}

/// Which half of a stage is on screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StagePhase {
    #[default]
    Deployment,
    Battlefield,
}

/// Guards the `UnitsDeployed` signal so it fires once per commit.
#[derive(Clone, Debug, Default)]
pub struct StageProgress {
    phase: StagePhase,
    commits: u64,
    signalled: u64,
}

impl StageProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> StagePhase {
        self.phase
    }

    /// Records a commit; the battlefield takes over.
    pub fn commit(&mut self) -> u64 {
        self.commits += 1;
        self.phase = StagePhase::Battlefield;
        self.commits
    }

    /// Returns `true` the first time it is called after each commit.
    pub fn take_signal(&mut self) -> bool {
        if self.signalled < self.commits {
            self.signalled = self.commits;
            true
        } else {
            false
        }
    }

    /// Back to deployment, e.g. when the stage is re-entered.
    pub fn restart(&mut self) {
        self.phase = StagePhase::Deployment;
    }
}
