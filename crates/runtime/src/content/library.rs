use std::sync::Arc;

use game_content::{
    ContentLayout, LoadResult, parse_init, parse_map, parse_scene_document, parse_script,
    parse_script_module, parse_stage, parse_town,
};
use game_core::{
    InitDocument, KeyValueStore, MapDocument, SceneDocument, ScriptDocument, ScriptModule,
    StageDocument, TownDocument,
};

use super::ContentStore;
use crate::api::{Result, RuntimeError};

/// Typed document access over a [`ContentStore`].
///
/// The test-case scope is re-read from the key/value store on every fetch,
/// so changing `selectedTestCase` takes effect without a restart.
#[derive(Clone)]
pub struct ContentLibrary {
    content: Arc<dyn ContentStore>,
    state: Arc<dyn KeyValueStore>,
    fallback_test_case: String,
}

impl ContentLibrary {
    pub fn new(
        content: Arc<dyn ContentStore>,
        state: Arc<dyn KeyValueStore>,
        fallback_test_case: impl Into<String>,
    ) -> Self {
        Self {
            content,
            state,
            fallback_test_case: fallback_test_case.into(),
        }
    }

    pub fn layout(&self) -> ContentLayout {
        ContentLayout::selected(self.state.as_ref(), &self.fallback_test_case)
    }

    pub async fn init(&self) -> Result<InitDocument> {
        self.load(self.layout().init(), parse_init).await
    }

    /// Script bound to a scene resource, e.g. the chat scene's.
    pub async fn scene_script(&self, resource: &str) -> Result<ScriptDocument> {
        self.load(self.layout().scene_resource(resource), parse_script)
            .await
    }

    /// Script addressed by id, used for navigation and injection.
    pub async fn dialog_script(&self, script_id: &str) -> Result<ScriptDocument> {
        self.load(self.layout().dialog_script(script_id), parse_script)
            .await
    }

    pub async fn script_module(&self, script: &str) -> Result<ScriptModule> {
        self.load(self.layout().script_module(script), parse_script_module)
            .await
    }

    pub async fn town(&self, resource: &str) -> Result<TownDocument> {
        self.load(self.layout().scene_resource(resource), parse_town)
            .await
    }

    /// Render hooks bound to a battlefield or rogue resource.
    pub async fn scene_document(&self, resource: &str) -> Result<SceneDocument> {
        self.load(self.layout().scene_resource(resource), parse_scene_document)
            .await
    }

    pub async fn map(&self, map_id: &str) -> Result<MapDocument> {
        self.load(self.layout().map(map_id), parse_map).await
    }

    pub async fn stage(&self, stage_id: &str) -> Result<StageDocument> {
        self.load(self.layout().stage(stage_id), parse_stage).await
    }

    async fn load<T>(&self, path: String, parse: fn(&str) -> LoadResult<T>) -> Result<T> {
        let text = self.content.fetch(&path).await?;
        parse(&text).map_err(|err| RuntimeError::Load {
            path,
            message: format!("{err:#}"),
        })
    }
}
