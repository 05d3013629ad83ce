//! Content-store path layout.
//!
//! ```text
//! architecture/<test-case>/init.json         init document
//! architecture/<test-case>/<resource>        scene resources, script modules
//! dialog-script/<script-id>.json             scripts addressed by id
//! map-data/<map-id>.json                     map documents
//! stages/stage-<stage-id>.json               stage documents
//! ```

use game_core::KeyValueStore;

/// Test case used when neither configuration nor the store selects one.
pub const DEFAULT_TEST_CASE: &str = "test-case-001";

/// UI-only key that overrides the configured test case.
pub const SELECTED_TEST_CASE_KEY: &str = "selectedTestCase";

const ARCHITECTURE_DIR: &str = "architecture";
const DIALOG_SCRIPT_DIR: &str = "dialog-script";
const MAP_DIR: &str = "map-data";
const STAGE_DIR: &str = "stages";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentLayout {
    test_case: String,
}

impl Default for ContentLayout {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_CASE)
    }
}

impl ContentLayout {
    pub fn new(test_case: impl Into<String>) -> Self {
        Self {
            test_case: test_case.into(),
        }
    }

    /// Layout for the test case selected in `store`, else `fallback`.
    pub fn selected(store: &dyn KeyValueStore, fallback: &str) -> Self {
        match store.get(SELECTED_TEST_CASE_KEY) {
            Some(selected) if !selected.trim().is_empty() => Self::new(selected.trim()),
            _ => Self::new(fallback),
        }
    }

    pub fn test_case(&self) -> &str {
        &self.test_case
    }

    pub fn init(&self) -> String {
        self.scene_resource("init.json")
    }

    /// Resources are relative to the test case; a leading `/` is tolerated.
    pub fn scene_resource(&self, resource: &str) -> String {
        format!(
            "{ARCHITECTURE_DIR}/{}/{}",
            self.test_case,
            resource.trim_start_matches('/')
        )
    }

    pub fn script_module(&self, script: &str) -> String {
        self.scene_resource(script)
    }

    pub fn dialog_script(&self, script_id: &str) -> String {
        format!("{DIALOG_SCRIPT_DIR}/{script_id}.json")
    }

    pub fn map(&self, map_id: &str) -> String {
        format!("{MAP_DIR}/{map_id}.json")
    }

    pub fn stage(&self, stage_id: &str) -> String {
        format!("{STAGE_DIR}/stage-{stage_id}.json")
    }
}
