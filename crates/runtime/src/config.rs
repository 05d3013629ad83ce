//! Runtime configuration shared across the theater and its workers.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use game_content::DEFAULT_TEST_CASE;
use game_core::grid::SCROLL_SPEED;

/// Key written by `RESET_STATE` unless overridden.
pub const DEFAULT_PROGRESS_KEY: &str = "story.chapter";
/// Chapter marker written by `RESET_STATE` unless overridden.
pub const DEFAULT_INITIAL_CHAPTER: &str = "chapter-001";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory served as the content store.
    pub content_root: PathBuf,
    /// Test case used when the store does not select one.
    pub test_case: String,
    /// Directory of the file-backed key/value store; in-memory when `None`.
    pub save_dir: Option<PathBuf>,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
    pub scroll_speed: f64,
    pub scroll_tick: Duration,
    pub progress_key: String,
    pub initial_chapter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("content"),
            test_case: DEFAULT_TEST_CASE.to_owned(),
            save_dir: None,
            event_buffer_size: 100,
            command_buffer_size: 32,
            scroll_speed: SCROLL_SPEED,
            scroll_tick: Duration::from_millis(16),
            progress_key: DEFAULT_PROGRESS_KEY.to_owned(),
            initial_chapter: DEFAULT_INITIAL_CHAPTER.to_owned(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from `HEXSTAGE_*` environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = env::var("HEXSTAGE_CONTENT_ROOT") {
            config.content_root = PathBuf::from(root);
        }
        if let Ok(test_case) = env::var("HEXSTAGE_TEST_CASE")
            && !test_case.trim().is_empty()
        {
            config.test_case = test_case.trim().to_owned();
        }

        // Save directory: explicit path, or the platform data dir when set to "default"
        config.save_dir = match env::var("HEXSTAGE_SAVE_DIR").ok().as_deref() {
            Some("default") => default_save_dir(),
            Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
            _ => None,
        };

        if let Some(capacity) = read_env::<usize>("HEXSTAGE_EVENT_BUFFER") {
            config.event_buffer_size = capacity.max(1);
        }
        if let Some(capacity) = read_env::<usize>("HEXSTAGE_COMMAND_BUFFER") {
            config.command_buffer_size = capacity.max(1);
        }
        if let Some(speed) = read_env::<f64>("HEXSTAGE_SCROLL_SPEED")
            && speed.is_finite()
        {
            config.scroll_speed = speed.abs();
        }
        if let Some(millis) = read_env::<u64>("HEXSTAGE_SCROLL_TICK_MS") {
            config.scroll_tick = Duration::from_millis(millis.max(1));
        }
        if let Ok(key) = env::var("HEXSTAGE_PROGRESS_KEY")
            && !key.is_empty()
        {
            config.progress_key = key;
        }
        if let Ok(chapter) = env::var("HEXSTAGE_INITIAL_CHAPTER")
            && !chapter.is_empty()
        {
            config.initial_chapter = chapter;
        }

        config
    }
}

/// Platform data directory for persisted progress.
pub fn default_save_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "hexstage").map(|dirs| dirs.data_dir().join("saves"))
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
