mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use game_core::{InMemoryStore, KeyValueStore, QueuedCommand, Scene, SceneCommand, TheaterEvent};
use runtime::{Event, InMemoryContentStore, LifecycleEvent, SceneEvent, Topic};
use serde_json::json;

use common::{case_path, next_matching, theater};

fn append(target: &str, value: &str) -> QueuedCommand {
    QueuedCommand::from_value(json!({
        "command": "WRITE_VALUE",
        "target": target,
        "operation": "APPEND",
        "value": value,
    }))
}

#[tokio::test]
async fn later_invoke_scene_wins_and_resources_stay_independent() {
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(InMemoryContentStore::new(), store).await;
    let handle = theater.handle();

    handle
        .dispatch_all([
            SceneCommand::invoke(Scene::Chat, "a"),
            SceneCommand::invoke(Scene::Town, "b"),
        ])
        .await
        .unwrap();

    let snapshot = handle.settled().await.unwrap();
    assert!(snapshot.is_settled());
    assert_eq!(snapshot.scenes.visible_scenes(), vec![Scene::Town]);
    assert_eq!(snapshot.scenes.resource(Scene::Town), Some("b"));
    assert_eq!(snapshot.scenes.resource(Scene::Chat), Some("a"));

    theater.shutdown().await.unwrap();
}

#[tokio::test]
async fn start_game_runs_init_commands_in_order() {
    let content = InMemoryContentStore::new().with_document(
        case_path("init.json"),
        json!([
            {"command": "RESET_STATE"},
            {"command": "HIDE_SCENE", "scene": "homeScreen"},
            {"command": "STACK_SCENE", "scene": "deployment"},
            {"command": "STACK_SCENE", "scene": "inventory", "condition": "story.main >= 1"},
        ]),
    );
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(content, store.clone()).await;
    let handle = theater.handle();
    let mut scene_rx = handle.subscribe(Topic::Scene);

    handle.start_game().await.unwrap();
    let snapshot = handle.settled().await.unwrap();

    assert_eq!(snapshot.scenes.visible_scenes(), vec![Scene::Deployment]);
    assert_eq!(store.get("story.chapter").as_deref(), Some("chapter-001"));

    next_matching(&mut scene_rx, |event| match event {
        Event::Scene(SceneEvent::Lifecycle(LifecycleEvent::GameStarted)) => Some(()),
        _ => None,
    })
    .await;
    let skipped = next_matching(&mut scene_rx, |event| match event {
        Event::Scene(SceneEvent::CommandSkipped { command, .. }) => Some(command),
        _ => None,
    })
    .await;
    assert_eq!(skipped, "STACK_SCENE");

    theater.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_and_unknown_commands_do_not_stop_the_queue() {
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(InMemoryContentStore::new(), store.clone()).await;
    let handle = theater.handle();

    handle
        .dispatch_all([
            append("order", "first"),
            QueuedCommand::from_value(json!({"command": "PLAY_MOVIE", "file": "intro.mp4"})),
            QueuedCommand::from(SceneCommand::InvokeScript {
                script: "modules/missing.json".into(),
                entry_point: "main".into(),
            }),
            append("order", "last"),
        ])
        .await
        .unwrap();

    handle.settled().await.unwrap();
    assert_eq!(store.get("order").as_deref(), Some("first,last"));

    theater.shutdown().await.unwrap();
}

#[tokio::test]
async fn script_module_commands_run_inline() {
    let content = InMemoryContentStore::new().with_document(
        case_path("modules/intro.json"),
        json!({
            "entryPoints": {
                "begin": [
                    {"command": "WRITE_VALUE", "target": "order", "operation": "APPEND", "value": "module"},
                    {"command": "STACK_SCENE", "scene": "chat", "condition": "missing == 1"}
                ]
            }
        }),
    );
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(content, store.clone()).await;
    let handle = theater.handle();

    handle
        .dispatch_all([
            append("order", "first"),
            QueuedCommand::from(SceneCommand::InvokeScript {
                script: "/modules/intro.json".into(),
                entry_point: "begin".into(),
            }),
            append("order", "last"),
        ])
        .await
        .unwrap();

    let snapshot = handle.settled().await.unwrap();
    assert_eq!(store.get("order").as_deref(), Some("first,module,last"));
    assert!(!snapshot.scenes.is_visible(Scene::Chat));

    theater.shutdown().await.unwrap();
}

#[tokio::test]
async fn recursive_script_modules_stop_at_the_depth_limit() {
    let content = InMemoryContentStore::new().with_document(
        case_path("modules/loop.json"),
        json!({
            "entryPoints": {
                "again": [
                    {"command": "WRITE_VALUE", "target": "count", "operation": "APPEND", "value": "x"},
                    {"command": "INVOKE_SCRIPT", "script": "modules/loop.json", "entryPoint": "again"}
                ]
            }
        }),
    );
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(content, store.clone()).await;
    let handle = theater.handle();

    handle
        .dispatch_all([
            QueuedCommand::from(SceneCommand::InvokeScript {
                script: "modules/loop.json".into(),
                entry_point: "again".into(),
            }),
            append("after", "done"),
        ])
        .await
        .unwrap();

    handle.settled().await.unwrap();
    let count = store.get("count").unwrap_or_default();
    assert_eq!(count.split(',').count(), runtime::MAX_MODULE_DEPTH);
    assert_eq!(store.get("after").as_deref(), Some("done"));

    theater.shutdown().await.unwrap();
}

#[tokio::test]
async fn town_render_queues_its_follow_up_commands() {
    let content = InMemoryContentStore::new().with_document(
        case_path("town/main.json"),
        json!({
            "townName": "Riverside",
            "backgroundResource": "town/riverside.png",
            "townConfig": {
                "inn": {"name": "Inn", "destination": "/town/inn.json", "enableAt": {"story": "main", "chapter": 1}},
                "castle": {"name": "Castle", "enableAt": {"story": "main", "chapter": 3}}
            },
            "onRenderCompleted": [
                {"command": "WRITE_VALUE", "target": "visited", "value": true},
                {"command": "STACK_SCENE", "scene": "inventory", "condition": "story.main >= 5"}
            ]
        }),
    );
    let store = Arc::new(InMemoryStore::with_entries([("story.main", "2")]));
    let theater = theater(content, store.clone()).await;
    let handle = theater.handle();
    let mut scene_rx = handle.subscribe(Topic::Scene);

    handle
        .dispatch(SceneCommand::invoke(Scene::Town, "/town/main.json"))
        .await
        .unwrap();

    let (town_name, enabled) = next_matching(&mut scene_rx, |event| match event {
        Event::Scene(SceneEvent::TownLoaded {
            town_name,
            enabled_locations,
            ..
        }) => Some((town_name, enabled_locations)),
        _ => None,
    })
    .await;
    assert_eq!(town_name.as_deref(), Some("Riverside"));
    assert_eq!(enabled, vec!["inn".to_owned()]);

    let snapshot = handle.settled().await.unwrap();
    assert_eq!(store.get("visited").as_deref(), Some("true"));
    assert!(!snapshot.scenes.is_visible(Scene::Inventory));

    theater.shutdown().await.unwrap();
}

fn rendered(scene: Scene) -> impl FnMut(Event) -> Option<String> {
    move |event| match event {
        Event::Scene(SceneEvent::Rendered {
            scene: rendered,
            resource,
        }) if rendered == scene => Some(resource),
        _ => None,
    }
}

#[tokio::test]
async fn battlefield_and_rogue_renders_run_their_hooks() {
    let content = InMemoryContentStore::new()
        .with_document(
            case_path("battlefield/battlefield-01.json"),
            json!({"onRenderCompleted": [{"command": "WRITE_VALUE", "target": "battle", "value": "on"}]}),
        )
        .with_document(
            case_path("rogue/r.json"),
            json!({
                "description": "Endless ruins",
                "onRenderCompleted": [{"command": "WRITE_VALUE", "target": "rogue", "value": "on"}],
                "onClosed": [{"command": "WRITE_VALUE", "target": "closed", "operation": "APPEND", "value": "x"}]
            }),
        );
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(content, store.clone()).await;
    let handle = theater.handle();
    let mut scene_rx = handle.subscribe(Topic::Scene);

    handle
        .dispatch(SceneCommand::invoke(
            Scene::Battlefield,
            "battlefield/battlefield-01.json",
        ))
        .await
        .unwrap();
    let resource = next_matching(&mut scene_rx, rendered(Scene::Battlefield)).await;
    assert_eq!(resource, "battlefield/battlefield-01.json");

    handle
        .dispatch(SceneCommand::stack(Scene::Rogue, "rogue/r.json"))
        .await
        .unwrap();
    next_matching(&mut scene_rx, rendered(Scene::Rogue)).await;
    handle.settled().await.unwrap();
    assert_eq!(store.get("battle").as_deref(), Some("on"));
    assert_eq!(store.get("rogue").as_deref(), Some("on"));
    assert_eq!(store.get("closed"), None);

    handle
        .dispatch_all([SceneCommand::hide(Scene::Rogue), SceneCommand::hide(Scene::Rogue)])
        .await
        .unwrap();
    let snapshot = handle.settled().await.unwrap();
    assert_eq!(store.get("closed").as_deref(), Some("x"));
    assert_eq!(snapshot.scenes.visible_scenes(), vec![Scene::Battlefield]);

    theater.shutdown().await.unwrap();
}

#[tokio::test]
async fn renders_of_hidden_scenes_are_dropped() {
    let content = InMemoryContentStore::new()
        .with_document(
            case_path("rogue/r.json"),
            json!({"onRenderCompleted": [{"command": "WRITE_VALUE", "target": "rogue", "value": "on"}]}),
        )
        .with_document(
            case_path("stage-7"),
            json!({"onRenderCompleted": [{"command": "WRITE_VALUE", "target": "stage", "value": "on"}]}),
        )
        .with_document(
            case_path("battlefield/battlefield-02.json"),
            json!({"onRenderCompleted": [{"command": "WRITE_VALUE", "target": "battle", "value": "on"}]}),
        );
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(content, store.clone()).await;
    let handle = theater.handle();
    let mut scene_rx = handle.subscribe(Topic::Scene);

    handle
        .dispatch_all([
            SceneCommand::invoke(Scene::Rogue, "rogue/r.json"),
            SceneCommand::invoke(Scene::Battlefield, "stage-7"),
        ])
        .await
        .unwrap();
    handle
        .dispatch(SceneCommand::invoke(
            Scene::Battlefield,
            "battlefield/battlefield-02.json",
        ))
        .await
        .unwrap();
    next_matching(&mut scene_rx, rendered(Scene::Battlefield)).await;
    handle.settled().await.unwrap();

    assert_eq!(store.get("battle").as_deref(), Some("on"));
    assert_eq!(store.get("rogue"), None);
    assert_eq!(store.get("stage"), None);

    theater.shutdown().await.unwrap();
}

#[tokio::test]
async fn change_scene_replaces_visibility_and_placeholders_are_published() {
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(InMemoryContentStore::new(), store).await;
    let handle = theater.handle();
    let mut scene_rx = handle.subscribe(Topic::Scene);

    let payload = BTreeMap::from([(Scene::Town, true), (Scene::HomeScreen, false)]);
    handle
        .emit(TheaterEvent::ChangeScene { payload })
        .await
        .unwrap();
    handle.emit(TheaterEvent::ShowSettings).await.unwrap();

    let visible = next_matching(&mut scene_rx, |event| match event {
        Event::Scene(SceneEvent::Changed { visible, .. }) => Some(visible),
        _ => None,
    })
    .await;
    assert_eq!(visible, vec![Scene::Town]);

    let lifecycle = next_matching(&mut scene_rx, |event| match event {
        Event::Scene(SceneEvent::Lifecycle(lifecycle)) => Some(lifecycle),
        _ => None,
    })
    .await;
    assert_eq!(lifecycle, LifecycleEvent::SettingsRequested);

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.scenes.visible_scenes(), vec![Scene::Town]);

    theater.shutdown().await.unwrap();
}
