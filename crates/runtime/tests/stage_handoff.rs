mod common;

use std::sync::Arc;

use game_core::{
    DeploymentError, EngineOutput, GridLayout, HexCoordinate, InMemoryStore, Scene, StagePhase,
    playable_roster,
};
use runtime::{DeploymentEvent, Event, InMemoryContentStore, RuntimeError, Topic};
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;

use common::{case_path, next_matching, theater};

fn stage_content() -> InMemoryContentStore {
    InMemoryContentStore::new()
        .with_document(
            "stages/stage-001.json",
            json!({
                "stageId": "001",
                "name": "River Ford",
                "mapId": "ford",
                "stageEvent": [
                    {"trigger": "POST_DEPLOY", "invoke": "chat", "content": "/chat/briefing.json"},
                    {"trigger": "ON_VICTORY", "invoke": "chat", "content": "/chat/victory.json"}
                ]
            }),
        )
        .with_document(
            "map-data/ford.json",
            json!({
                "width": 5,
                "height": 3,
                "terrain": [
                    ["plain", "plain", "plain", "plain", "plain"],
                    ["plain", "plain", "forest", "plain", "plain"],
                    ["plain", "plain", "plain", "sea", "plain"]
                ]
            }),
        )
        .with_document(
            case_path("chat/briefing.json"),
            json!({"events": [{"eventCommand": "SHOW_MESSAGE", "message": "Hold the ford."}]}),
        )
}

#[tokio::test]
async fn committed_units_reappear_on_the_battlefield() {
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(stage_content(), store).await;
    let handle = theater.handle();
    let mut deployment_rx = handle.subscribe(Topic::Deployment);
    let mut dialog_rx = handle.subscribe(Topic::Dialog);

    let mut stage = theater.open_stage("001").await.unwrap();
    assert_eq!(stage.stage().name, "River Ford");
    assert_eq!(stage.map().width(), 5);

    let roster = playable_roster();
    stage.place(roster[0].clone(), HexCoordinate::new(0, 0)).unwrap();
    stage.place(roster[1].clone(), HexCoordinate::new(1, 0)).unwrap();
    assert_eq!(stage.available_units().len(), roster.len() - 2);

    let record = stage.commit().await.unwrap();
    assert_eq!(record.deployed_units.len(), 2);
    assert_eq!(stage.phase(), StagePhase::Battlefield);

    let deployed = next_matching(&mut deployment_rx, |event| match event {
        Event::Deployment(DeploymentEvent::UnitsDeployed { stage_id, units }) => {
            Some((stage_id, units))
        }
        _ => None,
    })
    .await;
    assert_eq!(deployed, ("001".to_owned(), 2));

    let snapshot = handle.settled().await.unwrap();
    assert!(snapshot.scenes.is_visible(Scene::Chat));
    assert_eq!(snapshot.scenes.resource(Scene::Chat), Some("/chat/briefing.json"));
    let briefing = next_matching(&mut dialog_rx, |event| match event {
        Event::Dialog(EngineOutput::MessageShown { message, .. }) => Some(message.text),
        _ => None,
    })
    .await;
    assert_eq!(briefing, "Hold the ford.");

    // A second commit in the same session is refused and signals nothing.
    assert!(matches!(
        stage.commit().await,
        Err(RuntimeError::WrongStagePhase { .. })
    ));

    let layout = GridLayout::default();
    let units = stage.enter_battlefield().unwrap();
    assert_eq!(units.len(), 2);
    for placed in &units {
        assert_eq!(placed.pixel, layout.hex_to_pixel(placed.coordinate));
    }
    assert_eq!(units[0].unit, roster[0]);
    assert_eq!(units[0].coordinate, HexCoordinate::new(0, 0));
    assert_eq!(units[1].coordinate, HexCoordinate::new(1, 0));

    let ready = next_matching(&mut deployment_rx, |event| match event {
        Event::Deployment(DeploymentEvent::BattlefieldReady { units, .. }) => Some(units),
        _ => None,
    })
    .await;
    assert_eq!(ready, units);
    assert!(matches!(deployment_rx.try_recv(), Err(TryRecvError::Empty)));

    // The record is consumed on read.
    assert!(stage.enter_battlefield().unwrap().is_empty());

    theater.shutdown().await.unwrap();
}

#[tokio::test]
async fn placement_rules_are_enforced() {
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(stage_content(), store).await;
    let mut stage = theater.open_stage("001").await.unwrap();
    let roster = playable_roster();

    assert!(matches!(
        stage.place(roster[0].clone(), HexCoordinate::new(7, 0)),
        Err(RuntimeError::Deployment(DeploymentError::OutOfBounds { .. }))
    ));
    // File rows run bottom-up, so the sea in the last row is at (3, 0).
    assert!(matches!(
        stage.place(roster[0].clone(), HexCoordinate::new(3, 0)),
        Err(RuntimeError::Deployment(DeploymentError::Impassable { .. }))
    ));

    stage.place(roster[0].clone(), HexCoordinate::new(2, 1)).unwrap();
    assert!(matches!(
        stage.place(roster[1].clone(), HexCoordinate::new(2, 1)),
        Err(RuntimeError::Deployment(DeploymentError::CellOccupied { .. }))
    ));
    assert!(matches!(
        stage.place(roster[0].clone(), HexCoordinate::new(4, 1)),
        Err(RuntimeError::Deployment(DeploymentError::AlreadyDeployed { .. }))
    ));

    assert_eq!(stage.remove(HexCoordinate::new(2, 1)), Some(roster[0].clone()));
    assert!(stage.board().is_empty());

    theater.shutdown().await.unwrap();
}

#[tokio::test]
async fn battlefield_without_a_record_is_empty() {
    let store = Arc::new(InMemoryStore::new());
    let theater = theater(stage_content(), store).await;
    let mut stage = theater.open_stage("001").await.unwrap();

    assert!(stage.enter_battlefield().unwrap().is_empty());
    assert!(matches!(
        theater.open_stage("999").await,
        Err(RuntimeError::Content(_))
    ));

    theater.shutdown().await.unwrap();
}
