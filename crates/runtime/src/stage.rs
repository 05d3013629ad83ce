//! Stage coordination: deployment commit and battlefield hand-off.
//!
//! A [`StageSession`] owns the deployment board for one stage. Committing
//! persists the roster, publishes `UnitsDeployed` once per commit and queues
//! the stage's `POST_DEPLOY` chat scenes on the theater. Entering the
//! battlefield consumes the stored record.

use std::sync::Arc;

use tracing::{debug, info};

use game_core::{
    DeploymentBoard, DeploymentRecord, GridLayout, HexCoordinate, KeyValueStore, MapDocument,
    StageDocument, StagePhase, StageProgress, Unit, commit_deployment, load_deployment,
    playable_roster,
};

use crate::api::{Result, RuntimeError, TheaterHandle};
use crate::content::ContentLibrary;
use crate::events::{DeploymentEvent, Event, PlacedUnit};

pub struct StageSession {
    stage: StageDocument,
    map: MapDocument,
    board: DeploymentBoard,
    progress: StageProgress,
    layout: GridLayout,
    store: Arc<dyn KeyValueStore>,
    theater: TheaterHandle,
}

impl StageSession {
    /// Loads the stage document and its map.
    pub async fn open(
        library: &ContentLibrary,
        store: Arc<dyn KeyValueStore>,
        theater: TheaterHandle,
        stage_id: &str,
    ) -> Result<Self> {
        let stage = library.stage(stage_id).await?;
        let map = library.map(&stage.map_id).await?;
        info!(
            target: "runtime::stage",
            stage = %stage.stage_id,
            map = %stage.map_id,
            "Stage opened"
        );

        let board = DeploymentBoard::new(stage.stage_id.clone(), &map);
        Ok(Self {
            stage,
            map,
            board,
            progress: StageProgress::new(),
            layout: GridLayout::default(),
            store,
            theater,
        })
    }

    pub fn stage(&self) -> &StageDocument {
        &self.stage
    }

    pub fn map(&self) -> &MapDocument {
        &self.map
    }

    pub fn board(&self) -> &DeploymentBoard {
        &self.board
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn phase(&self) -> StagePhase {
        self.progress.phase()
    }

    /// Roster units not yet on the board.
    pub fn available_units(&self) -> Vec<Unit> {
        playable_roster()
            .into_iter()
            .filter(|unit| !self.board.is_deployed(unit.id))
            .collect()
    }

    pub fn place(&mut self, unit: Unit, coord: HexCoordinate) -> Result<()> {
        self.ensure_phase(StagePhase::Deployment)?;
        debug!(target: "runtime::stage", unit = unit.id, x = coord.x(), y = coord.y(), "Placing unit");
        self.board.place(unit, coord)?;
        Ok(())
    }

    pub fn remove(&mut self, coord: HexCoordinate) -> Option<Unit> {
        self.board.remove(coord)
    }

    /// Persists the board and fires the post-deploy triggers.
    pub async fn commit(&mut self) -> Result<DeploymentRecord> {
        self.ensure_phase(StagePhase::Deployment)?;

        let record = self.board.record();
        commit_deployment(self.store.as_ref(), &record)?;
        let commit = self.progress.commit();
        info!(
            target: "runtime::stage",
            stage = %record.stage_id,
            units = record.deployed_units.len(),
            commit,
            "Deployment committed"
        );

        if self.progress.take_signal() {
            self.theater
                .event_bus()
                .publish(Event::Deployment(DeploymentEvent::UnitsDeployed {
                    stage_id: record.stage_id.clone(),
                    units: record.deployed_units.len(),
                }));
            self.theater
                .dispatch_all(self.stage.post_deploy_commands())
                .await?;
        }

        Ok(record)
    }

    /// Consumes the stored record and positions its units.
    pub fn enter_battlefield(&mut self) -> Result<Vec<PlacedUnit>> {
        let record = load_deployment(self.store.as_ref(), self.board.stage_id())?;
        let units: Vec<PlacedUnit> = record
            .placements(&self.layout)
            .into_iter()
            .map(|(deployed, pixel)| PlacedUnit {
                unit: deployed.unit.clone(),
                coordinate: deployed.coordinate(),
                pixel,
            })
            .collect();

        info!(
            target: "runtime::stage",
            stage = %record.stage_id,
            units = units.len(),
            "Battlefield ready"
        );
        self.theater
            .event_bus()
            .publish(Event::Deployment(DeploymentEvent::BattlefieldReady {
                stage_id: record.stage_id,
                units: units.clone(),
            }));
        Ok(units)
    }

    /// Returns to an empty deployment board.
    pub fn restart(&mut self) {
        self.board.clear();
        self.progress.restart();
    }

    fn ensure_phase(&self, expected: StagePhase) -> Result<()> {
        let phase = self.progress.phase();
        if phase == expected {
            Ok(())
        } else {
            Err(RuntimeError::WrongStagePhase {
                stage_id: self.stage.stage_id.clone(),
                phase,
            })
        }
    }
}
