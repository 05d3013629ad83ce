//! Line-oriented dialog front end.
//!
//! Scene and dialog events are printed as they arrive; each input line is
//! parsed into one theater or dialog request.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

use game_core::{EngineOutput, FinishOutcome, Scene, SceneCommand};
use runtime::{Event, SceneEvent, Theater, Topic};

const HELP: &str = "\
commands:
  <enter>             advance the current message
  <n>                 choose option n
  s <value>           choose the option with this value
  i <text>            submit text input
  y | n               confirm or cancel submitted input
  go <scene> [res]    invoke a scene, e.g. `go town /town/main.json`
  state               show visible scenes
  q                   quit";

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Advance,
    Choose(usize),
    ChooseValue(String),
    Submit(String),
    Confirm,
    Cancel,
    Invoke(Scene, Option<String>),
    State,
    Help,
    Quit,
    Unknown(String),
}

fn parse(line: &str) -> Input {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head {
        "" | "next" => Input::Advance,
        "q" | "quit" | "exit" => Input::Quit,
        "y" | "yes" => Input::Confirm,
        "n" | "no" => Input::Cancel,
        "state" => Input::State,
        "help" | "?" => Input::Help,
        "s" if !rest.is_empty() => Input::ChooseValue(rest.to_owned()),
        "i" if !rest.is_empty() => Input::Submit(rest.to_owned()),
        "go" => {
            let mut parts = rest.split_whitespace();
            match parts.next().map(str::parse::<Scene>) {
                Some(Ok(scene)) => Input::Invoke(scene, parts.next().map(str::to_owned)),
                _ => Input::Unknown(line.to_owned()),
            }
        }
        number => match number.parse::<usize>() {
            Ok(index) if index > 0 && rest.is_empty() => Input::Choose(index - 1),
            _ => Input::Unknown(line.to_owned()),
        },
    }
}

/// Starts the game and serves stdin until `q` or end of input.
pub async fn run(theater: &Theater) -> Result<()> {
    let handle = theater.handle();
    let dialog = theater.dialog();

    let renderer = tokio::spawn(render(
        handle.subscribe(Topic::Scene),
        handle.subscribe(Topic::Dialog),
    ));

    handle.start_game().await?;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let accepted = match parse(&line) {
            Input::Advance => dialog.advance().await?,
            Input::Choose(index) => dialog.select_index(index).await?,
            Input::ChooseValue(value) => dialog.select(value).await?,
            Input::Submit(text) => dialog.submit_input(text).await?,
            Input::Confirm => dialog.confirm_input().await?,
            Input::Cancel => dialog.cancel_input().await?,
            Input::Invoke(scene, resource) => {
                handle
                    .dispatch(SceneCommand::InvokeScene {
                        scene,
                        scene_resource: resource,
                    })
                    .await?;
                true
            }
            Input::State => {
                let snapshot = handle.snapshot().await?;
                println!("[scene] visible: {}", scene_list(&snapshot.scenes.visible_scenes()));
                for (scene, resource) in snapshot.scenes.resources() {
                    println!("  {scene} -> {resource}");
                }
                true
            }
            Input::Help => {
                println!("{HELP}");
                true
            }
            Input::Quit => break,
            Input::Unknown(line) => {
                println!("unknown command: {line}");
                true
            }
        };
        if !accepted {
            println!("(not now)");
        }
    }

    renderer.abort();
    Ok(())
}

async fn render(
    mut scene_rx: broadcast::Receiver<Event>,
    mut dialog_rx: broadcast::Receiver<Event>,
) {
    loop {
        let received = tokio::select! {
            event = scene_rx.recv() => event,
            event = dialog_rx.recv() => event,
        };
        match received {
            Ok(event) => {
                for line in describe(&event) {
                    println!("{line}");
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Renderer skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn scene_list(scenes: &[Scene]) -> String {
    scenes
        .iter()
        .map(Scene::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe(event: &Event) -> Vec<String> {
    match event {
        Event::Scene(SceneEvent::Changed { visible, .. }) => {
            vec![format!("[scene] visible: {}", scene_list(visible))]
        }
        Event::Scene(SceneEvent::TownLoaded {
            town_name,
            enabled_locations,
            ..
        }) => vec![format!(
            "[town] {}: {}",
            town_name.as_deref().unwrap_or("town"),
            enabled_locations.join(", ")
        )],
        Event::Scene(SceneEvent::Rendered { scene, resource }) => {
            vec![format!("[{scene}] {resource}")]
        }
        Event::Scene(SceneEvent::Lifecycle(lifecycle)) => vec![format!("[game] {lifecycle:?}")],
        Event::Dialog(output) => describe_output(output),
        _ => Vec::new(),
    }
}

fn describe_output(output: &EngineOutput) -> Vec<String> {
    match output {
        EngineOutput::MessageShown { message, .. } => vec![match &message.speaker {
            Some(speaker) => format!("{speaker}: {}", message.text),
            None => message.text.clone(),
        }],
        EngineOutput::SelectionRequested { prompt, options } => {
            let mut lines: Vec<String> = prompt.iter().map(|p| p.text.clone()).collect();
            lines.extend(
                options
                    .iter()
                    .enumerate()
                    .map(|(index, option)| format!("  {}) {}", index + 1, option.label)),
            );
            lines
        }
        EngineOutput::InputRequested { prompt, .. } => {
            vec![format!("? {}", prompt.as_deref().unwrap_or("input"))]
        }
        EngineOutput::InputConfirmation { message, .. } => vec![format!("{message} (y/n)")],
        EngineOutput::InputRejected { reason, .. } => vec![format!("! {reason}")],
        EngineOutput::BackgroundChanged(Some(background)) => {
            vec![format!("[background] {background}")]
        }
        EngineOutput::CharacterShown { position, sprite } => {
            vec![format!("[{position}] {sprite}")]
        }
        EngineOutput::LoadFailed { script_id, message } => {
            vec![format!("! could not load {script_id}: {message}")]
        }
        EngineOutput::Finished(FinishOutcome::Invalid { reason }) => {
            vec![format!("! script ended badly: {reason}")]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_core::script::{MessageView, OptionView};

    #[test]
    fn parses_dialog_inputs() {
        assert_eq!(parse(""), Input::Advance);
        assert_eq!(parse("2"), Input::Choose(1));
        assert_eq!(parse("0"), Input::Unknown("0".into()));
        assert_eq!(parse("s left"), Input::ChooseValue("left".into()));
        assert_eq!(parse("i  Ann Lee "), Input::Submit("Ann Lee".into()));
        assert_eq!(parse("y"), Input::Confirm);
        assert_eq!(parse("q"), Input::Quit);
    }

    #[test]
    fn parses_scene_invocations() {
        assert_eq!(
            parse("go town /town/main.json"),
            Input::Invoke(Scene::Town, Some("/town/main.json".into()))
        );
        assert_eq!(parse("go homeScreen"), Input::Invoke(Scene::HomeScreen, None));
        assert!(matches!(parse("go nowhere"), Input::Unknown(_)));
    }

    #[test]
    fn selections_are_numbered_from_one() {
        let lines = describe_output(&EngineOutput::SelectionRequested {
            prompt: Some(MessageView {
                speaker: None,
                text: "Which way?".into(),
            }),
            options: vec![
                OptionView {
                    label: "Left".into(),
                    value: "left".into(),
                },
                OptionView {
                    label: "Right".into(),
                    value: "right".into(),
                },
            ],
        });
        assert_eq!(lines, vec!["Which way?", "  1) Left", "  2) Right"]);
    }
}
