use crate::app::Scene;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub(crate) struct InputEvent {
    pub(crate) key: KeyCode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Quit,
    TogglePause,
    ToggleHelp,
    ToggleTitle,
    ToggleColor,
    ToggleAbout,
    Reseed,
    LinesUp,
    LinesDown,
    FpsUp,
    FpsDown,
}

pub(crate) fn collect_input_nonblocking(
    max_frame_time: Duration,
) -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        if let Event::Key(k) = event::read()? {
            if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                out.push(InputEvent { key: k.code });
                if out.len() >= 32 {
                    break;
                }
            }
        }
    }
    Ok(out)
}

pub(crate) fn map_event_to_action(scene: Scene, ev: InputEvent) -> Option<Action> {
    // Global
    match ev.key {
        KeyCode::Char('q') | KeyCode::Char('Q') => return Some(Action::Quit),
        KeyCode::Char('h') | KeyCode::Char('H') => return Some(Action::ToggleHelp),
        _ => {}
    }

    match scene {
        Scene::Field => match ev.key {
            KeyCode::Esc => Some(Action::Quit),
            KeyCode::Char(' ') => Some(Action::TogglePause),
            KeyCode::Char('t') | KeyCode::Char('T') => Some(Action::ToggleTitle),
            KeyCode::Char('c') | KeyCode::Char('C') => Some(Action::ToggleColor),
            KeyCode::Char('r') | KeyCode::Char('R') => Some(Action::Reseed),
            KeyCode::Tab => Some(Action::ToggleAbout),
            KeyCode::Up => Some(Action::LinesUp),
            KeyCode::Down => Some(Action::LinesDown),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::FpsUp),
            KeyCode::Char('-') | KeyCode::Char('_') => Some(Action::FpsDown),
            _ => None,
        },
        Scene::About => match ev.key {
            KeyCode::Esc | KeyCode::Tab => Some(Action::ToggleAbout),
            _ => None,
        },
    }
}
