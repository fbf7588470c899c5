//! Line-oriented terminal surface
//!
//! Renders [`GameMessage`]s to stdout and turns stdin lines into
//! [`PlayerEvent`]s. Stdin is read on a plain thread so a pending read never
//! holds the runtime open at exit.

use std::io::{self, BufRead, Write};
use std::thread;

use tokio::sync::mpsc;

use whosthat_core::{
    display_name, AnswerMode, Cue, Effects, GameMessage, NotifyLevel, Outcome, Phase,
    PlayerEvent, SessionResult,
};

/// Typed input that leaves the session
const QUIT_COMMANDS: [&str; 3] = [":q", "quit", "exit"];

/// Terminal bell for correct and wrong answers
pub struct BellEffects {
    enabled: bool,
}

impl BellEffects {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Effects for BellEffects {
    fn play(&self, cue: Cue) {
        if !self.enabled {
            return;
        }
        if matches!(cue, Cue::Correct | Cue::Wrong) {
            let mut out = io::stdout();
            let _ = out.write_all(b"\x07");
            let _ = out.flush();
        }
    }
}

/// Turn one input line into an event
pub fn parse_input(line: &str, mode: AnswerMode) -> Option<PlayerEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if QUIT_COMMANDS.contains(&line.to_lowercase().as_str()) {
        return Some(PlayerEvent::quit());
    }
    if let AnswerMode::MultipleChoice(_) = mode {
        if let Some(index) = line.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) {
            return Some(PlayerEvent::choice(index));
        }
    }
    Some(PlayerEvent::text(line))
}

/// Forward stdin lines as player events until stdin closes
pub fn spawn_input(mode: AnswerMode, events: mpsc::Sender<PlayerEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if let Some(event) = parse_input(&line, mode) {
                if events.blocking_send(event).is_err() {
                    break;
                }
            }
        }
        tracing::debug!("Input thread finished");
    });
}

/// Print messages until the conductor goes away
pub async fn render(mut rx: mpsc::Receiver<GameMessage>) {
    let mut out = io::stdout();
    while let Some(msg) = rx.recv().await {
        if let Err(e) = render_message(&mut out, &msg) {
            tracing::warn!(error = %e, "Failed to write to terminal");
            break;
        }
    }
}

fn render_message(out: &mut impl Write, msg: &GameMessage) -> io::Result<()> {
    match msg {
        GameMessage::SessionStarted {
            config, pool_size, ..
        } => {
            writeln!(out, "Who's That?")?;
            writeln!(
                out,
                "Generations {} | {} rounds | {}s per guess | {}{}",
                config.categories_label(),
                config.round_count,
                config.time_limit_secs,
                match config.answer_mode {
                    AnswerMode::MultipleChoice(n) => format!("{n} options"),
                    AnswerMode::FreeText => "free text".to_string(),
                },
                if config.sudden_death {
                    " | sudden death"
                } else {
                    ""
                },
            )?;
            writeln!(out, "{pool_size} candidates. Type :q to quit.")?;
        }
        GameMessage::RoundPresented {
            round_index,
            round_count,
            options,
            ..
        } => {
            writeln!(out)?;
            writeln!(out, "Round {round_index}/{round_count}: who's that?")?;
            for (i, option) in options.iter().enumerate() {
                writeln!(out, "  {}) {}", i + 1, display_name(option))?;
            }
        }
        GameMessage::GuessingStarted { time_limit_secs } => {
            write!(out, "[{time_limit_secs}s] > ")?;
        }
        GameMessage::Tick { time_remaining } => {
            if *time_remaining <= 3 {
                write!(out, "[{time_remaining}s] ")?;
            }
        }
        GameMessage::AnswerRevealed { verdict } => {
            writeln!(out)?;
            let name = display_name(&verdict.entity.name);
            if verdict.correct {
                writeln!(out, "Correct! It's {name}!")?;
            } else if verdict.timed_out {
                writeln!(out, "Time's up! It's {name}.")?;
            } else {
                writeln!(out, "Nope, it's {name}.")?;
            }
            writeln!(
                out,
                "  #{} | {} | {:.1} m | {:.1} kg | score {}",
                verdict.entity.id,
                verdict.entity.types.join("/"),
                verdict.entity.height_meters(),
                verdict.entity.weight_kilograms(),
                verdict.score,
            )?;
            if verdict.ends_session {
                writeln!(out, "Sudden death!")?;
            }
        }
        GameMessage::Rejected { reason, .. } => {
            writeln!(out, "  ({reason})")?;
        }
        GameMessage::Notify { level, message } => {
            let tag = match level {
                NotifyLevel::Info => "info",
                NotifyLevel::Success => "yay",
                NotifyLevel::Warning => "warning",
                NotifyLevel::Error => "error",
            };
            writeln!(out, "[{tag}] {message}")?;
        }
        GameMessage::SessionComplete { result } => render_result(out, result)?,
        GameMessage::ProgressUpdated {
            high_score,
            newly_unlocked,
            ..
        } => {
            writeln!(out, "High score: {high_score}")?;
            if !newly_unlocked.is_empty() {
                let names: Vec<String> = newly_unlocked.iter().map(|n| display_name(n)).collect();
                writeln!(out, "Added to your collection: {}", names.join(", "))?;
            }
        }
        GameMessage::State { snapshot } => {
            tracing::trace!(phase = ?snapshot.phase, round = snapshot.round_index, "State");
            if snapshot.phase == Phase::Loading && snapshot.round_index > 1 {
                writeln!(out, "...")?;
            }
        }
        GameMessage::Ack { .. } => {}
    }
    out.flush()
}

fn render_result(out: &mut impl Write, result: &SessionResult) -> io::Result<()> {
    writeln!(out)?;
    match &result.outcome {
        Outcome::Completed => writeln!(out, "Session complete!")?,
        Outcome::SuddenDeathLoss => writeln!(out, "Game over!")?,
        Outcome::Abandoned => writeln!(out, "Session abandoned.")?,
        Outcome::Error { message } => writeln!(out, "Session ended early: {message}")?,
    }
    writeln!(
        out,
        "Score: {}/{} ({}%)",
        result.score,
        result.rounds_played,
        result.percentage()
    )?;
    writeln!(out, "{}", result.rating().message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_pick_options_in_choice_mode() {
        let event = parse_input(" 2 ", AnswerMode::MultipleChoice(4)).unwrap();
        assert!(matches!(event, PlayerEvent::ChoiceSelected { index: 1, .. }));
    }

    #[test]
    fn test_numbers_are_text_in_free_mode() {
        let event = parse_input("2", AnswerMode::FreeText).unwrap();
        assert!(matches!(event, PlayerEvent::TextSubmitted { ref text, .. } if text == "2"));
    }

    #[test]
    fn test_zero_is_text() {
        let event = parse_input("0", AnswerMode::MultipleChoice(4)).unwrap();
        assert!(matches!(event, PlayerEvent::TextSubmitted { .. }));
    }

    #[test]
    fn test_quit_and_blank() {
        assert!(matches!(
            parse_input(":Q", AnswerMode::FreeText),
            Some(PlayerEvent::QuitRequested { .. })
        ));
        assert!(parse_input("   ", AnswerMode::FreeText).is_none());
    }

    #[test]
    fn test_round_header_uses_round_index() {
        let mut buf = Vec::new();
        let msg = GameMessage::RoundPresented {
            round_index: 3,
            round_count: 3,
            image_url: "memory://artwork/122.png".to_string(),
            options: vec!["mr-mime".to_string(), "squirtle".to_string()],
        };
        render_message(&mut buf, &msg).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "\nRound 3/3: who's that?\n  1) Mr Mime\n  2) Squirtle\n"
        );
    }

    #[test]
    fn test_notification_line() {
        let mut buf = Vec::new();
        let msg = GameMessage::Notify {
            level: NotifyLevel::Warning,
            message: "Progress was not saved".to_string(),
        };
        render_message(&mut buf, &msg).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "[warning] Progress was not saved\n"
        );
    }
}
