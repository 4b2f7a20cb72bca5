//! Scripted speech engine shared by the integration tests
//!
//! Each `start` pops the next step from a script (falling back to a default
//! step) and records the text it was asked to speak. Tests run on a paused
//! tokio clock, so the durations below are virtual.

#![allow(dead_code)]

use chatvoice::speech::{Completion, RetryingSpeaker, SpeakerPolicy, SpeechEngine};
use chatvoice::SpeakError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the engine reacts to one `start`
#[derive(Debug, Clone)]
pub enum Step {
    /// Start, then finish after the delay
    Speak(Duration),
    /// Start, then report an engine error after the delay
    Fail(Duration, &'static str),
    /// Report an interruption right away
    Interrupt,
    /// Never start and never finish
    Hang,
    /// Start but never report the end
    StartThenHang,
    /// Refuse synchronously: no backend
    Unavailable,
}

#[derive(Default)]
struct State {
    script: VecDeque<Step>,
    default_step: Option<Step>,
    started: Vec<String>,
    cancels: usize,
    current: Option<Completion>,
}

/// Inspection handle kept by the test
#[derive(Clone, Default)]
pub struct Probe {
    state: Arc<Mutex<State>>,
}

impl Probe {
    /// Texts passed to `start`, in order (includes retries)
    pub fn started(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    /// Distinct consecutive texts, collapsing retries of the same line
    pub fn spoken_lines(&self) -> Vec<String> {
        let mut lines = self.started();
        lines.dedup();
        lines
    }

    pub fn cancels(&self) -> usize {
        self.state.lock().unwrap().cancels
    }

    pub fn push(&self, step: Step) {
        self.state.lock().unwrap().script.push_back(step);
    }
}

pub struct ScriptedEngine {
    probe: Probe,
}

impl ScriptedEngine {
    /// Engine whose unscripted starts use `default_step`
    pub fn new(default_step: Step) -> (Self, Probe) {
        let probe = Probe::default();
        probe.state.lock().unwrap().default_step = Some(default_step);
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl SpeechEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn start(&mut self, text: &str, completion: Completion) -> Result<(), SpeakError> {
        let step = {
            let mut state = self.probe.state.lock().unwrap();
            state.started.push(text.to_string());
            let step = state
                .script
                .pop_front()
                .or_else(|| state.default_step.clone())
                .unwrap_or(Step::Speak(Duration::from_secs(1)));
            state.current = Some(completion.clone());
            step
        };

        match step {
            Step::Speak(delay) => {
                completion.mark_started();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    completion.succeed();
                });
            }
            Step::Fail(delay, message) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    completion.fail(SpeakError::Engine(message.to_string()));
                });
            }
            Step::Interrupt => {
                completion.fail(SpeakError::Interrupted);
            }
            Step::Hang => {}
            Step::StartThenHang => completion.mark_started(),
            Step::Unavailable => {
                return Err(SpeakError::EngineUnavailable("no audio device".to_string()));
            }
        }
        Ok(())
    }

    fn cancel_all(&mut self) {
        let mut state = self.probe.state.lock().unwrap();
        state.cancels += 1;
        if let Some(current) = state.current.take() {
            current.fail(SpeakError::Interrupted);
        }
    }
}

/// Policy with the documented defaults
pub fn default_policy() -> SpeakerPolicy {
    SpeakerPolicy::default()
}

/// Speaker over a scripted engine
pub fn scripted_speaker(default_step: Step) -> (RetryingSpeaker, Probe) {
    let (engine, probe) = ScriptedEngine::new(default_step);
    (
        RetryingSpeaker::new(Box::new(engine), default_policy()),
        probe,
    )
}

/// Let spawned tasks run without advancing far on the paused clock
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
