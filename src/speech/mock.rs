//! Scripted in-memory speech engine.
//!
//! Used by the test suite and by headless embedders: it records every command
//! it receives and lets the harness feed lifecycle events back through the
//! session, standing in for the platform callbacks.

use super::engine::{SpeechEngine, Utterance, Voice};
use anyhow::{Result, anyhow};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Speak(Utterance),
    Cancel,
    Pause,
    Resume,
}

#[derive(Debug)]
struct MockEngineState {
    commands: Vec<EngineCommand>,
    voices: Vec<Voice>,
    supported: bool,
    fail_next_speak: bool,
}

/// Shared view onto the engine's command log, kept by the test harness after
/// the engine itself moves into a driver.
#[derive(Clone)]
pub struct MockHandle {
    state: Rc<RefCell<MockEngineState>>,
}

impl MockHandle {
    pub fn commands(&self) -> Vec<EngineCommand> {
        self.state.borrow().commands.clone()
    }

    /// Texts of every utterance submitted so far, in order.
    pub fn spoken_texts(&self) -> Vec<String> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|command| match command {
                EngineCommand::Speak(utterance) => Some(utterance.text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_utterance(&self) -> Option<Utterance> {
        self.state
            .borrow()
            .commands
            .iter()
            .rev()
            .find_map(|command| match command {
                EngineCommand::Speak(utterance) => Some(utterance.clone()),
                _ => None,
            })
    }

    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    pub fn set_voices(&self, voices: Vec<Voice>) {
        self.state.borrow_mut().voices = voices;
    }

    /// Make the next `speak` call return an error.
    pub fn fail_next_speak(&self) {
        self.state.borrow_mut().fail_next_speak = true;
    }
}

pub struct MockEngine {
    state: Rc<RefCell<MockEngineState>>,
}

impl MockEngine {
    pub fn new() -> (Self, MockHandle) {
        Self::with_voices(vec![Voice {
            id: "mock-en".to_string(),
            name: "Mock English".to_string(),
            language: "en-US".to_string(),
        }])
    }

    pub fn with_voices(voices: Vec<Voice>) -> (Self, MockHandle) {
        let state = Rc::new(RefCell::new(MockEngineState {
            commands: Vec::new(),
            voices,
            supported: true,
            fail_next_speak: false,
        }));
        let handle = MockHandle {
            state: Rc::clone(&state),
        };
        (Self { state }, handle)
    }

    /// An engine that reports synthesis as unavailable.
    pub fn unsupported() -> (Self, MockHandle) {
        let (engine, handle) = Self::with_voices(Vec::new());
        engine.state.borrow_mut().supported = false;
        (engine, handle)
    }
}

impl SpeechEngine for MockEngine {
    fn is_supported(&self) -> bool {
        self.state.borrow().supported
    }

    fn voices(&self) -> Vec<Voice> {
        self.state.borrow().voices.clone()
    }

    fn speak(&mut self, utterance: Utterance) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_next_speak {
            state.fail_next_speak = false;
            return Err(anyhow!("scripted speak failure"));
        }
        state.commands.push(EngineCommand::Speak(utterance));
        Ok(())
    }

    fn cancel(&mut self) {
        self.state.borrow_mut().commands.push(EngineCommand::Cancel);
    }

    fn pause(&mut self) {
        self.state.borrow_mut().commands.push(EngineCommand::Pause);
    }

    fn resume(&mut self) {
        self.state.borrow_mut().commands.push(EngineCommand::Resume);
    }
}
