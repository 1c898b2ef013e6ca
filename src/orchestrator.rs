//! Orchestrator
//!
//! Single-threaded loop that owns the sound engine. Commands arrive over a
//! channel from the keyboard listener (and anything else holding a sender);
//! outcomes are published on the event bus. Between commands the loop reaps
//! finished voices.

use std::collections::HashSet;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::audio_system::{KeySoundEngine, PlayOutcome};
use crate::error::SettingsError;
use crate::messaging::{Command, Event, EventBus};
use crate::settings::{Settings, SettingsChange, SettingsStore};
use crate::sound::{classify, Action, KeyInput, SoundKey};

/// Idle interval between completion sweeps
const IDLE_TICK: Duration = Duration::from_millis(50);

pub struct Orchestrator {
    engine: KeySoundEngine,
    settings: Settings,
    store: Box<dyn SettingsStore>,
    bus: EventBus,
    /// Keys currently down, by physical identity
    held: HashSet<String>,
}

impl Orchestrator {
    /// Load settings (filling in defaults) and take ownership of the engine
    pub fn new(
        engine: KeySoundEngine,
        mut store: Box<dyn SettingsStore>,
        bus: EventBus,
    ) -> Result<Self, SettingsError> {
        let settings = store.merge_defaults()?;
        Ok(Self {
            engine,
            settings,
            store,
            bus,
            held: HashSet::new(),
        })
    }

    pub fn engine(&self) -> &KeySoundEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut KeySoundEngine {
        &mut self.engine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Apply the stored volume and initialize the engine
    ///
    /// Returns whether the engine is ready. A failure is published and logged;
    /// the loop keeps running so the keyboard hook is never disturbed.
    pub fn start(&mut self) -> bool {
        self.engine
            .set_volume_with_ramp(self.settings.volume, Duration::ZERO);

        match self.engine.initialize() {
            Ok(()) => {
                self.bus.publish(Event::Ready {
                    preloading: self.engine.preloading_stats(),
                });
                true
            }
            Err(e) => {
                tracing::error!("Key sounds disabled: {}", e);
                self.bus.publish(Event::InitFailed {
                    message: e.to_string(),
                });
                false
            }
        }
    }

    /// Run until `Command::Shutdown` or until every sender is gone
    pub fn run(&mut self, commands: Receiver<Command>) {
        self.start();
        tracing::info!("Orchestrator running");

        loop {
            match commands.recv_timeout(IDLE_TICK) {
                Ok(command) => {
                    if !self.handle(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.engine.process_completions();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("Command channel closed");
                    break;
                }
            }
        }

        self.shutdown();
    }

    /// Handle one command; returns false when the loop should stop
    pub fn handle(&mut self, command: Command) -> bool {
        tracing::trace!("Handling command: {}", command.description());
        match command {
            Command::Key { input, action } => self.handle_key(&input, action),
            Command::ApplySettings { changes } => self.apply_settings(&changes),
            Command::ToggleMute => {
                let muted = self.engine.toggle_mute();
                if !muted {
                    self.persist_volume();
                }
                self.bus.publish(Event::MuteToggled { muted });
            }
            Command::SetVolume { volume } => {
                self.apply_settings(&[SettingsChange::Volume(volume)]);
            }
            Command::ReportStats => {
                self.bus.publish(Event::Stats {
                    preloading: self.engine.preloading_stats(),
                    concurrency: self.engine.concurrent_sounds_stats(),
                });
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn handle_key(&mut self, input: &KeyInput, action: Action) {
        let identity = input.identity().to_lowercase();
        match action {
            Action::Press => {
                // Held keys repeat presses without a release in between
                if !self.held.insert(identity) {
                    return;
                }
            }
            Action::Release => {
                self.held.remove(&identity);
            }
        }

        let category = classify(input);
        if !self.settings.should_play(category, action) {
            return;
        }

        let key = SoundKey::new(action, category);
        match self.engine.play_sound(category, action) {
            PlayOutcome::Started(_) => self.bus.publish(Event::SoundPlayed { key }),
            PlayOutcome::Skipped(reason) => {
                self.bus.publish(Event::SoundSkipped { key, reason })
            }
        }
    }

    fn apply_settings(&mut self, changes: &[SettingsChange]) {
        let mut changed = false;

        for change in changes {
            if let Err(e) = change.validate() {
                tracing::warn!("Rejected settings change: {}", e);
                self.bus.publish(Event::ErrorOccurred {
                    message: e.to_string(),
                    context: "settings".to_string(),
                });
                continue;
            }

            match self.store.set(change) {
                Ok(stored) => self.settings = stored,
                Err(e) => {
                    // Keep running on the in-memory value
                    tracing::error!("Failed to persist {}: {}", change.field(), e);
                    self.settings.apply(change);
                }
            }
            changed = true;

            match *change {
                SettingsChange::Volume(volume) => {
                    self.engine.set_volume(volume);
                    self.bus.publish(Event::VolumeChanged {
                        volume: self.engine.volume(),
                        muted: self.engine.is_muted(),
                    });
                }
                SettingsChange::Enabled(false) => {
                    self.engine.stop_all_sounds();
                }
                _ => {}
            }
        }

        if changed {
            tracing::debug!("Settings updated: {:?}", self.settings);
            self.bus.publish(Event::SettingsChanged {
                settings: self.settings.clone(),
            });
        }
    }

    /// Store the engine's current volume so an unmute survives a restart
    fn persist_volume(&mut self) {
        if self.settings.volume == self.engine.volume() {
            return;
        }
        let change = SettingsChange::Volume(self.engine.volume());
        match self.store.set(&change) {
            Ok(stored) => self.settings = stored,
            Err(e) => {
                tracing::error!("Failed to persist {}: {}", change.field(), e);
                self.settings.apply(&change);
            }
        }
    }

    fn shutdown(&mut self) {
        self.engine.destroy();
        self.held.clear();
        self.bus.publish(Event::Shutdown);
        tracing::info!("Orchestrator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::{HeadlessPlatform, ManualClock, SkipReason, SynthFetcher};
    use crate::config::EngineConfig;
    use crate::settings::MemorySettingsStore;
    use crate::sound::KeyCategory;
    use std::sync::Arc;

    fn orchestrator(platform: &HeadlessPlatform) -> (Orchestrator, Receiver<Event>) {
        let engine = KeySoundEngine::new(
            EngineConfig::default(),
            Box::new(platform.clone()),
            Arc::new(SynthFetcher),
            Arc::new(ManualClock::new()),
        );
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();
        let orchestrator =
            Orchestrator::new(engine, Box::new(MemorySettingsStore::new()), bus).unwrap();
        (orchestrator, rx)
    }

    fn drain(rx: &Receiver<Event>) -> Vec<Event> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_start_publishes_ready() {
        let platform = HeadlessPlatform::new();
        let (mut orchestrator, rx) = orchestrator(&platform);
        assert!(orchestrator.start());
        assert!(matches!(drain(&rx).first(), Some(Event::Ready { .. })));
    }

    #[test]
    fn test_start_failure_publishes_init_failed() {
        let platform = HeadlessPlatform::new();
        platform.set_unavailable(true);
        let (mut orchestrator, rx) = orchestrator(&platform);
        assert!(!orchestrator.start());
        assert!(matches!(drain(&rx).first(), Some(Event::InitFailed { .. })));

        // Keys are still accepted, just silent
        assert!(orchestrator.handle(Command::press(KeyInput::new("a", "KeyA"))));
        assert!(matches!(
            drain(&rx).first(),
            Some(Event::SoundSkipped {
                reason: SkipReason::NotInitialized,
                ..
            })
        ));
    }

    #[test]
    fn test_auto_repeat_is_suppressed() {
        let platform = HeadlessPlatform::new();
        let (mut orchestrator, _rx) = orchestrator(&platform);
        orchestrator.start();

        let input = KeyInput::new("a", "KeyA");
        for _ in 0..5 {
            orchestrator.handle(Command::press(input.clone()));
        }
        assert_eq!(platform.sounds_started(), 1);

        orchestrator.handle(Command::release(input.clone()));
        orchestrator.handle(Command::press(input));
        assert_eq!(platform.sounds_started(), 3);
    }

    #[test]
    fn test_category_flags_are_checked() {
        let platform = HeadlessPlatform::new();
        let (mut orchestrator, rx) = orchestrator(&platform);
        orchestrator.start();
        orchestrator.handle(Command::ApplySettings {
            changes: vec![
                SettingsChange::SpaceEnabled(false),
                SettingsChange::ReleaseSounds(false),
            ],
        });

        orchestrator.handle(Command::press(KeyInput::new(" ", "Space")));
        orchestrator.handle(Command::release(KeyInput::new(" ", "Space")));
        orchestrator.handle(Command::press(KeyInput::new("Enter", "Enter")));
        assert_eq!(platform.sounds_started(), 1);

        let played: Vec<SoundKey> = drain(&rx)
            .into_iter()
            .filter_map(|event| match event {
                Event::SoundPlayed { key } => Some(key),
                _ => None,
            })
            .collect();
        assert_eq!(played, vec![SoundKey::press(KeyCategory::Enter)]);
    }

    #[test]
    fn test_disabled_plays_nothing() {
        let platform = HeadlessPlatform::new();
        let (mut orchestrator, _rx) = orchestrator(&platform);
        orchestrator.start();
        orchestrator.handle(Command::ApplySettings {
            changes: vec![SettingsChange::Enabled(false)],
        });
        orchestrator.handle(Command::press(KeyInput::new("a", "KeyA")));
        assert_eq!(platform.sounds_started(), 0);
        assert!(!orchestrator.settings().enabled);
    }

    #[test]
    fn test_set_volume_persists_and_publishes() {
        let platform = HeadlessPlatform::new();
        let (mut orchestrator, rx) = orchestrator(&platform);
        orchestrator.start();
        drain(&rx);

        orchestrator.handle(Command::SetVolume { volume: 0.3 });
        assert_eq!(orchestrator.settings().volume, 0.3);
        assert_eq!(orchestrator.engine().volume(), 0.3);

        let events = drain(&rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::VolumeChanged { muted: false, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SettingsChanged { .. })));
    }

    #[test]
    fn test_invalid_volume_is_rejected() {
        let platform = HeadlessPlatform::new();
        let (mut orchestrator, rx) = orchestrator(&platform);
        orchestrator.start();
        drain(&rx);

        orchestrator.handle(Command::SetVolume { volume: 4.0 });
        assert_eq!(orchestrator.settings().volume, 0.5);
        assert!(matches!(
            drain(&rx).first(),
            Some(Event::ErrorOccurred { .. })
        ));
    }

    #[test]
    fn test_toggle_mute_silences_keys() {
        let platform = HeadlessPlatform::new();
        let (mut orchestrator, rx) = orchestrator(&platform);
        orchestrator.start();
        drain(&rx);

        orchestrator.handle(Command::ToggleMute);
        assert!(matches!(
            drain(&rx).first(),
            Some(Event::MuteToggled { muted: true })
        ));
        orchestrator.handle(Command::press(KeyInput::new("a", "KeyA")));
        assert_eq!(platform.sounds_started(), 0);
    }

    #[test]
    fn test_unmute_persists_restored_volume() {
        let platform = HeadlessPlatform::new();
        let (mut orchestrator, _rx) = orchestrator(&platform);
        orchestrator.start();

        orchestrator.handle(Command::SetVolume { volume: 0.0 });
        assert_eq!(orchestrator.settings().volume, 0.0);
        assert!(orchestrator.engine().is_muted());

        orchestrator.handle(Command::ToggleMute);
        assert!(!orchestrator.engine().is_muted());
        assert!(orchestrator.engine().volume() > 0.0);
        assert_eq!(orchestrator.settings().volume, orchestrator.engine().volume());
    }

    #[test]
    fn test_run_until_shutdown() {
        let platform = HeadlessPlatform::new();
        let (mut orchestrator, rx) = orchestrator(&platform);
        let (tx, commands) = crossbeam_channel::unbounded();

        tx.send(Command::press(KeyInput::new("a", "KeyA"))).unwrap();
        tx.send(Command::ReportStats).unwrap();
        tx.send(Command::Shutdown).unwrap();
        orchestrator.run(commands);

        assert!(!orchestrator.engine().is_ready());
        let events = drain(&rx);
        assert!(events.iter().any(|e| matches!(e, Event::Stats { .. })));
        assert!(matches!(events.last(), Some(Event::Shutdown)));
    }
}
