/// Messaging module for Event/Command architecture
///
/// This module implements the Event/Command segregation pattern:
/// - **Events**: Notifications of things that happened (past tense, broadcast)
/// - **Commands**: Requests to perform actions (imperative, targeted)
///
/// ## Architecture
///
/// ```text
/// ┌──────────┐     Command      ┌──────────────┐     Event      ┌─────────────┐
/// │ Listener │ ───────────────> │ Orchestrator │ ─────────────> │  Event Bus  │
/// │  (rdev)  │                  │   (engine)   │                │             │
/// └──────────┘                  └──────────────┘                └─────────────┘
///                                                                      │
///                                                                      │ Publishes
///                                                                      ▼
///                                                                ┌──────────┐
///                                                                │ Handlers │
///                                                                │ (status, │
///                                                                │  tests)  │
///                                                                └──────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let event_bus = EventBus::new();
/// let (rx, _id) = event_bus.subscribe();
///
/// let (command_tx, command_rx) = crossbeam_channel::unbounded();
/// command_tx.send(Command::ToggleMute)?;
///
/// while let Ok(event) = rx.recv() {
///     match event {
///         Event::MuteToggled { muted } => { /* update status */ },
///         _ => {}
///     }
/// }
/// ```

pub mod bus;
pub mod commands;
pub mod events;

// Re-export commonly used types
pub use bus::{EventBus, SubscriberId};
pub use commands::Command;
pub use events::Event;
