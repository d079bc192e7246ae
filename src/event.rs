use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Application events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Terminal resized; the next draw picks up the new size
  Resize(u16, u16),
  /// Periodic tick for query polling
  Tick,
}

/// Produces events from terminal input and a tick timer.
///
/// The reader runs on a blocking thread because crossterm's poll blocks. It
/// stops when the handler is dropped.
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
  stop: CancellationToken,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let stop = CancellationToken::new();

    let token = stop.clone();
    tokio::task::spawn_blocking(move || read_loop(tx, tick_rate, token));

    Self { rx, stop }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

impl Drop for EventHandler {
  fn drop(&mut self) {
    self.stop.cancel();
  }
}

fn read_loop(tx: mpsc::UnboundedSender<Event>, tick_rate: Duration, stop: CancellationToken) {
  let mut last_tick = Instant::now();

  while !stop.is_cancelled() {
    // Ticks keep coming even while keys are pressed
    let timeout = tick_rate.saturating_sub(last_tick.elapsed());
    let ready = match event::poll(timeout) {
      Ok(ready) => ready,
      Err(e) => {
        warn!(error = %e, "terminal poll failed");
        break;
      }
    };

    if ready {
      let translated = match event::read() {
        Ok(evt) => translate(evt),
        Err(e) => {
          warn!(error = %e, "terminal read failed");
          None
        }
      };
      if let Some(evt) = translated {
        if tx.send(evt).is_err() {
          break;
        }
      }
    }

    if last_tick.elapsed() >= tick_rate {
      if tx.send(Event::Tick).is_err() {
        break;
      }
      last_tick = Instant::now();
    }
  }

  debug!("event reader stopped");
}

/// Map a terminal event to an app event; key releases and repeats are dropped
fn translate(evt: CrosstermEvent) -> Option<Event> {
  match evt {
    CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
    CrosstermEvent::Resize(w, h) => Some(Event::Resize(w, h)),
    _ => None,
  }
}
