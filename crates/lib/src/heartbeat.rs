//! CI keep-alive output.
//!
//! CI services kill jobs that stay silent for too long. While a long build
//! runs with quiet logging, the heartbeat prints a `.` at a fixed interval so
//! the job is seen as alive.

use std::io::Write;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Progress marker written on every tick.
const MARKER: &[u8] = b".";

/// A running heartbeat task. Must be stopped with [`Heartbeat::stop`].
pub struct Heartbeat {
  token: CancellationToken,
  handle: JoinHandle<()>,
}

impl Heartbeat {
  /// Start writing to stderr every `every`.
  pub fn start(every: Duration) -> Self {
    Self::spawn(every, std::io::stderr())
  }

  /// Start writing to `writer` every `every`. The first marker is written
  /// after one full interval.
  pub fn spawn<W>(every: Duration, mut writer: W) -> Self
  where
    W: Write + Send + 'static,
  {
    let token = CancellationToken::new();
    let cancelled = token.clone();

    let handle = tokio::spawn(async move {
      let mut ticker = interval(every);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      // The first tick completes immediately
      ticker.tick().await;

      loop {
        tokio::select! {
          _ = cancelled.cancelled() => break,
          _ = ticker.tick() => {
            let _ = writer.write_all(MARKER);
            let _ = writer.flush();
          }
        }
      }
    });

    debug!(interval = ?every, "heartbeat started");
    Self { token, handle }
  }

  /// Stop the task and wait for it to finish.
  pub async fn stop(self) {
    self.token.cancel();
    match self.handle.await {
      Ok(()) => debug!("heartbeat stopped"),
      Err(e) => warn!(error = %e, "heartbeat task failed"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};
  use tracing_test::traced_test;

  #[derive(Clone, Default)]
  struct Captured(Arc<Mutex<Vec<u8>>>);

  impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
      Ok(())
    }
  }

  #[tokio::test]
  async fn writes_markers_while_running() {
    let out = Captured::default();
    let heartbeat = Heartbeat::spawn(Duration::from_millis(10), out.clone());

    tokio::time::sleep(Duration::from_millis(80)).await;
    heartbeat.stop().await;

    let written = out.0.lock().unwrap().clone();
    assert!(written.len() >= 2, "expected several markers, got {:?}", written);
    assert!(written.iter().all(|b| *b == b'.'));
  }

  #[tokio::test]
  async fn stops_promptly_and_writes_nothing_more() {
    let out = Captured::default();
    let heartbeat = Heartbeat::spawn(Duration::from_secs(3600), out.clone());

    heartbeat.stop().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(out.0.lock().unwrap().is_empty());
  }

  #[tokio::test]
  #[traced_test]
  async fn task_failure_is_reported_on_stop() {
    // A zero interval makes the ticker panic inside the task.
    let heartbeat = Heartbeat::spawn(Duration::ZERO, Captured::default());

    heartbeat.stop().await;

    assert!(logs_contain("heartbeat task failed"));
  }
}
