//! The hold protocol: a cooperative pause the orchestrator uses to prompt
//! an operator (attach a probe, swap a tool) before resuming the stream.
//!
//! Grounded on `original_source/machine/machine.go`'s `hold()` — a message
//! send, an `M0` that blocks the controller until a cycle-start `~`, then a
//! `"-"` sentinel once the M0 ack returns — recast onto a `broadcast`
//! channel so any number of UI subscribers can observe prompts, the same
//! pattern the teacher uses for controller-wide event fan-out.

use tokio::sync::broadcast;

const HOLD_CHANNEL_CAPACITY: usize = 16;

/// Sentinel published once a hold has been released.
pub const HOLD_CLEARED: &str = "-";

pub struct HoldChannel {
    tx: broadcast::Sender<String>,
}

impl HoldChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HOLD_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, message: impl Into<String>) {
        // No active subscriber is not an error: the prompt is still the
        // operator's responsibility to observe, but nothing here blocks on it.
        let _ = self.tx.send(message.into());
    }
}

impl Default for HoldChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_to_subscribers() {
        let ch = HoldChannel::new();
        let mut rx = ch.subscribe();
        ch.publish("Attach Z-Probe to spindle.");
        ch.publish(HOLD_CLEARED);
        assert_eq!(rx.try_recv().unwrap(), "Attach Z-Probe to spindle.");
        assert_eq!(rx.try_recv().unwrap(), "-");
    }
}
