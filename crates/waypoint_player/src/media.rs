// SPDX-License-Identifier: MIT OR Apache-2.0
//! Simulated media element.

use parking_lot::Mutex;
use std::sync::Arc;
use waypoint_engine::MediaPlayer;

#[derive(Debug, Default)]
struct Playhead {
    time: f64,
    paused: bool,
}

/// A clock-driven stand-in for a video element. The player advances it on
/// every poll tick while it is not paused.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMedia {
    playhead: Arc<Mutex<Playhead>>,
    length: f64,
}

impl SimulatedMedia {
    pub fn new(length: f64) -> Self {
        Self {
            playhead: Arc::default(),
            length,
        }
    }

    /// Advance by `secs` unless paused. Returns the new position.
    pub fn advance(&self, secs: f64) -> f64 {
        let mut playhead = self.playhead.lock();
        if !playhead.paused {
            playhead.time = (playhead.time + secs).min(self.length);
        }
        playhead.time
    }

    pub fn finished(&self) -> bool {
        self.playhead.lock().time >= self.length
    }
}

impl MediaPlayer for SimulatedMedia {
    fn play(&mut self) {
        self.playhead.lock().paused = false;
        tracing::info!("Media playing");
    }

    fn pause(&mut self) {
        let mut playhead = self.playhead.lock();
        playhead.paused = true;
        tracing::info!("Media paused at {:.1}s", playhead.time);
    }

    fn seek(&mut self, secs: f64) {
        self.playhead.lock().time = secs.clamp(0.0, self.length);
    }

    fn current_time(&self) -> f64 {
        self.playhead.lock().time
    }

    fn is_paused(&self) -> bool {
        self.playhead.lock().paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advances_only_while_playing() {
        let media = SimulatedMedia::new(3.0);
        let mut handle = media.clone();
        assert_eq!(media.advance(1.0), 1.0);

        handle.pause();
        assert_eq!(media.advance(1.0), 1.0);

        handle.play();
        assert_eq!(media.advance(5.0), 3.0);
        assert!(media.finished());
    }

    #[test]
    fn test_seek_is_bounded() {
        let mut media = SimulatedMedia::new(10.0);
        media.seek(-2.0);
        assert_eq!(media.current_time(), 0.0);
        media.seek(12.0);
        assert_eq!(media.current_time(), 10.0);
    }
}
