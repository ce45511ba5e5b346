/// System mixer abstraction.
///
/// `MixerBackend` is the thin OS-facing collaborator (ALSA, nircmd, ...).
/// `MixerSink` owns one backend for the lifetime of a run, enforces the
/// volume ceiling and suppresses redundant writes.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::MAX_VOLUME_LEVEL;

/// Platform volume control. Levels are 0-99.
pub trait MixerBackend {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Read the current master level.
    fn get_level(&mut self) -> Result<u8>;

    /// Write the master level.
    fn set_level(&mut self, level: u8) -> Result<()>;
}

pub struct MixerSink {
    backend: Box<dyn MixerBackend>,
    max_volume: u8,
    /// Last level known to be applied
    current: u8,
}

impl MixerSink {
    /// Wrap a backend. The initial level is read from the backend so the
    /// first redundant write is already suppressed.
    pub fn new(mut backend: Box<dyn MixerBackend>, max_volume: u8) -> Result<Self> {
        let max_volume = max_volume.min(MAX_VOLUME_LEVEL);
        let current = backend.get_level()?.min(MAX_VOLUME_LEVEL);
        debug!(backend = backend.name(), current, max_volume, "Mixer opened");
        Ok(Self {
            backend,
            max_volume,
            current,
        })
    }

    pub fn current_level(&self) -> u8 {
        self.current
    }

    pub fn max_volume(&self) -> u8 {
        self.max_volume
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Clamp `level` to the ceiling and write it if it differs from the
    /// current level. Returns true when the backend was called.
    pub fn apply(&mut self, level: u8) -> Result<bool> {
        let level = level.min(self.max_volume);
        if level == self.current {
            return Ok(false);
        }

        self.backend
            .set_level(level)
            .map_err(|e| match e {
                Error::MixerUnavailable(_) => e,
                other => Error::mixer(other),
            })?;
        self.current = level;
        info!("Volume set to {}", level);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        level: u8,
        sets: Vec<u8>,
        fail: bool,
    }

    struct FakeMixer(Arc<Mutex<Recorded>>);

    impl MixerBackend for FakeMixer {
        fn name(&self) -> &str {
            "fake"
        }

        fn get_level(&mut self) -> Result<u8> {
            Ok(self.0.lock().unwrap().level)
        }

        fn set_level(&mut self, level: u8) -> Result<()> {
            let mut rec = self.0.lock().unwrap();
            if rec.fail {
                return Err(Error::mixer("device went away"));
            }
            rec.level = level;
            rec.sets.push(level);
            Ok(())
        }
    }

    fn sink(initial: u8, max: u8) -> (MixerSink, Arc<Mutex<Recorded>>) {
        let rec = Arc::new(Mutex::new(Recorded {
            level: initial,
            ..Default::default()
        }));
        let sink = MixerSink::new(Box::new(FakeMixer(Arc::clone(&rec))), max).unwrap();
        (sink, rec)
    }

    #[test]
    fn test_clamps_to_ceiling() {
        let (mut sink, rec) = sink(0, 30);
        for level in [0u8, 10, 29, 30, 31, 50, 99] {
            sink.apply(level).unwrap();
            assert_eq!(sink.current_level(), level.min(30));
        }
        assert_eq!(rec.lock().unwrap().level, 30);
    }

    #[test]
    fn test_idempotent_apply() {
        let (mut sink, rec) = sink(0, 99);
        assert!(sink.apply(40).unwrap());
        assert!(!sink.apply(40).unwrap());
        assert_eq!(rec.lock().unwrap().sets, vec![40]);
    }

    #[test]
    fn test_levels_above_ceiling_collapse_to_one_write() {
        let (mut sink, rec) = sink(0, 30);
        sink.apply(60).unwrap();
        sink.apply(99).unwrap();
        sink.apply(31).unwrap();
        assert_eq!(rec.lock().unwrap().sets, vec![30]);
    }

    #[test]
    fn test_initial_level_suppresses_first_write() {
        let (mut sink, rec) = sink(25, 30);
        assert_eq!(sink.current_level(), 25);
        assert!(!sink.apply(25).unwrap());
        assert!(rec.lock().unwrap().sets.is_empty());
    }

    #[test]
    fn test_ceiling_capped_at_99() {
        let (sink, _) = sink(0, 150);
        assert_eq!(sink.max_volume(), MAX_VOLUME_LEVEL);
    }

    #[test]
    fn test_failure_keeps_state() {
        let (mut sink, rec) = sink(5, 99);
        rec.lock().unwrap().fail = true;
        let err = sink.apply(20).unwrap_err();
        assert!(matches!(err, Error::MixerUnavailable(_)));
        assert_eq!(sink.current_level(), 5);

        // Same level retried after recovery is written, not suppressed
        rec.lock().unwrap().fail = false;
        assert!(sink.apply(20).unwrap());
    }
}
