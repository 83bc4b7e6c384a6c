//! Deterministic in-memory [`SynthEngine`].
//!
//! The clock only moves when [`VirtualEngine::advance`] is called, and
//! triggers "fire" when the clock passes their time. Used by the tests and by
//! the CLI to simulate playback without an audio device.

use std::collections::{BTreeMap, HashSet};

use crate::error::ScoreError;

use super::synth::SynthEngine;
use super::types::{BusId, Trigger, TriggerHandle, VoiceRef};

/// A trigger the virtual clock has passed.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredTrigger {
    pub handle: TriggerHandle,
    pub trigger: Trigger,
    /// Bus gain at the moment the trigger fired
    pub gain: f64,
}

#[derive(Debug, Clone)]
pub struct VirtualEngine {
    clock: f64,
    running: bool,
    available: bool,
    failing_voices: HashSet<String>,
    loaded_voices: HashSet<VoiceRef>,
    gains: Vec<f64>,
    next_handle: u64,
    pending: BTreeMap<TriggerHandle, Trigger>,
    fired: Vec<FiredTrigger>,
    cancelled: usize,
}

impl Default for VirtualEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualEngine {
    /// A running engine at time 0.
    pub fn new() -> Self {
        Self {
            clock: 0.0,
            running: true,
            available: true,
            failing_voices: HashSet::new(),
            loaded_voices: HashSet::new(),
            gains: Vec::new(),
            next_handle: 1,
            pending: BTreeMap::new(),
            fired: Vec::new(),
            cancelled: 0,
        }
    }

    /// An engine whose backend failed to initialize.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            running: false,
            ..Self::new()
        }
    }

    /// Make loading `voice` fail with an asset error.
    pub fn fail_voice(mut self, voice: &str) -> Self {
        self.failing_voices.insert(voice.to_string());
        self
    }

    /// Stop the clock until the next [`resume`](SynthEngine::resume).
    pub fn suspend(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Move the clock forward and fire every trigger it passes.
    pub fn advance(&mut self, seconds: f64) {
        self.advance_to(self.clock + seconds);
    }

    /// Move the clock to `time` (never backwards) and fire due triggers.
    pub fn advance_to(&mut self, time: f64) {
        if !self.running || time <= self.clock {
            return;
        }
        self.clock = time;

        let mut due: Vec<TriggerHandle> = self
            .pending
            .iter()
            .filter(|(_, t)| t.time <= self.clock)
            .map(|(h, _)| *h)
            .collect();
        due.sort_by(|a, b| {
            let (ta, tb) = (&self.pending[a], &self.pending[b]);
            ta.time.total_cmp(&tb.time).then(a.cmp(b))
        });
        for handle in due {
            if let Some(trigger) = self.pending.remove(&handle) {
                let gain = self.gains.get(trigger.bus.0 as usize).copied().unwrap_or(1.0);
                self.fired.push(FiredTrigger { handle, trigger, gain });
            }
        }
    }

    /// Everything fired so far, in firing order.
    pub fn fired(&self) -> &[FiredTrigger] {
        &self.fired
    }

    pub fn clear_fired(&mut self) {
        self.fired.clear();
    }

    /// Triggers scheduled but not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of successful cancellations.
    pub fn cancelled(&self) -> usize {
        self.cancelled
    }

    pub fn bus_gain(&self, bus: BusId) -> Option<f64> {
        self.gains.get(bus.0 as usize).copied()
    }

    pub fn is_loaded(&self, voice: &VoiceRef) -> bool {
        self.loaded_voices.contains(voice)
    }
}

impl SynthEngine for VirtualEngine {
    fn now(&self) -> f64 {
        self.clock
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn resume(&mut self) -> Result<(), ScoreError> {
        if !self.available {
            return Err(ScoreError::BackendUnavailable);
        }
        self.running = true;
        Ok(())
    }

    fn load_voice(&mut self, voice: &VoiceRef) -> Result<(), ScoreError> {
        if self.failing_voices.contains(voice.id()) {
            return Err(ScoreError::AssetLoad {
                voice: voice.id().to_string(),
                message: "sample set not found".to_string(),
            });
        }
        self.loaded_voices.insert(voice.clone());
        Ok(())
    }

    fn create_bus(&mut self) -> BusId {
        self.gains.push(1.0);
        BusId(self.gains.len() as u32 - 1)
    }

    fn set_bus_gain(&mut self, bus: BusId, gain: f64) {
        if let Some(slot) = self.gains.get_mut(bus.0 as usize) {
            *slot = gain.clamp(0.0, 1.0);
        }
    }

    fn trigger(&mut self, trigger: Trigger) -> TriggerHandle {
        let handle = TriggerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.insert(handle, trigger);
        handle
    }

    fn cancel(&mut self, handle: TriggerHandle) {
        if self.pending.remove(&handle).is_some() {
            self.cancelled += 1;
        }
    }
}
