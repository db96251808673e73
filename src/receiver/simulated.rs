//! Simulated receiver for running the testbed without hardware
//!
//! Generates samples from per-channel patterns at a fixed sample rate. The
//! [`SignalPattern::Symbols`] pattern emits a symbol message as amplitude
//! levels, which gives the decoders something real to decode.
//!
//! Timestamps are the scheduled sample times (`n / sample_rate_hz`), so the
//! generated stream is reproducible for a given seed.
//!
//! # Example
//!
//! ```ignore
//! use molcomm_rs::receiver::simulated::{SignalPattern, SimulatedReceiver};
//!
//! let mut receiver = SimulatedReceiver::new(vec![SignalPattern::Square {
//!     period: 1.0,
//!     amplitude: 2.0,
//! }])
//! .with_sample_rate(200.0);
//!
//! receiver.open(std::time::Instant::now())?;
//! let sample = receiver.read(std::time::Duration::from_millis(100))?;
//! ```

use crate::config::SimulatedReceiverConfig;
use crate::error::{MolcommError, Result};
use crate::receiver::Receiver;
use crate::types::Sample;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Pattern for generating one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern")]
pub enum SignalPattern {
    /// Constant value
    Constant { value: f64 },
    /// Sine wave
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Square wave alternating between `amplitude` and `-amplitude`
    Square { period: f64, amplitude: f64 },
    /// Linear ramp that resets every period
    Sawtooth { period: f64, amplitude: f64 },
    /// Triangle wave
    Triangle { period: f64, amplitude: f64 },
    /// Uniform random values within range
    Random { min: f64, max: f64 },
    /// A symbol message: `baseline + symbol * amplitude_per_level` per slot
    Symbols {
        symbols: Vec<u32>,
        amplitude_per_level: f64,
        #[serde(default)]
        baseline: f64,
        symbol_duration_s: f64,
        /// Time at baseline before the first symbol
        #[serde(default)]
        lead_in_s: f64,
        /// Loop the message instead of returning to baseline
        #[serde(default)]
        repeat: bool,
    },
}

impl Default for SignalPattern {
    fn default() -> Self {
        SignalPattern::Sine {
            frequency: 1.0,
            amplitude: 1.0,
            offset: 0.0,
        }
    }
}

impl SignalPattern {
    /// Noise-free value at time `t` (seconds)
    pub fn value_at(&self, t: f64, rng: &mut XorShift) -> f64 {
        match self {
            SignalPattern::Constant { value } => *value,
            SignalPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin(),
            SignalPattern::Square { period, amplitude } => {
                if t.rem_euclid(*period) < period / 2.0 {
                    *amplitude
                } else {
                    -amplitude
                }
            }
            SignalPattern::Sawtooth { period, amplitude } => {
                amplitude * (t.rem_euclid(*period) / period)
            }
            SignalPattern::Triangle { period, amplitude } => {
                let phase = t.rem_euclid(*period);
                let half = period / 2.0;
                if phase < half {
                    amplitude * (2.0 * phase / half - 1.0)
                } else {
                    amplitude * (1.0 - 2.0 * (phase - half) / half)
                }
            }
            SignalPattern::Random { min, max } => min + rng.next_f64() * (max - min),
            SignalPattern::Symbols {
                symbols,
                amplitude_per_level,
                baseline,
                symbol_duration_s,
                lead_in_s,
                repeat,
            } => {
                if symbols.is_empty() || *symbol_duration_s <= 0.0 || t < *lead_in_s {
                    return *baseline;
                }
                let mut slot = ((t - lead_in_s) / symbol_duration_s).floor() as usize;
                if *repeat {
                    slot %= symbols.len();
                }
                match symbols.get(slot) {
                    Some(&symbol) => baseline + symbol as f64 * amplitude_per_level,
                    None => *baseline,
                }
            }
        }
    }
}

/// Small deterministic pseudo-random generator (xorshift64)
#[derive(Debug, Clone)]
pub struct XorShift {
    state: u64,
}

impl XorShift {
    pub fn new(seed: u64) -> Self {
        // A zero state would stay zero forever.
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    /// Next value in `[0, 1]`
    pub fn next_f64(&mut self) -> f64 {
        let mut s = self.state;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.state = s;
        (s as f64) / (u64::MAX as f64)
    }
}

/// Receiver that generates samples from patterns
pub struct SimulatedReceiver {
    patterns: Vec<SignalPattern>,
    channel_names: Vec<String>,
    sample_rate_hz: f64,
    noise_amplitude: f64,
    rng: XorShift,
    /// Index of the next sample
    next_index: u64,
    /// Start of the stream; set by `open`
    epoch: Option<Instant>,
    /// Sleep until each sample is due
    paced: bool,
    /// Fail every read after this many samples
    fail_after: Option<u64>,
}

impl SimulatedReceiver {
    /// Create a receiver with one channel per pattern
    pub fn new(patterns: Vec<SignalPattern>) -> Self {
        let channel_names = (1..=patterns.len()).map(|i| format!("ch{}", i)).collect();
        Self {
            patterns,
            channel_names,
            sample_rate_hz: 100.0,
            noise_amplitude: 0.0,
            rng: XorShift::new(12345),
            next_index: 0,
            epoch: None,
            paced: true,
            fail_after: None,
        }
    }

    /// Build from config
    pub fn from_config(config: &SimulatedReceiverConfig) -> Result<Self> {
        if config.channels.is_empty() {
            return Err(MolcommError::Config(
                "Simulated receiver needs at least one channel".to_string(),
            ));
        }
        if !(config.sample_rate_hz > 0.0) {
            return Err(MolcommError::Config(format!(
                "Simulated receiver sample rate must be positive, got {}",
                config.sample_rate_hz
            )));
        }

        let mut receiver = Self::new(config.channels.clone())
            .with_sample_rate(config.sample_rate_hz)
            .with_noise(config.noise_amplitude)
            .with_seed(config.seed);

        if !config.channel_names.is_empty() {
            if config.channel_names.len() == config.channels.len() {
                receiver.channel_names = config.channel_names.clone();
            } else {
                tracing::warn!(
                    "Simulated receiver has {} channel names for {} channels, using generated names",
                    config.channel_names.len(),
                    config.channels.len()
                );
            }
        }

        Ok(receiver)
    }

    /// Set the sample rate in Hz
    pub fn with_sample_rate(mut self, hz: f64) -> Self {
        self.sample_rate_hz = hz;
        self
    }

    /// Add uniform noise of the given peak amplitude
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    /// Seed the noise generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = XorShift::new(seed);
        self
    }

    /// Produce samples as fast as they are read instead of in real time
    pub fn with_pacing(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Simulate a failing sensor: every read after `samples` samples errors
    pub fn with_failure_after(mut self, samples: u64) -> Self {
        self.fail_after = Some(samples);
        self
    }

    /// Scheduled timestamp of the next sample
    pub fn next_timestamp(&self) -> f64 {
        self.next_index as f64 / self.sample_rate_hz
    }

    /// Generate the next sample without waiting for it to be due
    pub fn next_sample(&mut self) -> Sample {
        let t = self.next_timestamp();
        let noise = self.noise_amplitude;
        let rng = &mut self.rng;
        let values = self
            .patterns
            .iter()
            .map(|pattern| {
                let value = pattern.value_at(t, rng);
                if noise > 0.0 {
                    value + (rng.next_f64() - 0.5) * 2.0 * noise
                } else {
                    value
                }
            })
            .collect();
        self.next_index += 1;
        Sample::new(t, values)
    }
}

impl Receiver for SimulatedReceiver {
    fn kind(&self) -> &str {
        "Simulated"
    }

    fn channel_names(&self) -> Vec<String> {
        self.channel_names.clone()
    }

    fn open(&mut self, epoch: Instant) -> Result<()> {
        // Resume after a restart without going back in time
        let elapsed_samples = (epoch.elapsed().as_secs_f64() * self.sample_rate_hz).floor() as u64;
        self.next_index = self.next_index.max(elapsed_samples);
        self.epoch = Some(epoch);
        tracing::debug!(
            "Simulated receiver opened with {} channels at {} Hz",
            self.patterns.len(),
            self.sample_rate_hz
        );
        Ok(())
    }

    fn read(&mut self, timeout: Duration) -> Result<Option<Sample>> {
        if let Some(limit) = self.fail_after {
            if self.next_index >= limit {
                return Err(MolcommError::Receiver(
                    "simulated sensor failure".to_string(),
                ));
            }
        }

        if self.paced {
            let epoch = self.epoch.ok_or_else(|| {
                MolcommError::InvalidState("Simulated receiver read before open".to_string())
            })?;
            let due = Duration::from_secs_f64(self.next_timestamp());
            let elapsed = epoch.elapsed();
            if due > elapsed {
                let wait = due - elapsed;
                if wait > timeout {
                    std::thread::sleep(timeout);
                    return Ok(None);
                }
                std::thread::sleep(wait);
            }
        }

        Ok(Some(self.next_sample()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> XorShift {
        XorShift::new(1)
    }

    #[test]
    fn test_constant_and_square() {
        let mut rng = rng();
        assert_eq!(SignalPattern::Constant { value: 3.5 }.value_at(10.0, &mut rng), 3.5);

        let square = SignalPattern::Square {
            period: 1.0,
            amplitude: 2.0,
        };
        assert_eq!(square.value_at(0.25, &mut rng), 2.0);
        assert_eq!(square.value_at(0.75, &mut rng), -2.0);
    }

    #[test]
    fn test_symbols_pattern() {
        let mut rng = rng();
        let pattern = SignalPattern::Symbols {
            symbols: vec![1, 0, 2],
            amplitude_per_level: 1.5,
            baseline: 0.1,
            symbol_duration_s: 1.0,
            lead_in_s: 0.5,
            repeat: false,
        };

        assert_eq!(pattern.value_at(0.2, &mut rng), 0.1);
        assert_eq!(pattern.value_at(0.6, &mut rng), 1.6);
        assert_eq!(pattern.value_at(1.6, &mut rng), 0.1);
        assert_eq!(pattern.value_at(2.6, &mut rng), 3.1);
        assert_eq!(pattern.value_at(10.0, &mut rng), 0.1);
    }

    #[test]
    fn test_symbols_repeat() {
        let mut rng = rng();
        let pattern = SignalPattern::Symbols {
            symbols: vec![1, 0],
            amplitude_per_level: 1.0,
            baseline: 0.0,
            symbol_duration_s: 1.0,
            lead_in_s: 0.0,
            repeat: true,
        };
        assert_eq!(pattern.value_at(2.5, &mut rng), 1.0);
        assert_eq!(pattern.value_at(3.5, &mut rng), 0.0);
    }

    #[test]
    fn test_random_stays_in_range() {
        let mut rng = rng();
        let pattern = SignalPattern::Random { min: -1.0, max: 1.0 };
        for _ in 0..1000 {
            let v = pattern.value_at(0.0, &mut rng);
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_unpaced_timestamps_follow_sample_rate() {
        let mut receiver = SimulatedReceiver::new(vec![SignalPattern::Constant { value: 1.0 }])
            .with_sample_rate(10.0)
            .with_pacing(false);
        receiver.open(Instant::now()).unwrap();

        let timeout = Duration::from_millis(1);
        let timestamps: Vec<f64> = (0..3)
            .map(|_| receiver.read(timeout).unwrap().unwrap().timestamp)
            .collect();
        assert_eq!(timestamps, vec![0.0, 0.1, 0.2]);
    }

    #[test]
    fn test_paced_read_times_out_when_not_due() {
        let mut receiver = SimulatedReceiver::new(vec![SignalPattern::Constant { value: 1.0 }])
            .with_sample_rate(1.0);
        receiver.open(Instant::now()).unwrap();

        // First sample is due immediately, the second only after one second.
        assert!(receiver.read(Duration::from_millis(5)).unwrap().is_some());
        assert!(receiver.read(Duration::from_millis(5)).unwrap().is_none());
    }

    #[test]
    fn test_failure_after() {
        let mut receiver = SimulatedReceiver::new(vec![SignalPattern::default()])
            .with_pacing(false)
            .with_failure_after(2);
        receiver.open(Instant::now()).unwrap();

        let timeout = Duration::from_millis(1);
        assert!(receiver.read(timeout).is_ok());
        assert!(receiver.read(timeout).is_ok());
        assert!(matches!(receiver.read(timeout), Err(MolcommError::Receiver(_))));
    }

    #[test]
    fn test_from_config_validates() {
        let config = SimulatedReceiverConfig {
            channels: Vec::new(),
            ..SimulatedReceiverConfig::default()
        };
        assert!(SimulatedReceiver::from_config(&config).is_err());

        let config = SimulatedReceiverConfig {
            channel_names: vec!["a".to_string(), "b".to_string()],
            ..SimulatedReceiverConfig::default()
        };
        let receiver = SimulatedReceiver::from_config(&config).unwrap();
        assert_eq!(receiver.channel_names(), vec!["ch1".to_string()]);
    }

    #[test]
    fn test_noise_is_reproducible() {
        let make = || {
            SimulatedReceiver::new(vec![SignalPattern::Constant { value: 0.0 }])
                .with_noise(0.5)
                .with_seed(7)
        };
        let mut a = make();
        let mut b = make();
        for _ in 0..10 {
            let sa = a.next_sample();
            assert_eq!(sa, b.next_sample());
            assert!(sa.values[0].abs() <= 0.5);
        }
    }
}
