//! Test data builders for creating test objects

use molcomm_rs::config::{
    DecoderConfig, DecoderKind, ReceiverConfig, SimulatedReceiverConfig,
};
use molcomm_rs::decoder::strategies::OnOffKeyingConfig;
use molcomm_rs::receiver::{SignalPattern, SimulatedReceiver};

/// Builder for simulated receivers that send a keyed message
pub struct MessageReceiverBuilder {
    symbols: Vec<u32>,
    symbol_duration_s: f64,
    lead_in_s: f64,
    sample_rate_hz: f64,
    noise: f64,
    fail_after: Option<u64>,
}

impl MessageReceiverBuilder {
    pub fn new(symbols: &[u32]) -> Self {
        Self {
            symbols: symbols.to_vec(),
            symbol_duration_s: 0.05,
            lead_in_s: 0.05,
            sample_rate_hz: 1000.0,
            noise: 0.0,
            fail_after: None,
        }
    }

    pub fn symbol_duration(mut self, seconds: f64) -> Self {
        self.symbol_duration_s = seconds;
        self
    }

    pub fn lead_in(mut self, seconds: f64) -> Self {
        self.lead_in_s = seconds;
        self
    }

    pub fn sample_rate(mut self, hz: f64) -> Self {
        self.sample_rate_hz = hz;
        self
    }

    pub fn noise(mut self, amplitude: f64) -> Self {
        self.noise = amplitude;
        self
    }

    pub fn fail_after(mut self, samples: u64) -> Self {
        self.fail_after = Some(samples);
        self
    }

    pub fn pattern(&self) -> SignalPattern {
        SignalPattern::Symbols {
            symbols: self.symbols.clone(),
            amplitude_per_level: 1.0,
            baseline: 0.0,
            symbol_duration_s: self.symbol_duration_s,
            lead_in_s: self.lead_in_s,
            repeat: false,
        }
    }

    /// Seconds until the whole message has been sent
    pub fn message_end(&self) -> f64 {
        self.lead_in_s + self.symbols.len() as f64 * self.symbol_duration_s
    }

    pub fn build(self) -> SimulatedReceiver {
        let receiver = SimulatedReceiver::new(vec![self.pattern()])
            .with_sample_rate(self.sample_rate_hz)
            .with_noise(self.noise);
        match self.fail_after {
            Some(samples) => receiver.with_failure_after(samples),
            None => receiver,
        }
    }

    pub fn build_config(self) -> ReceiverConfig {
        ReceiverConfig::Simulated(SimulatedReceiverConfig {
            channels: vec![self.pattern()],
            channel_names: vec!["concentration".to_string()],
            sample_rate_hz: self.sample_rate_hz,
            noise_amplitude: self.noise,
            ..SimulatedReceiverConfig::default()
        })
    }
}

/// On-off keying decoder config over the given receivers
pub fn on_off_keying_config(symbol_duration_s: f64, receivers: Vec<ReceiverConfig>) -> DecoderConfig {
    DecoderConfig::new(
        DecoderKind::OnOffKeying(OnOffKeyingConfig {
            channel: 0,
            threshold: 0.5,
            symbol_duration_s,
        }),
        receivers,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builder() {
        let builder = MessageReceiverBuilder::new(&[1, 0, 1]).symbol_duration(0.1);
        assert!((builder.message_end() - 0.35).abs() < 1e-9);

        match builder.build_config() {
            ReceiverConfig::Simulated(sim) => assert_eq!(sim.channel_names, vec!["concentration"]),
            other => panic!("unexpected receiver {:?}", other),
        }
    }
}
