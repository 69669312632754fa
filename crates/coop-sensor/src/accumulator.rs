//! Running-sum accumulator for sensor samples
//!
//! Owned by the node instance, never shared. The average is only computed
//! when at least one sample has been added; `take_average` couples the
//! read and the reset so a send can never divide by zero or race a reset
//! against a stale count.

use coop_protocol::message::Measurements;

use crate::source::SensorReading;

/// Running sums per measured quantity plus the sample count
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Accumulator {
    sum_temperature: f64,
    sum_humidity: f64,
    sum_luminosity: f64,
    sum_hazardous_gas: f64,
    sample_count: u32,
}

impl Accumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one reading into the running sums
    pub fn add(&mut self, reading: &SensorReading) {
        self.sum_temperature += reading.temperature;
        self.sum_humidity += reading.humidity;
        self.sum_luminosity += reading.luminosity;
        self.sum_hazardous_gas += reading.hazardous_gas_warning;
        self.sample_count += 1;
    }

    /// Samples accumulated since the last reset
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Average the accumulated samples and reset, in one step
    ///
    /// Returns `None` without touching state when no samples have been
    /// accumulated; the caller must skip sending in that case.
    pub fn take_average(&mut self) -> Option<Measurements> {
        if self.sample_count == 0 {
            return None;
        }
        let count = f64::from(self.sample_count);
        let average = Measurements {
            temperature: self.sum_temperature / count,
            humidity: self.sum_humidity / count,
            luminosity: self.sum_luminosity / count,
            hazardous_gas_warning: self.sum_hazardous_gas / count,
        };
        self.reset();
        Some(average)
    }

    /// Zero all sums and the sample count
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temperature: f64) -> SensorReading {
        SensorReading {
            temperature,
            humidity: 50.0,
            luminosity: 0.5,
            hazardous_gas_warning: 0.0,
        }
    }

    #[test]
    fn test_empty_accumulator_yields_nothing() {
        let mut acc = Accumulator::new();
        assert_eq!(acc.take_average(), None);
        assert_eq!(acc.sample_count(), 0);
    }

    #[test]
    fn test_average_of_two_samples() {
        let mut acc = Accumulator::new();
        acc.add(&reading(20.0));
        acc.add(&reading(22.0));
        assert_eq!(acc.sample_count(), 2);

        let avg = acc.take_average().unwrap();
        assert_eq!(avg.temperature, 21.0);
        assert_eq!(avg.humidity, 50.0);
    }

    #[test]
    fn test_take_average_resets() {
        let mut acc = Accumulator::new();
        acc.add(&reading(20.0));
        acc.take_average().unwrap();
        assert_eq!(acc.sample_count(), 0);
        assert_eq!(acc.take_average(), None);
    }

    #[test]
    fn test_gas_trip_ratio() {
        let mut acc = Accumulator::new();
        acc.add(&SensorReading {
            hazardous_gas_warning: 1.0,
            ..Default::default()
        });
        acc.add(&SensorReading::default());
        let avg = acc.take_average().unwrap();
        assert_eq!(avg.hazardous_gas_warning, 0.5);
    }
}
