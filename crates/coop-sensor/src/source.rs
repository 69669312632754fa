//! Sensor acquisition contract
//!
//! Raw acquisition (DHT, LDR, MQ gas sensor) is an external collaborator;
//! this trait is its observable surface. A read never blocks the run loop.
//! Acquisition failures are not distinguished from zero readings in the
//! current design; a source that wants to signal failure returns zeros.

/// One raw acquisition across all attached sensors
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
    /// Normalized light level, 0.0 to 1.0
    pub luminosity: f64,
    /// Gas sensor digital line, 0.0 or 1.0
    pub hazardous_gas_warning: f64,
}

/// Source of raw sensor readings
pub trait SensorSource: Send {
    /// Read all attached sensors once; must not block
    fn read(&mut self) -> SensorReading;
}

/// Source returning a fixed reading, for tests and dry runs
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSource(pub SensorReading);

impl SensorSource for FixedSource {
    fn read(&mut self) -> SensorReading {
        self.0
    }
}
