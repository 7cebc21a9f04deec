//! Sensor readings of a simulated agricultural node.
//!
//! Every node carries the same five environmental sensors. Each cycle produces one
//! reading per sensor, sampled uniformly in the sensor's range and rounded to two
//! decimals (half away from zero, see [`round2`]).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensor kinds carried by every node, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Humidity,
    SoilHumidity,
    Pressure,
    Luminosity,
}

impl SensorType {
    pub const ALL: [SensorType; 5] = [
        SensorType::Temperature,
        SensorType::Humidity,
        SensorType::SoilHumidity,
        SensorType::Pressure,
        SensorType::Luminosity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
            SensorType::SoilHumidity => "soil_humidity",
            SensorType::Pressure => "pressure",
            SensorType::Luminosity => "luminosity",
        }
    }

    /// Documented range of the sensor.
    pub const fn range(self) -> SensorRange {
        let (min, max) = match self {
            SensorType::Temperature => (5.0, 45.0),
            SensorType::Humidity => (20.0, 95.0),
            SensorType::SoilHumidity => (15.0, 80.0),
            SensorType::Pressure => (950.0, 1050.0),
            SensorType::Luminosity => (0.0, 12000.0),
        };
        SensorRange { sensor: self, min, max }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed interval a sensor may report in.
#[derive(Debug, Clone, Copy)]
pub struct SensorRange {
    pub sensor: SensorType,
    pub min: f64,
    pub max: f64,
}

impl SensorRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

pub const SENSOR_RANGES: [SensorRange; 5] = [
    SensorType::Temperature.range(),
    SensorType::Humidity.range(),
    SensorType::SoilHumidity.range(),
    SensorType::Pressure.range(),
    SensorType::Luminosity.range(),
];

/// One sensor value inside a LoRa frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "tipoSensor")]
    pub sensor: SensorType,
    #[serde(rename = "valor")]
    pub value: f64,
}

/// Rounds to two decimals, ties away from zero (`f64::round` semantics).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Samples one reading per entry of [`SENSOR_RANGES`], preserving its order.
pub fn generate_readings<R: Rng + ?Sized>(rng: &mut R) -> Vec<SensorReading> {
    SENSOR_RANGES
        .iter()
        .map(|range| SensorReading {
            sensor: range.sensor,
            value: round2(rng.gen_range(range.min..=range.max)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn has_two_decimals_at_most(value: f64) -> bool {
        round2(value) == value
    }

    #[test]
    fn test_readings_stay_in_range_with_two_decimals() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2_000 {
            for reading in generate_readings(&mut rng) {
                let range = reading.sensor.range();
                assert!(range.contains(reading.value), "{:?} out of range", reading);
                assert!(has_two_decimals_at_most(reading.value), "{:?} not rounded", reading);
            }
        }
    }

    #[test]
    fn test_one_reading_per_sensor_in_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let readings = generate_readings(&mut rng);
        let kinds: Vec<SensorType> = readings.iter().map(|r| r.sensor).collect();
        assert_eq!(kinds, SensorType::ALL.to_vec());

        let unique: HashSet<SensorType> = kinds.into_iter().collect();
        assert_eq!(unique.len(), SensorType::ALL.len());
    }

    #[test]
    fn test_range_table() {
        let sensors: Vec<SensorType> = SENSOR_RANGES.iter().map(|r| r.sensor).collect();
        assert_eq!(sensors, SensorType::ALL.to_vec());

        let pressure = SensorType::Pressure.range();
        assert_eq!((pressure.min, pressure.max), (950.0, 1050.0));
        assert!(SensorType::Luminosity.range().contains(0.0));
        assert!(SensorType::Luminosity.range().contains(12000.0));
        assert!(!SensorType::Temperature.range().contains(45.01));
    }

    #[test]
    fn test_round2_ties_away_from_zero() {
        assert_eq!(round2(12.344), 12.34);
        assert_eq!(round2(12.346), 12.35);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(45.0), 45.0);
    }

    #[test]
    fn test_sensor_wire_names() {
        let reading = SensorReading { sensor: SensorType::SoilHumidity, value: 42.5 };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["tipoSensor"], "soil_humidity");
        assert_eq!(json["valor"], 42.5);

        for sensor in SensorType::ALL {
            let encoded = serde_json::to_value(sensor).unwrap();
            assert_eq!(encoded, sensor.as_str());
        }
    }
}
