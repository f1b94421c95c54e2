//! Wheel Speed Conversion

use crate::error::FilterError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Unit of the derived linear speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    /// Kilometres per hour
    #[default]
    KmPerHour,
    /// Metres per second
    MPerSecond,
    /// Centimetres per second
    CmPerSecond,
}

impl SpeedUnit {
    /// Conversion from metres per minute
    fn per_m_per_min(self) -> f64 {
        match self {
            SpeedUnit::KmPerHour => 60.0 / 1000.0,
            SpeedUnit::MPerSecond => 1.0 / 60.0,
            SpeedUnit::CmPerSecond => 100.0 / 60.0,
        }
    }

    /// Short label for status output
    pub fn label(self) -> &'static str {
        match self {
            SpeedUnit::KmPerHour => "km/h",
            SpeedUnit::MPerSecond => "m/s",
            SpeedUnit::CmPerSecond => "cm/s",
        }
    }
}

/// Physical constants of the measured wheel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelGeometry {
    /// Wheel radius in metres
    pub wheel_radius_m: f64,
    /// Sensor revolutions per wheel revolution
    pub sensor_ratio: f64,
    /// Output unit
    pub unit: SpeedUnit,
}

impl Default for WheelGeometry {
    fn default() -> Self {
        Self {
            wheel_radius_m: 0.0325,
            sensor_ratio: 1.0,
            unit: SpeedUnit::KmPerHour,
        }
    }
}

/// Maps rotational speed (rpm) to linear speed
#[derive(Debug, Clone, Copy)]
pub struct SpeedCalculator {
    geometry: WheelGeometry,
    factor: f64,
}

impl SpeedCalculator {
    /// Create a calculator for the given wheel
    pub fn new(geometry: WheelGeometry) -> Result<Self, FilterError> {
        if !(geometry.wheel_radius_m.is_finite() && geometry.wheel_radius_m > 0.0) {
            return Err(FilterError::InvalidGeometry(format!(
                "wheel radius {} m",
                geometry.wheel_radius_m
            )));
        }
        if !(geometry.sensor_ratio.is_finite() && geometry.sensor_ratio > 0.0) {
            return Err(FilterError::InvalidGeometry(format!(
                "sensor ratio {}",
                geometry.sensor_ratio
            )));
        }

        Ok(Self {
            geometry,
            factor: speed_per_rpm(&geometry),
        })
    }

    /// Linear speed for a (filtered) sensor rpm
    ///
    /// Linear in rpm: zero maps to zero and reverse rotation to a negative speed.
    pub fn speed(&self, filtered_rpm: f64) -> f64 {
        filtered_rpm * self.factor
    }

    /// Wheel geometry in use
    pub fn geometry(&self) -> &WheelGeometry {
        &self.geometry
    }
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        let geometry = WheelGeometry::default();
        Self {
            geometry,
            factor: speed_per_rpm(&geometry),
        }
    }
}

fn speed_per_rpm(geometry: &WheelGeometry) -> f64 {
    let circumference_m = 2.0 * PI * geometry.wheel_radius_m;
    circumference_m / geometry.sensor_ratio * geometry.unit.per_m_per_min()
}

#[cfg(test)]
mod tests {
    use super::*;

    // One metre of circumference per revolution
    fn unit_wheel(unit: SpeedUnit) -> WheelGeometry {
        WheelGeometry {
            wheel_radius_m: 1.0 / (2.0 * PI),
            sensor_ratio: 1.0,
            unit,
        }
    }

    #[test]
    fn test_unit_conversion() {
        let kmh = SpeedCalculator::new(unit_wheel(SpeedUnit::KmPerHour)).unwrap();
        let ms = SpeedCalculator::new(unit_wheel(SpeedUnit::MPerSecond)).unwrap();
        let cms = SpeedCalculator::new(unit_wheel(SpeedUnit::CmPerSecond)).unwrap();

        // 60 rpm on a 1 m wheel is 1 m/s
        assert!((kmh.speed(60.0) - 3.6).abs() < 1e-9);
        assert!((ms.speed(60.0) - 1.0).abs() < 1e-9);
        assert!((cms.speed(60.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensor_ratio() {
        let geometry = WheelGeometry {
            sensor_ratio: 2.0,
            ..unit_wheel(SpeedUnit::MPerSecond)
        };
        let calc = SpeedCalculator::new(geometry).unwrap();
        assert!((calc.speed(120.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_and_negative() {
        let calc = SpeedCalculator::default();
        assert_eq!(calc.speed(0.0), 0.0);
        assert!((calc.speed(-300.0) + calc.speed(300.0)).abs() < 1e-12);
        assert!(calc.speed(-300.0) < 0.0);
    }

    #[test]
    fn test_default_matches_new() {
        let a = SpeedCalculator::default();
        let b = SpeedCalculator::new(WheelGeometry::default()).unwrap();
        assert_eq!(a.speed(1234.0), b.speed(1234.0));
    }

    #[test]
    fn test_invalid_geometry() {
        let zero_radius = WheelGeometry {
            wheel_radius_m: 0.0,
            ..Default::default()
        };
        assert!(SpeedCalculator::new(zero_radius).is_err());

        let bad_ratio = WheelGeometry {
            sensor_ratio: f64::INFINITY,
            ..Default::default()
        };
        assert!(SpeedCalculator::new(bad_ratio).is_err());
    }
}
