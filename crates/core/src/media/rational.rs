//! Exact frame rates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A frame rate stored as a reduced fraction, e.g. `30000/1001` for 29.97.
///
/// Equality is exact: `50/2` and `25/1` compare equal, `2997/100` and
/// `30000/1001` do not.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "FrameRateRepr", into = "String")]
pub struct FrameRate {
    num: u32,
    den: u32,
}

impl FrameRate {
    /// 25 frames per second.
    pub const PAL: Self = Self { num: 25, den: 1 };

    /// Creates a frame rate, returning `None` for a zero numerator or denominator.
    pub fn new(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 {
            return None;
        }
        let divisor = gcd(num, den);
        Some(Self {
            num: num / divisor,
            den: den / divisor,
        })
    }

    /// Whole frames per second.
    pub fn integer(fps: u32) -> Option<Self> {
        Self::new(fps, 1)
    }

    pub fn numerator(&self) -> u32 {
        self.num
    }

    pub fn denominator(&self) -> u32 {
        self.den
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Returns the frame rate as an integer when the denominator is one.
    pub fn as_integer(&self) -> Option<u32> {
        (self.den == 1).then_some(self.num)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

impl fmt::Debug for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Error returned when a frame rate string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid frame rate: {0:?}")]
pub struct ParseFrameRateError(pub String);

impl FromStr for FrameRate {
    type Err = ParseFrameRateError;

    /// Accepts `"N/D"`, `"N"` and decimals such as `"29.97"` (kept to three places).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseFrameRateError(s.to_string());
        let s = s.trim();

        if let Some((num, den)) = s.split_once('/') {
            let num = num.trim().parse::<u32>().map_err(|_| invalid())?;
            let den = den.trim().parse::<u32>().map_err(|_| invalid())?;
            return Self::new(num, den).ok_or_else(invalid);
        }

        if let Ok(num) = s.parse::<u32>() {
            return Self::integer(num).ok_or_else(invalid);
        }

        let value = s.parse::<f64>().map_err(|_| invalid())?;
        if !value.is_finite() || value <= 0.0 || value > u32::MAX as f64 / 1000.0 {
            return Err(invalid());
        }
        Self::new((value * 1000.0).round() as u32, 1000).ok_or_else(invalid)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FrameRateRepr {
    Integer(u32),
    Float(f64),
    Text(String),
}

impl TryFrom<FrameRateRepr> for FrameRate {
    type Error = ParseFrameRateError;

    fn try_from(repr: FrameRateRepr) -> Result<Self, Self::Error> {
        match repr {
            FrameRateRepr::Integer(n) => {
                Self::integer(n).ok_or_else(|| ParseFrameRateError(n.to_string()))
            }
            FrameRateRepr::Float(f) => f.to_string().parse(),
            FrameRateRepr::Text(s) => s.parse(),
        }
    }
}

impl From<FrameRate> for String {
    fn from(rate: FrameRate) -> Self {
        rate.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduces_fraction() {
        let rate = FrameRate::new(50, 2).unwrap();
        assert_eq!(rate.numerator(), 25);
        assert_eq!(rate.denominator(), 1);
        assert_eq!(rate, FrameRate::integer(25).unwrap());
    }

    #[test]
    fn test_zero_is_rejected() {
        assert!(FrameRate::new(0, 1).is_none());
        assert!(FrameRate::new(25, 0).is_none());
    }

    #[test]
    fn test_ntsc_is_not_rounded() {
        let ntsc: FrameRate = "30000/1001".parse().unwrap();
        let approx: FrameRate = "29.97".parse().unwrap();
        assert_ne!(ntsc, approx);
        assert!((ntsc.as_f64() - 29.97).abs() < 0.001);
        assert_eq!(ntsc.as_integer(), None);
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!("25".parse::<FrameRate>().unwrap().to_string(), "25");
        assert_eq!("25/1".parse::<FrameRate>().unwrap().to_string(), "25");
        assert_eq!("23.976".parse::<FrameRate>().unwrap().to_string(), "2997/125");
        assert_eq!("24000/1001".parse::<FrameRate>().unwrap().to_string(), "24000/1001");
        assert!("0/0".parse::<FrameRate>().is_err());
        assert!("abc".parse::<FrameRate>().is_err());
        assert!("-25".parse::<FrameRate>().is_err());
    }

    #[test]
    fn test_deserialize_from_number_or_string() {
        #[derive(Deserialize)]
        struct Holder {
            fps: FrameRate,
        }

        let h: Holder = toml::from_str("fps = 25").unwrap();
        assert_eq!(h.fps.as_integer(), Some(25));

        let h: Holder = toml::from_str("fps = 50.0").unwrap();
        assert_eq!(h.fps.as_integer(), Some(50));

        let h: Holder = toml::from_str(r#"fps = "30000/1001""#).unwrap();
        assert_eq!(h.fps.numerator(), 30000);

        assert!(toml::from_str::<Holder>("fps = 0").is_err());
    }
}
