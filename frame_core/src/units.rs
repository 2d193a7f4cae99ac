//! # Unit Types
//!
//! `f64` newtypes for the US customary units the pipeline works in. Each
//! serializes as a bare number and displays with its symbol.
//!
//! Model coordinates are feet, area loads psf, line loads plf, forces kips,
//! moments kip-ft, stresses ksi, deflections inches.
//!
//! ```rust
//! use frame_core::units::{Feet, Inches, Kips, Pounds, PlF, Psf};
//!
//! let span = Feet(24.0);
//! assert_eq!(Inches::from(span), Inches(288.0));
//!
//! // 25 psf on a 2 ft strip over the span
//! let w: PlF = Psf(25.0) * Feet(2.0);
//! let total: Kips = (w * span).into();
//! assert_eq!(total, Kips(1.2));
//! assert_eq!(total.to_string(), "1.20 k");
//! ```

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Declares a unit newtype with its display symbol and linear arithmetic.
macro_rules! unit {
    ($(#[$meta:meta])* $name:ident, $symbol:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            pub const ZERO: $name = $name(0.0);

            pub fn value(self) -> f64 {
                self.0
            }

            pub fn abs(self) -> Self {
                $name(self.0.abs())
            }

            pub fn max(self, other: Self) -> Self {
                $name(self.0.max(other.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:.2} {}", self.0, $symbol)
            }
        }

        impl Add for $name {
            type Output = $name;
            fn add(self, rhs: $name) -> $name {
                $name(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = $name;
            fn sub(self, rhs: $name) -> $name {
                $name(self.0 - rhs.0)
            }
        }

        impl Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = $name;
            fn mul(self, factor: f64) -> $name {
                $name(self.0 * factor)
            }
        }

        impl Div<f64> for $name {
            type Output = $name;
            fn div(self, divisor: f64) -> $name {
                $name(self.0 / divisor)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = $name>>(iter: I) -> $name {
                $name(iter.map(|u| u.0).sum())
            }
        }
    };
}

/// `From` in both directions for units that differ by a constant factor.
macro_rules! scale {
    ($small:ident per $large:ident = $factor:expr) => {
        impl From<$large> for $small {
            fn from(v: $large) -> $small {
                $small(v.0 * $factor)
            }
        }

        impl From<$small> for $large {
            fn from(v: $small) -> $large {
                $large(v.0 / $factor)
            }
        }
    };
}

/// `lhs * rhs = out` for dimensionally compatible units.
macro_rules! product {
    ($lhs:ident * $rhs:ident = $out:ident) => {
        impl Mul<$rhs> for $lhs {
            type Output = $out;
            fn mul(self, rhs: $rhs) -> $out {
                $out(self.0 * rhs.0)
            }
        }
    };
}

unit!(
    /// Length, model coordinates and spans
    Feet, "ft"
);
unit!(
    /// Length, section dimensions and deflections
    Inches, "in"
);
unit!(Pounds, "lb");
unit!(
    /// Force; axial, shear and reactions
    Kips, "k"
);
unit!(KipFt, "k-ft");
unit!(KipIn, "k-in");
unit!(Ksi, "ksi");
unit!(
    /// Line load along a member
    PlF, "plf"
);
unit!(
    /// Uniform area load
    Psf, "psf"
);
unit!(SqFt, "sf");
unit!(SqIn, "in²");

scale!(Inches per Feet = 12.0);
scale!(Pounds per Kips = 1000.0);
scale!(KipIn per KipFt = 12.0);
scale!(SqIn per SqFt = 144.0);

product!(PlF * Feet = Pounds);
product!(Psf * SqFt = Pounds);
product!(Psf * Feet = PlF);
product!(Ksi * SqIn = Kips);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_conversions() {
        assert_eq!(Inches::from(Feet(10.0)), Inches(120.0));
        assert_eq!(Feet::from(Inches(6.0)), Feet(0.5));
        assert_eq!(Kips::from(Pounds(2500.0)), Kips(2.5));
        assert_eq!(KipFt::from(KipIn(120.0)), KipFt(10.0));
        assert_eq!(SqIn::from(SqFt(1.0)), SqIn(144.0));
    }

    #[test]
    fn test_tributary_products() {
        // 50 psf bay, 10 ft tributary width, 20 ft span
        let w = Psf(50.0) * Feet(10.0);
        assert_eq!(w, PlF(500.0));
        let p: Kips = (w * Feet(20.0)).into();
        assert!((p.0 - 10.0).abs() < 1e-12);
        assert_eq!(Psf(20.0) * SqFt(600.0), Pounds(12_000.0));
        assert_eq!(Ksi(50.0) * SqIn(2.0), Kips(100.0));
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = KipFt(10.0);
        assert_eq!(a + KipFt(5.0), KipFt(15.0));
        assert_eq!(a - KipFt(15.0), KipFt(-5.0));
        assert_eq!((a * 2.0) / 4.0, KipFt(5.0));
        assert_eq!((-a).abs(), a);
        assert_eq!(a.max(KipFt(12.0)).value(), 12.0);
        let total: Kips = [Kips(1.0), Kips(2.5)].into_iter().sum();
        assert_eq!(total, Kips(3.5));
    }

    #[test]
    fn test_display_and_serde() {
        assert_eq!(Psf(62.5).to_string(), "62.50 psf");
        assert_eq!(Inches(0.75).to_string(), "0.75 in");
        let json = serde_json::to_string(&Psf(62.5)).unwrap();
        assert_eq!(json, "62.5");
        assert_eq!(serde_json::from_str::<Psf>(&json).unwrap(), Psf(62.5));
    }
}
