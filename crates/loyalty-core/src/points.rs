//! Fixed-point loyalty-point amounts.
//!
//! # Motivation
//!
//! All monetary amounts in this system (accruals, withdrawal sums, derived
//! balances) are 1e-6 fixed-point values stored as `i64`. A bare `i64`
//! would let an accrual silently mix with order counts or ids in
//! arithmetic; the `Points` newtype makes every such mix a type error and
//! keeps construction from raw integers an explicit, visible act (there is
//! no `From<i64>` impl).
//!
//! # Scale
//!
//! 1 point = 1_000_000 raw units. The external accrual protocol and the
//! user-facing API both speak decimal floats, so `Points` carries explicit
//! `f64` boundary conversions and (de)serializes as a float; everything
//! between the boundaries stays integral.

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const SCALE: i64 = 1_000_000;

/// A fixed-point loyalty-point amount at 1e-6 scale.
///
/// # Construction
///
/// [`Points::new`] takes raw units; [`Points::from_f64`] converts at a
/// float boundary. A raw integer never becomes a `Points` implicitly.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Points(i64);

impl Points {
    /// Zero amount.
    pub const ZERO: Points = Points(0);

    /// Construct from raw 1e-6 units.
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Points(raw)
    }

    /// Extract the underlying raw `i64`.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Convert a decimal float into `Points`, rounding to the nearest raw
    /// unit. Returns `None` for NaN, infinities, and values outside the
    /// representable range.
    pub fn from_f64(value: f64) -> Option<Points> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * SCALE as f64).round();
        if scaled < i64::MIN as f64 || scaled > i64::MAX as f64 {
            return None;
        }
        Some(Points(scaled as i64))
    }

    /// Convert to a decimal float for a wire boundary.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// Saturating addition, clamping at `i64::MAX` on overflow.
    #[inline]
    pub fn saturating_add(self, rhs: Points) -> Points {
        Points(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction, clamping at `i64::MIN` on underflow.
    #[inline]
    pub fn saturating_sub(self, rhs: Points) -> Points {
        Points(self.0.saturating_sub(rhs.0))
    }

    /// `true` if this amount is strictly positive.
    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// `true` if this amount is non-negative.
    #[inline]
    pub fn is_non_negative(self) -> bool {
        self.0 >= 0
    }
}

// ---------------------------------------------------------------------------
// Arithmetic operators (closed over Points)
// ---------------------------------------------------------------------------

impl Add for Points {
    type Output = Points;
    #[inline]
    fn add(self, rhs: Points) -> Points {
        Points(self.0 + rhs.0)
    }
}

impl Sub for Points {
    type Output = Points;
    #[inline]
    fn sub(self, rhs: Points) -> Points {
        Points(self.0 - rhs.0)
    }
}

impl Neg for Points {
    type Output = Points;
    #[inline]
    fn neg(self) -> Points {
        Points(-self.0)
    }
}

impl AddAssign for Points {
    #[inline]
    fn add_assign(&mut self, rhs: Points) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Points {
    #[inline]
    fn sub_assign(&mut self, rhs: Points) {
        self.0 -= rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl std::fmt::Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / SCALE;
        let frac = (self.0 % SCALE).abs();
        // When |value| < 1 and value is negative, `whole` truncates to 0,
        // losing the sign. Emit "-0" explicitly in that case.
        if self.0 < 0 && whole == 0 {
            write!(f, "-{whole}.{frac:06}")
        } else {
            write!(f, "{whole}.{frac:06}")
        }
    }
}

// ---------------------------------------------------------------------------
// Serde: decimal float on the wire
// ---------------------------------------------------------------------------

impl Serialize for Points {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Points {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Points::from_f64(value)
            .ok_or_else(|| serde::de::Error::custom("point amount is not a finite number"))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
