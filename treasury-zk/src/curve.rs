//! Baby Jubjub group law: `a·x² + y² = 1 + d·x²·y²` over [`Base`].
//!
//! A [`Point`] can only be built from coordinates that satisfy the curve equation, so every
//! value of this type is safe to feed into ownership checks and hashing. Points decoded from the
//! ledger or from JSON go through the same check and are rejected with `InvalidPoint`.

use crate::constants::{CURVE_A, CURVE_D, GENERATOR_X, GENERATOR_Y, MAX_FIELD_TO_POINT_ATTEMPTS};
use crate::error::ZkError;
use crate::field::{Base, FieldExt, Scalar};
use ark_ff::{BigInteger, Field, One, PrimeField, Zero};
use serde::{Deserialize, Serialize};
use std::ops::Neg;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PointHex", into = "PointHex")]
pub struct Point {
    x: Base,
    y: Base,
}

impl Point {
    pub fn new(x: Base, y: Base) -> Result<Self, ZkError> {
        if !Self::is_on_curve(&x, &y) {
            return Err(ZkError::InvalidPoint);
        }
        Ok(Self { x, y })
    }

    /// The neutral element `(0, 1)`.
    pub fn identity() -> Self {
        Self { x: Base::zero(), y: Base::one() }
    }

    pub fn generator() -> Self {
        Self { x: GENERATOR_X, y: GENERATOR_Y }
    }

    pub fn is_on_curve(x: &Base, y: &Base) -> bool {
        let x2 = x.square();
        let y2 = y.square();
        CURVE_A * x2 + y2 == Base::one() + CURVE_D * x2 * y2
    }

    pub fn is_valid(&self) -> bool {
        Self::is_on_curve(&self.x, &self.y)
    }

    pub fn is_identity(&self) -> bool {
        self.x.is_zero() && self.y.is_one()
    }

    pub fn x(&self) -> Base {
        self.x
    }

    pub fn y(&self) -> Base {
        self.y
    }

    /// Unified twisted Edwards addition.
    ///
    /// The curve is complete (`a` is a square, `d` is not), so the denominators never vanish
    /// for points on the curve; `DivisionByZero` is kept only as a typed guard.
    pub fn add(&self, other: &Point) -> Result<Point, ZkError> {
        if self.is_identity() {
            return Ok(*other);
        }
        if other.is_identity() {
            return Ok(*self);
        }

        let (x1, y1) = (self.x, self.y);
        let (x2, y2) = (other.x, other.y);

        let t = CURVE_D * x1 * x2 * y1 * y2;
        let x_den = (Base::one() + t).inverse().ok_or(ZkError::DivisionByZero)?;
        let y_den = (Base::one() - t).inverse().ok_or(ZkError::DivisionByZero)?;

        Ok(Point {
            x: (x1 * y2 + y1 * x2) * x_den,
            y: (y1 * y2 - CURVE_A * x1 * x2) * y_den,
        })
    }

    pub fn double(&self) -> Result<Point, ZkError> {
        self.add(self)
    }

    /// Double-and-add over the bits of `k`, least-significant bit first.
    ///
    /// `k` is already an element of the scalar field, so any reduction happened when it was built.
    pub fn mul(&self, k: &Scalar) -> Result<Point, ZkError> {
        let bits = k.into_bigint().to_bits_le();
        let Some(top) = bits.iter().rposition(|b| *b) else {
            return Ok(Point::identity());
        };

        let mut acc = Point::identity();
        let mut base = *self;
        for (i, bit) in bits[..=top].iter().enumerate() {
            if *bit {
                acc = acc.add(&base)?;
            }
            if i < top {
                base = base.double()?;
            }
        }
        Ok(acc)
    }

    /// Recovers `y` from `y² = (a·x² - 1) / (d·x² - 1)`.
    ///
    /// Both `(x, y)` and `(x, -y)` lie on the curve; the canonical root is returned.
    pub fn from_x(x: Base) -> Result<Point, ZkError> {
        let x2 = x.square();
        let num = CURVE_A * x2 - Base::one();
        let den = CURVE_D * x2 - Base::one();
        let y = num.checked_div(&den)?.checked_sqrt()?;
        Point::new(x, y)
    }

    /// Recovers `x` from `x² = (y² - 1) / (d·y² - a)`.
    pub fn from_y(y: Base) -> Result<Point, ZkError> {
        let y2 = y.square();
        let num = y2 - Base::one();
        let den = CURVE_D * y2 - CURVE_A;
        let x = num.checked_div(&den)?.checked_sqrt()?;
        Point::new(x, y)
    }

    /// Embeds an arbitrary field element as a point by trying `x = value, value + 1, ...`.
    ///
    /// Returns the point together with the number of increments that were needed. Roughly half of
    /// all candidates work, so the attempt bound is never reached in practice.
    pub fn from_field(value: Base) -> Result<(Point, u64), ZkError> {
        let mut x = value;
        for added in 0..MAX_FIELD_TO_POINT_ATTEMPTS {
            match Point::from_x(x) {
                Ok(point) => return Ok((point, added)),
                Err(ZkError::NoSquareRoot) => x += Base::one(),
                Err(e) => return Err(e),
            }
        }
        Err(ZkError::NoSquareRoot)
    }

    /// `x || y`, each coordinate 32 bytes big-endian.
    pub fn to_be_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.x.to_be_bytes32());
        out[32..].copy_from_slice(&self.y.to_be_bytes32());
        out
    }

    pub fn from_coordinates_be(x: &[u8; 32], y: &[u8; 32]) -> Result<Point, ZkError> {
        Point::new(Base::from_be_bytes32(x)?, Base::from_be_bytes32(y)?)
    }

    pub fn to_decimal(&self) -> [String; 2] {
        [self.x.to_decimal(), self.y.to_decimal()]
    }

    pub fn from_decimal(x: &str, y: &str) -> Result<Point, ZkError> {
        Point::new(Base::from_decimal(x)?, Base::from_decimal(y)?)
    }
}

impl Neg for Point {
    type Output = Point;

    /// `(-x, y)`.
    fn neg(self) -> Point {
        Point { x: -self.x, y: self.y }
    }
}

/// JSON form of a point: both coordinates as `0x`-prefixed 32-byte hex.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PointHex {
    pub x: String,
    pub y: String,
}

impl From<Point> for PointHex {
    fn from(p: Point) -> Self {
        Self { x: p.x.to_hex(), y: p.y.to_hex() }
    }
}

impl TryFrom<PointHex> for Point {
    type Error = ZkError;

    fn try_from(p: PointHex) -> Result<Self, Self::Error> {
        Point::new(Base::from_hex(&p.x)?, Base::from_hex(&p.y)?)
    }
}
