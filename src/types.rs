use fixed::types::I32F32;

/// Layout length in PDF points, stored as fixed-point so layout math is
/// reproducible across platforms. Arithmetic rounds to a thousandth of a point.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

// Bits per point in the I32F32 representation.
const ONE: i128 = 1 << 32;

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        Pt::from_milli((value as f64 * 1000.0).round() as i128)
    }

    pub fn from_i32(value: i32) -> Pt {
        Pt::from_milli(value as i128 * 1000)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let milli = round_div(self.0.to_bits() as i128 * 1000, ONE);
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt::from_milli(milli as i128)
    }

    pub fn max(self, other: Pt) -> Pt {
        if other > self { other } else { self }
    }

    pub fn min(self, other: Pt) -> Pt {
        if other < self { other } else { self }
    }

    pub fn clamp(self, lo: Pt, hi: Pt) -> Pt {
        self.max(lo).min(hi)
    }

    /// `self * num / denom`, rounded to the nearest thousandth of a point.
    /// A zero denominator yields zero.
    pub fn mul_ratio(self, num: i32, denom: i32) -> Pt {
        let scaled = self.milli().saturating_mul(num as i128);
        Pt::from_milli(round_div(scaled, denom as i128))
    }

    fn milli(self) -> i128 {
        self.to_milli_i64() as i128
    }

    fn from_milli(milli: i128) -> Pt {
        let bits = round_div(milli.saturating_mul(ONE), 1000);
        Pt(I32F32::from_bits(
            bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
        ))
    }
}

/// Division rounding half away from zero; zero when `den` is zero.
fn round_div(num: i128, den: i128) -> i128 {
    if den == 0 {
        return 0;
    }
    let half = den.abs() / 2;
    let magnitude = (num.abs() + half) / den.abs();
    if (num < 0) != (den < 0) { -magnitude } else { magnitude }
}

macro_rules! milli_ops {
    ($op:ident, $method:ident, $assign:ident, $assign_method:ident, $f:expr) => {
        impl std::ops::$op for Pt {
            type Output = Pt;
            fn $method(self, rhs: Pt) -> Pt {
                Pt::from_milli(($f)(self.milli(), rhs.milli()))
            }
        }

        impl std::ops::$assign for Pt {
            fn $assign_method(&mut self, rhs: Pt) {
                *self = std::ops::$op::$method(*self, rhs);
            }
        }
    };
}

milli_ops!(Add, add, AddAssign, add_assign, |a: i128, b: i128| a + b);
milli_ops!(Sub, sub, SubAssign, sub_assign, |a: i128, b: i128| a - b);

impl std::ops::Mul<i32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: i32) -> Pt {
        Pt::from_milli(self.milli().saturating_mul(rhs as i128))
    }
}

impl std::ops::Div<i32> for Pt {
    type Output = Pt;
    fn div(self, rhs: i32) -> Pt {
        Pt::from_milli(round_div(self.milli(), rhs as i128))
    }
}

impl std::ops::Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        Pt::from_f32(self.to_f32() * rhs)
    }
}

impl std::ops::Neg for Pt {
    type Output = Pt;
    fn neg(self) -> Pt {
        Pt::from_milli(-self.milli())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
        }
    }

    pub fn a4() -> Self {
        Self::new(595.28, 841.89)
    }

    pub fn letter() -> Self {
        // 8.5in x 11in at 72pt/in.
        Self::new(612.0, 792.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: Pt,
    pub right: Pt,
    pub bottom: Pt,
    pub left: Pt,
}

impl Margins {
    pub fn all(value: f32) -> Self {
        let v = Pt::from_f32(value);
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_ratio_is_exact_for_fifths() {
        let track = Pt::from_f32(482.0);
        for score in 0..=5 {
            let width = track.mul_ratio(score, 5);
            let expected = 482.0 * score as f32 / 5.0;
            assert!((width.to_f32() - expected).abs() < 0.001, "score {score}");
        }
    }

    #[test]
    fn arithmetic_rounds_to_thousandths() {
        let third = Pt::from_i32(1) / 3;
        assert_eq!(third.to_milli_i64(), 333);
        assert_eq!((Pt::from_i32(-1) / 3).to_milli_i64(), -333);
        assert_eq!((Pt::from_f32(0.0005) + Pt::ZERO).to_milli_i64(), 1);
        assert_eq!(Pt::from_i32(7) - Pt::from_i32(10), -Pt::from_i32(3));
        assert_eq!(Pt::from_i32(4) * 0.08, Pt::from_f32(0.32));
        assert_eq!(Pt::from_i32(5).mul_ratio(1, 0), Pt::ZERO);
    }

    #[test]
    fn clamp_orders_bounds() {
        let lo = Pt::ZERO;
        let hi = Pt::from_i32(10);
        assert_eq!(Pt::from_i32(-3).clamp(lo, hi), lo);
        assert_eq!(Pt::from_i32(13).clamp(lo, hi), hi);
        assert_eq!(Pt::from_i32(4).clamp(lo, hi), Pt::from_i32(4));
    }

    #[test]
    fn rgb8_normalises_channels() {
        let c = Color::rgb8(255, 0, 51);
        assert_eq!(c.r, 1.0);
        assert_eq!(c.g, 0.0);
        assert!((c.b - 0.2).abs() < 1e-6);
    }
}
