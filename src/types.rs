use fixed::types::I32F32;

/// Fixed-point coordinate in CSS pixels, quantized to thousandths so pen
/// arithmetic is deterministic across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn from_i32(value: i32) -> Pt {
        Pt::from_milli_i64((value as i64) * 1000)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let scaled = (self.0.to_bits() as i128) * 1000;
        let denom = 1i128 << 32;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        ((scaled + adj) / denom).clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Pt {
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * (1i128 << 32) + adj) / 1000;
        Pt(I32F32::from_bits(
            bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
        ))
    }

    pub fn max(self, other: Pt) -> Pt {
        if self >= other { self } else { other }
    }

    /// Scales by `num / denom`, rounding half away from zero.
    pub fn mul_ratio(self, num: i32, denom: i32) -> Pt {
        if denom == 0 {
            return Pt::ZERO;
        }
        let scaled = (self.to_milli_i64() as i128).saturating_mul(num as i128);
        let denom = denom as i128;
        let half = denom.abs() / 2;
        let value = if scaled >= 0 {
            (scaled + half) / denom
        } else {
            -((-scaled + half) / denom)
        };
        Pt::from_milli_i128(value)
    }
}

impl std::fmt::Display for Pt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let milli = self.to_milli_i64();
        let sign = if milli < 0 { "-" } else { "" };
        let abs = milli.unsigned_abs();
        let (whole, frac) = (abs / 1000, abs % 1000);
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let frac = format!("{frac:03}");
            write!(f, "{sign}{whole}.{}", frac.trim_end_matches('0'))
        }
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::AddAssign for Pt {
    fn add_assign(&mut self, rhs: Pt) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Mul<i32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: i32) -> Pt {
        Pt::from_milli_i128((self.to_milli_i64() as i128).saturating_mul(rhs as i128))
    }
}

impl std::ops::Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        if !rhs.is_finite() {
            return Pt::ZERO;
        }
        Pt::from_f32(self.to_f32() * rhs)
    }
}

impl std::iter::Sum for Pt {
    fn sum<I: Iterator<Item = Pt>>(iter: I) -> Pt {
        iter.fold(Pt::ZERO, |acc, v| acc + v)
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

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parses the colour forms accepted by `fillStyle`/`strokeStyle`:
    /// `#rgb`, `#rrggbb`, `rgb()`, `rgba()` and a few named colours.
    /// Returns the colour with its alpha.
    pub fn parse(raw: &str) -> Option<(Color, f32)> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        if s.starts_with('#') {
            return parse_hex(s).map(|c| (c, 1.0));
        }
        let lower = s.to_ascii_lowercase();
        if let Some(color) = named_color(&lower) {
            return Some(color);
        }
        let inner = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let channel = |raw: &str| -> Option<f32> {
            Some(raw.parse::<f32>().ok()?.clamp(0.0, 255.0) / 255.0)
        };
        let color = Color::rgb(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?);
        let alpha = match parts.get(3) {
            Some(a) => a.parse::<f32>().ok()?.clamp(0.0, 1.0),
            None => 1.0,
        };
        Some((color, alpha))
    }

    pub fn to_hex(self) -> String {
        let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }
}

fn parse_hex(value: &str) -> Option<Color> {
    let s = value.strip_prefix('#').unwrap_or(value);
    if !s.is_ascii() {
        return None;
    }
    let expanded: String = match s.len() {
        3 => s.chars().flat_map(|ch| [ch, ch]).collect(),
        6 => s.to_string(),
        _ => return None,
    };
    let byte = |range: std::ops::Range<usize>| u8::from_str_radix(&expanded[range], 16).ok();
    let (r, g, b) = (byte(0..2)?, byte(2..4)?, byte(4..6)?);
    Some(Color::rgb(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
    ))
}

fn named_color(name: &str) -> Option<(Color, f32)> {
    let color = match name {
        "black" => Color::BLACK,
        "white" => Color::rgb(1.0, 1.0, 1.0),
        "red" => Color::rgb(1.0, 0.0, 0.0),
        "green" => Color::rgb(0.0, 128.0 / 255.0, 0.0),
        "blue" => Color::rgb(0.0, 0.0, 1.0),
        "gray" | "grey" => Color::rgb(128.0 / 255.0, 128.0 / 255.0, 128.0 / 255.0),
        "transparent" => return Some((Color::BLACK, 0.0)),
        _ => return None,
    };
    Some((color, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pt_arithmetic_is_quantized_to_thousandths() {
        let a = Pt::from_f32(0.1);
        let b = Pt::from_f32(0.2);
        assert_eq!((a + b).to_milli_i64(), 300);
        assert_eq!((Pt::from_f32(6.0) * 5).to_milli_i64(), 30_000);
        assert_eq!(Pt::from_f32(f32::NAN), Pt::ZERO);
    }

    #[test]
    fn pt_display_trims_trailing_zeros() {
        assert_eq!(Pt::from_f32(36.0).to_string(), "36");
        assert_eq!(Pt::from_f32(-1.25).to_string(), "-1.25");
    }

    #[test]
    fn mul_ratio_rounds_half_away_from_zero() {
        assert_eq!(Pt::from_i32(10).mul_ratio(600, 1000), Pt::from_i32(6));
        assert_eq!(Pt::from_milli_i64(1).mul_ratio(1, 2).to_milli_i64(), 1);
        assert_eq!(Pt::from_i32(3).mul_ratio(1, 0), Pt::ZERO);
    }

    #[test]
    fn parses_hex_rgb_and_named_colors() {
        assert_eq!(Color::parse("#f00"), Some((Color::rgb(1.0, 0.0, 0.0), 1.0)));
        assert_eq!(Color::parse("#0000ff").map(|c| c.0.to_hex()), Some("#0000ff".to_string()));
        assert_eq!(Color::parse("RED"), Some((Color::rgb(1.0, 0.0, 0.0), 1.0)));
        let (color, alpha) = Color::parse("rgba(0, 255, 0, 0.5)").expect("rgba");
        assert_eq!(color, Color::rgb(0.0, 1.0, 0.0));
        assert!((alpha - 0.5).abs() < f32::EPSILON);
        assert_eq!(Color::parse("#12"), None);
        assert_eq!(Color::parse("rgb(1,2)"), None);
        assert_eq!(Color::parse("papayawhip"), None);
    }
}
