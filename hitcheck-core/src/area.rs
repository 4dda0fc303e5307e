use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Which inequality decides the quadrant-III quarter-disk.
///
/// The two rules are not equivalent: `HalfRadius` compares `x² + y²`
/// against `r / 2`, `QuarterRadiusSquared` against `r² / 4` (a disk of
/// radius `r / 2`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarterDiskRule {
    /// `x² + y² <= r / 2`
    #[default]
    HalfRadius,
    /// `4 · (x² + y²) <= r²`
    QuarterRadiusSquared,
}

impl QuarterDiskRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuarterDiskRule::HalfRadius => "half_radius",
            QuarterDiskRule::QuarterRadiusSquared => "quarter_radius_squared",
        }
    }

    // No division: every term is a product of normalized inputs.
    fn contains(&self, x: Decimal, y: Decimal, r: Decimal) -> bool {
        let (x, y, r) = (x.normalize(), y.normalize(), r.normalize());
        let dist_sq = x * x + y * y;
        match self {
            QuarterDiskRule::HalfRadius => dec!(2) * dist_sq <= r,
            QuarterDiskRule::QuarterRadiusSquared => dec!(4) * dist_sq <= r * r,
        }
    }
}

/// Decide whether `(x, y)` lies inside the area for radius `r`.
///
/// Quadrants are tested in the order I, III, IV; all bounds are inclusive,
/// so points on an axis belong to the first quadrant that claims them.
/// Quadrant II never hits.
///
/// Exact for inputs with at most
/// [`MAX_SCALE`](crate::validate::MAX_SCALE) significant decimals, which is
/// what [`validate`](crate::validate::validate) lets through.
pub fn is_hit(x: Decimal, y: Decimal, r: Decimal, rule: QuarterDiskRule) -> bool {
    let zero = Decimal::ZERO;

    // I: rectangle r × r/2
    if x >= zero && y >= zero {
        return x <= r && dec!(2) * y <= r;
    }
    // III: quarter-disk
    if x <= zero && y <= zero {
        return rule.contains(x, y, r);
    }
    // IV: triangle under y = x - 2
    if x >= zero && y <= zero {
        return x - dec!(2) <= y;
    }
    false
}
