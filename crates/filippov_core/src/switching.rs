//! Behaviour of a trajectory that reaches the switching line `y = w`.
//!
//! The lower field `f1` governs `y < w`, the upper field `f2` governs `y > w`.
//! At a boundary point the normal components `f1_y`, `f2_y` decide whether the
//! trajectory crosses, slides along the line or touches it tangentially.

use crate::traits::{DynamicalSystem, PlanarField};
use serde::{Deserialize, Serialize};

/// Region of the plane relative to the switching line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// `y < w`, governed by the lower field.
    Below,
    /// `y > w`, governed by the upper field.
    Above,
}

impl Side {
    pub fn of(y: f64, w: f64) -> Option<Side> {
        if y < w {
            Some(Side::Below)
        } else if y > w {
            Some(Side::Above)
        } else {
            None
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Below => Side::Above,
            Side::Above => Side::Below,
        }
    }
}

/// Moves `w` strictly off the line towards `side`.
pub fn nudge(w: f64, side: Side, eps: f64) -> f64 {
    match side {
        Side::Below => w - eps,
        Side::Above => w + eps,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Both fields push the same way across the line.
    Crossing,
    /// The fields push against each other; motion continues on the line.
    Sliding,
    /// One normal component vanishes; the trajectory leaves towards `exit`.
    Tangency { exit: Side },
}

/// Normal components of both fields at a boundary point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundaryNormals {
    pub f1_y: f64,
    pub f2_y: f64,
}

impl BoundaryNormals {
    pub fn at<F1, F2>(lower: &F1, upper: &F2, t: f64, x: f64, w: f64) -> Self
    where
        F1: PlanarField,
        F2: PlanarField,
    {
        Self {
            f1_y: lower.eval_planar(t, x, w).1,
            f2_y: upper.eval_planar(t, x, w).1,
        }
    }

    /// `l = f1_y · f2_y`
    pub fn product(&self) -> f64 {
        self.f1_y * self.f2_y
    }

    pub fn classify(&self, tangency_tol: f64) -> Classification {
        if self.f1_y.abs() <= tangency_tol || self.f2_y.abs() <= tangency_tol {
            return Classification::Tangency {
                exit: self.tangency_exit(),
            };
        }
        if self.product() > 0.0 {
            Classification::Crossing
        } else {
            Classification::Sliding
        }
    }

    /// The dominant normal component picks the exit; zero counts as downward.
    pub fn tangency_exit(&self) -> Side {
        let dominant = if self.f1_y.abs() < self.f2_y.abs() {
            self.f2_y
        } else {
            self.f1_y
        };
        if dominant > 0.0 {
            Side::Above
        } else {
            Side::Below
        }
    }

    /// Side a sliding trajectory is released to when it stops on the line.
    pub fn release_side(&self) -> Side {
        if self.f1_y > 0.0 {
            Side::Above
        } else {
            Side::Below
        }
    }
}

/// Tangential velocity used while sliding on `y = w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlidingRule {
    /// `x' = f1_x(x, w)`
    #[default]
    FirstField,
    /// Filippov convex combination `(f2_y f1_x - f1_y f2_x) / (f2_y - f1_y)`.
    Convex,
}

impl SlidingRule {
    pub fn velocity(self, f1: (f64, f64), f2: (f64, f64)) -> f64 {
        match self {
            SlidingRule::FirstField => f1.0,
            SlidingRule::Convex => {
                let denominator = f2.1 - f1.1;
                if denominator == 0.0 {
                    f1.0
                } else {
                    (f2.1 * f1.0 - f1.1 * f2.0) / denominator
                }
            }
        }
    }
}

/// One-dimensional sliding dynamics on `y = w`, state `[x]`.
pub struct SlidingField<'a, F1, F2> {
    pub lower: &'a F1,
    pub upper: &'a F2,
    pub w: f64,
    pub rule: SlidingRule,
}

impl<F1, F2> DynamicalSystem<f64> for SlidingField<'_, F1, F2>
where
    F1: PlanarField,
    F2: PlanarField,
{
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        let f1 = self.lower.eval_planar(t, x[0], self.w);
        out[0] = match self.rule {
            SlidingRule::FirstField => f1.0,
            SlidingRule::Convex => self
                .rule
                .velocity(f1, self.upper.eval_planar(t, x[0], self.w)),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::{nudge, BoundaryNormals, Classification, Side, SlidingField, SlidingRule};
    use crate::models::PredatorPreyParams;
    use crate::traits::DynamicalSystem;

    fn normals(f1_y: f64, f2_y: f64) -> BoundaryNormals {
        BoundaryNormals { f1_y, f2_y }
    }

    #[test]
    fn same_sign_normals_cross() {
        assert_eq!(normals(1.0, 0.5).classify(1e-8), Classification::Crossing);
        assert_eq!(normals(-1.0, -0.5).classify(1e-8), Classification::Crossing);
    }

    #[test]
    fn opposing_normals_slide() {
        assert_eq!(normals(1.0, -0.5).classify(1e-8), Classification::Sliding);
        assert_eq!(normals(-2.0, 3.0).classify(1e-8), Classification::Sliding);
    }

    #[test]
    fn vanishing_normal_is_tangency_with_dominant_exit() {
        assert_eq!(
            normals(0.0, 0.3).classify(1e-8),
            Classification::Tangency { exit: Side::Above }
        );
        assert_eq!(
            normals(1e-9, -0.3).classify(1e-8),
            Classification::Tangency { exit: Side::Below }
        );
        assert_eq!(
            normals(0.0, 0.0).classify(1e-8),
            Classification::Tangency { exit: Side::Below }
        );
        assert_eq!(
            normals(0.5, 1e-10).classify(1e-8),
            Classification::Tangency { exit: Side::Above }
        );
    }

    #[test]
    fn every_finite_pair_gets_exactly_one_class() {
        let values = [-2.0, -1e-9, 0.0, 1e-9, 0.7, 3.0];
        for &a in &values {
            for &b in &values {
                let class = normals(a, b).classify(1e-8);
                let tangent = a.abs() <= 1e-8 || b.abs() <= 1e-8;
                match class {
                    Classification::Tangency { .. } => assert!(tangent),
                    Classification::Crossing => assert!(!tangent && a * b > 0.0),
                    Classification::Sliding => assert!(!tangent && a * b < 0.0),
                }
            }
        }
    }

    #[test]
    fn nudge_leaves_the_line() {
        let w = 1.625;
        assert!(nudge(w, Side::Above, 1e-5) > w);
        assert!(nudge(w, Side::Below, 1e-5) < w);
        assert_eq!(Side::of(1.0, 1.0), None);
        assert_eq!(Side::of(0.5, 1.0), Some(Side::Below));
        assert_eq!(Side::Below.opposite(), Side::Above);
    }

    #[test]
    fn release_side_follows_lower_normal() {
        assert_eq!(normals(0.2, -0.1).release_side(), Side::Above);
        assert_eq!(normals(0.0, 0.4).release_side(), Side::Below);
    }

    #[test]
    fn convex_rule_reduces_to_first_field_for_shared_tangent_component() {
        let f1 = (0.4, 0.3);
        let f2 = (0.4, -0.2);
        assert!((SlidingRule::Convex.velocity(f1, f2) - 0.4).abs() < 1e-15);
        assert_eq!(SlidingRule::FirstField.velocity(f1, (9.0, 1.0)), 0.4);
        assert_eq!(SlidingRule::Convex.velocity((1.0, 0.5), (2.0, 0.5)), 1.0);
    }

    #[test]
    fn sliding_field_uses_prey_dynamics_on_the_line() {
        let params = PredatorPreyParams::default();
        let (lower, upper) = (params.lower(), params.upper());
        let field = SlidingField {
            lower: &lower,
            upper: &upper,
            w: 1.625,
            rule: SlidingRule::Convex,
        };
        let mut out = [0.0];
        field.apply(0.0, &[0.5], &mut out);
        let expected = 0.5 * 0.5 - params.a * 0.5 * 1.625 / (params.b + 0.5);
        assert!((out[0] - expected).abs() < 1e-12);
    }
}
