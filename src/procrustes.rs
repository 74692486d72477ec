//! Procrustes shape alignment.
//!
//! [`align_pair`] superimposes one shape onto a reference with the optimal
//! rotation and scale (never a reflection), and [`align_set`] iterates that
//! over a whole [`ShapeSet`] until the mean shape stops improving
//! (Generalized Procrustes Analysis).

use log::{debug, warn};
use nalgebra::{Matrix2, RowVector2, Vector2};

use crate::error::{Error, Result};
use crate::types::{Point, Shape, ShapeSet};

/// Iteration cap handed to the SVD solver; 2x2 problems converge in a few sweeps.
const SVD_MAX_ITERATIONS: usize = 100;

/// Optimal superimposition of a target shape onto a reference shape.
///
/// Points are treated as row vectors, so a normalized target point `q` maps
/// to `q * rotation * trace * reference_norm + reference_centroid`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcrustesFit {
    /// Proper rotation (determinant +1) acting on row vectors.
    pub rotation: Matrix2<f64>,
    /// Sum of the reflection-corrected singular values.
    pub trace: f64,
    pub reference_centroid: Point,
    pub reference_norm: f64,
    pub target_centroid: Point,
    pub target_norm: f64,
    /// Procrustes distance `1 - trace^2` between the unit-scale shapes.
    pub distance: f64,
}

impl ProcrustesFit {
    /// Scale factor applied to the target in its original units.
    pub fn scale(&self) -> f64 {
        self.trace * self.reference_norm / self.target_norm
    }

    /// Map a point from the target's frame into the reference's frame.
    pub fn transform_point(&self, p: Point) -> Point {
        let q = (p - self.target_centroid) / self.target_norm;
        let r = RowVector2::new(q.x, q.y) * self.rotation;
        Point::new(r[0], r[1]) * (self.trace * self.reference_norm) + self.reference_centroid
    }

    /// Map every landmark of `shape` into the reference's frame.
    pub fn apply(&self, shape: &Shape) -> Shape {
        Shape::new(
            shape
                .points
                .iter()
                .map(|p| self.transform_point(*p))
                .collect(),
        )
    }

    /// Same mapping expressed as `scale * R * p + translation` on column vectors.
    pub fn similarity(&self) -> SimilarityTransform2D {
        let scale = self.scale();
        let r = self.rotation.transpose();
        let angle = r[(1, 0)].atan2(r[(0, 0)]);
        let c = r * Vector2::new(self.target_centroid.x, self.target_centroid.y) * scale;
        SimilarityTransform2D {
            angle,
            scale,
            translation: Point::new(
                self.reference_centroid.x - c[0],
                self.reference_centroid.y - c[1],
            ),
        }
    }
}

/// Rotation, uniform scale and translation in the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform2D {
    /// Counter-clockwise rotation in radians.
    pub angle: f64,
    pub scale: f64,
    pub translation: Point,
}

impl SimilarityTransform2D {
    pub fn identity() -> Self {
        Self {
            angle: 0.0,
            scale: 1.0,
            translation: Point::zero(),
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        let (sin, cos) = self.angle.sin_cos();
        Point::new(
            self.scale * (cos * p.x - sin * p.y) + self.translation.x,
            self.scale * (sin * p.x + cos * p.y) + self.translation.y,
        )
    }

    pub fn apply_shape(&self, shape: &Shape) -> Shape {
        Shape::new(shape.points.iter().map(|p| self.apply(*p)).collect())
    }
}

/// Similarity transform that best maps `from` onto `to`.
pub fn find_similarity_transform(from: &Shape, to: &Shape) -> Result<SimilarityTransform2D> {
    Ok(procrustes_fit(to, from)?.similarity())
}

fn check_pair(reference: &Shape, target: &Shape) -> Result<()> {
    let n = reference.num_landmarks();
    if target.num_landmarks() != n {
        return Err(Error::ShapeMismatch {
            expected: n,
            actual: target.num_landmarks(),
        });
    }
    if n < 2 {
        return Err(Error::TooFewPoints(n));
    }
    Ok(())
}

/// Fit the rotation and scale that superimpose `target` onto `reference`.
///
/// Shapes whose landmarks all coincide have a zero norm; they are not
/// detected and yield non-finite results (or [`Error::SvdFailed`]).
pub fn procrustes_fit(reference: &Shape, target: &Shape) -> Result<ProcrustesFit> {
    check_pair(reference, target)?;

    let reference_centroid = reference.centroid();
    let target_centroid = target.centroid();

    let x = reference.translated(Point::zero() - reference_centroid);
    let y = target.translated(Point::zero() - target_centroid);

    let reference_norm = x.frobenius_norm();
    let target_norm = y.frobenius_norm();

    // Cross-covariance X^T * Y of the unit-norm shapes.
    let mut a = Matrix2::<f64>::zeros();
    for (p, q) in x.points.iter().zip(y.points.iter()) {
        a[(0, 0)] += p.x * q.x;
        a[(0, 1)] += p.x * q.y;
        a[(1, 0)] += p.y * q.x;
        a[(1, 1)] += p.y * q.y;
    }
    a /= reference_norm * target_norm;

    let svd = a
        .try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS)
        .ok_or(Error::SvdFailed)?;
    let u = svd.u.ok_or(Error::SvdFailed)?;
    let mut v = svd.v_t.ok_or(Error::SvdFailed)?.transpose();
    let mut s = svd.singular_values;

    let mut rotation = v * u.transpose();
    if rotation.determinant() < 0.0 {
        v.column_mut(1).neg_mut();
        s[1] = -s[1];
        rotation = v * u.transpose();
    }

    let trace = s.sum();

    Ok(ProcrustesFit {
        rotation,
        trace,
        reference_centroid,
        reference_norm,
        target_centroid,
        target_norm,
        distance: 1.0 - trace * trace,
    })
}

/// Superimpose `target` onto `reference` in place and return the Procrustes
/// distance between them.
///
/// The target ends up in the reference's original position and scale, not
/// in a shared unit frame.
pub fn align_pair(reference: &Shape, target: &mut Shape) -> Result<f64> {
    let fit = procrustes_fit(reference, target)?;
    for p in target.points.iter_mut() {
        *p = fit.transform_point(*p);
    }
    Ok(fit.distance)
}

/// Why [`align_set`] stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The mean moved further from the reference than in the previous pass.
    DistanceIncreased,
    /// The pass count exceeded the iteration limit.
    IterationLimit,
}

/// Summary of a Generalized Procrustes Analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct GpaOutcome {
    /// Mean of the aligned shapes after the final pass.
    pub mean_shape: Shape,
    /// Number of align-all passes performed (always at least one).
    pub passes: usize,
    /// Distance between the final mean and the reference of the final pass.
    pub last_distance: f64,
    pub stop_reason: StopReason,
}

/// Generalized Procrustes Analysis over `shapes`, aligning every shape in place.
///
/// The first shape is the initial reference. Each pass aligns all shapes to
/// the reference and measures how far their mean lies from it. Iteration
/// stops as soon as that distance grows compared to the previous pass, or
/// once more than `max_iterations` passes have completed; otherwise the mean
/// becomes the next reference. `max_iterations == 0` still performs one pass.
pub fn align_set(shapes: &mut ShapeSet, max_iterations: usize) -> Result<GpaOutcome> {
    if shapes.is_empty() {
        return Err(Error::EmptyShapeSet);
    }
    if shapes.num_landmarks() < 2 {
        return Err(Error::TooFewPoints(shapes.num_landmarks()));
    }

    let mut reference = shapes[0].clone();
    let mut last_distance = f64::MAX;
    let mut iterations = 0usize;
    let mut passes = 0usize;

    loop {
        for shape in shapes.shapes_mut() {
            align_pair(&reference, shape)?;
        }
        passes += 1;

        let mean = shapes.mean_shape();
        let distance = mean.distance(&reference);
        debug!("GPA pass {}: mean moved {:.6e}", passes, distance);

        let stop = if distance > last_distance {
            Some(StopReason::DistanceIncreased)
        } else {
            iterations += 1;
            (iterations > max_iterations).then_some(StopReason::IterationLimit)
        };

        last_distance = distance;
        reference = mean;

        if let Some(stop_reason) = stop {
            if stop_reason == StopReason::IterationLimit && max_iterations > 0 {
                warn!(
                    "GPA stopped at the iteration limit ({}) with distance {:.6e}",
                    max_iterations, distance
                );
            }
            return Ok(GpaOutcome {
                mean_shape: reference,
                passes,
                last_distance,
                stop_reason,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sample_shape() -> Shape {
        Shape::new(vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.5),
            Point::new(5.0, 3.0),
            Point::new(2.0, 6.0),
            Point::new(-1.0, 3.5),
        ])
    }

    fn rotate(shape: &Shape, angle: f64) -> Shape {
        SimilarityTransform2D {
            angle,
            scale: 1.0,
            translation: Point::zero(),
        }
        .apply_shape(shape)
    }

    fn assert_shapes_close(a: &Shape, b: &Shape, eps: f64) {
        for (p, q) in a.points.iter().zip(b.points.iter()) {
            assert!(p.distance(q) < eps, "{:?} vs {:?}", p, q);
        }
    }

    #[test]
    fn self_alignment_is_identity() {
        let reference = sample_shape();
        let fit = procrustes_fit(&reference, &reference).unwrap();

        assert!(fit.distance.abs() < 1e-12);
        assert_relative_eq!(fit.scale(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.rotation[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.rotation[(1, 1)], 1.0, epsilon = 1e-12);
        assert!(fit.rotation[(0, 1)].abs() < 1e-12);
        assert!(fit.rotation[(1, 0)].abs() < 1e-12);

        let mut target = reference.clone();
        let d = align_pair(&reference, &mut target).unwrap();
        assert!(d.abs() < 1e-12);
        assert_shapes_close(&target, &reference, 1e-9);
    }

    #[test]
    fn mirrored_target_never_yields_reflection() {
        let reference = sample_shape();
        let mirrored = Shape::new(
            reference
                .points
                .iter()
                .map(|p| Point::new(-p.x, p.y))
                .collect(),
        );

        let fit = procrustes_fit(&reference, &mirrored).unwrap();
        assert!(fit.rotation.determinant() > 0.0);
        assert_relative_eq!(fit.rotation.determinant(), 1.0, epsilon = 1e-9);
        // A reflection cannot be undone, so the residual stays positive.
        assert!(fit.distance > 1e-6);
        assert!(fit.trace < 1.0);
    }

    #[test]
    fn rotation_is_proper_for_random_pairs() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let a = Shape::new(
                (0..6)
                    .map(|_| Point::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)))
                    .collect(),
            );
            let b = Shape::new(
                (0..6)
                    .map(|_| Point::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)))
                    .collect(),
            );
            let fit = procrustes_fit(&a, &b).unwrap();
            assert!(fit.rotation.determinant() > 0.0);
            assert!(fit.distance >= -1e-12 && fit.distance <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn scaled_translated_rotated_copy_aligns_back() {
        let reference = sample_shape();
        let transform = SimilarityTransform2D {
            angle: 0.6,
            scale: 2.5,
            translation: Point::new(10.0, -3.0),
        };
        let mut target = transform.apply_shape(&reference);

        let d = align_pair(&reference, &mut target).unwrap();
        assert!(d.abs() < 1e-12);
        assert_shapes_close(&target, &reference, 1e-9);
    }

    #[test]
    fn similarity_transform_recovers_parameters() {
        let from = sample_shape();
        let expected = SimilarityTransform2D {
            angle: -0.4,
            scale: 0.5,
            translation: Point::new(3.0, 7.0),
        };
        let to = expected.apply_shape(&from);

        let found = find_similarity_transform(&from, &to).unwrap();
        assert_relative_eq!(found.angle, expected.angle, epsilon = 1e-9);
        assert_relative_eq!(found.scale, expected.scale, epsilon = 1e-9);
        assert_relative_eq!(found.translation.x, 3.0, epsilon = 1e-9);
        assert_relative_eq!(found.translation.y, 7.0, epsilon = 1e-9);
    }

    #[test]
    fn align_pair_rejects_bad_input() {
        let reference = sample_shape();
        let mut shorter = Shape::zeros(3);
        assert!(matches!(
            align_pair(&reference, &mut shorter),
            Err(Error::ShapeMismatch {
                expected: 5,
                actual: 3
            })
        ));

        let single = Shape::new(vec![Point::new(1.0, 1.0)]);
        let mut other = single.clone();
        assert!(matches!(
            align_pair(&single, &mut other),
            Err(Error::TooFewPoints(1))
        ));
    }

    #[test]
    fn set_of_perturbed_copies_converges() {
        let base = sample_shape();
        let mut rng = StdRng::seed_from_u64(42);

        let shapes = (0..12)
            .map(|i| {
                let noisy = Shape::new(
                    base.points
                        .iter()
                        .map(|p| {
                            *p + Point::new(rng.gen_range(-0.01..0.01), rng.gen_range(-0.01..0.01))
                        })
                        .collect(),
                );
                SimilarityTransform2D {
                    angle: 0.1 * i as f64,
                    scale: 1.0 + 0.05 * i as f64,
                    translation: Point::new(i as f64, -(i as f64)),
                }
                .apply_shape(&noisy)
            })
            .collect();
        let mut set = ShapeSet::new(shapes).unwrap();

        let outcome = align_set(&mut set, 10).unwrap();
        assert!(outcome.passes <= 11);
        assert!(outcome.passes >= 2);
        assert!(outcome.last_distance < 1e-3);

        // Every aligned shape sits close to the mean.
        for shape in set.shapes() {
            assert_shapes_close(shape, &outcome.mean_shape, 0.05);
        }
    }

    #[test]
    fn zero_iterations_runs_one_pass() {
        let base = sample_shape();
        let mut set = ShapeSet::new(vec![base.clone(), rotate(&base, 1.0)]).unwrap();
        let outcome = align_set(&mut set, 0).unwrap();
        assert_eq!(outcome.passes, 1);
        assert_eq!(outcome.stop_reason, StopReason::IterationLimit);
        // The first pass aligns everything onto the first shape.
        assert_shapes_close(&set[1], &base, 1e-9);
    }

    #[test]
    fn always_terminates_within_limit() {
        let mut rng = StdRng::seed_from_u64(3);
        let shapes = (0..8)
            .map(|_| {
                Shape::new(
                    (0..7)
                        .map(|_| Point::new(rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0)))
                        .collect(),
                )
            })
            .collect();
        let mut set = ShapeSet::new(shapes).unwrap();
        for max_iterations in [1, 2, 5] {
            let outcome = align_set(&mut set, max_iterations).unwrap();
            assert!(outcome.passes <= max_iterations + 1);
        }
    }

    fn random_set(seed: u64) -> ShapeSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let shapes = (0..6)
            .map(|_| {
                Shape::new(
                    (0..5)
                        .map(|_| Point::new(rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0)))
                        .collect(),
                )
            })
            .collect();
        ShapeSet::new(shapes).unwrap()
    }

    #[test]
    fn stops_when_mean_distance_increases() {
        let max_iterations = 50;

        // Unstructured random sets regularly make the mean drift back out.
        let (original, set, outcome) = (0..500u64)
            .find_map(|seed| {
                let original = random_set(seed);
                let mut set = original.clone();
                let outcome = align_set(&mut set, max_iterations).unwrap();
                (outcome.stop_reason == StopReason::DistanceIncreased)
                    .then_some((original, set, outcome))
            })
            .expect("no seed stopped on a distance increase");

        assert!(outcome.passes >= 2);
        assert!(outcome.passes < max_iterations + 1);

        // Replay the passes and record how far each mean moved.
        let mut replay = original;
        let mut reference = replay[0].clone();
        let mut distances = Vec::new();
        for _ in 0..outcome.passes {
            for shape in replay.shapes_mut() {
                align_pair(&reference, shape).unwrap();
            }
            let mean = replay.mean_shape();
            distances.push(mean.distance(&reference));
            reference = mean;
        }

        let n = distances.len();
        assert!(distances[n - 1] > distances[n - 2]);
        // No earlier pass increased, otherwise iteration would have stopped there.
        for w in distances[..n - 1].windows(2) {
            assert!(w[1] <= w[0]);
        }
        assert_relative_eq!(outcome.last_distance, distances[n - 1], epsilon = 1e-12);
        assert_shapes_close(&outcome.mean_shape, &reference, 1e-12);
        assert_shapes_close(&set.mean_shape(), &reference, 1e-12);
    }

    #[test]
    fn empty_set_is_rejected() {
        let mut set = ShapeSet::new(Vec::new()).unwrap();
        assert!(matches!(align_set(&mut set, 5), Err(Error::EmptyShapeSet)));
    }
}
