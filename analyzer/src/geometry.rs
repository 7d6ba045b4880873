//! Inertia tensors, principal moments and shape ratios for weighted point sets.
//!
//! Pure numerical code: callers decide the masses (1.0 for a-spheres, atomic mass otherwise).

use std::f64::consts::PI;

use log::debug;
use ndarray::Array2;

use crate::models::ShapeRatios;

pub type Point = [f64; 3];

/// Inertia tensor about the mass-weighted centroid. `None` for an empty or massless set.
pub fn inertia_tensor(points: &[(Point, f64)]) -> Option<Array2<f64>> {
    let total_mass: f64 = points.iter().map(|(_, m)| m).sum();
    if points.is_empty() || total_mass <= 0.0 {
        return None;
    }

    let mut com = [0.0; 3];
    for (p, m) in points {
        for k in 0..3 {
            com[k] += p[k] * m;
        }
    }
    for c in com.iter_mut() {
        *c /= total_mass;
    }

    let mut t = Array2::<f64>::zeros((3, 3));
    for (p, m) in points {
        let x = p[0] - com[0];
        let y = p[1] - com[1];
        let z = p[2] - com[2];
        t[[0, 0]] += m * (y * y + z * z);
        t[[1, 1]] += m * (x * x + z * z);
        t[[2, 2]] += m * (x * x + y * y);
        t[[0, 1]] -= m * x * y;
        t[[0, 2]] -= m * x * z;
        t[[1, 2]] -= m * y * z;
    }
    t[[1, 0]] = t[[0, 1]];
    t[[2, 0]] = t[[0, 2]];
    t[[2, 1]] = t[[1, 2]];
    Some(t)
}

/// Eigenvalues of a symmetric 3x3 matrix in ascending order (I1 <= I2 <= I3).
pub fn principal_moments(tensor: &Array2<f64>) -> [f64; 3] {
    let a = |i: usize, j: usize| tensor[[i, j]];
    let p1 = a(0, 1).powi(2) + a(0, 2).powi(2) + a(1, 2).powi(2);

    let mut eig = if p1 == 0.0 {
        [a(0, 0), a(1, 1), a(2, 2)]
    } else {
        let q = (a(0, 0) + a(1, 1) + a(2, 2)) / 3.0;
        let p2 = (a(0, 0) - q).powi(2) + (a(1, 1) - q).powi(2) + (a(2, 2) - q).powi(2) + 2.0 * p1;
        let p = (p2 / 6.0).sqrt();
        let b = (tensor - &(Array2::<f64>::eye(3) * q)) / p;
        let r = determinant(&b) / 2.0;
        let phi = if r <= -1.0 {
            PI / 3.0
        } else if r >= 1.0 {
            0.0
        } else {
            r.acos() / 3.0
        };
        let largest = q + 2.0 * p * phi.cos();
        let smallest = q + 2.0 * p * (phi + 2.0 * PI / 3.0).cos();
        [smallest, 3.0 * q - largest - smallest, largest]
    };

    // round-off on collinear sets can leave tiny negatives
    for v in eig.iter_mut() {
        if *v < 0.0 && *v > -1e-9 {
            *v = 0.0;
        }
    }
    eig.sort_by(|x, y| x.total_cmp(y));
    eig
}

fn determinant(m: &Array2<f64>) -> f64 {
    m[[0, 0]] * (m[[1, 1]] * m[[2, 2]] - m[[1, 2]] * m[[2, 1]])
        - m[[0, 1]] * (m[[1, 0]] * m[[2, 2]] - m[[1, 2]] * m[[2, 0]])
        + m[[0, 2]] * (m[[1, 0]] * m[[2, 1]] - m[[1, 1]] * m[[2, 0]])
}

/// Normalized PMI ratios. Coincident points (I3 == 0) give NaN ratios; an empty set gives `None`.
pub fn shape_ratios(points: &[(Point, f64)]) -> Option<ShapeRatios> {
    let tensor = inertia_tensor(points)?;
    let moments = principal_moments(&tensor);
    debug!("principal moments {:?}", moments);
    Some(ShapeRatios::from_moments(moments))
}

/// Mean position of a point set.
pub fn center(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let mut c = [0.0; 3];
    for p in points {
        for k in 0..3 {
            c[k] += p[k];
        }
    }
    Some([c[0] / n, c[1] / n, c[2] / n])
}

pub fn distance(a: &Point, b: &Point) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Minimum Euclidean distance from `point` to any member of `set`.
pub fn min_distance(point: &Point, set: &[Point]) -> Option<f64> {
    set.iter().map(|q| distance(point, q)).min_by(|a, b| a.total_cmp(b))
}

/// Number of members of `from` lying within `cutoff` (inclusive) of any member of `to`.
pub fn count_within(from: &[Point], to: &[Point], cutoff: f64) -> usize {
    from.iter()
        .filter(|p| to.iter().any(|q| distance(p, q) <= cutoff))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShapeClass;
    use ndarray::arr2;

    fn diagonal(values: [f64; 3]) -> Array2<f64> {
        arr2(&[
            [values[0], 0.0, 0.0],
            [0.0, values[1], 0.0],
            [0.0, 0.0, values[2]],
        ])
    }

    fn unit(points: &[Point]) -> Vec<(Point, f64)> {
        points.iter().map(|p| (*p, 1.0)).collect()
    }

    #[test]
    fn diagonal_tensor_moments_sorted() {
        let m = principal_moments(&diagonal([4.0, 1.0, 1.0]));
        assert_eq!(m, [1.0, 1.0, 4.0]);
    }

    #[test]
    fn rotated_tensor_matches_known_eigenvalues() {
        // eigenvalues 1, 2, 4 mixed by a rotation about z
        let t = arr2(&[[1.5, 0.5, 0.0], [0.5, 1.5, 0.0], [0.0, 0.0, 4.0]]);
        let m = principal_moments(&t);
        assert!((m[0] - 1.0).abs() < 1e-9);
        assert!((m[1] - 2.0).abs() < 1e-9);
        assert!((m[2] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn octahedron_is_sphere_like() {
        let pts = unit(&[
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ]);
        let r = shape_ratios(&pts).unwrap();
        assert!((r.npr1 - 1.0).abs() < 1e-9 && (r.npr2 - 1.0).abs() < 1e-9);
        assert_eq!(r.classify(), ShapeClass::SphereLike);
    }

    #[test]
    fn square_is_disc_like() {
        let pts = unit(&[[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, -1.0, 0.0]]);
        let r = shape_ratios(&pts).unwrap();
        assert!((r.npr1 - 0.5).abs() < 1e-9);
        assert!((r.npr2 - 0.5).abs() < 1e-9);
        assert_eq!(r.classify(), ShapeClass::DiscLike);
    }

    #[test]
    fn line_is_rod_like() {
        let pts = unit(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);
        let r = shape_ratios(&pts).unwrap();
        assert!(r.npr1.abs() < 1e-9);
        assert!((r.npr2 - 1.0).abs() < 1e-9);
        assert_eq!(r.classify(), ShapeClass::RodLike);
    }

    #[test]
    fn moments_ordered_and_ratios_bounded() {
        let pts = vec![
            ([0.3, 1.2, -0.7], 12.011),
            ([2.1, -0.4, 0.9], 14.007),
            ([-1.5, 0.8, 2.2], 15.999),
            ([0.0, -2.3, -1.1], 30.974),
            ([1.7, 2.9, 0.4], 1.008),
        ];
        let t = inertia_tensor(&pts).unwrap();
        let m = principal_moments(&t);
        assert!(m[0] <= m[1] && m[1] <= m[2]);
        let r = shape_ratios(&pts).unwrap();
        assert!((0.0..=1.0).contains(&r.npr1));
        assert!((0.0..=1.0).contains(&r.npr2));
    }

    #[test]
    fn coincident_points_give_nan() {
        let pts = unit(&[[1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]);
        let r = shape_ratios(&pts).unwrap();
        assert!(r.npr1.is_nan() && r.npr2.is_nan());
        assert!(shape_ratios(&[]).is_none());
    }

    #[test]
    fn center_and_distances() {
        let pts = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        assert_eq!(center(&pts), Some([1.0, 0.0, 0.0]));
        assert_eq!(min_distance(&[1.0, 0.0, 0.0], &pts), Some(1.0));
        assert_eq!(count_within(&pts, &[[3.0, 0.0, 0.0]], 1.0), 1);
        assert!(min_distance(&[0.0; 3], &[]).is_none());
    }
}
