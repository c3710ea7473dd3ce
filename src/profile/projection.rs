//! Two-component PCA of cluster profiles for the scatter view.

use ndarray::{Array2, ArrayView2};

use crate::normalize::standardize;

const JACOBI_SWEEPS: usize = 100;

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns eigenvalues in descending order and the matching eigenvectors as
/// columns.
pub fn symmetric_eigen(mut a: Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..JACOBI_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]].powi(2))
            .sum();
        if off < 1e-22 {
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                if a[[p, q]].abs() < 1e-300 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));
    let values = order.iter().map(|&i| a[[i, i]]).collect();
    let vectors = Array2::from_shape_fn((n, n), |(r, c)| v[[r, order[c]]]);
    (values, vectors)
}

/// First two principal-component scores of each row of `x` after
/// standardizing its columns. Fewer than two rows project to the origin.
pub fn pca_2d(x: ArrayView2<'_, f64>) -> Vec<(f64, f64)> {
    let n = x.nrows();
    if n < 2 {
        return vec![(0.0, 0.0); n];
    }
    let z = standardize(x);
    let gram = z.dot(&z.t());
    let (values, mut vectors) = symmetric_eigen(gram);

    let mut scores = vec![[0.0f64; 2]; n];
    for comp in 0..2.min(n) {
        let mut col = vectors.column_mut(comp);
        // Sign convention: the largest-magnitude loading is positive.
        let pivot = col
            .iter()
            .copied()
            .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if pivot < 0.0 {
            col.mapv_inplace(|v| -v);
        }
        let scale = values[comp].max(0.0).sqrt();
        for (s, v) in scores.iter_mut().zip(col.iter()) {
            s[comp] = v * scale;
        }
    }
    scores.into_iter().map(|[a, b]| (a, b)).collect()
}
