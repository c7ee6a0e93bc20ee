//! Angular distance helpers.
//!
//! The angular distance between `u` and `v` is `sqrt(2 - 2 cos(u, v))`,
//! the Euclidean distance between the two vectors after normalizing them
//! to unit length. It ranges from 0 (same direction) to 2 (opposite) and
//! ignores magnitude. A zero vector is treated as orthogonal to everything.

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Unit-length copy of `v`, or a copy of `v` itself when it is zero.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n > 0.0 {
        v.iter().map(|x| x / n).collect()
    } else {
        v.to_vec()
    }
}

/// Cosine similarity clamped to `[-1, 1]`; 0 when either side is zero.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let na = norm(a);
    let nb = norm(b);
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot(a, b) / (na * nb)).clamp(-1.0, 1.0)
}

pub fn angular(a: &[f32], b: &[f32]) -> f32 {
    (2.0 - 2.0 * cosine(a, b)).max(0.0).sqrt()
}
