//! Scoring functions and their gradients.
//!
//! Complex-valued embeddings store each component as an interleaved
//! `(re, im)` pair, so a `d`-component ComplEx vector has length `2d`.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Model families the built-in trainer knows how to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    /// TransE: -||h + r - t||
    TransE,
    /// DistMult: <h, r, t>
    DistMult,
    /// ComplEx: Re(<h, r, conj(t)>)
    ComplEx,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [Self::TransE, Self::DistMult, Self::ComplEx];

    /// Stored vector length for `dim` embedding components.
    pub fn width(&self, dim: usize) -> usize {
        match self {
            Self::ComplEx => 2 * dim,
            Self::TransE | Self::DistMult => dim,
        }
    }

    /// Plausibility of (h, r, t); higher is more plausible.
    pub fn score(&self, h: ArrayView1<f32>, r: ArrayView1<f32>, t: ArrayView1<f32>) -> f32 {
        match self {
            Self::TransE => score_transe(h, r, t),
            Self::DistMult => score_distmult(h, r, t),
            Self::ComplEx => score_complex(h, r, t),
        }
    }

    /// Gradient of [`score`](Self::score) with respect to (h, r, t).
    pub fn score_gradient(
        &self,
        h: ArrayView1<f32>,
        r: ArrayView1<f32>,
        t: ArrayView1<f32>,
    ) -> (Array1<f32>, Array1<f32>, Array1<f32>) {
        match self {
            Self::TransE => grad_transe(h, r, t),
            Self::DistMult => (&r * &t, &h * &t, &h * &r),
            Self::ComplEx => grad_complex(h, r, t),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TransE => "TransE",
            Self::DistMult => "DistMult",
            Self::ComplEx => "ComplEx",
        };
        f.write_str(name)
    }
}

impl FromStr for ModelFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transe" => Ok(Self::TransE),
            "distmult" => Ok(Self::DistMult),
            "complex" => Ok(Self::ComplEx),
            _ => Err(Error::InvalidConfig(format!("unknown model family '{}'", s))),
        }
    }
}

/// TransE scoring: -||h + r - t||_2
fn score_transe(h: ArrayView1<f32>, r: ArrayView1<f32>, t: ArrayView1<f32>) -> f32 {
    let mut sum_sq = 0.0;
    for i in 0..h.len() {
        let diff = h[i] + r[i] - t[i];
        sum_sq += diff * diff;
    }
    -sum_sq.sqrt()
}

/// DistMult scoring: <h, r, t>
fn score_distmult(h: ArrayView1<f32>, r: ArrayView1<f32>, t: ArrayView1<f32>) -> f32 {
    let mut score = 0.0;
    for i in 0..h.len() {
        score += h[i] * r[i] * t[i];
    }
    score
}

/// ComplEx scoring: Re(<h, r, conj(t)>).
fn score_complex(h: ArrayView1<f32>, r: ArrayView1<f32>, t: ArrayView1<f32>) -> f32 {
    let dim = h.len() / 2;
    let mut score = 0.0;

    for i in 0..dim {
        let (h_re, h_im) = (h[2 * i], h[2 * i + 1]);
        let (r_re, r_im) = (r[2 * i], r[2 * i + 1]);
        let (t_re, t_im) = (t[2 * i], t[2 * i + 1]);

        // (h * r) = x + yi; Re((x + yi)(t_re - t_im i)) = x t_re + y t_im
        let x = h_re * r_re - h_im * r_im;
        let y = h_re * r_im + h_im * r_re;

        score += x * t_re + y * t_im;
    }
    score
}

fn grad_transe(
    h: ArrayView1<f32>,
    r: ArrayView1<f32>,
    t: ArrayView1<f32>,
) -> (Array1<f32>, Array1<f32>, Array1<f32>) {
    let diff = &h + &r - &t;
    let norm = diff.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-8);
    // d(-||d||)/dh = -d / ||d||
    let g = diff.mapv(|x| -x / norm);
    let neg = g.mapv(|x| -x);
    (g.clone(), g, neg)
}

fn grad_complex(
    h: ArrayView1<f32>,
    r: ArrayView1<f32>,
    t: ArrayView1<f32>,
) -> (Array1<f32>, Array1<f32>, Array1<f32>) {
    let n = h.len();
    let mut gh = Array1::zeros(n);
    let mut gr = Array1::zeros(n);
    let mut gt = Array1::zeros(n);

    for i in 0..n / 2 {
        let (re, im) = (2 * i, 2 * i + 1);
        let (h_re, h_im) = (h[re], h[im]);
        let (r_re, r_im) = (r[re], r[im]);
        let (t_re, t_im) = (t[re], t[im]);

        gh[re] = r_re * t_re + r_im * t_im;
        gh[im] = r_re * t_im - r_im * t_re;
        gr[re] = h_re * t_re + h_im * t_im;
        gr[im] = h_re * t_im - h_im * t_re;
        gt[re] = h_re * r_re - h_im * r_im;
        gt[im] = h_re * r_im + h_im * r_re;
    }
    (gh, gr, gt)
}
