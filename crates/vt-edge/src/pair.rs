use crate::edge1d::{EdgePeak, EdgePolarity};

/// Anything that can take part in an opposite-polarity edge pair.
pub trait PairCandidate: Clone {
    fn position(&self) -> f32;
    fn polarity(&self) -> EdgePolarity;
    /// Weight averaged into the pair score.
    fn pair_weight(&self) -> f32;
}

impl PairCandidate for EdgePeak {
    fn position(&self) -> f32 {
        self.x
    }

    fn polarity(&self) -> EdgePolarity {
        self.polarity
    }

    fn pair_weight(&self) -> f32 {
        self.strength
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgePair<E> {
    pub first: E,
    pub second: E,
    pub center: f32,
    pub width: f32,
    pub score: f32,
    /// `first` rises and `second` falls: a bright band on a dark background.
    pub bright_on_dark: bool,
}

/// Accepted span, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgePairConfig {
    pub min_width: f32,
    pub max_width: f32,
    /// Required polarity of the earlier edge; `None` accepts both orders.
    pub first_polarity: Option<EdgePolarity>,
}

impl EdgePairConfig {
    pub fn around(expected: f32, tolerance: f32) -> Self {
        let tol = tolerance.abs();
        Self {
            min_width: (expected - tol).max(0.0),
            max_width: expected + tol,
            first_polarity: None,
        }
    }
}

impl Default for EdgePairConfig {
    fn default() -> Self {
        Self {
            min_width: 1.0,
            max_width: 50.0,
            first_polarity: None,
        }
    }
}

/// Highest-scoring opposite-polarity pair with a valid span. The pair score
/// is the mean of both weights; ties keep the pair found first.
pub fn best_edge_pair<E: PairCandidate>(edges: &[E], cfg: &EdgePairConfig) -> Option<EdgePair<E>> {
    let mut best: Option<EdgePair<E>> = None;

    for i in 0..edges.len() {
        for j in (i + 1)..edges.len() {
            if edges[i].polarity() == edges[j].polarity() {
                continue;
            }

            let (first, second) = if edges[i].position() <= edges[j].position() {
                (&edges[i], &edges[j])
            } else {
                (&edges[j], &edges[i])
            };

            if cfg.first_polarity.is_some_and(|p| p != first.polarity()) {
                continue;
            }

            let width = second.position() - first.position();
            if width < cfg.min_width || width > cfg.max_width {
                continue;
            }

            let score = 0.5 * (first.pair_weight() + second.pair_weight());
            if best.as_ref().is_some_and(|b| score <= b.score) {
                continue;
            }

            best = Some(EdgePair {
                first: first.clone(),
                second: second.clone(),
                center: 0.5 * (first.position() + second.position()),
                width,
                score,
                bright_on_dark: first.polarity() == EdgePolarity::Rising,
            });
        }
    }

    best
}
