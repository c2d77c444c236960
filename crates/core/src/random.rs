use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws for probability gates and response selection.
pub trait RandomSource: Send {
    /// Uniform draw in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn pick(&mut self, len: usize) -> usize {
        let index = (self.next_f64() * len as f64) as usize;
        index.min(len.saturating_sub(1))
    }
}

pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn from_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len.max(1))
    }
}

/// Replays a fixed sequence of draws, then repeats the fallback forever.
#[derive(Clone, Debug)]
pub struct ScriptedRandom {
    draws: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedRandom {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self { draws: draws.into_iter().collect(), fallback: 0.0 }
    }

    /// Every draw returns `value`.
    pub fn constant(value: f64) -> Self {
        Self { draws: VecDeque::new(), fallback: value }
    }

    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        self.draws.pop_front().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::{RandomSource, ScriptedRandom, SeededRandom};

    #[test]
    fn seeded_sources_are_reproducible() {
        let mut first = SeededRandom::from_seed(7);
        let mut second = SeededRandom::from_seed(7);

        let a = (0..5).map(|_| first.next_f64()).collect::<Vec<_>>();
        let b = (0..5).map(|_| second.next_f64()).collect::<Vec<_>>();

        assert_eq!(a, b);
        assert!(a.iter().all(|draw| (0.0..1.0).contains(draw)));
    }

    #[test]
    fn scripted_pick_maps_draw_onto_index_range() {
        let mut random = ScriptedRandom::new([0.0, 0.5, 0.999]);

        assert_eq!(random.pick(3), 0);
        assert_eq!(random.pick(3), 1);
        assert_eq!(random.pick(3), 2);
    }

    #[test]
    fn scripted_falls_back_after_sequence_is_exhausted() {
        let mut random = ScriptedRandom::new([0.25]).with_fallback(0.75);

        assert_eq!(random.next_f64(), 0.25);
        assert_eq!(random.next_f64(), 0.75);
        assert_eq!(random.next_f64(), 0.75);
    }
}
