use rand::seq::SliceRandom;

/// Shuffle-without-replacement cursor over a header pool.
///
/// Hands out a random permutation of the pool one item at a time and
/// reshuffles when it runs dry, so every `pool.len()`-sized window starting
/// at a cycle boundary contains each header exactly once.
#[derive(Debug, Clone)]
pub struct HeaderRotation<T> {
    pool: Vec<T>,
    remaining: Vec<T>,
}

impl<T: Clone> HeaderRotation<T> {
    pub fn new(pool: Vec<T>) -> Self {
        Self {
            pool,
            remaining: Vec::new(),
        }
    }
}

/// Never ends unless the pool is empty.
impl<T: Clone> Iterator for HeaderRotation<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.remaining.is_empty() {
            if self.pool.is_empty() {
                return None;
            }
            self.remaining = self.pool.clone();
            self.remaining.shuffle(&mut rand::rng());
        }
        self.remaining.pop()
    }
}
