use std::cell::RefCell;
use std::collections::HashMap;

use rand_123::threefry::{threefry_2x64, Array2x64};
use rand_core::{impls, Error as RandCoreError, RngCore};
use rand_distr::{Bernoulli, Distribution, Normal, Uniform};

use crate::errors::SketchError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistributionType {
    Gaussian,
    Uniform,
    Rademacher,
}

/// Counter-addressed random stream. Block b of the stream at position p is
/// `threefry_2x64([p, b], key)`, so the values at position p are a pure
/// function of (key, p) — no state from neighboring positions leaks in.
pub struct CounterRng {
    key: Array2x64,
    ctr: Array2x64,
    buf: Array2x64,
    used: usize,
}

impl CounterRng {
    fn new(key: Array2x64, position: u64) -> Self {
        CounterRng {
            key,
            ctr: [position, 0],
            buf: [0, 0],
            used: 2,
        }
    }
}

impl RngCore for CounterRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        if self.used == 2 {
            threefry_2x64(self.ctr, self.key, &mut self.buf);
            self.ctr[1] = self.ctr[1].wrapping_add(1);
            self.used = 0;
        }
        let value = self.buf[self.used];
        self.used += 1;
        value
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), RandCoreError> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn sample_value(key: Array2x64, position: u64, dist: DistributionType) -> f64 {
    let mut rng = CounterRng::new(key, position);
    match dist {
        DistributionType::Gaussian => {
            let normal = Normal::new(0.0, 1.0).unwrap();
            normal.sample(&mut rng)
        }
        DistributionType::Uniform => {
            let uniform = Uniform::new(-1.0, 1.0);
            uniform.sample(&mut rng)
        }
        DistributionType::Rademacher => {
            let bernoulli = Bernoulli::new(0.5).unwrap();
            if bernoulli.sample(&mut rng) {
                1.0
            } else {
                -1.0
            }
        }
    }
}

/// Seeded source of addressable random streams. Every allocation call
/// claims `count` consecutive stream positions and advances the cursor, so
/// sequential allocations never reuse randomness. A value at position p
/// depends only on (seed, p): the same draws come out no matter how the
/// consuming matrix is partitioned across processes.
pub struct RandomContext {
    seed: u64,
    key: Array2x64,
    offset: u64,
}

impl RandomContext {
    pub fn new(seed: u64) -> Self {
        Self::with_offset(seed, 0)
    }

    /// Re-opens a context at a persisted stream cursor.
    pub fn with_offset(seed: u64, offset: u64) -> Self {
        RandomContext {
            seed,
            key: [seed, 0],
            offset,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current stream cursor; the next allocation starts here.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Stream at an absolute position. Pure: does not move the cursor.
    pub fn substream(&self, position: u64) -> CounterRng {
        CounterRng::new(self.key, position)
    }

    fn advance(&mut self, count: usize) -> u64 {
        let base = self.offset;
        self.offset += count as u64;
        base
    }

    /// Eagerly draws `count` values from the given distribution.
    pub fn allocate_values(&mut self, count: usize, dist: DistributionType) -> Vec<f64> {
        let base = self.advance(count);
        log::debug!("allocating {} values at stream offset {}", count, base);
        (0..count)
            .map(|i| sample_value(self.key, base + i as u64, dist))
            .collect()
    }

    /// Eagerly draws `count` uniform indices over `[0, bound)`.
    pub fn allocate_indices(&mut self, count: usize, bound: usize) -> Result<Vec<usize>, SketchError> {
        if bound == 0 {
            return Err(SketchError::Configuration(
                "index distribution needs a nonzero bound".to_string(),
            ));
        }
        let base = self.advance(count);
        log::debug!("allocating {} indices below {} at stream offset {}", count, bound, base);
        let uniform = Uniform::from(0..bound);
        Ok((0..count)
            .map(|i| uniform.sample(&mut self.substream(base + i as u64)))
            .collect())
    }

    /// Claims `count` positions but defers generation to first access.
    /// Equivalent to `allocate_values` with the same cursor in every way
    /// except when the work is done.
    pub fn allocate_lazy(&mut self, count: usize, dist: DistributionType) -> LazyValues {
        let base = self.advance(count);
        LazyValues {
            key: self.key,
            base,
            len: count,
            dist,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

/// Deferred value array: entry i is generated from substream `base + i` on
/// first read and cached, so reads may come in any order and repeated reads
/// are consistent.
pub struct LazyValues {
    key: Array2x64,
    base: u64,
    len: usize,
    dist: DistributionType,
    cache: RefCell<HashMap<usize, f64>>,
}

impl LazyValues {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value at `index`, generating and caching it if this is the first
    /// read. Panics if `index` is out of range, like slice indexing.
    pub fn get(&self, index: usize) -> f64 {
        assert!(index < self.len, "lazy value index {} out of range {}", index, self.len);
        if let Some(&value) = self.cache.borrow().get(&index) {
            return value;
        }
        let value = sample_value(self.key, self.base + index as u64, self.dist);
        self.cache.borrow_mut().insert(index, value);
        value
    }
}
