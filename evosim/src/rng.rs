use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Mixing constant separating the streams of
/// consecutive generations.
const GENERATION_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// The single random source of an evolution.
///
/// Each generation gets its own stream, derived only from
/// the run seed and the generation number, so a run resumed
/// from a saved generation draws exactly the numbers an
/// uninterrupted run would have.
#[derive(Clone, Debug)]
pub struct EvolutionRng(StdRng);

impl EvolutionRng {
    /// Returns the stream used to breed generation `generation + 1`
    /// from generation `generation`.
    ///
    /// # Examples
    /// ```
    /// use evosim::EvolutionRng;
    /// use rand::Rng;
    ///
    /// let a: u64 = EvolutionRng::for_generation(42, 3).gen();
    /// let b: u64 = EvolutionRng::for_generation(42, 3).gen();
    /// let c: u64 = EvolutionRng::for_generation(42, 4).gen();
    /// assert_eq!(a, b);
    /// assert_ne!(a, c);
    /// ```
    pub fn for_generation(seed: u64, generation: usize) -> EvolutionRng {
        let stream = (generation as u64).wrapping_add(1).wrapping_mul(GENERATION_STREAM);
        EvolutionRng(StdRng::seed_from_u64(seed ^ stream))
    }

    /// Returns the stream used to create the root population.
    pub fn genesis(seed: u64) -> EvolutionRng {
        EvolutionRng(StdRng::seed_from_u64(seed))
    }

    /// Returns `true` with probability `chance`.
    ///
    /// Values outside `[0, 1]` saturate instead of panicking.
    pub fn chance(&mut self, chance: f32) -> bool {
        self.0.gen::<f32>() < chance
    }
}

impl RngCore for EvolutionRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}
