use rand::{Error, RngCore};

// A small, deterministic PCG32 generator (O'Neill, 2014). The source
// generator used an unseeded `rand::random`, which makes two renders of the
// same scene diverge pixel-to-pixel; every draw here is reproducible from
// (seed, tile, sample index, bounce index), which the tile renderer and
// integrator fold into the initial state before the first draw.
//
// The mixing step is the same hash a GPU path tracer in this family uses to
// turn an integer index into a well-distributed 32-bit word; here it seeds
// the classic PCG32 state/increment pair rather than being called per draw.
pub struct Rng {
    state: u64,
    inc: u64,
}

const PCG_MULTIPLIER: u64 = 6364136223846793005;

impl Rng {
    pub fn new(seed: u64, stream: u64) -> Rng {
        let mut rng = Rng {
            state: 0,
            inc: (stream << 1) | 1,
        };
        rng.step();
        rng.state = rng.state.wrapping_add(seed);
        rng.step();
        rng
    }

    // Derives a stream id from the coordinates a draw needs reproducibility
    // over, then seeds a fresh generator from it. Each (tile, sample, bounce)
    // triple therefore maps to its own PCG32 stream, and re-rendering with
    // the same master seed reproduces every draw.
    pub fn for_draw(master_seed: u64, tile_index: u64, sample_index: u64, bounce: u64) -> Rng {
        let mixed = pcg_hash(master_seed as u32)
            ^ (pcg_hash(tile_index as u32) as u64).rotate_left(16)
            ^ (pcg_hash(sample_index as u32) as u64).rotate_left(32)
            ^ (pcg_hash(bounce as u32) as u64).rotate_left(48);
        Rng::new(mixed, tile_index ^ sample_index.wrapping_mul(0x9E3779B97F4A7C15))
    }

    fn step(&mut self) {
        self.state = self
            .state
            .wrapping_mul(PCG_MULTIPLIER)
            .wrapping_add(self.inc);
    }
}

impl RngCore for Rng {
    fn next_u32(&mut self) -> u32 {
        let old_state = self.state;
        self.step();
        let xorshifted = (((old_state >> 18) ^ old_state) >> 27) as u32;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut i = 0;
        while i < dest.len() {
            let word = self.next_u32().to_le_bytes();
            let n = (dest.len() - i).min(4);
            dest[i..i + n].copy_from_slice(&word[..n]);
            i += n;
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747796405u32).wrapping_add(2891336453u32);
    let word = ((state >> ((state >> 28u32) + 4u32)) ^ state).wrapping_mul(277803737u32);
    (word >> 22u32) ^ word
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng as _;

    #[test]
    fn same_coordinates_reproduce_same_stream() {
        let mut a = Rng::for_draw(42, 3, 7, 0);
        let mut b = Rng::for_draw(42, 3, 7, 0);
        for _ in 0..32 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_tiles_diverge() {
        let mut a = Rng::for_draw(42, 3, 7, 0);
        let mut b = Rng::for_draw(42, 4, 7, 0);
        let seq_a: Vec<u32> = (0..8).map(|_| a.next_u32()).collect();
        let seq_b: Vec<u32> = (0..8).map(|_| b.next_u32()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn gen_range_stays_in_bounds() {
        let mut rng = Rng::for_draw(1, 0, 0, 0);
        for _ in 0..256 {
            let v: f64 = rng.gen_range(0.0, 1.0);
            assert!(v >= 0.0 && v < 1.0);
        }
    }
}
