//! PCG32 stream per pixel and sample batch.

const PCG_MULT: u64 = 6364136223846793005;
const PCG_INIT: u64 = 0x853c49e6748fea9b;

pub(crate) struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    /// One independent stream per pixel, seeded with the index of the first sample traced.
    pub(crate) fn new(stream: u64, seed: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: (stream << 1) | 1,
        };
        rng.next_u32();
        rng.state = rng.state.wrapping_add(PCG_INIT.wrapping_add(seed));
        rng.next_u32();
        rng
    }

    pub(crate) fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.state = old.wrapping_mul(PCG_MULT).wrapping_add(self.inc);
        let xorshifted = (((old >> 18) ^ old) >> 27) as u32;
        let rot = (old >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    /// Uniform in `[0, 1)`.
    pub(crate) fn next_f32(&mut self) -> f32 {
        let bits = (self.next_u32() >> 9) | 0x3f80_0000;
        f32::from_bits(bits) - 1.0
    }
}
