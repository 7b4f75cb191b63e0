// <threefry.rs>
use rand_core::le;

pub type Array2x64 = [u64; 2];

#[derive(Clone)]
pub struct ThreeFry2x64 {
    ctr: Array2x64,
    key: Array2x64,
}

impl ThreeFry2x64 {
    pub fn next(&mut self) -> Array2x64 {
        let mut results = [0u64; 2];
        threefry_2x64(self.ctr, self.key, &mut results);
        self.ctr[0] = self.ctr[0].wrapping_add(1);
        if self.ctr[0] == 0 {
            self.ctr[1] = self.ctr[1].wrapping_add(1);
        }
        results
    }

    pub fn from_seed(seed: [u8; 16]) -> Self {
        let mut key = [0u64; 2];
        le::read_u64_into(&seed, &mut key);
        Self { ctr: [0,0], key: key }
    }
}

const SKEIN_HI: u64 = 0x1BD11BDA;
const SKEIN_LO: u64 = 0xA9FC1A22;
const SKEIN_PARITY: u64 = SKEIN_LO + (SKEIN_HI << 32);

const R_64X2_0_0: u32 = 16;
const R_64X2_1_0: u32 = 42;
const R_64X2_2_0: u32 = 12;
const R_64X2_3_0: u32 = 31;
const R_64X2_4_0: u32 = 16;
const R_64X2_5_0: u32 = 32;
const R_64X2_6_0: u32 = 24;
const R_64X2_7_0: u32 = 21;

macro_rules! round1 {
    ($x: expr) => {{
        $x[0]=$x[0].wrapping_add($x[1]); $x[1]=$x[1].rotate_left(R_64X2_0_0); $x[1]^=$x[0];
        $x[0]=$x[0].wrapping_add($x[1]); $x[1]=$x[1].rotate_left(R_64X2_1_0); $x[1]^=$x[0];
        $x[0]=$x[0].wrapping_add($x[1]); $x[1]=$x[1].rotate_left(R_64X2_2_0); $x[1]^=$x[0];
        $x[0]=$x[0].wrapping_add($x[1]); $x[1]=$x[1].rotate_left(R_64X2_3_0); $x[1]^=$x[0];
    }}
}

macro_rules! round2 {
    ($x: expr) => {{
        $x[0]=$x[0].wrapping_add($x[1]); $x[1]=$x[1].rotate_left(R_64X2_4_0); $x[1]^=$x[0];
        $x[0]=$x[0].wrapping_add($x[1]); $x[1]=$x[1].rotate_left(R_64X2_5_0); $x[1]^=$x[0];
        $x[0]=$x[0].wrapping_add($x[1]); $x[1]=$x[1].rotate_left(R_64X2_6_0); $x[1]^=$x[0];
        $x[0]=$x[0].wrapping_add($x[1]); $x[1]=$x[1].rotate_left(R_64X2_7_0); $x[1]^=$x[0];
    }}
}

macro_rules! sbox {
    ($x: expr, $ks: expr, $k: expr) => {{
        $x[0]=$x[0].wrapping_add($ks[($k+0)%3]);
        $x[1]=$x[1].wrapping_add($ks[($k+1)%3]);
        $x[1]=$x[1].wrapping_add($k);
    }}
}

pub fn threefry_2x64(ctr: Array2x64, key: Array2x64, x: &mut Array2x64) {
    let mut ks: [u64; 3] = [0, 0, SKEIN_PARITY];
    for i in 0..2 {
        ks[i] = key[i];
        x[i] = ctr[i];
        ks[2] ^= key[i];
    }

    sbox!(x, ks, 0);

    round1!(x);
    sbox!(x, ks, 1);

    round2!(x);
    sbox!(x, ks, 2);

    round1!(x);
    sbox!(x, ks, 3);

    round2!(x);
    sbox!(x, ks, 4);

    round1!(x);
    sbox!(x, ks, 5);
}


// <threefry.rs>
