// Finite-field Diffie-Hellman over arbitrary-precision integers.
//
// Sizes are taken as given: small primes are a valid configuration for
// demonstration runs and are never rounded up.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};

use crate::error::{Result, TriDhError};

/// Generator fixed for every parameter set.
pub const GENERATOR: u32 = 2;

/// Primes used for trial division and as deterministic Miller-Rabin bases.
/// The 13 bases make the test exact for n < 3.3 * 10^24.
const SMALL_PRIMES: [u32; 13] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41];

/// Extra random Miller-Rabin rounds for candidates above the deterministic bound.
const RANDOM_ROUNDS: usize = 16;

/// Bit length above which the deterministic bases no longer suffice.
const DETERMINISTIC_BITS: u64 = 81;

/// Generate DH parameters: a prime `p` of exactly `bits` bits and `g = 2`.
pub fn generate_parameters<R: RngCore + CryptoRng>(
    bits: u64,
    rng: &mut R,
) -> Result<(BigUint, BigUint)> {
    if bits < 2 {
        return Err(TriDhError::InvalidArgument(format!(
            "no prime has exactly {bits} bit(s)"
        )));
    }
    loop {
        let mut candidate = random_bits(bits, rng);
        candidate.set_bit(bits - 1, true);
        if bits > 2 {
            candidate.set_bit(0, true);
        }
        if is_probable_prime(&candidate, rng) {
            return Ok((candidate, BigUint::from(GENERATOR)));
        }
    }
}

/// Generate a key pair under `(p, g)`: a private key drawn from `bits` bits of
/// entropy and `public = g^private mod p`.
pub fn generate_key_pair<R: RngCore + CryptoRng>(
    p: &BigUint,
    g: &BigUint,
    bits: u64,
    rng: &mut R,
) -> Result<(BigUint, BigUint)> {
    if bits == 0 {
        return Err(TriDhError::InvalidArgument(
            "key size must be at least one bit".into(),
        ));
    }
    check_modulus(p)?;
    let private_key = random_bits(bits, rng);
    let public_key = g.modpow(&private_key, p);
    Ok((private_key, public_key))
}

/// Compute `their_public^my_private mod p`.
pub fn compute_shared_value(
    my_private: &BigUint,
    their_public: &BigUint,
    p: &BigUint,
) -> Result<BigUint> {
    check_modulus(p)?;
    Ok(their_public.modpow(my_private, p))
}

/// Probabilistic primality test: trial division by small primes, then
/// Miller-Rabin with the small primes as bases, plus random bases for
/// candidates too large for those bases to be conclusive.
pub fn is_probable_prime<R: RngCore + CryptoRng>(n: &BigUint, rng: &mut R) -> bool {
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    for &sp in SMALL_PRIMES.iter() {
        let sp = BigUint::from(sp);
        if n == &sp {
            return true;
        }
        if (n % &sp).is_zero() {
            return false;
        }
    }

    // n - 1 = d * 2^s with d odd
    let n_minus_one = n - 1u32;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    let witnessed = SMALL_PRIMES
        .iter()
        .all(|&b| miller_rabin_round(n, &n_minus_one, &d, s, &BigUint::from(b)));
    if !witnessed {
        return false;
    }
    if n.bits() < DETERMINISTIC_BITS {
        return true;
    }
    // Random bases in [2, n - 2].
    let span = n - 3u32;
    (0..RANDOM_ROUNDS).all(|_| {
        let a = random_bits(n.bits(), rng) % &span + &two;
        miller_rabin_round(n, &n_minus_one, &d, s, &a)
    })
}

fn miller_rabin_round(n: &BigUint, n_minus_one: &BigUint, d: &BigUint, s: u64, a: &BigUint) -> bool {
    let mut x = a.modpow(d, n);
    if x.is_one() || &x == n_minus_one {
        return true;
    }
    for _ in 1..s {
        x = x.modpow(&BigUint::from(2u32), n);
        if &x == n_minus_one {
            return true;
        }
    }
    false
}

/// Uniform integer in `[0, 2^bits)`.
fn random_bits<R: RngCore + CryptoRng>(bits: u64, rng: &mut R) -> BigUint {
    let byte_len = bits.div_ceil(8) as usize;
    let mut bytes = vec![0u8; byte_len];
    rng.fill_bytes(&mut bytes);
    let excess = (byte_len as u64 * 8 - bits) as u32;
    if excess > 0 {
        bytes[0] &= 0xFF >> excess;
    }
    BigUint::from_bytes_be(&bytes)
}

fn check_modulus(p: &BigUint) -> Result<()> {
    if p.is_zero() {
        return Err(TriDhError::InvalidArgument("modulus must be non-zero".into()));
    }
    Ok(())
}
