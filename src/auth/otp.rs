//! Time-based one-time passcodes.
//!
//! HMAC-SHA256 over a random 160-bit secret, 6 digits, 30-second step.
//! Verification tolerates one step of clock drift either way and uses a
//! constant-time comparison. Both ends of the exchange are this
//! service, so there is no need to interoperate with RFC 6238 SHA-1
//! authenticator apps.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const STEP_SECS: u64 = 30;
const DIGITS: u32 = 6;
const DRIFT_STEPS: i64 = 1;

/// Generate a fresh hex-encoded 160-bit OTP secret.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Code for the current time step.
pub fn generate_otp(secret: &str) -> String {
    hotp(secret, current_step())
}

/// Check a submitted code against the secret, allowing ±1 step of drift.
pub fn verify_otp(secret: &str, otp: &str) -> bool {
    let now = current_step() as i64;
    for drift in -DRIFT_STEPS..=DRIFT_STEPS {
        let step = now + drift;
        if step < 0 {
            continue;
        }
        let expected = hotp(secret, step as u64);
        if expected.as_bytes().ct_eq(otp.as_bytes()).into() {
            return true;
        }
    }
    false
}

fn current_step() -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now / STEP_SECS
}

/// HOTP with dynamic truncation (RFC 4226 §5.3), HMAC-SHA256 variant.
fn hotp(secret: &str, counter: u64) -> String {
    // Hex decode failure only happens for hand-crafted secrets; fall
    // back to the raw bytes so verification still behaves total.
    let key = hex::decode(secret).unwrap_or_else(|_| secret.as_bytes().to_vec());

    let mut mac = HmacSha256::new_from_slice(&key).expect("HMAC accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((u32::from(digest[offset]) & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    format!("{:0width$}", binary % 10u32.pow(DIGITS), width = DIGITS as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_hex_and_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), 40);
        assert!(hex::decode(&a).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn hotp_is_deterministic_and_six_digits() {
        let secret = "000102030405060708090a0b0c0d0e0f10111213";
        let code = hotp(secret, 42);
        assert_eq!(code, hotp(secret, 42));
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn different_counters_differ() {
        let secret = generate_secret();
        // Not guaranteed in theory, vanishingly unlikely to collide.
        assert_ne!(hotp(&secret, 1), hotp(&secret, 2));
    }

    #[test]
    fn current_code_verifies() {
        let secret = generate_secret();
        let code = generate_otp(&secret);
        assert!(verify_otp(&secret, &code));
    }

    #[test]
    fn drift_of_one_step_verifies() {
        let secret = generate_secret();
        let previous = hotp(&secret, current_step() - 1);
        assert!(verify_otp(&secret, &previous));
    }

    #[test]
    fn wrong_code_and_wrong_secret_fail() {
        let secret = generate_secret();
        assert!(!verify_otp(&secret, "000000"));
        let code = generate_otp(&secret);
        assert!(!verify_otp(&generate_secret(), &code));
    }
}
