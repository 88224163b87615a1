//! time-based one-time code validation (rfc 6238).
//!
//! validation reports *which* time-slot matched, because replay suppression
//! must be scoped to the exact slot that was accepted - codes are only six
//! digits and would collide cheaply across unrelated requests if the raw
//! code string were used.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::Error;

/// number of digits in a generated code.
const TOTP_DIGITS: u32 = 6;

/// byte length of generated shared secrets.
const TOTP_SECRET_LEN: usize = 20;

/// a successful totp validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotpMatch {
    /// the absolute time-step index that matched.
    pub slot: i64,

    /// drift from the current step, in steps.
    pub offset: i64,
}

/// generate a new random shared secret, hex-encoded.
pub fn generate_totp_secret() -> String {
    let bytes: [u8; TOTP_SECRET_LEN] = rand::random();
    hex::encode(bytes)
}

/// rfc 4226 hotp with dynamic truncation.
fn hotp(secret: &[u8], counter: u64) -> String {
    let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(secret)
        .expect("hmac accepts any key length");
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    format!("{:06}", binary % 10u32.pow(TOTP_DIGITS))
}

/// compute the code for an absolute time-step index.
///
/// exposed so provisioning tools and tests can derive expected codes.
pub fn totp_code_at_slot(secret_hex: &str, slot: i64) -> Result<String, Error> {
    let secret = hex::decode(secret_hex).map_err(|_| Error::InvalidTotpSecret)?;
    Ok(hotp(&secret, slot as u64))
}

/// validate a submitted code against a window of `±drift` steps around
/// `now_unix`.
///
/// returns the matched slot on success, `None` on failure. no partial
/// state is retained for failures.
pub fn verify_totp(
    secret_hex: &str,
    code: &str,
    now_unix: i64,
    step_secs: u64,
    drift: i64,
) -> Result<Option<TotpMatch>, Error> {
    let secret = hex::decode(secret_hex).map_err(|_| Error::InvalidTotpSecret)?;
    if code.len() != TOTP_DIGITS as usize {
        return Ok(None);
    }

    let current = now_unix.div_euclid(step_secs as i64);
    for offset in -drift..=drift {
        let slot = current + offset;
        if slot < 0 {
            continue;
        }
        let expected = hotp(&secret, slot as u64);
        if expected.as_bytes().ct_eq(code.as_bytes()).into() {
            return Ok(Some(TotpMatch { slot, offset }));
        }
    }
    Ok(None)
}
