//! Claim reference numbers: `REF` + `YYMMDD` + two letters + four digits.
//!
//! These are proposals only. Uniqueness is the backend's job, and the value
//! kept is whatever the confirmed item carries.

use chrono::{DateTime, Utc};
use rand::Rng;

pub const PREFIX: &str = "REF";
const LEN: usize = PREFIX.len() + 6 + 2 + 4;

pub fn generate(now: DateTime<Utc>) -> String {
    generate_with(&mut rand::thread_rng(), now)
}

pub fn generate_with<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> String {
    let letters: String = (0..2).map(|_| char::from(rng.gen_range(b'A'..=b'Z'))).collect();
    let digits: u16 = rng.gen_range(0..10_000);
    format!("{PREFIX}{}{letters}{digits:04}", now.format("%y%m%d"))
}

pub fn is_reference_number(s: &str) -> bool {
    let Some(rest) = s.strip_prefix(PREFIX) else {
        return false;
    };
    let b = rest.as_bytes();
    s.len() == LEN
        && b[..6].iter().all(u8::is_ascii_digit)
        && b[6..8].iter().all(u8::is_ascii_uppercase)
        && b[8..].iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn generated_numbers_match_format() {
        let now = Utc.with_ymd_and_hms(2025, 10, 19, 9, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let r = generate_with(&mut rng, now);
            assert!(r.starts_with("REF251019"), "{r}");
            assert!(is_reference_number(&r), "{r}");
        }
        assert!(is_reference_number(&generate(now)));
    }

    #[test]
    fn format_check_rejects_near_misses() {
        assert!(is_reference_number("REF251019QK0427"));
        assert!(!is_reference_number("REF251019qk0427"));
        assert!(!is_reference_number("REF251019QK042"));
        assert!(!is_reference_number("CLM251019QK0427"));
        assert!(!is_reference_number("REF25101AQK0427"));
        assert!(!is_reference_number(""));
    }
}
