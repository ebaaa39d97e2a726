//! SubAgent identity helpers: the `<name>-<monotonic-nanos>` id scheme, and
//! purpose-hash naming as a default `name` source for ad hoc spawns that
//! don't supply one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static NANOS_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Wall-clock nanoseconds since the epoch, bumped forward by an atomic
/// counter so repeated calls within the same tick still produce distinct,
/// monotonically increasing values.
fn next_monotonic_nanos() -> u64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64;
    loop {
        let prev = NANOS_COUNTER.load(Ordering::SeqCst);
        let next = now.max(prev + 1);
        if NANOS_COUNTER.compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            return next;
        }
    }
}

/// `<name>-<monotonic-nanos>`.
pub fn make_id(name: &str) -> String {
    format!("{name}-{}", next_monotonic_nanos())
}

/// Human-readable prefix (first few meaningful words of `purpose`, kebab
/// case, truncated to 20 chars) plus a 5-hex-char uniqueness suffix.
pub fn purpose_hash_name(purpose: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let words: Vec<&str> = purpose.split_whitespace().filter(|w| w.len() > 1).take(4).collect();

    let prefix = if words.is_empty() {
        "agent".to_string()
    } else {
        words
            .iter()
            .map(|w| w.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect::<String>())
            .collect::<Vec<_>>()
            .join("-")
    };
    let prefix = if prefix.len() > 20 { prefix[..20].to_string() } else { prefix };

    let mut hasher = DefaultHasher::new();
    purpose.hash(&mut hasher);
    next_monotonic_nanos().hash(&mut hasher);
    let hash = hasher.finish();
    let suffix = format!("{:05x}", hash & 0xFFFFF);

    format!("{prefix}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_id_is_prefixed_and_unique() {
        let a = make_id("coder");
        let b = make_id("coder");
        assert!(a.starts_with("coder-"));
        assert_ne!(a, b);
    }

    #[test]
    fn purpose_hash_name_has_hex_suffix() {
        let name = purpose_hash_name("Fix the slider CSS bug");
        let parts: Vec<&str> = name.rsplitn(2, '-').collect();
        assert_eq!(parts[0].len(), 5);
        assert!(parts[0].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn purpose_hash_name_truncates_long_prefixes() {
        let name = purpose_hash_name("this is a very long purpose string that goes on and on");
        let parts: Vec<&str> = name.rsplitn(2, '-').collect();
        assert!(parts[1].len() <= 20);
    }
}
