//! Correlation-ID generation.

use uuid::Uuid;

/// Produces a globally unique, opaque string per call.
///
/// Any `Fn() -> String` closure is an `IdGenerator`, which keeps tests
/// deterministic:
///
/// ```rust
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use waymark::Router;
///
/// let next = AtomicU64::new(0);
/// let router = Router::new()
///     .with_id_generator(move || format!("req-{}", next.fetch_add(1, Ordering::Relaxed)));
/// ```
pub trait IdGenerator: Send + Sync + 'static {
    fn generate(&self) -> String;
}

/// Default [`IdGenerator`]: random (v4) UUIDs, hyphenated lowercase.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync + 'static,
{
    fn generate(&self) -> String {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_are_distinct_and_well_formed() {
        let a = UuidGenerator.generate();
        let b = UuidGenerator.generate();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(Uuid::parse_str(&a).unwrap().get_version_num(), 4);
    }

    #[test]
    fn closures_are_generators() {
        let fixed = || "fixed".to_owned();
        assert_eq!(fixed.generate(), "fixed");
    }
}
