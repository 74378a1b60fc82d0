//! Search domain: the square region containing the stationary target.

use nalgebra::Vector2;
use rand::Rng;

/// Square search area `[0, length] x [0, length]` with a fixed target.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchDomain {
    length: f64,
    target: Vector2<f64>,
}

impl SearchDomain {
    /// Domain with the target drawn uniformly over `[0, length) x [0, length)`.
    pub fn new<R: Rng + ?Sized>(length: f64, rng: &mut R) -> Self {
        assert!(
            length > 0.0 && length.is_finite(),
            "Domain length must be positive and finite"
        );
        let target = Vector2::new(rng.random_range(0.0..length), rng.random_range(0.0..length));
        SearchDomain { length, target }
    }

    /// Domain with a known target position.
    pub fn with_target(length: f64, target: Vector2<f64>) -> Self {
        assert!(
            length > 0.0 && length.is_finite(),
            "Domain length must be positive and finite"
        );
        assert!(
            (0.0..=length).contains(&target.x) && (0.0..=length).contains(&target.y),
            "Target must lie inside the domain"
        );
        SearchDomain { length, target }
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn target_position(&self) -> Vector2<f64> {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_target_inside_domain() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let domain = SearchDomain::new(100.0, &mut rng);
            let target = domain.target_position();
            assert!((0.0..100.0).contains(&target.x));
            assert!((0.0..100.0).contains(&target.y));
        }
    }

    #[test]
    #[should_panic(expected = "Target must lie inside the domain")]
    fn test_target_outside_domain() {
        let _domain = SearchDomain::with_target(10.0, Vector2::new(11.0, 5.0));
    }
}
