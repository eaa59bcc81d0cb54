//! Dune-like elevation field.

const X_FREQUENCY: f32 = 0.3;
const X_AMPLITUDE: f32 = 1.5;
const Z_FREQUENCY: f32 = 0.2;
const Z_AMPLITUDE: f32 = 1.2;
const BASE_ELEVATION: f32 = 1.0;

/// Lowest value `height` can return.
pub const MIN_HEIGHT: f32 = BASE_ELEVATION - X_AMPLITUDE - Z_AMPLITUDE;
/// Highest value `height` can return.
pub const MAX_HEIGHT: f32 = BASE_ELEVATION + X_AMPLITUDE + Z_AMPLITUDE;

/// Terrain elevation at planar coordinates `(x, z)`.
pub fn height(x: f32, z: f32) -> f32 {
    (x * X_FREQUENCY).sin() * X_AMPLITUDE + (z * Z_FREQUENCY).cos() * Z_AMPLITUDE + BASE_ELEVATION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WORLD_HALF_EXTENT;

    #[test]
    fn test_height_at_origin() {
        assert_eq!(height(0.0, 0.0), Z_AMPLITUDE + BASE_ELEVATION);
    }

    #[test]
    fn test_height_is_deterministic() {
        let samples = [(0.0, 0.0), (12.5, -3.25), (-199.0, 199.0), (57.1, 88.8)];
        for (x, z) in samples {
            let first = height(x, z);
            for _ in 0..10 {
                assert_eq!(height(x, z).to_bits(), first.to_bits());
            }
        }
    }

    #[test]
    fn test_height_is_bounded_over_world() {
        let mut x = -WORLD_HALF_EXTENT;
        while x <= WORLD_HALF_EXTENT {
            let mut z = -WORLD_HALF_EXTENT;
            while z <= WORLD_HALF_EXTENT {
                let y = height(x, z);
                assert!(y.is_finite());
                assert!(y >= MIN_HEIGHT - 1e-4 && y <= MAX_HEIGHT + 1e-4);
                z += 7.3;
            }
            x += 7.3;
        }
    }
}
