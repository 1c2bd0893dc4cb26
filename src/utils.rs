use ndarray::IxDyn;
use ndarray_rand::{
    rand::Rng,
    rand_distr::{Normal, Uniform},
    RandomExt,
};

use crate::grad::Tensor;

/// Tensor of `shape` drawn uniformly from `[low, high)`.
/// Panics if `low >= high`.
pub fn uniform(shape: &[usize], low: f32, high: f32) -> Tensor {
    Tensor::random(IxDyn(shape), Uniform::new(low, high))
}

pub fn uniform_using<R>(shape: &[usize], low: f32, high: f32, rng: &mut R) -> Tensor
where
    R: Rng,
{
    Tensor::random_using(IxDyn(shape), Uniform::new(low, high), rng)
}

/// Zero-mean Gaussian noise with standard deviation `std`, the sample drawn for
/// each batch when training with weight noise.
pub fn gaussian_noise(shape: &[usize], std: f32) -> Tensor {
    gaussian_noise_using(shape, std, &mut ndarray_rand::rand::thread_rng())
}

pub fn gaussian_noise_using<R>(shape: &[usize], std: f32, rng: &mut R) -> Tensor
where
    R: Rng,
{
    match Normal::new(0.0, std.abs()) {
        Ok(normal) => Tensor::random_using(IxDyn(shape), normal, rng),
        Err(_) => Tensor::zeros(IxDyn(shape)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray_rand::rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn uniform_within_bounds() {
        let tensor = uniform(&[3, 4], -0.5, 0.5);
        assert_eq!(&[3, 4], tensor.shape());
        assert!(tensor.iter().all(|&v| (-0.5..0.5).contains(&v)));
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let first = gaussian_noise_using(&[2, 3], 1.0, &mut StdRng::seed_from_u64(42));
        let second = gaussian_noise_using(&[2, 3], 1.0, &mut StdRng::seed_from_u64(42));
        assert_eq!(first, second);

        let other = uniform_using(&[2, 3], 0.0, 1.0, &mut StdRng::seed_from_u64(7));
        assert_eq!(other, uniform_using(&[2, 3], 0.0, 1.0, &mut StdRng::seed_from_u64(7)));
    }

    #[test]
    fn noise_scale() {
        let noise = gaussian_noise_using(&[10_000], 0.1, &mut StdRng::seed_from_u64(0));
        let mean = noise.mean().unwrap();
        let std = noise.std(0.0);
        assert!(mean.abs() < 0.01);
        assert!((std - 0.1).abs() < 0.01);

        assert!(gaussian_noise(&[4], 0.0).iter().all(|&v| v == 0.0));
    }
}
