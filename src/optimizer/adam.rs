use log::{debug, trace};
use ndarray::Zip;

use crate::{
    error::Result,
    grad::Tensor,
    optimizer::{Slots, UpdateRule},
    params::{Gradients, ParamSet},
};

/// Base step size, scaled by the bias correction of each step.
pub const LEARNING_RATE: f32 = 0.0002;
/// Weight of the newest gradient in the first moment.
pub const B1: f32 = 0.1;
/// Weight of the newest squared gradient in the second moment.
pub const B2: f32 = 0.001;
pub const EPSILON: f32 = 1e-8;

/// Accumulators Adam keeps for one parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct AdamState {
    pub gradient: Tensor,
    pub first_moment: Tensor,
    pub second_moment: Tensor,
}

impl AdamState {
    fn zeros_like(parameter: &Tensor) -> Self {
        Self {
            gradient: Tensor::zeros(parameter.raw_dim()),
            first_moment: Tensor::zeros(parameter.raw_dim()),
            second_moment: Tensor::zeros(parameter.raw_dim()),
        }
    }

    fn update(&mut self, parameter: &mut Tensor, step_size: f32) {
        Zip::from(parameter)
            .and(&self.gradient)
            .and(&mut self.first_moment)
            .and(&mut self.second_moment)
            .for_each(|p, &g, m, v| {
                *m = B1 * g + (1.0 - B1) * *m;
                *v = B2 * g * g + (1.0 - B2) * *v;
                let direction = *m / (v.sqrt() + EPSILON);
                *p -= step_size * direction;
            });
    }
}

/// Adam with the moment decay rates written as the weight of the newest sample
/// (`B1 = 0.1` is `1 - beta1` for the usual `beta1 = 0.9`).
/// The step size is fixed; the learning rate passed to `apply` is ignored.
pub struct Adam {
    slots: Slots<AdamState>,
    step: u32,
}

impl Adam {
    pub fn new(params: &ParamSet) -> Self {
        let slots = Slots::new(params, AdamState::zeros_like);
        debug!("adam over {} parameters", slots.len());
        Self { slots, step: 0 }
    }

    /// Number of `apply` calls so far.
    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn state(&self, name: &str) -> Option<&AdamState> {
        self.slots.get(name)
    }

    /// `(1 - B1^step, 1 - B2^step)`.
    pub fn bias_correction(step: u32) -> (f32, f32) {
        let exponent = i32::try_from(step).unwrap_or(i32::MAX);
        (1.0 - B1.powi(exponent), 1.0 - B2.powi(exponent))
    }

    /// Bias-corrected step size used by the `step`-th apply, counting from one.
    pub fn step_size(step: u32) -> f32 {
        let (fix1, fix2) = Self::bias_correction(step);
        LEARNING_RATE * fix2.sqrt() / fix1
    }
}

impl UpdateRule for Adam {
    fn accumulate(&mut self, gradients: &Gradients) -> Result<()> {
        self.slots
            .accumulate(gradients, |state, gradient| state.gradient.assign(gradient))
    }

    fn apply(&mut self, _learning_rate: f32) -> Result<()> {
        let step = self.step.saturating_add(1);
        let step_size = Self::step_size(step);
        trace!("adam step {} with step size {}", step, step_size);

        self.slots
            .apply(|parameter, state| state.update(parameter, step_size))?;
        self.step = step;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::grad::{Function, Variable};

    use super::*;

    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn first_bias_correction() {
        let (fix1, fix2) = Adam::bias_correction(1);
        assert_eq!(1.0 - 0.1f32, fix1);
        assert_eq!(1.0 - 0.001f32, fix2);
        assert_relative_eq!(0.9, fix1, max_relative = 1e-6);
        assert_relative_eq!(0.999, fix2, max_relative = 1e-6);
    }

    #[test]
    fn step_size_converges() {
        let first = Adam::step_size(1);
        assert_relative_eq!(
            LEARNING_RATE * 0.999f32.sqrt() / 0.9,
            first,
            max_relative = 1e-6
        );

        let mut previous = (first - LEARNING_RATE).abs();
        for step in [2, 10, 100, 1000, 100_000] {
            let distance = (Adam::step_size(step) - LEARNING_RATE).abs();
            assert!(distance <= previous);
            previous = distance;
        }
        assert_relative_eq!(LEARNING_RATE, Adam::step_size(u32::MAX));
    }

    #[test]
    fn apply_counts_steps() {
        let p = Variable::new(arr1(&[1.0, -1.0])).requires_grad();
        let params = ParamSet::new().with("p", p.clone()).unwrap();
        let mut rule = Adam::new(&params);
        let gradients = [("p".to_string(), arr1(&[0.5, -0.5]).into_dyn())]
            .into_iter()
            .collect();

        rule.accumulate(&gradients).unwrap();
        assert_eq!(0, rule.step());
        rule.apply(123.0).unwrap();
        assert_eq!(1, rule.step());

        // m = 0.1 g, v = 0.001 g^2, so the direction is ~ sign(g) * 0.1 / sqrt(0.001)
        let state = rule.state("p").unwrap();
        assert_relative_eq!(0.05, state.first_moment[[0]], max_relative = 1e-6);
        assert_relative_eq!(0.00025, state.second_moment[[0]], max_relative = 1e-6);
        let moved = Adam::step_size(1) * 0.05 / (0.00025f32.sqrt() + EPSILON);
        assert_relative_eq!(1.0 - moved, p.data()[[0]], max_relative = 1e-6);
        assert_relative_eq!(-1.0 + moved, p.data()[[1]], max_relative = 1e-6);

        rule.apply(0.0).unwrap();
        assert_eq!(2, rule.step());
    }
}
