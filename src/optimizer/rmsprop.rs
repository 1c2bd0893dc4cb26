use log::debug;
use ndarray::Zip;

use crate::{
    error::Result,
    grad::Tensor,
    optimizer::{Slots, UpdateRule},
    params::{Gradients, ParamSet},
};

const DECAY: f32 = 0.95;
const MOMENTUM: f32 = 0.9;
const STEP: f32 = 1e-4;

/// Accumulators RMSProp keeps for one parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct RmsPropState {
    pub gradient: Tensor,
    /// Running mean of gradients.
    pub mean_gradient: Tensor,
    /// Running mean of squared gradients.
    pub squared_gradient: Tensor,
    /// Previous update, carried over as momentum.
    pub direction: Tensor,
}

impl RmsPropState {
    fn zeros_like(parameter: &Tensor) -> Self {
        Self {
            gradient: Tensor::zeros(parameter.raw_dim()),
            mean_gradient: Tensor::zeros(parameter.raw_dim()),
            squared_gradient: Tensor::zeros(parameter.raw_dim()),
            direction: Tensor::zeros(parameter.raw_dim()),
        }
    }

    fn stash(&mut self, gradient: &Tensor) {
        self.gradient.assign(gradient);
        Zip::from(&mut self.mean_gradient)
            .and(&mut self.squared_gradient)
            .and(gradient)
            .for_each(|mean, squared, &g| {
                *mean = DECAY * *mean + 0.05 * g;
                *squared = DECAY * *squared + 0.05 * g * g;
            });
    }

    fn update(&mut self, parameter: &mut Tensor) {
        Zip::from(parameter)
            .and(&mut self.direction)
            .and(&self.gradient)
            .and(&self.mean_gradient)
            .and(&self.squared_gradient)
            .for_each(|p, direction, &g, &mean, &squared| {
                let scale = (squared - mean * mean + STEP).sqrt();
                *direction = MOMENTUM * *direction - STEP * g / scale;
                *p += *direction;
            });
    }
}

/// RMSProp with momentum (Graves, 2013). Step size and momentum are fixed;
/// the learning rate passed to `apply` is ignored.
pub struct RmsProp {
    slots: Slots<RmsPropState>,
}

impl RmsProp {
    pub fn new(params: &ParamSet) -> Self {
        let slots = Slots::new(params, RmsPropState::zeros_like);
        debug!("rmsprop over {} parameters", slots.len());
        Self { slots }
    }

    pub fn state(&self, name: &str) -> Option<&RmsPropState> {
        self.slots.get(name)
    }
}

impl UpdateRule for RmsProp {
    fn accumulate(&mut self, gradients: &Gradients) -> Result<()> {
        self.slots.accumulate(gradients, RmsPropState::stash)
    }

    fn apply(&mut self, _learning_rate: f32) -> Result<()> {
        self.slots.apply(|parameter, state| state.update(parameter))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        assert_rel_eq_arr,
        grad::{Function, Variable},
    };

    use super::*;

    use approx::assert_relative_eq;
    use ndarray::arr1;

    fn gradient(value: f32) -> Gradients {
        [("p".to_string(), arr1(&[value]).into_dyn())]
            .into_iter()
            .collect()
    }

    #[test]
    fn first_step() {
        let p = Variable::new(arr1(&[1.0])).requires_grad();
        let params = ParamSet::new().with("p", p.clone()).unwrap();
        let mut rule = RmsProp::new(&params);

        rule.accumulate(&gradient(2.0)).unwrap();
        let state = rule.state("p").unwrap();
        assert_relative_eq!(0.1, state.mean_gradient[[0]], max_relative = 1e-6);
        assert_relative_eq!(0.2, state.squared_gradient[[0]], max_relative = 1e-6);

        rule.apply(0.0).unwrap();
        // direction = -1e-4 * 2 / sqrt(0.2 - 0.01 + 1e-4)
        let expected = -2e-4 / (0.19f32 + 1e-4).sqrt();
        assert_relative_eq!(
            expected,
            rule.state("p").unwrap().direction[[0]],
            max_relative = 1e-5
        );
        assert_relative_eq!(1.0 + expected, p.data()[[0]], max_relative = 1e-6);
    }

    #[test]
    fn learning_rate_is_ignored() {
        let run = |learning_rate: f32| {
            let p = Variable::new(arr1(&[1.0, -1.0])).requires_grad();
            let params = ParamSet::new().with("p", p.clone()).unwrap();
            let mut rule = RmsProp::new(&params);
            let gradients = [("p".to_string(), arr1(&[0.5, -2.0]).into_dyn())]
                .into_iter()
                .collect();
            for _ in 0..5 {
                rule.accumulate(&gradients).unwrap();
                rule.apply(learning_rate).unwrap();
            }
            let data = p.data().clone();
            data
        };

        let small = run(1e-6);
        let large = run(10.0);
        assert_eq!(small, large);
        assert_rel_eq_arr!(small, run(0.0));
    }

    #[test]
    fn momentum_keeps_moving() {
        let p = Variable::new(arr1(&[0.0])).requires_grad();
        let params = ParamSet::new().with("p", p.clone()).unwrap();
        let mut rule = RmsProp::new(&params);

        rule.accumulate(&gradient(1.0)).unwrap();
        rule.apply(0.0).unwrap();
        let first = p.data()[[0]];
        rule.accumulate(&gradient(0.0)).unwrap();
        rule.apply(0.0).unwrap();
        let second = p.data()[[0]] - first;

        assert!(first < 0.0);
        assert_relative_eq!(MOMENTUM * first, second, max_relative = 1e-5);
    }
}
