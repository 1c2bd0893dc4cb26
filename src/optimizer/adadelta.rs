use log::debug;
use ndarray::Zip;

use crate::{
    error::Result,
    grad::Tensor,
    optimizer::{Slots, UpdateRule},
    params::{Gradients, ParamSet},
};

/// Accumulators AdaDelta keeps for one parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct AdaDeltaState {
    /// Gradient of the latest evaluation.
    pub gradient: Tensor,
    /// Running average of squared gradients.
    pub squared_gradient: Tensor,
    /// Running average of squared updates.
    pub squared_update: Tensor,
}

impl AdaDeltaState {
    fn zeros_like(parameter: &Tensor) -> Self {
        Self {
            gradient: Tensor::zeros(parameter.raw_dim()),
            squared_gradient: Tensor::zeros(parameter.raw_dim()),
            squared_update: Tensor::zeros(parameter.raw_dim()),
        }
    }

    fn stash(&mut self, gradient: &Tensor) {
        self.gradient.assign(gradient);
        Zip::from(&mut self.squared_gradient)
            .and(gradient)
            .for_each(|average, &g| *average = 0.95 * *average + 0.05 * g * g);
    }

    /// `epsilon` sits inside both square roots.
    fn update(&mut self, parameter: &mut Tensor, epsilon: f32) {
        Zip::from(parameter)
            .and(&self.gradient)
            .and(&self.squared_gradient)
            .and(&mut self.squared_update)
            .for_each(|p, &g, &squared_gradient, squared_update| {
                let update =
                    -(*squared_update + epsilon).sqrt() / (squared_gradient + epsilon).sqrt() * g;
                *squared_update = 0.95 * *squared_update + 0.05 * update * update;
                *p += update;
            });
    }
}

/// AdaDelta, with the learning rate passed to `apply` used as the epsilon of both
/// running averages rather than as a step size.
pub struct AdaDelta {
    slots: Slots<AdaDeltaState>,
}

impl AdaDelta {
    pub fn new(params: &ParamSet) -> Self {
        let slots = Slots::new(params, AdaDeltaState::zeros_like);
        debug!("adadelta over {} parameters", slots.len());
        Self { slots }
    }

    pub fn state(&self, name: &str) -> Option<&AdaDeltaState> {
        self.slots.get(name)
    }

    pub(crate) fn pair<'g>(&self, gradients: &'g Gradients) -> Result<Vec<&'g Tensor>> {
        self.slots.pair(gradients)
    }

    pub(crate) fn stash(&mut self, paired: Vec<&Tensor>) {
        self.slots.stash(paired, AdaDeltaState::stash);
    }
}

impl UpdateRule for AdaDelta {
    fn accumulate(&mut self, gradients: &Gradients) -> Result<()> {
        self.slots.accumulate(gradients, AdaDeltaState::stash)
    }

    fn apply(&mut self, learning_rate: f32) -> Result<()> {
        self.slots
            .apply(|parameter, state| state.update(parameter, learning_rate))
    }
}
