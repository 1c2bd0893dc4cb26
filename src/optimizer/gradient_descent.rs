use log::debug;
use ndarray::Zip;

use crate::{
    error::Result,
    grad::Tensor,
    optimizer::{Slots, UpdateRule},
    params::{Gradients, ParamSet},
};

/// Plain stochastic gradient descent: `p <- p - lr * g`.
pub struct GradientDescent {
    slots: Slots<Tensor>,
}

impl GradientDescent {
    pub fn new(params: &ParamSet) -> Self {
        let slots = Slots::new(params, |parameter| Tensor::zeros(parameter.raw_dim()));
        debug!("sgd over {} parameters", slots.len());
        Self { slots }
    }

    /// Gradient stashed by the last `accumulate`.
    pub fn gradient(&self, name: &str) -> Option<&Tensor> {
        self.slots.get(name)
    }
}

impl UpdateRule for GradientDescent {
    fn accumulate(&mut self, gradients: &Gradients) -> Result<()> {
        self.slots
            .accumulate(gradients, |stashed, gradient| stashed.assign(gradient))
    }

    fn apply(&mut self, learning_rate: f32) -> Result<()> {
        self.slots.apply(|parameter, gradient| {
            Zip::from(parameter)
                .and(&*gradient)
                .for_each(|p, &g| *p -= learning_rate * g);
        })
    }
}
