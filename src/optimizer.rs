mod adadelta;
mod adam;
mod gradient_descent;
mod rmsprop;
mod weight_noise;

use enum_dispatch::enum_dispatch;
use log::debug;

use crate::{
    error::{Error, Result},
    grad::{Function, Tensor, Variable},
    objective::Objective,
    params::{Gradients, ParamSet},
};

pub use adadelta::{AdaDelta, AdaDeltaState};
pub use adam::{Adam, AdamState};
pub use gradient_descent::GradientDescent;
pub use rmsprop::{RmsProp, RmsPropState};
pub use weight_noise::WeightNoise;

/// Trait to abstract update rules.
///
/// A rule owns accumulator tensors shaped like each parameter it was built for.
/// `accumulate` stashes the gradients of the latest evaluation into them and `apply`
/// consumes them to move the parameters. Calling `apply` twice without an
/// `accumulate` in between reuses the same gradients.
#[enum_dispatch]
pub trait UpdateRule {
    fn accumulate(&mut self, gradients: &Gradients) -> Result<()>;

    /// Variants whose step size is fixed accept and ignore `learning_rate`.
    fn apply(&mut self, learning_rate: f32) -> Result<()>;
}

/// Any of the single-group rules, chosen at runtime.
#[enum_dispatch(UpdateRule)]
pub enum Rule {
    GradientDescent,
    AdaDelta,
    RmsProp,
    Adam,
}

/// Drives the two phases of a training step: evaluate-and-accumulate, then apply.
pub struct Optimizer<O, R> {
    objective: O,
    rule: R,
}

impl<O, R> Optimizer<O, R>
where
    O: Objective,
    R: UpdateRule,
{
    pub fn new(objective: O, rule: R) -> Self {
        Self { objective, rule }
    }

    /// Evaluate the cost on `batch` and stash its gradients. Returns the cost.
    pub fn accumulate(&mut self, batch: &O::Batch) -> Result<f32> {
        let evaluation = self.objective.evaluate(batch)?;
        self.rule.accumulate(&evaluation.gradients)?;
        Ok(evaluation.cost)
    }

    /// Update the parameters in place from the stashed gradients.
    pub fn apply(&mut self, learning_rate: f32) -> Result<()> {
        self.rule.apply(learning_rate)
    }

    pub fn objective(&self) -> &O {
        &self.objective
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }
}

/// A parameter together with the tensors a rule keeps for it.
struct Slot<S> {
    name: String,
    shape: Vec<usize>,
    parameter: Variable,
    state: S,
}

/// Per-parameter state of a rule, in the iteration order of the parameter set.
/// Gradients are looked up by parameter name.
pub(crate) struct Slots<S> {
    slots: Vec<Slot<S>>,
}

impl<S> Slots<S> {
    pub(crate) fn new(params: &ParamSet, init: impl Fn(&Tensor) -> S) -> Self {
        let slots = params
            .iter()
            .map(|(name, parameter)| {
                let data = parameter.data();
                Slot {
                    name: name.to_string(),
                    shape: data.shape().to_vec(),
                    parameter: parameter.clone(),
                    state: init(&*data),
                }
            })
            .collect();
        Self { slots }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&S> {
        self.slots
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| &slot.state)
    }

    /// Find the gradient of every parameter, failing before any state is touched.
    pub(crate) fn pair<'g>(&self, gradients: &'g Gradients) -> Result<Vec<&'g Tensor>> {
        self.slots
            .iter()
            .map(|slot| {
                let gradient = gradients
                    .get(&slot.name)
                    .ok_or_else(|| Error::MissingGradient(slot.name.clone()))?;
                if gradient.shape() != slot.shape.as_slice() {
                    return Err(Error::ShapeMismatch {
                        name: slot.name.clone(),
                        expected: slot.shape.clone(),
                        got: gradient.shape().to_vec(),
                    });
                }
                Ok(gradient)
            })
            .collect()
    }

    /// Feed gradients returned by `pair` into the state of each slot.
    pub(crate) fn stash(&mut self, paired: Vec<&Tensor>, mut update: impl FnMut(&mut S, &Tensor)) {
        for (slot, gradient) in self.slots.iter_mut().zip(paired) {
            update(&mut slot.state, gradient);
        }
    }

    pub(crate) fn accumulate(
        &mut self,
        gradients: &Gradients,
        update: impl FnMut(&mut S, &Tensor),
    ) -> Result<()> {
        let paired = self.pair(gradients)?;
        if gradients.len() > paired.len() {
            let ignored = gradients
                .names()
                .filter(|name| self.get(name).is_none())
                .collect::<Vec<_>>();
            debug!("ignoring gradients of unknown parameters {:?}", ignored);
        }
        self.stash(paired, update);
        Ok(())
    }

    /// Update every parameter in place. Fails without touching anything if a
    /// parameter no longer has the shape its accumulators were built with.
    pub(crate) fn apply(&mut self, mut update: impl FnMut(&mut Tensor, &mut S)) -> Result<()> {
        for slot in &self.slots {
            let got = slot.parameter.shape();
            if got != slot.shape {
                return Err(Error::ShapeMismatch {
                    name: slot.name.clone(),
                    expected: slot.shape.clone(),
                    got,
                });
            }
        }

        for slot in &mut self.slots {
            let mut data = slot.parameter.data_mut();
            update(&mut *data, &mut slot.state);
        }
        Ok(())
    }
}
