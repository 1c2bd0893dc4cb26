use std::marker::PhantomData;

use log::debug;

use crate::{
    error::{Error, Result},
    grad::{Function, Tensor, Variable},
    params::{Gradients, ParamSet},
};

/// Result of evaluating a cost on one minibatch.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub cost: f32,
    pub gradients: Gradients,
}

/// A scalar cost which can be evaluated together with its gradients.
/// `Batch` is what the caller feeds for one step, e.g. the input tensors of a graph.
pub trait Objective {
    type Batch: ?Sized;

    fn evaluate(&self, batch: &Self::Batch) -> Result<Evaluation>;
}

/// Cost expressed as a computational graph over input slots and parameters.
pub struct GraphObjective<C>
where
    C: Function,
{
    inputs: Vec<Variable>,
    cost: C,
    params: ParamSet,
}

impl<C> GraphObjective<C>
where
    C: Function,
{
    /// `inputs` are the variables a batch is loaded into, in batch order.
    /// `params` are the parameters to differentiate the cost with respect to.
    pub fn new(inputs: Vec<Variable>, cost: C, params: ParamSet) -> Self {
        Self {
            inputs,
            cost,
            params,
        }
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }
}

impl<C> Objective for GraphObjective<C>
where
    C: Function,
{
    type Batch = [Tensor];

    fn evaluate(&self, batch: &[Tensor]) -> Result<Evaluation> {
        if batch.len() != self.inputs.len() {
            return Err(Error::InputCount {
                expected: self.inputs.len(),
                got: batch.len(),
            });
        }
        for (input, tensor) in self.inputs.iter().zip(batch) {
            input.set_data(tensor.clone());
        }

        self.params.zero_gradients();
        self.cost.forward()?;

        let cost = {
            let data = self.cost.data();
            if data.len() != 1 {
                return Err(Error::NonScalarCost(data.shape().to_vec()));
            }
            data.sum()
        };

        self.cost.init_gradient();
        self.cost.backward();
        debug!("evaluated cost {} on {} inputs", cost, batch.len());

        Ok(Evaluation {
            cost,
            gradients: Gradients::from_params(&self.params),
        })
    }
}

/// Cost whose gradients are computed by hand, e.g. closed-form derivatives.
pub struct FnObjective<F, B>
where
    B: ?Sized,
{
    function: F,
    _batch: PhantomData<fn(&B)>,
}

impl<F, B> FnObjective<F, B>
where
    F: Fn(&B) -> Result<Evaluation>,
    B: ?Sized,
{
    pub fn new(function: F) -> Self {
        Self {
            function,
            _batch: PhantomData,
        }
    }
}

impl<F, B> Objective for FnObjective<F, B>
where
    F: Fn(&B) -> Result<Evaluation>,
    B: ?Sized,
{
    type Batch = B;

    fn evaluate(&self, batch: &B) -> Result<Evaluation> {
        (self.function)(batch)
    }
}
