use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

use ndarray::{arr0, Zip};

use crate::{
    error::{Error, Result},
    grad::{store, take_gradient, unevaluated, Function, Tensor},
};

pub fn mse<Input, Target>(input: &Input, target: &Target) -> MeanSquaredError<Input, Target>
where
    Input: Function,
    Target: Function,
{
    MeanSquaredError::new(input, target)
}

/// Half of the mean squared difference: `sum((input - target)^2) / 2n`.
/// The result is a 0-dimensional tensor, usable as the cost of a graph.
#[derive(Clone)]
pub struct MeanSquaredError<Input, Target>
where
    Input: Function,
    Target: Function,
{
    data: Rc<RefCell<Tensor>>,
    input: Input,
    target: Target,
    gradient: Rc<RefCell<Tensor>>,
}

impl<Input, Target> MeanSquaredError<Input, Target>
where
    Input: Function,
    Target: Function,
{
    pub fn new(input: &Input, target: &Target) -> Self {
        Self {
            data: Rc::new(RefCell::new(unevaluated())),
            input: input.clone(),
            target: target.clone(),
            gradient: Rc::new(RefCell::new(unevaluated())),
        }
    }
}

impl<Input, Target> Function for MeanSquaredError<Input, Target>
where
    Input: Function,
    Target: Function,
{
    fn data(&self) -> Ref<Tensor> {
        self.data.borrow()
    }

    fn gradient(&self) -> Ref<Tensor> {
        self.gradient.borrow()
    }

    fn gradient_mut(&self) -> RefMut<Tensor> {
        self.gradient.borrow_mut()
    }

    fn forward(&self) -> Result<()> {
        self.input.forward()?;
        self.target.forward()?;

        let loss = {
            let input = self.input.data();
            let target = self.target.data();
            if input.shape() != target.shape() {
                return Err(Error::IncompatibleShapes {
                    op: "mse",
                    lhs: input.shape().to_vec(),
                    rhs: target.shape().to_vec(),
                });
            }

            let squared_sum = Zip::from(&*input)
                .and(&*target)
                .fold(0.0, |sum, &input, &target| sum + (input - target).powi(2));
            squared_sum / input.len().max(1) as f32 / 2.0
        };
        store(&self.data, &self.gradient, arr0(loss).into_dyn());
        Ok(())
    }

    fn backward(&self) {
        let gradient = take_gradient(self);
        let upstream = gradient.iter().next().copied().unwrap_or(0.0);

        let input_grad = {
            let input = self.input.data();
            let scale = upstream / input.len().max(1) as f32;
            let input_grad = Zip::from(&*input)
                .and(&*self.target.data())
                .map_collect(|&input, &target| (input - target) * scale);
            input_grad
        };
        self.input.update_gradient(&input_grad);
        // Omit updating `self.target`'s gradient because there is no need to diffrentiate w.r.t
        // target data.

        self.input.backward();
        self.target.backward();
    }
}
