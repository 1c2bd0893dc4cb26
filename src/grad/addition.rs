use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

use ndarray::{IxDyn, Zip};

use crate::{
    error::{Error, Result},
    grad::{broadcast_shape, reduce, store, take_gradient, unevaluated, Function, Tensor},
};

pub fn add<Lhs, Rhs>(lhs: &Lhs, rhs: &Rhs) -> Addition<Lhs, Rhs>
where
    Lhs: Function,
    Rhs: Function,
{
    Addition::new(lhs, rhs)
}

/// Element-wise sum. Operands are broadcast against each other.
#[derive(Clone)]
pub struct Addition<Lhs, Rhs>
where
    Lhs: Function,
    Rhs: Function,
{
    data: Rc<RefCell<Tensor>>,
    lhs: Lhs,
    rhs: Rhs,
    gradient: Rc<RefCell<Tensor>>,
}

impl<Lhs, Rhs> Addition<Lhs, Rhs>
where
    Lhs: Function,
    Rhs: Function,
{
    pub fn new(lhs: &Lhs, rhs: &Rhs) -> Self {
        Self {
            data: Rc::new(RefCell::new(unevaluated())),
            lhs: lhs.clone(),
            rhs: rhs.clone(),
            gradient: Rc::new(RefCell::new(unevaluated())),
        }
    }
}

impl<Lhs, Rhs> Function for Addition<Lhs, Rhs>
where
    Lhs: Function,
    Rhs: Function,
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
        self.lhs.forward()?;
        self.rhs.forward()?;

        let sum = {
            let lhs = self.lhs.data();
            let rhs = self.rhs.data();
            let shape = broadcast_shape(lhs.shape(), rhs.shape()).ok_or_else(|| {
                Error::IncompatibleShapes {
                    op: "add",
                    lhs: lhs.shape().to_vec(),
                    rhs: rhs.shape().to_vec(),
                }
            })?;

            let mut sum = Tensor::zeros(IxDyn(&shape));
            Zip::from(&mut sum)
                .and_broadcast(&*lhs)
                .and_broadcast(&*rhs)
                .for_each(|sum, &l, &r| *sum = l + r);
            sum
        };
        store(&self.data, &self.gradient, sum);
        Ok(())
    }

    fn backward(&self) {
        let gradient = take_gradient(self);

        let lhs_grad = reduce(&gradient, self.lhs.data().shape());
        self.lhs.update_gradient(&lhs_grad);
        let rhs_grad = reduce(&gradient, self.rhs.data().shape());
        self.rhs.update_gradient(&rhs_grad);

        self.lhs.backward();
        self.rhs.backward();
    }
}
