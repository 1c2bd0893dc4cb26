use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

use ndarray::Zip;

use crate::{
    error::{Error, Result},
    grad::{store, take_gradient, unevaluated, Function, Tensor},
};

pub fn mul<Lhs, Rhs>(lhs: &Lhs, rhs: &Rhs) -> Multiplication<Lhs, Rhs>
where
    Lhs: Function,
    Rhs: Function,
{
    Multiplication::new(lhs, rhs)
}

/// Element-wise product of two tensors of the same shape.
#[derive(Clone)]
pub struct Multiplication<Lhs, Rhs>
where
    Lhs: Function,
    Rhs: Function,
{
    data: Rc<RefCell<Tensor>>,
    lhs: Lhs,
    rhs: Rhs,
    gradient: Rc<RefCell<Tensor>>,
}

impl<Lhs, Rhs> Multiplication<Lhs, Rhs>
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

impl<Lhs, Rhs> Function for Multiplication<Lhs, Rhs>
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

        let product = {
            let lhs = self.lhs.data();
            let rhs = self.rhs.data();
            if lhs.shape() != rhs.shape() {
                return Err(Error::IncompatibleShapes {
                    op: "mul",
                    lhs: lhs.shape().to_vec(),
                    rhs: rhs.shape().to_vec(),
                });
            }
            let product = Zip::from(&*lhs).and(&*rhs).map_collect(|&l, &r| l * r);
            product
        };
        store(&self.data, &self.gradient, product);
        Ok(())
    }

    fn backward(&self) {
        let gradient = take_gradient(self);

        let lhs_grad = Zip::from(&gradient)
            .and(&*self.rhs.data())
            .map_collect(|&grad, &rhs| grad * rhs);
        self.lhs.update_gradient(&lhs_grad);

        let rhs_grad = Zip::from(&gradient)
            .and(&*self.lhs.data())
            .map_collect(|&grad, &lhs| grad * lhs);
        self.rhs.update_gradient(&rhs_grad);

        self.lhs.backward();
        self.rhs.backward();
    }
}
