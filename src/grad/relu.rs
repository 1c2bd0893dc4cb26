use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

use ndarray::Zip;

use crate::{
    error::Result,
    grad::{store, take_gradient, unevaluated, Function, Tensor},
};

#[derive(Clone)]
pub struct Relu<I>
where
    I: Function,
{
    data: Rc<RefCell<Tensor>>,
    input: I,
    gradient: Rc<RefCell<Tensor>>,
}

pub fn relu<I>(input: &I) -> Relu<I>
where
    I: Function,
{
    Relu {
        data: Rc::new(RefCell::new(unevaluated())),
        input: input.clone(),
        gradient: Rc::new(RefCell::new(unevaluated())),
    }
}

impl<I> Function for Relu<I>
where
    I: Function,
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
        let activated = self
            .input
            .data()
            .mapv(|input| if input >= 0.0 { input } else { 0.0 });
        store(&self.data, &self.gradient, activated);
        Ok(())
    }

    fn backward(&self) {
        let gradient = take_gradient(self);
        let input_grad = Zip::from(&gradient)
            .and(&*self.input.data())
            .map_collect(|&grad, &input| if input >= 0.0 { grad } else { 0.0 });
        self.input.update_gradient(&input_grad);
        self.input.backward();
    }
}
