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
pub struct Sigmoid<I>
where
    I: Function,
{
    data: Rc<RefCell<Tensor>>,
    input: I,
    gradient: Rc<RefCell<Tensor>>,
}

pub fn sigmoid<I>(input: &I) -> Sigmoid<I>
where
    I: Function,
{
    Sigmoid {
        data: Rc::new(RefCell::new(unevaluated())),
        input: input.clone(),
        gradient: Rc::new(RefCell::new(unevaluated())),
    }
}

fn compute_sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl<I> Function for Sigmoid<I>
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
        let activated = self.input.data().mapv(compute_sigmoid);
        store(&self.data, &self.gradient, activated);
        Ok(())
    }

    fn backward(&self) {
        let gradient = take_gradient(self);
        // The forward output already holds s(x); s'(x) = s(x) * (1 - s(x)).
        let input_grad = Zip::from(&gradient)
            .and(&*self.data())
            .map_collect(|&grad, &s| grad * (s * (1.0 - s)));
        self.input.update_gradient(&input_grad);
        self.input.backward();
    }
}

#[cfg(test)]
mod tests {
    use crate::{assert_rel_eq_arr, grad::Variable};

    use super::*;

    use ndarray::arr2;

    #[test]
    fn compute_sigmoid() {
        let x = Variable::new(arr2(&[[-2.0, -1.0, 0.0, 1.0, 2.0]])).requires_grad();
        let y = sigmoid(&x);
        y.forward().unwrap();
        assert_rel_eq_arr!(
            arr2(&[[
                0.1192029220221175,
                0.2689414213699951,
                0.5000000000000000,
                0.7310585786300049,
                0.8807970779778823,
            ]])
            .into_dyn(),
            y.data().clone()
        );

        y.init_gradient();
        y.backward();
        assert_rel_eq_arr!(
            arr2(&[[
                0.1049935854035065,
                0.1966119332414819,
                0.2500000000000000,
                0.1966119332414819,
                0.1049935854035066,
            ]])
            .into_dyn(),
            x.gradient().clone()
        );
    }
}
