use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

use ndarray::{ArrayView2, Ix2};

use crate::{
    error::{Error, Result},
    grad::{store, take_gradient, unevaluated, Function, Tensor},
};

pub fn matmul<Lhs, Rhs>(lhs: &Lhs, rhs: &Rhs) -> MatrixMultiplication<Lhs, Rhs>
where
    Lhs: Function,
    Rhs: Function,
{
    MatrixMultiplication::new(lhs, rhs)
}

fn as_matrix(tensor: &Tensor) -> Option<ArrayView2<f32>> {
    tensor.view().into_dimensionality::<Ix2>().ok()
}

/// Product of two 2D tensors: (n, k) x (k, m) -> (n, m).
#[derive(Clone)]
pub struct MatrixMultiplication<Lhs, Rhs>
where
    Lhs: Function,
    Rhs: Function,
{
    data: Rc<RefCell<Tensor>>,
    lhs: Lhs,
    rhs: Rhs,
    gradient: Rc<RefCell<Tensor>>,
}

impl<Lhs, Rhs> MatrixMultiplication<Lhs, Rhs>
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

impl<Lhs, Rhs> Function for MatrixMultiplication<Lhs, Rhs>
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
            let product = match (as_matrix(&lhs), as_matrix(&rhs)) {
                (Some(l), Some(r)) if l.ncols() == r.nrows() => l.dot(&r).into_dyn(),
                _ => {
                    return Err(Error::IncompatibleShapes {
                        op: "matmul",
                        lhs: lhs.shape().to_vec(),
                        rhs: rhs.shape().to_vec(),
                    })
                }
            };
            product
        };
        store(&self.data, &self.gradient, product);
        Ok(())
    }

    fn backward(&self) {
        let gradient = take_gradient(self);

        let (lhs_grad, rhs_grad) = {
            let lhs = self.lhs.data();
            let rhs = self.rhs.data();
            let (Some(g), Some(l), Some(r)) = (as_matrix(&gradient), as_matrix(&lhs), as_matrix(&rhs))
            else {
                return;
            };
            let lhs_grad = g.dot(&r.t()).into_dyn();
            let rhs_grad = l.t().dot(&g).into_dyn();
            (lhs_grad, rhs_grad)
        };
        self.lhs.update_gradient(&lhs_grad);
        self.rhs.update_gradient(&rhs_grad);

        self.lhs.backward();
        self.rhs.backward();
    }
}
