pub mod addition;
pub mod matmul;
pub mod mse;
pub mod mul;
pub mod relu;
pub mod sigmoid;

use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

use ndarray::{Array, ArrayD, Axis, Dimension, IxDyn};

use crate::error::Result;

pub use addition::{add, Addition};
pub use matmul::{matmul, MatrixMultiplication};
pub use mse::{mse, MeanSquaredError};
pub use mul::{mul, Multiplication};
pub use relu::{relu, Relu};
pub use sigmoid::{sigmoid, Sigmoid};

pub type Tensor = ArrayD<f32>;

/// Trait to represent a computational graph of a function to be diffrentiated.
/// All node in the graph implements this trait.
pub trait Function: Clone {
    /// Return the reference to this node's value which has computed in forward path for given inputs.
    fn data(&self) -> Ref<Tensor>;

    /// Return the reference to the gradient of the whole function with respect to this node.
    fn gradient(&self) -> Ref<Tensor>;

    /// Return the mutable reference to the gradient of the whole function with respect to this node.
    fn gradient_mut(&self) -> RefMut<Tensor>;

    /// Initialize gradient with the tensor whose elements are all 1.0.
    /// This is called when the struct instance is the root of the computation graph.
    fn init_gradient(&self) {
        let shape = self.data().raw_dim();
        *self.gradient_mut() = Tensor::ones(shape);
    }

    /// Add `gradient` sent from a consumer of this node.
    fn update_gradient(&self, gradient: &Tensor) {
        *self.gradient_mut() += gradient;
    }

    /// Run forward propagation.
    fn forward(&self) -> Result<()>;

    /// Run backward propagation.
    fn backward(&self);
}

/// Leaf of a computational graph: a model parameter or an input slot.
/// By default, the function cannot be diffrentiated with respect to this variable.
/// To diffrentiate, call `requires_grad()`.
#[derive(Clone, Debug)]
pub struct Variable {
    data: Rc<RefCell<Tensor>>,
    gradient: Rc<RefCell<Tensor>>,
    requires_grad: bool,
}

impl Variable {
    pub fn new<D>(data: Array<f32, D>) -> Self
    where
        D: Dimension,
    {
        let data = data.into_dyn();
        let shape = data.raw_dim();

        Self {
            data: Rc::new(RefCell::new(data)),
            gradient: Rc::new(RefCell::new(Tensor::zeros(shape))),
            requires_grad: false,
        }
    }

    pub fn requires_grad(self) -> Self {
        Self {
            requires_grad: true,
            ..self
        }
    }

    pub fn tracks_gradient(&self) -> bool {
        self.requires_grad
    }

    pub fn shape(&self) -> Vec<usize> {
        self.data.borrow().shape().to_vec()
    }

    pub fn data_mut(&self) -> RefMut<Tensor> {
        self.data.borrow_mut()
    }

    /// Replace the value held by this variable, e.g. to feed the next minibatch.
    pub fn set_data<D>(&self, data: Array<f32, D>)
    where
        D: Dimension,
    {
        let data = data.into_dyn();
        *self.gradient.borrow_mut() = Tensor::zeros(data.raw_dim());
        *self.data.borrow_mut() = data;
    }

    /// Clear the gradient, resizing it if the value changed shape.
    pub fn zero_gradient(&self) {
        let shape = self.data.borrow().raw_dim();
        *self.gradient.borrow_mut() = Tensor::zeros(shape);
    }
}

impl Function for Variable {
    fn data(&self) -> Ref<Tensor> {
        self.data.borrow()
    }

    fn gradient(&self) -> Ref<Tensor> {
        self.gradient.borrow()
    }

    fn gradient_mut(&self) -> RefMut<Tensor> {
        self.gradient.borrow_mut()
    }

    fn update_gradient(&self, gradient: &Tensor) {
        if !self.requires_grad {
            return;
        }

        *self.gradient.borrow_mut() += gradient;
    }

    fn forward(&self) -> Result<()> {
        Ok(())
    }

    fn backward(&self) {}
}

/// Placeholder value of a node which has not run forward yet.
pub(crate) fn unevaluated() -> Tensor {
    Tensor::zeros(IxDyn(&[0]))
}

/// Store the result of a forward pass and clear the gradient to the same shape.
pub(crate) fn store(data: &RefCell<Tensor>, gradient: &RefCell<Tensor>, value: Tensor) {
    *gradient.borrow_mut() = Tensor::zeros(value.raw_dim());
    *data.borrow_mut() = value;
}

/// Move the gradient collected by `node` out, leaving zeros behind.
/// A node consumed by several others is visited once per consumer, and each
/// visit must only pass on what arrived since the previous one.
pub(crate) fn take_gradient<F>(node: &F) -> Tensor
where
    F: Function,
{
    let cleared = Tensor::zeros(node.gradient().raw_dim());
    std::mem::replace(&mut *node.gradient_mut(), cleared)
}

/// Shape produced by broadcasting `lhs` against `rhs`, aligning trailing axes.
pub(crate) fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Option<Vec<usize>> {
    let ndim = lhs.len().max(rhs.len());
    let len_at = |shape: &[usize], axis: usize| {
        let offset = ndim - shape.len();
        if axis < offset {
            1
        } else {
            shape[axis - offset]
        }
    };

    let mut shape = Vec::with_capacity(ndim);
    for axis in 0..ndim {
        let len = match (len_at(lhs, axis), len_at(rhs, axis)) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            _ => return None,
        };
        shape.push(len);
    }
    Some(shape)
}

/// Sum `gradient` over the axes that were broadcast so it matches `shape` again.
pub(crate) fn reduce(gradient: &Tensor, shape: &[usize]) -> Tensor {
    let mut reduced = gradient.clone();
    while reduced.ndim() > shape.len() {
        reduced = reduced.sum_axis(Axis(0));
    }
    for (axis, &len) in shape.iter().enumerate() {
        if len == 1 && reduced.len_of(Axis(axis)) != 1 {
            reduced = reduced.sum_axis(Axis(axis)).insert_axis(Axis(axis));
        }
    }
    reduced
}
