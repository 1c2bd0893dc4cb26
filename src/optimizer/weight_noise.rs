use log::debug;

use crate::{
    error::Result,
    objective::Objective,
    optimizer::{AdaDelta, UpdateRule},
    params::ParamSet,
};

/// AdaDelta over weights split into a mean and a noise scale (sigma).
///
/// Both groups are differentiated from one evaluation of the cost, but each group
/// is updated by its own apply so they can follow separate schedules.
pub struct WeightNoise<O> {
    objective: O,
    mean: AdaDelta,
    sigma: AdaDelta,
}

impl<O> WeightNoise<O>
where
    O: Objective,
{
    /// Fails with `Error::DuplicateParameter` if a name is in both groups.
    pub fn new(objective: O, mean: &ParamSet, sigma: &ParamSet) -> Result<Self> {
        mean.chain(sigma)?;
        debug!(
            "weight noise over {} mean and {} sigma parameters",
            mean.len(),
            sigma.len()
        );
        Ok(Self {
            objective,
            mean: AdaDelta::new(mean),
            sigma: AdaDelta::new(sigma),
        })
    }

    /// Evaluate the cost on `batch` and stash the gradients of both groups.
    /// Nothing is stashed unless every parameter of both groups has a gradient.
    pub fn accumulate(&mut self, batch: &O::Batch) -> Result<f32> {
        let evaluation = self.objective.evaluate(batch)?;
        let mean = self.mean.pair(&evaluation.gradients)?;
        let sigma = self.sigma.pair(&evaluation.gradients)?;
        self.mean.stash(mean);
        self.sigma.stash(sigma);
        debug!("weight noise cost {}", evaluation.cost);
        Ok(evaluation.cost)
    }

    pub fn apply_mean(&mut self, learning_rate: f32) -> Result<()> {
        self.mean.apply(learning_rate)
    }

    pub fn apply_sigma(&mut self, learning_rate: f32) -> Result<()> {
        self.sigma.apply(learning_rate)
    }

    pub fn mean(&self) -> &AdaDelta {
        &self.mean
    }

    pub fn sigma(&self) -> &AdaDelta {
        &self.sigma
    }

    pub fn objective(&self) -> &O {
        &self.objective
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::Error,
        grad::{Function, Variable},
        objective::{Evaluation, FnObjective},
        params::Gradients,
    };

    use super::*;

    use ndarray::arr1;

    fn groups() -> (ParamSet, ParamSet) {
        let mean = ParamSet::new()
            .with("w_mu", Variable::new(arr1(&[0.5, -0.5])).requires_grad())
            .unwrap();
        let sigma = ParamSet::new()
            .with("w_sigma", Variable::new(arr1(&[0.1, 0.2])).requires_grad())
            .unwrap();
        (mean, sigma)
    }

    fn constant_gradients(_: &()) -> Result<Evaluation> {
        let gradients: Gradients = [
            ("w_mu".to_string(), arr1(&[1.0, -1.0]).into_dyn()),
            ("w_sigma".to_string(), arr1(&[0.5, 0.5]).into_dyn()),
        ]
        .into_iter()
        .collect();
        Ok(Evaluation {
            cost: 1.0,
            gradients,
        })
    }

    #[test]
    fn apply_mean_leaves_sigma() {
        let (mean, sigma) = groups();
        let mut optimizer =
            WeightNoise::new(FnObjective::new(constant_gradients), &mean, &sigma).unwrap();
        let sigma_before = sigma.get("w_sigma").unwrap().data().clone();
        let mean_before = mean.get("w_mu").unwrap().data().clone();

        for _ in 0..3 {
            optimizer.accumulate(&()).unwrap();
            optimizer.apply_mean(1e-6).unwrap();
        }
        assert_eq!(sigma_before, *sigma.get("w_sigma").unwrap().data());
        assert_ne!(mean_before, *mean.get("w_mu").unwrap().data());
    }

    #[test]
    fn apply_sigma_leaves_mean() {
        let (mean, sigma) = groups();
        let mut optimizer =
            WeightNoise::new(FnObjective::new(constant_gradients), &mean, &sigma).unwrap();
        let mean_before = mean.get("w_mu").unwrap().data().clone();

        for _ in 0..3 {
            optimizer.accumulate(&()).unwrap();
            optimizer.apply_sigma(1e-6).unwrap();
        }
        assert_eq!(mean_before, *mean.get("w_mu").unwrap().data());
        assert!(optimizer
            .sigma()
            .state("w_sigma")
            .unwrap()
            .squared_update
            .iter()
            .all(|&v| v > 0.0));
        assert!(optimizer
            .mean()
            .state("w_mu")
            .unwrap()
            .squared_update
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn groups_match_plain_adadelta() {
        let (mean, sigma) = groups();
        let mut optimizer =
            WeightNoise::new(FnObjective::new(constant_gradients), &mean, &sigma).unwrap();

        let (reference, _) = groups();
        let mut adadelta = AdaDelta::new(&reference);
        let gradients = constant_gradients(&()).unwrap().gradients;

        for _ in 0..4 {
            optimizer.accumulate(&()).unwrap();
            optimizer.apply_mean(1e-4).unwrap();
            adadelta.accumulate(&gradients).unwrap();
            adadelta.apply(1e-4).unwrap();
        }
        assert_eq!(
            *reference.get("w_mu").unwrap().data(),
            *mean.get("w_mu").unwrap().data()
        );
    }

    #[test]
    fn missing_sigma_gradient_stashes_nothing() {
        let (mean, sigma) = groups();
        let objective = FnObjective::new(|_: &()| {
            let gradients = [("w_mu".to_string(), arr1(&[1.0, 1.0]).into_dyn())]
                .into_iter()
                .collect();
            Ok(Evaluation {
                cost: 0.0,
                gradients,
            })
        });
        let mut optimizer = WeightNoise::new(objective, &mean, &sigma).unwrap();

        let result = optimizer.accumulate(&());
        assert!(matches!(result, Err(Error::MissingGradient(name)) if name == "w_sigma"));
        let state = optimizer.mean().state("w_mu").unwrap();
        assert!(state.gradient.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn groups_must_be_disjoint() {
        let (mean, _) = groups();
        let result = WeightNoise::new(FnObjective::new(constant_gradients), &mean, &mean);
        assert!(matches!(result, Err(Error::DuplicateParameter(name)) if name == "w_mu"));
    }
}
