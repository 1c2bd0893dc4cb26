use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    optimizer::{AdaDelta, Adam, GradientDescent, RmsProp, Rule},
    params::ParamSet,
};

/// The single-group update rules, selectable by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Sgd,
    AdaDelta,
    RmsProp,
    Adam,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Sgd,
        Algorithm::AdaDelta,
        Algorithm::RmsProp,
        Algorithm::Adam,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sgd => "sgd",
            Algorithm::AdaDelta => "adadelta",
            Algorithm::RmsProp => "rmsprop",
            Algorithm::Adam => "adam",
        }
    }

    /// Build the rule with fresh, zeroed accumulators for `params`.
    pub fn build(self, params: &ParamSet) -> Rule {
        match self {
            Algorithm::Sgd => GradientDescent::new(params).into(),
            Algorithm::AdaDelta => AdaDelta::new(params).into(),
            Algorithm::RmsProp => RmsProp::new(params).into(),
            Algorithm::Adam => Adam::new(params).into(),
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == name)
            .ok_or_else(|| Error::UnknownAlgorithm(s.to_string()))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which rule to train with and the learning rate handed to its apply phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub algorithm: Algorithm,
    pub learning_rate: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::AdaDelta,
            learning_rate: 1e-6,
        }
    }
}

impl OptimizerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build(&self, params: &ParamSet) -> Rule {
        self.algorithm.build(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        assert_eq!(Algorithm::Sgd, "sgd".parse().unwrap());
        assert_eq!(Algorithm::AdaDelta, "AdaDelta".parse().unwrap());
        assert_eq!(Algorithm::RmsProp, " rmsprop".parse().unwrap());
        assert_eq!(Algorithm::Adam, "adam".parse().unwrap());
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm, algorithm.to_string().parse().unwrap());
        }
    }

    #[test]
    fn unknown_name() {
        let result = "adagrad".parse::<Algorithm>();
        assert!(matches!(result, Err(Error::UnknownAlgorithm(name)) if name == "adagrad"));
    }

    #[test]
    fn config_from_json() {
        let config = OptimizerConfig::from_json(r#"{"algorithm": "rmsprop", "learning_rate": 0.5}"#)
            .unwrap();
        assert_eq!(Algorithm::RmsProp, config.algorithm);
        assert_eq!(0.5, config.learning_rate);

        let config = OptimizerConfig::from_json(r#"{"algorithm": "adam"}"#).unwrap();
        assert_eq!(1e-6, config.learning_rate);

        assert_eq!(OptimizerConfig::default(), OptimizerConfig::from_json("{}").unwrap());
    }

    #[test]
    fn malformed_config() {
        assert!(matches!(
            OptimizerConfig::from_json(r#"{"algorithm": "newton"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            OptimizerConfig::from_json("not json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = OptimizerConfig {
            algorithm: Algorithm::Sgd,
            learning_rate: 0.25,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(r#"{"algorithm":"sgd","learning_rate":0.25}"#, json);
        assert_eq!(config, OptimizerConfig::from_json(&json).unwrap());
    }

    #[test]
    fn build_matches_algorithm() {
        let params = ParamSet::new();
        assert!(matches!(Algorithm::Sgd.build(&params), Rule::GradientDescent(_)));
        assert!(matches!(Algorithm::AdaDelta.build(&params), Rule::AdaDelta(_)));
        assert!(matches!(Algorithm::RmsProp.build(&params), Rule::RmsProp(_)));
        assert!(matches!(Algorithm::Adam.build(&params), Rule::Adam(_)));
    }
}
