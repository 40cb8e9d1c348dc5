//! Training configuration.

use crate::errors::TrainError;

/// How the learner picks among scored candidate features at a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSelectionStrategy {
    /// The highest-gain feature, ties broken by lower feature id.
    Best,
    /// Uniformly among the three highest-gain tie-classes.
    Top3Random,
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    max_add_depth: u32,
    check_depth: u32,
    alpha: f64,
    feature_selection: FeatureSelectionStrategy,
    allow_negative_gain: bool,
    gain_check_bags: u32,
    random_seed: Option<u64>,
}

impl TrainConfig {
    pub fn builder() -> TrainConfigBuilder {
        TrainConfigBuilder::default()
    }

    pub fn max_add_depth(&self) -> u32 {
        self.max_add_depth
    }

    pub fn check_depth(&self) -> u32 {
        self.check_depth
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn feature_selection(&self) -> FeatureSelectionStrategy {
        self.feature_selection
    }

    pub fn allow_negative_gain(&self) -> bool {
        self.allow_negative_gain
    }

    pub fn gain_check_bags(&self) -> u32 {
        self.gain_check_bags
    }

    pub fn random_seed(&self) -> Option<u64> {
        self.random_seed
    }

    fn validate(&self) -> Result<(), TrainError> {
        if self.max_add_depth == 0 {
            return Err(TrainError::InvalidConfig(
                "maxAddDepth must be at least 1".into(),
            ));
        }
        if self.check_depth == 0 {
            return Err(TrainError::InvalidConfig(
                "checkDepth must be at least 1".into(),
            ));
        }
        if self.check_depth > self.max_add_depth {
            return Err(TrainError::InvalidConfig(format!(
                "checkDepth which was equal to {}, must not exceed maxAddDepth which was equal to {}",
                self.check_depth, self.max_add_depth
            )));
        }
        if self.check_depth > 64 {
            return Err(TrainError::InvalidConfig(
                "checkDepth must not exceed 64".into(),
            ));
        }
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(TrainError::InvalidConfig(
                "alpha must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct TrainConfigBuilder {
    max_add_depth: Option<u32>,
    check_depth: Option<u32>,
    alpha: Option<f64>,
    feature_selection: Option<FeatureSelectionStrategy>,
    allow_negative_gain: Option<bool>,
    gain_check_bags: Option<u32>,
    random_seed: Option<u64>,
}

impl TrainConfigBuilder {
    pub fn max_add_depth(mut self, max_add_depth: u32) -> Self {
        self.max_add_depth = Some(max_add_depth);
        self
    }

    pub fn check_depth(mut self, check_depth: u32) -> Self {
        self.check_depth = Some(check_depth);
        self
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn feature_selection(mut self, strategy: FeatureSelectionStrategy) -> Self {
        self.feature_selection = Some(strategy);
        self
    }

    pub fn allow_negative_gain(mut self, allow: bool) -> Self {
        self.allow_negative_gain = Some(allow);
        self
    }

    pub fn gain_check_bags(mut self, bags: u32) -> Self {
        self.gain_check_bags = Some(bags);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<TrainConfig, TrainError> {
        let config = TrainConfig {
            max_add_depth: self.max_add_depth.unwrap_or(1),
            check_depth: self.check_depth.unwrap_or(1),
            alpha: self.alpha.unwrap_or(1.0),
            feature_selection: self.feature_selection.unwrap_or(FeatureSelectionStrategy::Best),
            allow_negative_gain: self.allow_negative_gain.unwrap_or(false),
            gain_check_bags: self.gain_check_bags.unwrap_or(0),
            random_seed: self.random_seed,
        };
        config.validate()?;
        Ok(config)
    }
}
