use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::FEATURE_COUNT;
use crate::scoring::features::FeatureVector;
use crate::scoring::model::{baseline_factory, sigmoid, LogisticModel, ModelFactory, RiskModel};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// When and how strongly user feedback moves the baseline model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdapterConfig {
    /// Off means every session scores with the fixed baseline model
    pub enabled: bool,
    /// Samples needed before the first fit (both outcomes must be present)
    pub min_samples: usize,
    /// Weight given to the user-fitted model when blending
    pub blend_alpha: f64,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    /// Oldest feedback is dropped past this many samples
    pub max_history: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_samples: 5,
            blend_alpha: 0.2,
            learning_rate: 0.5,
            epochs: 200,
            l2: 0.01,
            max_history: 500,
        }
    }
}

/// Baseline logistic model nudged toward one user's observed breakdowns.
///
/// The user model is refit from scratch on every new sample once enough
/// history exists, and blending always starts from the baseline weights, so
/// repeated feedback never compounds the nudge.
#[derive(Debug, Clone)]
pub struct PersonalizedModel {
    baseline: LogisticModel,
    active: LogisticModel,
    user: Option<LogisticModel>,
    history: VecDeque<(FeatureVector, bool)>,
    config: AdapterConfig,
}

impl PersonalizedModel {
    pub fn new(baseline: LogisticModel, config: AdapterConfig) -> Self {
        Self {
            active: baseline.clone(),
            baseline,
            user: None,
            history: VecDeque::new(),
            config,
        }
    }

    pub fn active(&self) -> &LogisticModel {
        &self.active
    }

    pub fn user_model(&self) -> Option<&LogisticModel> {
        self.user.as_ref()
    }

    pub fn sample_count(&self) -> usize {
        self.history.len()
    }

    fn has_both_outcomes(&self) -> bool {
        let positives = self.history.iter().filter(|(_, y)| *y).count();
        positives > 0 && positives < self.history.len()
    }

    fn adapt(&mut self) {
        if self.history.len() < self.config.min_samples {
            return;
        }
        if !self.has_both_outcomes() {
            log_debug!(
                "skipping adaptation: {} samples share one outcome",
                self.history.len()
            );
            return;
        }

        let user = fit_logistic(&self.history, &self.config);
        let alpha = self.config.blend_alpha.clamp(0.0, 1.0);

        let mut blended = self.baseline.clone();
        blended.bias = (1.0 - alpha) * self.baseline.bias + alpha * user.bias;
        for (slot, (base, learned)) in blended
            .weights
            .iter_mut()
            .zip(self.baseline.weights.iter().zip(user.weights.iter()))
        {
            *slot = (1.0 - alpha) * base + alpha * learned;
        }

        log_info!(
            "risk model adapted from {} feedback samples",
            self.history.len()
        );
        self.active = blended;
        self.user = Some(user);
    }
}

/// One personalised model per session, each starting from the baseline.
pub fn personalized_factory(config: AdapterConfig) -> ModelFactory {
    Arc::new(move || {
        Box::new(PersonalizedModel::new(LogisticModel::baseline(), config.clone()))
            as Box<dyn RiskModel>
    })
}

/// The factory sessions should use under `config`.
pub fn model_factory(config: &AdapterConfig) -> ModelFactory {
    if config.enabled {
        personalized_factory(config.clone())
    } else {
        baseline_factory()
    }
}

/// Deterministic full-batch gradient descent with L2 on the weights.
fn fit_logistic(samples: &VecDeque<(FeatureVector, bool)>, config: &AdapterConfig) -> LogisticModel {
    let mut model = LogisticModel {
        bias: 0.0,
        weights: [0.0; FEATURE_COUNT],
    };
    let n = samples.len() as f64;

    for _ in 0..config.epochs {
        let mut grad_w = [0.0; FEATURE_COUNT];
        let mut grad_b = 0.0;

        for (features, outcome) in samples {
            let target = if *outcome { 1.0 } else { 0.0 };
            let error = sigmoid(model.logit(features)) - target;
            grad_b += error;
            for (g, x) in grad_w.iter_mut().zip(features.values()) {
                *g += error * x;
            }
        }

        model.bias -= config.learning_rate * grad_b / n;
        for (w, g) in model.weights.iter_mut().zip(grad_w) {
            *w -= config.learning_rate * (g / n + config.l2 * *w);
        }
    }

    model
}

impl RiskModel for PersonalizedModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        self.active.predict(features)
    }

    fn contributions(&self, features: &FeatureVector) -> Result<[f64; FEATURE_COUNT]> {
        self.active.contributions(features)
    }

    fn record_feedback(&mut self, features: &FeatureVector, actual_breakdown: bool) {
        self.history.push_back((*features, actual_breakdown));
        while self.history.len() > self.config.max_history.max(1) {
            self.history.pop_front();
        }
        self.adapt();
    }

    fn name(&self) -> &str {
        "personalized"
    }
}
