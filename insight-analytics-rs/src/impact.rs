//! Deterministic impact projection for proposed platform changes
//!
//! Every sub-estimate combines two ingredients: fixed lookup tables keyed by
//! change type and scope, and correlation coefficients drawn from the
//! historical metrics store. With an empty store every correlation term is
//! 0 and the projection degrades to the table baseline. There is no
//! randomness anywhere in this module.

use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationEngine;
use crate::store::metric;

/// Kind of change being proposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Feature,
    Optimization,
    Architecture,
    Design,
    Content,
}

/// Blast radius of the change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeScope {
    Component,
    Page,
    System,
    Platform,
}

/// A proposed change to project impact for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    pub change_type: ChangeType,
    pub scope: ChangeScope,
    pub description: String,
}

/// Configuration table for the estimator.
///
/// The individual constants are illustrative defaults, not calibrated
/// business figures; deployments tune this one struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactWeights {
    /// Blended hourly cost of development time
    pub hourly_rate: f64,
    /// Share of development time that displaces revenue work
    pub opportunity_share: f64,
    /// Revenue baseline the conversion terms scale against
    pub monthly_revenue_baseline: f64,
    /// Months over which return on investment is projected
    pub roi_horizon_months: f64,
    /// Load-time baseline used when the store has no readings, in ms
    pub baseline_lcp_ms: f64,
}

impl Default for ImpactWeights {
    fn default() -> Self {
        Self {
            hourly_rate: 150.0,
            opportunity_share: 0.6,
            monthly_revenue_baseline: 25_000.0,
            roi_horizon_months: 12.0,
            baseline_lcp_ms: 2_500.0,
        }
    }
}

impl ImpactWeights {
    /// Expected bundle-size delta in bytes for a change of this type
    pub fn bundle_delta_bytes(&self, change_type: ChangeType) -> f64 {
        match change_type {
            ChangeType::Feature => 50_000.0,
            ChangeType::Optimization => -20_000.0,
            ChangeType::Architecture => 10_000.0,
            ChangeType::Design => 5_000.0,
            ChangeType::Content => 2_000.0,
        }
    }

    /// How the blast radius scales per-type estimates
    pub fn scope_multiplier(&self, scope: ChangeScope) -> f64 {
        match scope {
            ChangeScope::Component => 0.2,
            ChangeScope::Page => 0.5,
            ChangeScope::System => 1.0,
            ChangeScope::Platform => 2.0,
        }
    }

    /// Expected relative load-time shift for a change of this type,
    /// on a -1..1 scale (positive means faster)
    pub fn performance_shift(&self, change_type: ChangeType) -> f64 {
        match change_type {
            ChangeType::Optimization => 0.3,
            ChangeType::Feature => -0.1,
            ChangeType::Architecture => 0.1,
            ChangeType::Design => 0.05,
            ChangeType::Content => 0.02,
        }
    }

    pub fn maintainability_factor(&self, change_type: ChangeType) -> f64 {
        match change_type {
            ChangeType::Feature => 0.7,
            ChangeType::Optimization => 0.9,
            ChangeType::Architecture => 0.6,
            ChangeType::Design => 0.8,
            ChangeType::Content => 0.95,
        }
    }

    pub fn scalability_factor(&self, scope: ChangeScope) -> f64 {
        match scope {
            ChangeScope::Component => 0.85,
            ChangeScope::Page => 0.7,
            ChangeScope::System => 0.8,
            ChangeScope::Platform => 0.9,
        }
    }

    pub fn scope_risk(&self, scope: ChangeScope) -> f64 {
        match scope {
            ChangeScope::Component => 1.0,
            ChangeScope::Page => 2.0,
            ChangeScope::System => 4.0,
            ChangeScope::Platform => 6.0,
        }
    }

    /// Base development effort in hours
    pub fn base_hours(&self, scope: ChangeScope) -> f64 {
        match scope {
            ChangeScope::Component => 8.0,
            ChangeScope::Page => 24.0,
            ChangeScope::System => 80.0,
            ChangeScope::Platform => 200.0,
        }
    }

    /// Base calendar days until the change pays off
    pub fn base_days_to_value(&self, scope: ChangeScope) -> f64 {
        match scope {
            ChangeScope::Component => 3.0,
            ChangeScope::Page => 7.0,
            ChangeScope::System => 21.0,
            ChangeScope::Platform => 45.0,
        }
    }

    pub fn differentiation_bonus(&self, scope: ChangeScope) -> f64 {
        match scope {
            ChangeScope::Platform => 2.0,
            ChangeScope::System => 1.0,
            ChangeScope::Page => 0.5,
            ChangeScope::Component => 0.0,
        }
    }

    pub fn defensibility(&self, scope: ChangeScope) -> f64 {
        match scope {
            ChangeScope::Platform => 9.0,
            ChangeScope::System => 7.0,
            ChangeScope::Page => 5.0,
            ChangeScope::Component => 4.0,
        }
    }

    /// Hours a competitor would need to ship an equivalent response
    pub fn competitor_response_hours(&self, scope: ChangeScope) -> f64 {
        match scope {
            ChangeScope::Platform => 720.0,
            ChangeScope::System => 240.0,
            ChangeScope::Page => 72.0,
            ChangeScope::Component => 24.0,
        }
    }

    /// Expected relative conversion-rate improvement
    pub fn conversion_improvement(&self, change_type: ChangeType) -> f64 {
        match change_type {
            ChangeType::Optimization => 0.15,
            ChangeType::Feature => 0.08,
            ChangeType::Architecture => 0.05,
            ChangeType::Design => 0.12,
            ChangeType::Content => 0.06,
        }
    }

    pub fn conversion_scope_multiplier(&self, scope: ChangeScope) -> f64 {
        match scope {
            ChangeScope::Platform => 1.5,
            ChangeScope::System => 1.2,
            ChangeScope::Page => 1.0,
            ChangeScope::Component => 0.8,
        }
    }

    pub fn priority_scope_score(&self, scope: ChangeScope) -> f64 {
        match scope {
            ChangeScope::Platform => 10.0,
            ChangeScope::System => 8.0,
            ChangeScope::Page => 6.0,
            ChangeScope::Component => 4.0,
        }
    }

    /// Effort multiplier from description length, a rough complexity proxy
    pub fn complexity_factor(&self, description: &str) -> f64 {
        if description.len() > 200 {
            1.5
        } else if description.len() > 100 {
            1.2
        } else {
            1.0
        }
    }
}

/// Technical dimension of an estimate; scores are 1-10
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalImpact {
    pub performance: f64,
    pub maintainability: f64,
    pub scalability: f64,
    pub risk_level: f64,
}

/// Business dimension; scores 1-10 except the raw revenue projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessImpact {
    pub conversion_likelihood: f64,
    pub lead_quality: f64,
    /// Projected monthly revenue delta, in currency units
    pub revenue_projection: f64,
    pub time_to_value_days: f64,
}

/// Competitive dimension; scores 1-10 except the raw response time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitiveImpact {
    pub market_position: f64,
    pub differentiation: f64,
    pub defensibility: f64,
    pub response_time_hours: f64,
}

/// Resource dimension; hours and ROI stay raw, the rest are 1-10
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceImpact {
    pub development_hours: f64,
    pub opportunity_cost: f64,
    /// Percentage return over the configured horizon
    pub risk_adjusted_roi: f64,
    pub priority_score: f64,
}

/// Cross-dimensional projection for one proposed change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub technical: TechnicalImpact,
    pub business: BusinessImpact,
    pub competitive: CompetitiveImpact,
    pub resource: ResourceImpact,
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(1.0, 10.0)
}

/// Projects multi-dimensional effect estimates for proposed changes
#[derive(Debug, Clone)]
pub struct ImpactEstimator {
    engine: CorrelationEngine,
    weights: ImpactWeights,
}

impl ImpactEstimator {
    pub fn new(engine: CorrelationEngine, weights: ImpactWeights) -> Self {
        Self { engine, weights }
    }

    /// Full projection; reproducible for identical descriptor and store state
    pub fn estimate(&self, change: &ChangeDescriptor) -> ImpactEstimate {
        ImpactEstimate {
            technical: self.technical_impact(change),
            business: self.business_impact(change),
            competitive: self.competitive_impact(change),
            resource: self.resource_impact(change),
        }
    }

    fn technical_impact(&self, change: &ChangeDescriptor) -> TechnicalImpact {
        let w = &self.weights;
        let bundle_delta =
            w.bundle_delta_bytes(change.change_type) * w.scope_multiplier(change.scope);
        let bundle_to_lcp = self.engine.correlate(metric::BUNDLE_SIZE, metric::LCP);
        let predicted_lcp_shift = bundle_delta * bundle_to_lcp;

        let performance = clamp_score(8.0 - (predicted_lcp_shift / w.baseline_lcp_ms) / 10.0);
        let maintainability = clamp_score(
            w.maintainability_factor(change.change_type) * 10.0
                - if change.description.len() > 100 { 1.0 } else { 0.0 },
        );
        let scalability = clamp_score((w.scalability_factor(change.scope) * 10.0).round());
        let risk_level = clamp_score(3.0 + w.scope_risk(change.scope));

        TechnicalImpact {
            performance,
            maintainability,
            scalability,
            risk_level,
        }
    }

    fn business_impact(&self, change: &ChangeDescriptor) -> BusinessImpact {
        let w = &self.weights;
        let shift = w.performance_shift(change.change_type) * w.scope_multiplier(change.scope);
        let conversion_corr = self
            .engine
            .correlate(metric::LCP, metric::CONVERSION_EVENTS);
        let bounce_corr = self.engine.correlate(metric::LCP, metric::BOUNCE_RATE);

        let conversion_impact = shift * conversion_corr;
        let engagement_impact = shift * bounce_corr;

        BusinessImpact {
            conversion_likelihood: clamp_score(6.0 + conversion_impact * 10.0),
            lead_quality: clamp_score(7.0 + engagement_impact * 5.0),
            revenue_projection: conversion_impact.abs() * w.monthly_revenue_baseline,
            time_to_value_days: (w.base_days_to_value(change.scope)
                * if change.description.len() > 150 { 1.5 } else { 1.0 })
            .round(),
        }
    }

    fn competitive_impact(&self, change: &ChangeDescriptor) -> CompetitiveImpact {
        let w = &self.weights;
        let market_position = clamp_score(
            6.0 + if change.scope == ChangeScope::Platform {
                2.0
            } else {
                0.0
            },
        );
        // Competitor capability is assumed neutral; the table bonus carries
        // the scope signal.
        let differentiation = clamp_score(6.0 + w.differentiation_bonus(change.scope));

        CompetitiveImpact {
            market_position,
            differentiation,
            defensibility: w.defensibility(change.scope),
            response_time_hours: w.competitor_response_hours(change.scope),
        }
    }

    fn resource_impact(&self, change: &ChangeDescriptor) -> ResourceImpact {
        let w = &self.weights;
        let hours =
            (w.base_hours(change.scope) * w.complexity_factor(&change.description)).round();
        let opportunity_cost =
            clamp_score(hours * w.hourly_rate * w.opportunity_share / 5_000.0);

        let conversion_improvement = w.conversion_improvement(change.change_type)
            * w.conversion_scope_multiplier(change.scope);
        let annual_gain =
            w.monthly_revenue_baseline * conversion_improvement * w.roi_horizon_months;
        let investment = hours * w.hourly_rate;
        let roi = if investment > 0.0 {
            ((annual_gain - investment) / investment * 100.0).max(0.0)
        } else {
            0.0
        };

        let roi_score = (roi / 50.0).clamp(0.0, 10.0);
        let time_score = (10.0 - hours / 20.0).max(1.0);
        let priority_score = clamp_score(
            (roi_score * 0.4
                + time_score * 0.3
                + w.priority_scope_score(change.scope) * 0.3)
                .round(),
        );

        ResourceImpact {
            development_hours: hours,
            opportunity_cost,
            risk_adjusted_roi: roi,
            priority_score,
        }
    }
}
