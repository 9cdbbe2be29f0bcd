//! EdgeLab Stats — inference over the per-market summary table.
//!
//! This crate builds on `edgelab-core` to provide:
//! - Analysis pipeline (resolve, decompose, counterfactual, test, fit)
//! - Symmetric-subset tilt test with a bias-corrected null
//! - Stratified permutation test preserving the price-outcome correlation
//! - Driver regression (OLS) with bivariate contrast per feature
//! - Coverage/quality accounting and a serializable report

pub mod config;
pub mod normal;
pub mod permutation;
pub mod pipeline;
pub mod regression;
pub mod table;
pub mod tilt;

pub use config::{AnalysisConfig, ConfigError};
pub use normal::{erf, normal_cdf, two_sided_p};
pub use permutation::{
    shuffle_preserving_count, stratified_permutation_test, PermutationError,
    StratifiedPermutationResult,
};
pub use pipeline::{run_analysis, AnalysisInput, AnalysisReport, Coverage};
pub use regression::{
    fit_drivers, spearman, DriverRow, FeatureEffect, RegressionError, RegressionFit,
    DEPTH_PROXY_CAVEAT, FEATURE_NAMES,
};
pub use table::ResolvedMarket;
pub use tilt::{
    naive_agreement, symmetric_subset_test, NaiveAgreement, SymmetricSubsetResult, TiltTestError,
    TiltVerdict,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<AnalysisConfig>();
        assert_sync::<AnalysisConfig>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<SymmetricSubsetResult>();
        assert_sync::<SymmetricSubsetResult>();
        assert_send::<StratifiedPermutationResult>();
        assert_sync::<StratifiedPermutationResult>();
        assert_send::<NaiveAgreement>();
        assert_sync::<NaiveAgreement>();
        assert_send::<RegressionFit>();
        assert_sync::<RegressionFit>();
    }

    #[test]
    fn report_is_send_sync() {
        assert_send::<AnalysisReport>();
        assert_sync::<AnalysisReport>();
        assert_send::<Coverage>();
        assert_sync::<Coverage>();
        assert_send::<ResolvedMarket>();
        assert_sync::<ResolvedMarket>();
    }
}
