// Prediction and backtesting engine: aggregation, scoring, prediction
// building, outcome review, backtest evaluation and weight tuning.

pub mod aggregator;
pub mod backtest;
pub mod local_factors;
pub mod optimizer;
pub mod predictor;
pub mod review;
pub mod scoring;
