//! Ready-made collectors.
//!
//! Middleware only sees the collector traits from `wiretap-core`. These adapters
//! implement them for common metric backends:
//!
//! | Feature | Types |
//! |---------|-------|
//! | `collector-metrics` | [`MetricsObserver`], [`MetricsCounter`], [`MetricsGauge`] over the `metrics` facade |
//! | `collector-prometheus` | [`Prometheus`] wrapping `HistogramVec`, `IntCounterVec`, `CounterVec`, `IntGauge` and `Gauge` |

#[cfg(feature = "collector-metrics")]
mod facade;
#[cfg(feature = "collector-prometheus")]
mod prom;

#[cfg(feature = "collector-metrics")]
pub use facade::{MetricsCounter, MetricsGauge, MetricsObserver};
#[cfg(feature = "collector-prometheus")]
pub use prom::Prometheus;
