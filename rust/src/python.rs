//! Python bindings.
//!
//! Each function takes the store contents and the request parameters as JSON
//! strings and returns the result as JSON. Engine errors raise `ValueError`.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::engine::{
    AnalyzeCriticalPathParams, OptimizeDeliveryParams, OptimizeTimelineParams, SchedulingEngine,
};
use crate::error::EngineError;
use crate::storage::{InMemoryStore, StoreSnapshot};

fn parse<T: DeserializeOwned>(what: &str, json: &str) -> PyResult<T> {
    serde_json::from_str(json).map_err(|e| PyValueError::new_err(format!("invalid {what}: {e}")))
}

fn render<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyValueError::new_err(e.to_string()))
}

fn engine_error(err: EngineError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn load(store_json: &str, config_json: Option<&str>) -> PyResult<(InMemoryStore, EngineConfig)> {
    let snapshot: StoreSnapshot = parse("store snapshot", store_json)?;
    let config = match config_json {
        Some(json) => parse("engine config", json)?,
        None => EngineConfig::default(),
    };
    Ok((InMemoryStore::from_snapshot(snapshot), config))
}

/// Optimize one project's timeline.
///
/// # Arguments
/// * `store_json` - projects, tasks, dependencies, assignments and capacities
/// * `params_json` - `{projectId, timeRange?, optimizationGoals}`
/// * `config_json` - optional engine configuration
#[pyfunction]
#[pyo3(signature = (store_json, params_json, config_json=None))]
fn optimize_project_timeline(
    py: Python<'_>,
    store_json: &str,
    params_json: &str,
    config_json: Option<&str>,
) -> PyResult<String> {
    let (store, config) = load(store_json, config_json)?;
    let params: OptimizeTimelineParams = parse("parameters", params_json)?;
    let result = py
        .allow_threads(|| SchedulingEngine::new(&store, config).optimize_project_timeline(&params))
        .map_err(engine_error)?;
    render(&result)
}

/// CPM analysis of one project.
#[pyfunction]
#[pyo3(signature = (store_json, params_json, config_json=None))]
fn analyze_critical_path(
    py: Python<'_>,
    store_json: &str,
    params_json: &str,
    config_json: Option<&str>,
) -> PyResult<String> {
    let (store, config) = load(store_json, config_json)?;
    let params: AnalyzeCriticalPathParams = parse("parameters", params_json)?;
    let result = py
        .allow_threads(|| SchedulingEngine::new(&store, config).analyze_critical_path(&params))
        .map_err(engine_error)?;
    render(&result)
}

/// Schedule several projects against shared resources.
///
/// Projects that fail graph building are listed under `failures` rather than
/// raising.
#[pyfunction]
#[pyo3(signature = (store_json, params_json, config_json=None))]
fn optimize_delivery_schedule(
    py: Python<'_>,
    store_json: &str,
    params_json: &str,
    config_json: Option<&str>,
) -> PyResult<String> {
    let (store, config) = load(store_json, config_json)?;
    let params: OptimizeDeliveryParams = parse("parameters", params_json)?;
    let result = py
        .allow_threads(|| SchedulingEngine::new(&store, config).optimize_delivery_schedule(&params))
        .map_err(engine_error)?;
    render(&result)
}

/// The deliverypath Python module.
#[pymodule]
fn deliverypath(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(optimize_project_timeline, m)?)?;
    m.add_function(wrap_pyfunction!(analyze_critical_path, m)?)?;
    m.add_function(wrap_pyfunction!(optimize_delivery_schedule, m)?)?;
    Ok(())
}
