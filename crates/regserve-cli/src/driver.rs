//! Demo workload: fit several models at once, then load, predict, list and
//! clear them through the HTTP API.

use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::{Map, Value};

use crate::client::{ClientError, RegistryClient};

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// How many `linear_<n>` models to fit concurrently.
    pub models: usize,
    pub train_x: Vec<Vec<f64>>,
    pub train_y: Vec<f64>,
    pub predict_x: Vec<Vec<f64>>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        DriverOptions {
            models: 2,
            train_x: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            train_y: vec![5.0, 6.0],
            predict_x: vec![vec![5.0, 6.0], vec![7.0, 8.0]],
        }
    }
}

/// Outcome of every step. Failures are recorded, not raised, so one rejected
/// call does not hide the rest of the run.
#[derive(Debug)]
pub struct DriverReport {
    pub fits: Vec<(String, Result<String, ClientError>)>,
    pub fit_elapsed: Duration,
    pub load: Result<String, ClientError>,
    pub predict: Result<Vec<f64>, ClientError>,
    pub list: Result<Vec<String>, ClientError>,
    pub remove: Result<String, ClientError>,
}

impl DriverReport {
    pub fn all_succeeded(&self) -> bool {
        self.fits.iter().all(|(_, r)| r.is_ok())
            && self.load.is_ok()
            && self.predict.is_ok()
            && self.list.is_ok()
            && self.remove.is_ok()
    }
}

pub fn model_id(n: usize) -> String {
    format!("linear_{}", n)
}

pub async fn run(client: &RegistryClient, options: &DriverOptions) -> DriverReport {
    let mut hyperparameters = Map::new();
    hyperparameters.insert("fit_intercept".to_string(), Value::Bool(true));

    let ids: Vec<String> = (1..=options.models).map(model_id).collect();

    let start = Instant::now();
    let fits = join_all(ids.iter().map(|id| {
        client.fit(
            id,
            "linear",
            hyperparameters.clone(),
            options.train_x.clone(),
            options.train_y.clone(),
        )
    }))
    .await;
    let fit_elapsed = start.elapsed();
    let fits: Vec<_> = ids.into_iter().zip(fits).collect();
    for (id, result) in &fits {
        log::info!("Fit {}: {}", id, describe(result));
    }

    let first = model_id(1);
    let load = client.load(&first).await;
    let predict = client.predict(&first, options.predict_x.clone()).await;
    let list = client.list_models().await;
    let remove = client.remove_all().await;

    DriverReport {
        fits,
        fit_elapsed,
        load,
        predict,
        list,
        remove,
    }
}

/// Human-readable summary, one line per step.
pub fn render(report: &DriverReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (id, result) in &report.fits {
        lines.push(format!("fit {}: {}", id, describe(result)));
    }
    lines.push(format!(
        "Training duration: {:.2}s",
        report.fit_elapsed.as_secs_f64()
    ));
    lines.push(format!("load: {}", describe(&report.load)));
    lines.push(match &report.predict {
        Ok(preds) => format!("predict: {:?}", preds),
        Err(e) => format!("predict failed: {}", e),
    });
    lines.push(match &report.list {
        Ok(ids) => format!("models: {:?}", ids),
        Err(e) => format!("list_models failed: {}", e),
    });
    lines.push(format!("remove_all: {}", describe(&report.remove)));
    lines
}

fn describe(result: &Result<String, ClientError>) -> String {
    match result {
        Ok(message) => message.clone(),
        Err(e) => format!("failed: {}", e),
    }
}
