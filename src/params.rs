use std::{collections::HashMap, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use tracing::warn;

use crate::publisher::{DEFAULT_INTERVAL, DEFAULT_MESSAGE, DEFAULT_TOPIC_NAME};

pub const ENV_PREFIX: &str = "INTERVAL_PUBLISHER_";

const PARAM_TOPIC_NAME: &str = "topic_name";
const PARAM_PUBLISH_INTERVAL_SECS: &str = "publish_interval_secs";
const PARAM_MESSAGE: &str = "message";
const PARAM_TICK_PERIOD_MILLIS: &str = "tick_period_millis";
const PARAM_QUEUE_DEPTH: &str = "queue_depth";
const PARAM_REQUEST_TIMEOUT_MILLIS: &str = "request_timeout_millis";
const DEFAULT_TICK_PERIOD_MILLIS: u64 = 16;
const DEFAULT_QUEUE_DEPTH: usize = 16;
const DEFAULT_REQUEST_TIMEOUT_MILLIS: u64 = 2000;

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

pub type ParamsMap = HashMap<String, ParameterValue>;

/// Collects `{prefix}{NAME}` variables as lowercase parameter names.
///
/// Values stay text; each getter parses them as the type it expects.
pub fn params_from_vars(prefix: &str, vars: impl IntoIterator<Item = (String, String)>) -> ParamsMap {
    vars.into_iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(prefix)?.to_ascii_lowercase();
            Some((name, ParameterValue::String(value)))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub topic_name: String,
    pub publish_interval: Duration,
    pub message: String,
    pub tick_period: Duration,
    pub queue_depth: usize,
    pub request_timeout: Duration,
}

impl Params {
    pub fn from_env() -> Result<Self> {
        Self::load(&params_from_vars(ENV_PREFIX, std::env::vars()))
    }

    pub fn load(params: &ParamsMap) -> Result<Self> {
        let topic_name = get_string(params, PARAM_TOPIC_NAME, DEFAULT_TOPIC_NAME)?;
        let publish_interval = get_publish_interval(params)?;
        let message = get_string(params, PARAM_MESSAGE, DEFAULT_MESSAGE)?;
        let tick_period_millis =
            get_u64(params, PARAM_TICK_PERIOD_MILLIS, DEFAULT_TICK_PERIOD_MILLIS)?;
        let queue_depth = get_u64(params, PARAM_QUEUE_DEPTH, DEFAULT_QUEUE_DEPTH as u64)?;
        let request_timeout_millis = get_u64(
            params,
            PARAM_REQUEST_TIMEOUT_MILLIS,
            DEFAULT_REQUEST_TIMEOUT_MILLIS,
        )?;

        if tick_period_millis == 0 {
            bail!("{PARAM_TICK_PERIOD_MILLIS} must be positive");
        }
        let queue_depth: usize = queue_depth
            .try_into()
            .with_context(|| format!("invalid {PARAM_QUEUE_DEPTH} number {}", queue_depth))?;

        Ok(Self {
            topic_name,
            publish_interval,
            message,
            tick_period: Duration::from_millis(tick_period_millis),
            queue_depth,
            request_timeout: Duration::from_millis(request_timeout_millis),
        })
    }
}

fn get_string(params: &ParamsMap, name: &str, default: &str) -> Result<String> {
    let Some(value) = params.get(name) else {
        warn!("Using default value '{}' for parameter '{}'", default, name);
        return Ok(default.to_string());
    };
    let value = value
        .to_str()
        .ok_or_else(|| anyhow!("{name} has invalid type"))?;
    Ok(value.to_string())
}

fn get_u64(params: &ParamsMap, name: &str, default: u64) -> Result<u64> {
    let Some(value) = params.get(name) else {
        warn!("Using default value '{}' for parameter '{}'", default, name);
        return Ok(default);
    };
    let value = value
        .to_i64()
        .ok_or_else(|| anyhow!("{name} has invalid type"))?;
    let value = value
        .try_into()
        .with_context(|| format!("invalid {name} number {}", value))?;
    Ok(value)
}

fn get_publish_interval(params: &ParamsMap) -> Result<Duration> {
    let Some(value) = params.get(PARAM_PUBLISH_INTERVAL_SECS) else {
        warn!(
            "Using default value '{}' for parameter '{}'",
            DEFAULT_INTERVAL.as_secs_f64(),
            PARAM_PUBLISH_INTERVAL_SECS
        );
        return Ok(DEFAULT_INTERVAL);
    };
    let secs = value
        .to_f64()
        .ok_or_else(|| anyhow!("{PARAM_PUBLISH_INTERVAL_SECS} has invalid type"))?;
    if !(secs.is_finite() && secs > 0.0) {
        bail!("{PARAM_PUBLISH_INTERVAL_SECS} must be a positive number of seconds, got {secs}");
    }
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("{PARAM_PUBLISH_INTERVAL_SECS} is out of range: {secs}"))
}

pub trait ParameterValueExt {
    fn to_str(&self) -> Option<&str>;
    fn to_i64(&self) -> Option<i64>;
    fn to_f64(&self) -> Option<f64>;
}

impl ParameterValueExt for ParameterValue {
    fn to_str(&self) -> Option<&str> {
        if let Self::String(val) = self {
            Some(val)
        } else {
            None
        }
    }

    fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(val) => Some(*val),
            Self::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Double(val) => Some(*val),
            Self::Integer(val) => Some(*val as f64),
            Self::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}
