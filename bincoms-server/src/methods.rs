//! Method allow-list
//!
//! A call is routed, in order, to a meta method, a host-side extension method,
//! or a device function from the capability table. Anything else is an
//! unknown operation. An extension may take over a device function whose
//! answer is followed by more frames, such as the logic timer's `start`.

use crate::convert::{params_to_values, value_to_json};
use crate::protocol::Fault;
use async_trait::async_trait;
use bincoms_client::{DispatchGate, LogicTimer, START};
use bincoms_transport::ByteChannel;
use serde_json::Value as Json;
use std::sync::Arc;
use std::time::Duration;

pub const LIST_METHODS: &str = "system.listMethods";
pub const METHOD_HELP: &str = "system.methodHelp";
pub const SHUTDOWN: &str = "system.shutdown";

/// Meta methods and their help text
const META_METHODS: [(&str, &str); 3] = [
    (LIST_METHODS, "system.listMethods() -> list of callable method names"),
    (METHOD_HELP, "system.methodHelp(name) -> signature of the named method"),
    (SHUTDOWN, "system.shutdown() -> stop accepting connections"),
];

/// Host-side methods exposed next to the device functions
#[async_trait]
pub trait ExtensionMethods: Send + Sync {
    /// Names this extension answers
    fn names(&self) -> Vec<&'static str>;

    fn help(&self, name: &str) -> Option<String>;

    /// Run `name`; only called with one of `names()`
    async fn call(&self, name: &str, params: &[Json]) -> Result<Json, Fault>;
}

/// Extension set with no methods
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtensions;

#[async_trait]
impl ExtensionMethods for NoExtensions {
    fn names(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn help(&self, _name: &str) -> Option<String> {
        None
    }

    async fn call(&self, name: &str, _params: &[Json]) -> Result<Json, Fault> {
        Err(Fault::unknown_operation(name))
    }
}

const SET_DURATION: &str = "set_duration";
const GET_DURATION: &str = "get_duration";
const GET_DATA: &str = "get_data";

#[async_trait]
impl<C: ByteChannel + 'static> ExtensionMethods for LogicTimer<C> {
    fn names(&self) -> Vec<&'static str> {
        vec![START, SET_DURATION, GET_DURATION, GET_DATA]
    }

    fn help(&self, name: &str) -> Option<String> {
        let text = match name {
            START => return Some(self.gate().capabilities().lookup(START).ok()?.signature()),
            SET_DURATION => "set_duration(seconds) -> null",
            GET_DURATION => "get_duration() -> seconds",
            GET_DATA => "get_data() -> list of [counter, pin_state] recorded during one capture",
            _ => return None,
        };
        Some(text.to_string())
    }

    async fn call(&self, name: &str, params: &[Json]) -> Result<Json, Fault> {
        match name {
            START => {
                let ticks = self.start(duration_param(name, params)?).await?;
                Ok(value_to_json(&ticks))
            }
            SET_DURATION => {
                self.set_duration(duration_param(name, params)?);
                Ok(Json::Null)
            }
            GET_DURATION => {
                expect_no_params(name, params)?;
                Ok(Json::from(self.get_duration().as_secs_f64()))
            }
            GET_DATA => {
                expect_no_params(name, params)?;
                let records = self.get_data().await?;
                Ok(Json::Array(
                    records
                        .iter()
                        .map(|r| Json::Array(vec![Json::from(r.counter), Json::from(r.pin_state)]))
                        .collect(),
                ))
            }
            _ => Err(Fault::unknown_operation(name)),
        }
    }
}

fn duration_param(name: &str, params: &[Json]) -> Result<Duration, Fault> {
    let seconds = match params {
        [value] => value.as_f64(),
        _ => None,
    }
    .ok_or_else(|| Fault::invalid_params(format!("{} takes one number", name)))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| Fault::invalid_params(format!("Invalid duration: {}", e)))
}

fn expect_no_params(name: &str, params: &[Json]) -> Result<(), Fault> {
    if params.is_empty() {
        Ok(())
    } else {
        Err(Fault::invalid_params(format!(
            "{} takes no arguments, {} given",
            name,
            params.len()
        )))
    }
}

/// Where a method name resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Meta,
    Device,
    Extension,
}

/// Allow-list of callable methods bound to one device
pub struct MethodTable<C: ByteChannel> {
    gate: DispatchGate<C>,
    extensions: Arc<dyn ExtensionMethods>,
}

impl<C: ByteChannel> MethodTable<C> {
    pub fn new(gate: DispatchGate<C>) -> Self {
        Self::with_extensions(gate, Arc::new(NoExtensions))
    }

    pub fn with_extensions(gate: DispatchGate<C>, extensions: Arc<dyn ExtensionMethods>) -> Self {
        for name in extensions.names() {
            if gate.capabilities().contains(name) {
                log::debug!("Device function {} is handled by an extension", name);
            }
        }
        Self { gate, extensions }
    }

    pub fn gate(&self) -> &DispatchGate<C> {
        &self.gate
    }

    pub fn route(&self, name: &str) -> Option<Route> {
        if META_METHODS.iter().any(|(meta, _)| *meta == name) {
            Some(Route::Meta)
        } else if self.extensions.names().contains(&name) {
            Some(Route::Extension)
        } else if self.gate.capabilities().contains(name) {
            Some(Route::Device)
        } else {
            None
        }
    }

    /// Every callable name: device functions, extensions, then meta methods
    pub fn list_methods(&self) -> Vec<String> {
        let mut names = self.gate.capabilities().names();
        for name in self.extensions.names() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names.extend(META_METHODS.iter().map(|(name, _)| name.to_string()));
        names
    }

    pub fn method_help(&self, name: &str) -> Result<String, Fault> {
        match self.route(name) {
            Some(Route::Meta) => META_METHODS
                .iter()
                .find(|(meta, _)| *meta == name)
                .map(|(_, help)| help.to_string())
                .ok_or_else(|| Fault::unknown_operation(name)),
            Some(Route::Device) => Ok(self.gate.capabilities().lookup(name)?.signature()),
            Some(Route::Extension) => self
                .extensions
                .help(name)
                .ok_or_else(|| Fault::unknown_operation(name)),
            None => Err(Fault::unknown_operation(name)),
        }
    }

    /// Run a call other than shutdown, which the server handles itself
    pub async fn dispatch(&self, name: &str, params: &[Json]) -> Result<Json, Fault> {
        log::debug!("Call to {}", name);
        match self.route(name) {
            Some(Route::Meta) => match name {
                LIST_METHODS => Ok(Json::from(self.list_methods())),
                METHOD_HELP => match params {
                    [Json::String(method)] => self.method_help(method).map(Json::String),
                    _ => Err(Fault::invalid_params("system.methodHelp takes one method name")),
                },
                _ => Err(Fault::unknown_operation(name)),
            },
            Some(Route::Device) => {
                let args = params_to_values(params)?;
                let value = self.gate.call(name, &args).await?;
                Ok(value_to_json(&value))
            }
            Some(Route::Extension) => self.extensions.call(name, params).await,
            None => Err(Fault::unknown_operation(name)),
        }
    }
}
