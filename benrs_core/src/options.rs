//! Typed solver options and their conversion into the solver's options record
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::configuration::configuration;
use crate::native::records::OptRecord;
use crate::native::Handle;

/// Keys understood by earlier command line front ends that no longer have an effect here
const LEGACY_KEYS: [&str; 6] = [
    "solution",
    "log_file",
    "logfile",
    "filename",
    "format",
    "vertex_enumeration",
];

/// Variant of a Benson phase
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlgVariant {
    /// Approximate the upper image (phase 2) or the recession cone (phase 1) from outside
    #[default]
    Primal,
    /// Approximate the lower image (phase 2) or the dual parameter set (phase 1) from outside
    Dual,
}

/// Requested LP method of a phase
///
/// The LP backend is an interior point method, the method is kept so that options round
/// trip and is reported in the logs.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LpMethod {
    PrimalSimplex,
    DualSimplex,
    DualPrimalSimplex,
    Auto,
}

/// A loosely typed option value, as read from a host dictionary
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionsError {
    #[error("option {key} expects {expected}, got {found:?}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: OptionValue,
    },
    #[error("option {key} has invalid value {value}")]
    InvalidValue { key: String, value: String },
    #[error("malformed options document: {0}")]
    Json(String),
}

/// Options controlling a solve
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SolverOptions {
    /// Skip phases 0 and 1, assuming the upper image has no other recession directions
    /// than the ordering cone
    pub bounded: bool,
    pub message_level: u8,
    pub lp_message_level: u8,
    pub alg_phase1: AlgVariant,
    pub alg_phase2: AlgVariant,
    pub lp_method_phase0: LpMethod,
    pub lp_method_phase1: LpMethod,
    pub lp_method_phase2: LpMethod,
    pub eps_phase0: f64,
    pub eps_phase1: f64,
    pub eps_benson_phase1: f64,
    pub eps_benson_phase2: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        let config = configuration();
        SolverOptions {
            bounded: false,
            message_level: config.message_level,
            lp_message_level: config.lp_message_level,
            alg_phase1: AlgVariant::Primal,
            alg_phase2: AlgVariant::Primal,
            lp_method_phase0: LpMethod::PrimalSimplex,
            lp_method_phase1: LpMethod::Auto,
            lp_method_phase2: LpMethod::Auto,
            eps_phase0: config.eps_phase0,
            eps_phase1: config.eps_phase1,
            eps_benson_phase1: config.eps_benson_phase1,
            eps_benson_phase2: config.eps_benson_phase2,
        }
    }
}

impl SolverOptions {
    /// Set a single option from a loosely typed value
    ///
    /// # Parameters
    /// - `key`: option name
    /// - `value`: new value
    ///
    /// # Returns
    /// `Ok(true)` when the option was set, `Ok(false)` when the key is not recognised and was
    /// ignored, or an [`OptionsError`] when a recognised key gets an unusable value
    pub fn set(&mut self, key: &str, value: OptionValue) -> Result<bool, OptionsError> {
        match key {
            "bounded" => self.bounded = as_bool(key, &value)?,
            "message_level" => self.message_level = as_level(key, &value)?,
            "lp_message_level" => self.lp_message_level = as_level(key, &value)?,
            "alg_phase1" => self.alg_phase1 = as_variant(key, &value)?,
            "alg_phase2" => self.alg_phase2 = as_variant(key, &value)?,
            "lp_method_phase0" => {
                let method = as_method(key, &value)?;
                if method == LpMethod::Auto {
                    return Err(invalid(key, &value));
                }
                self.lp_method_phase0 = method;
            }
            "lp_method_phase1" => self.lp_method_phase1 = as_method(key, &value)?,
            "lp_method_phase2" => self.lp_method_phase2 = as_method(key, &value)?,
            "eps_phase0" => self.eps_phase0 = as_eps(key, &value)?,
            "eps_phase1" => self.eps_phase1 = as_eps(key, &value)?,
            "eps_benson_phase1" => self.eps_benson_phase1 = as_eps(key, &value)?,
            "eps_benson_phase2" => self.eps_benson_phase2 = as_eps(key, &value)?,
            _ if LEGACY_KEYS.contains(&key) => {
                log::warn!("option {key} has no effect and is ignored");
                return Ok(false);
            }
            _ => {
                log::warn!("unrecognised option {key} ignored");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Defaults overridden by every entry of `map`, in order
    pub fn from_map(map: &IndexMap<String, OptionValue>) -> Result<Self, OptionsError> {
        let mut options = SolverOptions::default();
        for (key, value) in map {
            options.set(key, value.clone())?;
        }
        Ok(options)
    }

    /// Defaults overridden by the entries of a JSON object
    ///
    /// Unknown keys are warned about and ignored like in [`SolverOptions::set`].
    pub fn from_json(value: &serde_json::Value) -> Result<Self, OptionsError> {
        let object = value
            .as_object()
            .ok_or_else(|| OptionsError::Json("expected an object".to_string()))?;
        let mut map = IndexMap::new();
        for (key, entry) in object {
            let value = match entry {
                serde_json::Value::Bool(b) => OptionValue::Bool(*b),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => OptionValue::Int(i),
                    None => OptionValue::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
                serde_json::Value::String(s) => OptionValue::Text(s.clone()),
                other => return Err(OptionsError::Json(format!("unsupported value for {key}: {other}"))),
            };
            map.insert(key.clone(), value);
        }
        SolverOptions::from_map(&map)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// region Value conversion

fn wrong_type(key: &str, expected: &'static str, value: &OptionValue) -> OptionsError {
    OptionsError::WrongType {
        key: key.to_string(),
        expected,
        found: value.clone(),
    }
}

fn invalid(key: &str, value: &OptionValue) -> OptionsError {
    let value = match value {
        OptionValue::Bool(b) => b.to_string(),
        OptionValue::Int(i) => i.to_string(),
        OptionValue::Float(f) => f.to_string(),
        OptionValue::Text(s) => s.clone(),
    };
    OptionsError::InvalidValue {
        key: key.to_string(),
        value,
    }
}

fn as_bool(key: &str, value: &OptionValue) -> Result<bool, OptionsError> {
    match value {
        OptionValue::Bool(b) => Ok(*b),
        OptionValue::Int(0) => Ok(false),
        OptionValue::Int(1) => Ok(true),
        other => Err(wrong_type(key, "a boolean", other)),
    }
}

fn as_level(key: &str, value: &OptionValue) -> Result<u8, OptionsError> {
    match value {
        OptionValue::Int(i) => u8::try_from(*i).map_err(|_| invalid(key, value)),
        other => Err(wrong_type(key, "an integer", other)),
    }
}

fn as_eps(key: &str, value: &OptionValue) -> Result<f64, OptionsError> {
    let eps = match value {
        OptionValue::Float(f) => *f,
        OptionValue::Int(i) => *i as f64,
        other => return Err(wrong_type(key, "a number", other)),
    };
    if eps.is_finite() && eps > 0. {
        Ok(eps)
    } else {
        Err(invalid(key, value))
    }
}

fn as_text<'v>(key: &str, value: &'v OptionValue) -> Result<&'v str, OptionsError> {
    match value {
        OptionValue::Text(s) => Ok(s),
        other => Err(wrong_type(key, "a string", other)),
    }
}

fn as_variant(key: &str, value: &OptionValue) -> Result<AlgVariant, OptionsError> {
    match as_text(key, value)? {
        "primal" => Ok(AlgVariant::Primal),
        "dual" => Ok(AlgVariant::Dual),
        _ => Err(invalid(key, value)),
    }
}

fn as_method(key: &str, value: &OptionValue) -> Result<LpMethod, OptionsError> {
    match as_text(key, value)? {
        "primal_simplex" => Ok(LpMethod::PrimalSimplex),
        "dual_simplex" => Ok(LpMethod::DualSimplex),
        "dual_primal_simplex" => Ok(LpMethod::DualPrimalSimplex),
        "auto" => Ok(LpMethod::Auto),
        _ => Err(invalid(key, value)),
    }
}

// endregion

impl From<&SolverOptions> for OptRecord {
    fn from(options: &SolverOptions) -> Self {
        OptRecord {
            bounded: options.bounded,
            message_level: options.message_level,
            lp_message_level: options.lp_message_level,
            alg_phase1: options.alg_phase1,
            alg_phase2: options.alg_phase2,
            lp_method_phase0: options.lp_method_phase0,
            lp_method_phase1: options.lp_method_phase1,
            lp_method_phase2: options.lp_method_phase2,
            eps_phase0: options.eps_phase0,
            eps_phase1: options.eps_phase1,
            eps_benson_phase1: options.eps_benson_phase1,
            eps_benson_phase2: options.eps_benson_phase2,
        }
    }
}

/// Owns the options record handed to a solve
#[derive(Debug, Default)]
pub struct OptionsHandle {
    inner: Handle<OptRecord>,
}

impl OptionsHandle {
    pub fn new(options: &SolverOptions) -> Self {
        let mut inner: Handle<OptRecord> = Handle::new();
        *inner.get_or_init() = OptRecord::from(options);
        OptionsHandle { inner }
    }

    pub(crate) fn record(&self) -> Option<&OptRecord> {
        self.inner.get()
    }

    pub fn release(&mut self) {
        self.inner.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_configuration() {
        let options = SolverOptions::default();
        assert!(!options.bounded);
        assert_eq!(options.alg_phase1, AlgVariant::Primal);
        assert_eq!(options.lp_method_phase0, LpMethod::PrimalSimplex);
        assert_eq!(options.lp_method_phase2, LpMethod::Auto);
        assert!((options.eps_phase0 - 1e-8).abs() < 1e-20);
        assert!((options.eps_benson_phase2 - 1e-7).abs() < 1e-20);
    }

    #[test]
    fn set_known_keys() {
        let mut options = SolverOptions::default();
        assert!(options.set("bounded", true.into()).unwrap());
        assert!(options.set("alg_phase2", "dual".into()).unwrap());
        assert!(options.set("lp_method_phase1", "dual_simplex".into()).unwrap());
        assert!(options.set("eps_phase1", OptionValue::Float(1e-6)).unwrap());
        assert!(options.set("message_level", 0i64.into()).unwrap());
        assert!(options.bounded);
        assert_eq!(options.alg_phase2, AlgVariant::Dual);
        assert_eq!(options.lp_method_phase1, LpMethod::DualSimplex);
        assert!((options.eps_phase1 - 1e-6).abs() < 1e-20);
        assert_eq!(options.message_level, 0);
    }

    #[test]
    fn unknown_and_legacy_keys_are_ignored() {
        let mut options = SolverOptions::default();
        assert!(!options.set("solution", true.into()).unwrap());
        assert!(!options.set("not_an_option", 3i64.into()).unwrap());
        assert_eq!(options, SolverOptions::default());
    }

    #[test]
    fn bad_values() {
        let mut options = SolverOptions::default();
        match options.set("alg_phase1", 1i64.into()) {
            Err(OptionsError::WrongType { key, .. }) => assert_eq!(key, "alg_phase1"),
            _ => panic!("Integer algorithm variant accepted"),
        }
        assert!(options.set("alg_phase1", "sideways".into()).is_err());
        assert!(options.set("lp_method_phase0", "auto".into()).is_err());
        assert!(options.set("eps_phase0", (-1.).into()).is_err());
        assert!(options.set("message_level", 300i64.into()).is_err());
    }

    #[test]
    fn json_round_trip() {
        let json = serde_json::json!({
            "alg_phase1": "dual",
            "lp_method_phase2": "dual_primal_simplex",
            "eps_benson_phase1": 1e-5,
            "log_file": "out.log"
        });
        let options = SolverOptions::from_json(&json).unwrap();
        assert_eq!(options.alg_phase1, AlgVariant::Dual);
        assert_eq!(options.lp_method_phase2, LpMethod::DualPrimalSimplex);
        let dumped = options.to_json();
        assert_eq!(dumped["alg_phase1"], "dual");
        assert_eq!(dumped["lp_method_phase2"], "dual_primal_simplex");
        let parsed: SolverOptions = serde_json::from_value(dumped).unwrap();
        assert_eq!(parsed, options);
        assert!(SolverOptions::from_json(&serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn options_record() {
        let mut options = SolverOptions::default();
        options.bounded = true;
        let mut handle = OptionsHandle::new(&options);
        assert!(handle.record().unwrap().bounded);
        handle.release();
        assert!(handle.record().is_none());
    }
}
