//! Per-application transformation options. Unrecognized keys are ignored so
//! that a script written for a newer engine still runs; type errors on keys
//! a transformation does read are reported against its name.
use linked_hash_map::LinkedHashMap;
use loft_utils::{Error, LoftResult};

#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl OptValue {
    /// Parse a raw option string: integer, then boolean, then plain text.
    pub fn parse(raw: &str) -> Self {
        if let Ok(v) = raw.parse::<i64>() {
            OptValue::Int(v)
        } else if let Ok(v) = raw.parse::<bool>() {
            OptValue::Bool(v)
        } else {
            OptValue::Str(raw.to_string())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    values: LinkedHashMap<String, OptValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: OptValue) {
        self.values.insert(key.to_string(), value);
    }

    pub fn with(mut self, key: &str, value: OptValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptValue> {
        self.values.get(key)
    }

    /// An integer option, or `default` when absent.
    pub fn get_int_or(
        &self,
        trans: &str,
        key: &str,
        default: i64,
    ) -> LoftResult<i64> {
        match self.values.get(key) {
            None => Ok(default),
            Some(OptValue::Int(v)) => Ok(*v),
            Some(other) => Err(Error::transformation(
                trans,
                format!("option '{key}' must be an integer, got {other:?}"),
            )),
        }
    }

    /// A strictly positive integer option, or `default` when absent.
    pub fn get_positive_int_or(
        &self,
        trans: &str,
        key: &str,
        default: i64,
    ) -> LoftResult<i64> {
        let v = self.get_int_or(trans, key, default)?;
        if v <= 0 {
            return Err(Error::transformation(
                trans,
                format!("option '{key}' must be a positive integer, got {v}"),
            ));
        }
        Ok(v)
    }

    pub fn get_bool_or(
        &self,
        trans: &str,
        key: &str,
        default: bool,
    ) -> LoftResult<bool> {
        match self.values.get(key) {
            None => Ok(default),
            Some(OptValue::Bool(v)) => Ok(*v),
            Some(other) => Err(Error::transformation(
                trans,
                format!("option '{key}' must be a boolean, got {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_type_errors() {
        let opts = Options::new()
            .with("blocksize", OptValue::Int(64))
            .with("flag", OptValue::Str("yes".into()));
        assert_eq!(opts.get_positive_int_or("t", "blocksize", 32).unwrap(), 64);
        assert_eq!(opts.get_positive_int_or("t", "missing", 32).unwrap(), 32);
        assert!(opts.get_bool_or("t", "flag", false).is_err());
        assert!(Options::new()
            .with("blocksize", OptValue::Int(0))
            .get_positive_int_or("t", "blocksize", 32)
            .unwrap_err()
            .is_transformation());
    }

    #[test]
    fn raw_values_parse_by_shape() {
        assert_eq!(OptValue::parse("12"), OptValue::Int(12));
        assert_eq!(OptValue::parse("true"), OptValue::Bool(true));
        assert_eq!(OptValue::parse("r0"), OptValue::Str("r0".into()));
    }
}
