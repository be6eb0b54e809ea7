//! Name-indexed registry of transformations, used by the driver to run
//! script steps without knowing the concrete types.
use super::{Named, Options, OptValue, Transformation};
use linked_hash_map::LinkedHashMap;
use loft_ir::{NodeId, Tree};
use loft_utils::{Error, LoftResult};
use std::str::FromStr;

type ValidateFn = Box<dyn Fn(&Tree, &[NodeId], &Options) -> LoftResult<()>>;
type ApplyFn = Box<dyn Fn(&mut Tree, &[NodeId], &Options) -> LoftResult<()>>;

struct Entry {
    validate: ValidateFn,
    apply: ApplyFn,
    description: &'static str,
}

/// One step of a transformation script: a registered name plus options.
/// Parsed from `name` or `name:key=val,key=val`.
#[derive(Debug, Clone)]
pub struct TransformStep {
    pub name: String,
    pub options: Options,
}

impl FromStr for TransformStep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, rest) = match s.split_once(':') {
            Some((name, rest)) => (name, Some(rest)),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(Error::parse_error("empty transformation name"));
        }
        let mut options = Options::new();
        if let Some(rest) = rest {
            for pair in rest.split(',') {
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    Error::parse_error(format!(
                        "malformed option '{pair}': expected key=value"
                    ))
                })?;
                options.set(key, OptValue::parse(value));
            }
        }
        Ok(TransformStep {
            name: name.to_string(),
            options,
        })
    }
}

#[derive(Default)]
pub struct TransformRegistry {
    entries: LinkedHashMap<String, Entry>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transformation under its [`Named::name`].
    pub fn register<T>(&mut self) -> LoftResult<()>
    where
        T: Transformation + Named + Default + 'static,
    {
        let name = T::name();
        if self.entries.contains_key(name) {
            return Err(Error::internal(format!(
                "transformation '{name}' is registered twice"
            )));
        }
        self.entries.insert(
            name.to_string(),
            Entry {
                validate: Box::new(|tree, targets, opts| {
                    T::default().validate(tree, targets, opts)
                }),
                apply: Box::new(|tree, targets, opts| {
                    T::default().apply(tree, targets, opts)
                }),
                description: T::description(),
            },
        );
        Ok(())
    }

    fn entry(&self, name: &str) -> LoftResult<&Entry> {
        self.entries.get(name).ok_or_else(|| {
            Error::transformation(name, "unknown transformation")
        })
    }

    pub fn validate(
        &self,
        name: &str,
        tree: &Tree,
        targets: &[NodeId],
        opts: &Options,
    ) -> LoftResult<()> {
        (self.entry(name)?.validate)(tree, targets, opts)
    }

    pub fn apply(
        &self,
        name: &str,
        tree: &mut Tree,
        targets: &[NodeId],
        opts: &Options,
    ) -> LoftResult<()> {
        log::debug!("applying '{name}' to {targets:?}");
        (self.entry(name)?.apply)(tree, targets, opts)
    }

    /// Registered names with their descriptions, in registration order.
    pub fn help(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.description))
    }
}

/// A registry holding every transformation this crate ships.
pub fn default_registry() -> TransformRegistry {
    let mut reg = TransformRegistry::new();
    reg.register::<crate::transforms::BlockLoop>()
        .expect("fresh registry");
    reg.register::<crate::transforms::LoopSwap>()
        .expect("fresh registry");
    reg.register::<crate::transforms::LoopTiling2D>()
        .expect("fresh registry");
    reg.register::<crate::transforms::AbsToCode>()
        .expect("fresh registry");
    reg.register::<crate::transforms::SignToCode>()
        .expect("fresh registry");
    reg.register::<crate::transforms::MinToCode>()
        .expect("fresh registry");
    reg.register::<crate::transforms::SumToCode>()
        .expect("fresh registry");
    reg.register::<crate::transforms::RegionExtract>()
        .expect("fresh registry");
    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_steps_with_and_without_options() {
        let step: TransformStep = "block-loop:blocksize=16".parse().unwrap();
        assert_eq!(step.name, "block-loop");
        assert_eq!(step.options.get("blocksize"), Some(&OptValue::Int(16)));

        let bare: TransformStep = "loop-swap".parse().unwrap();
        assert_eq!(bare.name, "loop-swap");
        assert!("loop-swap:oops".parse::<TransformStep>().is_err());
    }

    #[test]
    fn default_registry_lists_all_transforms() {
        let reg = default_registry();
        let names: Vec<_> = reg.help().map(|(n, _)| n.to_string()).collect();
        assert!(names.contains(&"block-loop".to_string()));
        assert!(names.contains(&"loop-tiling-2d".to_string()));
        assert!(names.contains(&"sum-to-code".to_string()));
        assert!(names.contains(&"extract-region".to_string()));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let reg = default_registry();
        let tree = Tree::new();
        assert!(reg
            .validate("nope", &tree, &[], &Options::new())
            .unwrap_err()
            .is_transformation());
    }
}
