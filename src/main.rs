//! Driver for the loft transformation engine.
mod cmdline;

use cmdline::Opts;
use loft_ir::{parse_path, Dialect, Printer, Tree};
use loft_opt::{default_registry, TransformRegistry, TransformStep};
use loft_utils::{Error, LoftResult};
use std::fs::File;
use std::io;

fn main() {
    let opts: Opts = argh::from_env();
    if let Err(err) = run(opts) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> LoftResult<()> {
    // enable tracing
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    let registry = default_registry();
    if opts.list_passes {
        for (name, description) in registry.help() {
            println!("- {name}: {description}");
        }
        return Ok(());
    }

    let file = opts
        .file
        .ok_or_else(|| Error::invalid_file("no input file given"))?;
    let dialect = Dialect {
        case_sensitive: opts.case_sensitive,
    };
    let mut tree = parse_path(&file, &dialect)?;

    for step in &opts.steps {
        apply_step(&registry, &mut tree, step)?;
    }

    match &opts.output {
        Some(path) => {
            let mut out = File::create(path).map_err(Error::write_error)?;
            Printer::write_tree(&tree, &mut out)
                .map_err(Error::write_error)?;
        }
        None => {
            Printer::write_tree(&tree, &mut io::stdout().lock())
                .map_err(Error::write_error)?;
        }
    }
    Ok(())
}

/// Run one script step on the first node whose preconditions hold.
fn apply_step(
    registry: &TransformRegistry,
    tree: &mut Tree,
    step: &TransformStep,
) -> LoftResult<()> {
    if !registry.help().any(|(name, _)| name == step.name) {
        return Err(Error::transformation(
            &step.name,
            "unknown transformation",
        ));
    }
    let target = tree
        .walk(tree.root())
        .into_iter()
        .find(|n| {
            registry
                .validate(&step.name, tree, &[*n], &step.options)
                .is_ok()
        })
        .ok_or_else(|| {
            Error::transformation(
                &step.name,
                "no node in the tree satisfies the preconditions",
            )
        })?;
    log::info!("applying '{}' to {:?}", step.name, target);
    registry.apply(&step.name, tree, &[target], &step.options)
}
