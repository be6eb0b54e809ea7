use argh::FromArgs;
use loft_opt::TransformStep;
use std::path::PathBuf;

/// Definition of the command line interface.
#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help"))]
/// The loft source-to-source transformation driver
pub struct Opts {
    /// input source file
    #[argh(positional)]
    pub file: Option<PathBuf>,

    /// output file, default is stdout
    #[argh(option, short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// transformation step to run, `name` or `name:key=val,key=val`;
    /// repeatable, applied in order
    #[argh(option, short = 'p', long = "pass")]
    pub steps: Vec<TransformStep>,

    /// list the available transformations and exit
    #[argh(switch, long = "list-passes")]
    pub list_passes: bool,

    /// keep the case of identifiers instead of folding to lowercase
    #[argh(switch, long = "case-sensitive")]
    pub case_sensitive: bool,

    /// set the logging level (off | error | warn | info | debug | trace)
    #[argh(option, long = "log-level", default = "log::LevelFilter::Warn")]
    pub log_level: log::LevelFilter,
}
