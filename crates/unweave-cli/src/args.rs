use std::path::PathBuf;

use clap::Parser;

/// CLI arguments for the unweave binary.
#[derive(Parser, Debug)]
#[command(
    name = "unweave",
    version,
    about = "Unweave obfuscated JavaScript into readable source"
)]
pub struct CliArgs {
    /// Input script to deobfuscate.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Remove dead nodes after deobfuscation.
    #[arg(short = 'c', long = "clean")]
    pub clean: bool,

    /// Suppress all output except errors.
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show debug-level pass logs.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Maximum number of deobfuscation iterations.
    #[arg(
        short = 'm',
        long = "max-iterations",
        value_name = "N",
        default_value_t = 100
    )]
    pub max_iterations: u32,

    /// Output filename (defaults to `<input>-deob.js`).
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl CliArgs {
    /// The effective output path.
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => {
                let stem = self
                    .input
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("out");
                self.input.with_file_name(format!("{stem}-deob.js"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_name() {
        let args = CliArgs::parse_from(["unweave", "sample.js"]);
        assert_eq!(args.output_path(), PathBuf::from("sample-deob.js"));
        assert_eq!(args.max_iterations, 100);
        assert!(!args.clean);
    }

    #[test]
    fn test_explicit_output() {
        let args = CliArgs::parse_from(["unweave", "sample.js", "-o", "out.js"]);
        assert_eq!(args.output_path(), PathBuf::from("out.js"));
        // Equals syntax works too.
        let args = CliArgs::parse_from(["unweave", "sample.js", "--output=other.js"]);
        assert_eq!(args.output_path(), PathBuf::from("other.js"));
    }

    #[test]
    fn test_max_iterations_both_syntaxes() {
        let args = CliArgs::parse_from(["unweave", "a.js", "-m", "10"]);
        assert_eq!(args.max_iterations, 10);
        let args = CliArgs::parse_from(["unweave", "a.js", "--max-iterations=7"]);
        assert_eq!(args.max_iterations, 7);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["unweave", "a.js", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_input_is_required() {
        assert!(CliArgs::try_parse_from(["unweave"]).is_err());
    }
}
