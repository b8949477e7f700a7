use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "imagegen", version, about = "Generate the images a slide deck asks for")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Deck JSON file to read.
    #[arg(long)]
    pub deck: String,

    /// Only process this slide.
    #[arg(long)]
    pub slide: Option<String>,

    /// Where to write the updated deck. Defaults to overwriting `--deck`.
    #[arg(long)]
    pub output: Option<String>,

    #[arg(long)]
    pub concurrency: Option<usize>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Disable the prompt cache for this run.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Regenerate interactive slots that already carry an image URL.
    #[arg(long, default_value_t = false)]
    pub regenerate_filled: bool,

    /// Hide the progress bar.
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(long)]
    pub prompt: String,

    #[arg(long, default_value_t = 800)]
    pub width: u32,

    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Overrides the configured model.
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate every missing image in a deck.
    Run(RunArgs),
    /// Issue a single generation call and print the URL.
    Generate(GenerateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let args = Args::try_parse_from([
            "imagegen",
            "run",
            "--deck",
            "deck.json",
            "--slide",
            "s1",
            "--concurrency",
            "2",
            "--no-cache",
        ])
        .unwrap();
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.deck, "deck.json");
        assert_eq!(run.slide.as_deref(), Some("s1"));
        assert_eq!(run.concurrency, Some(2));
        assert!(run.no_cache);
        assert!(!run.regenerate_filled);
        assert_eq!(run.max_retries, None);
    }

    #[test]
    fn test_parse_generate_defaults() {
        let args = Args::try_parse_from(["imagegen", "generate", "--prompt", "a cat"]).unwrap();
        let Commands::Generate(generate) = args.command else {
            panic!("expected generate");
        };
        assert_eq!(generate.prompt, "a cat");
        assert_eq!((generate.width, generate.height), (800, 600));
        assert_eq!(generate.model, None);
    }
}
