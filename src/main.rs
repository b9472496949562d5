use std::path::PathBuf;

use clap::Parser;
use tumble::{ViewerConfig, config::DEFAULT_SCENE, flow};

#[derive(Parser)]
#[command(name = "tumble", about = "Render spinning entities described by JSON files")]
struct Cli {
    /// Viewer configuration (JSON); missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entity descriptors, relative to the configured asset root
    descriptors: Vec<String>,
}

impl Cli {
    fn viewer_config(&self) -> anyhow::Result<ViewerConfig> {
        match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(ViewerConfig::from_json_str(&text)?)
            }
            None => Ok(ViewerConfig::default()),
        }
    }

    fn descriptor_paths(self) -> Vec<String> {
        if self.descriptors.is_empty() {
            DEFAULT_SCENE.iter().map(|path| path.to_string()).collect()
        } else {
            self.descriptors
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.viewer_config()?;
    flow::run(config, cli.descriptor_paths())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_render_the_bundled_scene() {
        let cli = Cli::try_parse_from(["tumble"]).unwrap();
        assert!(cli.config.is_none());
        assert_eq!(cli.viewer_config().unwrap(), ViewerConfig::default());
        assert_eq!(cli.descriptor_paths(), DEFAULT_SCENE);
    }

    #[test]
    fn descriptors_and_config_are_taken_as_given() {
        let cli = Cli::try_parse_from(["tumble", "--config", "viewer.json", "a.json", "b.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("viewer.json")));
        assert_eq!(cli.descriptor_paths(), ["a.json", "b.json"]);
    }

    #[test]
    fn config_flag_needs_a_value() {
        assert!(Cli::try_parse_from(["tumble", "--config"]).is_err());
    }
}
