use anyhow::Result;
use clap::{Args, ValueEnum};
use config::HarnessConfig;

const MASK: &str = "********";

#[derive(Args)]
pub struct PrintConfigArgs {
    #[arg(long, value_enum, default_value = "toml", help = "Output format")]
    pub format: Format,

    #[arg(long, help = "Print the database password instead of a mask")]
    pub show_secrets: bool
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Toml,
    Yaml
}

fn render(config: &HarnessConfig, args: &PrintConfigArgs) -> Result<String> {
    let mut config = config.clone();
    if !args.show_secrets {
        config.database.password = MASK.to_string();
    }
    Ok(match args.format {
        Format::Toml => toml::to_string_pretty(&config)?,
        Format::Yaml => serde_yaml::to_string(&config)?
    })
}

pub fn run(args: PrintConfigArgs, config: &HarnessConfig) -> Result<()> {
    print!("{}", render(config, &args)?);
    Ok(())
}
