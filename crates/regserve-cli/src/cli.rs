use clap::{Arg, Command, ValueHint};
use std::path::PathBuf;

pub const DEFAULT_URL: &str = "http://localhost:8000";

pub fn build_cli() -> Command {
    Command::new("regserve")
        .version(clap::crate_version!())
        .author("regserve contributors")
        .about("Fit, persist and serve regression models over HTTP")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Run the model-serving HTTP server")
                .arg(
                    Arg::new("config")
                        .help("Path to a JSON server configuration file")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("host")
                        .long("host")
                        .help("Address to bind. Overrides the configuration file.")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::Hostname),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .help("Port to listen on. Overrides the configuration file.")
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(
                    Arg::new("model_dir")
                        .short('d')
                        .long("model-dir")
                        .help("Directory holding <id>.model files")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("fit_delay_secs")
                        .long("fit-delay-secs")
                        .help("Seconds to pause after every fit")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("drive")
                .about("Fit models concurrently against a running server, then exercise every endpoint")
                .arg(
                    Arg::new("url")
                        .short('u')
                        .long("url")
                        .help("Base URL of the server")
                        .default_value(DEFAULT_URL)
                        .value_hint(ValueHint::Url),
                )
                .arg(
                    Arg::new("models")
                        .short('n')
                        .long("models")
                        .help("Number of models to fit concurrently")
                        .default_value("2")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Written by {author-with-newline}Version {version}\n\n\
             {all-args}{after-help}",
        )
}
