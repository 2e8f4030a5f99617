use std::path::PathBuf;

use clap::Parser;
use swimbench::cli::Cli;

#[test]
fn test_parse_header_only() {
    let cli = Cli::try_parse_from(["swimbench", "--header", "include/configuration.h"]).unwrap();

    assert_eq!(cli.header, PathBuf::from("include/configuration.h"));
    assert!(cli.config.is_none());
}

#[test]
fn test_parse_with_config_file() {
    let cli = Cli::try_parse_from([
        "swimbench",
        "--header",
        "configuration.h",
        "--config",
        "campaign.yaml",
    ])
    .unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("campaign.yaml")));
}

#[test]
fn test_short_config_flag() {
    let cli =
        Cli::try_parse_from(["swimbench", "-c", "campaign.yaml", "--header", "configuration.h"])
            .unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("campaign.yaml")));
    assert_eq!(cli.header, PathBuf::from("configuration.h"));
}

#[test]
fn test_header_is_required() {
    let err = Cli::try_parse_from(["swimbench"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}

#[test]
fn test_unknown_flag_rejected() {
    assert!(Cli::try_parse_from(["swimbench", "--header", "h.h", "--members", "8"]).is_err());
}

#[test]
fn test_cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
