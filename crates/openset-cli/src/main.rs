use std::path::PathBuf;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;

use openset_cli::evaluate::{default_config_json, run_evaluate, write_report, EvaluateOverrides};
use openset_eval::config::ExtractorKind;
use openset_eval::labels::UnknownClassSet;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("OPENSET_LOG", "error,openset=info"))
        .init();

    let matches = Command::new("openset")
        .version(clap::crate_version!())
        .about("Closed-set and open-set evaluation of image classifiers on CIFAR-100")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("evaluate")
                .about("Extract features and run the classifier roster")
                .arg(
                    Arg::new("data_dir")
                        .help("Directory holding the CIFAR-100 train.bin and test.bin files")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("extractor")
                        .short('e')
                        .long("extractor")
                        .help("Feature representation. Overrides the extractor in the config.")
                        .value_parser(["flatten", "prewitt", "hog"])
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("ood")
                        .long("ood")
                        .help("Fold the unknown classes into one unknown label (open-set mode).")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("unknown_classes")
                        .short('u')
                        .long("unknown-classes")
                        .help("Comma separated class indices treated as unknown, e.g. 0,10,20")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("coarse")
                        .long("coarse")
                        .help("Use the 20 CIFAR-100 superclasses instead of the 100 fine classes. With --ood, also pass --unknown-classes with indices below 20.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("shuffle")
                        .long("shuffle")
                        .help("Shuffle rows of both splits after feature extraction.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("Seed for shuffling and every randomized model.")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("abort_on_failure")
                        .long("abort-on-failure")
                        .help("Stop at the first classifier that fails instead of recording it.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("Path to the experiment JSON configuration file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help("Path to write the JSON report. The text table always goes to stdout.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(Command::new("config").about("Print the default experiment configuration as JSON"))
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("evaluate", sub_m)) => handle_evaluate(sub_m),
        Some(("config", _)) => {
            println!("{}", default_config_json()?);
            Ok(())
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_evaluate(matches: &ArgMatches) -> Result<()> {
    let data_dir: &PathBuf = matches
        .get_one("data_dir")
        .ok_or_else(|| anyhow::anyhow!("data_dir is required"))?;
    log::info!("[openset] Evaluating CIFAR-100 data in {:?}", data_dir);

    let extractor = matches
        .get_one::<String>("extractor")
        .map(|s| s.parse::<ExtractorKind>())
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let unknown_classes = matches
        .get_one::<String>("unknown_classes")
        .map(|s| s.parse::<UnknownClassSet>())
        .transpose()?;

    let overrides = EvaluateOverrides {
        extractor,
        open_set: matches.get_flag("ood"),
        unknown_classes,
        coarse_labels: matches.get_flag("coarse"),
        shuffle: matches.get_flag("shuffle"),
        seed: matches.get_one::<u64>("seed").copied(),
        abort_on_failure: matches.get_flag("abort_on_failure"),
    };

    let report = match run_evaluate(data_dir, matches.get_one::<PathBuf>("config"), &overrides) {
        Ok(report) => report,
        Err(e) => {
            log::error!("Evaluation failed: {:#}", e);
            std::process::exit(1)
        }
    };

    print!("{}", report);
    if let Some(output_path) = matches.get_one::<PathBuf>("output_file") {
        write_report(&report, output_path)?;
    }
    Ok(())
}
