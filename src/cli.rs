//! # Command Line Interface / 命令行接口
//!
//! Builds the `clap` command tree with localized help text and dispatches to
//! the `run`, `plan` and `init` commands.
//!
//! 使用本地化帮助文本构建 `clap` 命令树，并分派到 `run`、`plan` 和 `init` 命令。

pub mod commands;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf};
use tracing_subscriber::EnvFilter;

use crate::infra::t;
use commands::{plan::PlanFormat, run::RunOptions};

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` or `--lang=<VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--lang") {
        return args.get(pos + 1).cloned();
    }
    args.iter()
        .find_map(|arg| arg.strip_prefix("--lang="))
        .map(str::to_string)
}

fn config_arg(locale: &str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help(t!("arg_config", locale = locale).to_string())
        .value_name("CONFIG")
        .default_value("Matrix.toml")
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn project_dir_arg(locale: &str) -> Arg {
    Arg::new("project-dir")
        .long("project-dir")
        .help(t!("arg_project_dir", locale = locale).to_string())
        .value_name("PROJECT_DIR")
        .default_value(".")
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("matrix-ci")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help(t!("cli_verbose", locale = locale).to_string())
                .global(true)
                .action(ArgAction::Count),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cmd_run_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(project_dir_arg(locale))
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("only")
                        .long("only")
                        .help(t!("arg_only", locale = locale).to_string())
                        .value_name("JOB")
                        .num_args(1..)
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("total-runners")
                        .long("total-runners")
                        .help(t!("arg_total_runners", locale = locale).to_string())
                        .value_name("TOTAL_RUNNERS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("runner-index"),
                )
                .arg(
                    Arg::new("runner-index")
                        .long("runner-index")
                        .help(t!("arg_runner_index", locale = locale).to_string())
                        .value_name("RUNNER_INDEX")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set)
                        .requires("total-runners"),
                )
                .arg(
                    Arg::new("no-upload")
                        .long("no-upload")
                        .help(t!("arg_no_upload", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no-services")
                        .long("no-services")
                        .help(t!("arg_no_services", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help(t!("arg_json", locale = locale).to_string())
                        .value_name("JSON")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about(t!("cmd_plan_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(project_dir_arg(locale))
                .arg(
                    Arg::new("format")
                        .long("format")
                        .help(t!("arg_format", locale = locale).to_string())
                        .value_name("FORMAT")
                        .value_parser(["text", "json"])
                        .default_value("text")
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("arg_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
}

/// Installs the diagnostic log subscriber: 0 = warn, 1 = info, 2+ = debug.
/// Logs go to stderr so they never mix with report output.
fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::new("matrix_ci=warn"),
        1 => EnvFilter::new("matrix_ci=info"),
        _ => EnvFilter::new("matrix_ci=debug"),
    };
    // A second initialization (e.g. in tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}

fn path_arg(matches: &ArgMatches, id: &str) -> PathBuf {
    matches.get_one::<PathBuf>(id).cloned().unwrap_or_default()
}

pub async fn run() -> Result<()> {
    // Pre-parse language and initialize i18n first.
    let requested_lang = pre_parse_language();
    let language = match &requested_lang {
        Some(lang) => crate::resolve_locale(lang),
        None => rust_i18n::locale().to_string(),
    };
    rust_i18n::set_locale(&language);

    let matches = build_cli(&language).get_matches();
    init_tracing(matches.get_count("verbose"));

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let options = RunOptions {
                jobs: run_matches.get_one::<usize>("jobs").copied(),
                config: path_arg(run_matches, "config"),
                project_dir: path_arg(run_matches, "project-dir"),
                only: run_matches
                    .get_many::<String>("only")
                    .map(|names| names.cloned().collect())
                    .unwrap_or_default(),
                total_runners: run_matches.get_one::<usize>("total-runners").copied(),
                runner_index: run_matches.get_one::<usize>("runner-index").copied(),
                upload: !run_matches.get_flag("no-upload"),
                services: !run_matches.get_flag("no-services"),
                html: run_matches.get_one::<PathBuf>("html").cloned(),
                json: run_matches.get_one::<PathBuf>("json").cloned(),
                lang: requested_lang,
            };
            commands::run::execute(options).await?;
        }
        Some(("plan", plan_matches)) => {
            let format = match plan_matches.get_one::<String>("format").map(String::as_str) {
                Some("json") => PlanFormat::Json,
                _ => PlanFormat::Text,
            };
            commands::plan::execute(
                &path_arg(plan_matches, "config"),
                &path_arg(plan_matches, "project-dir"),
                format,
                &language,
            )?;
        }
        Some(("init", init_matches)) => {
            let non_interactive = init_matches.get_flag("non-interactive");
            let force = init_matches.get_flag("force");

            // Show language detection message if it was auto-detected
            if requested_lang.is_none() && !non_interactive {
                println!(
                    "{}",
                    t!("system_language_detected", locale = &language, lang = &language)
                );
            }
            commands::init::run_init_wizard(&language, non_interactive, force)?;
        }
        _ => {
            // subcommand_required makes clap print help and exit before this.
        }
    }
    Ok(())
}
