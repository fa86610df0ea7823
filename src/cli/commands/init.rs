//! # Init Command Module / 初始化命令模块
//!
//! Creates a `Matrix.toml` for a project, either from the built-in template or
//! through an interactive wizard that asks for the package, the settings
//! module and the framework lines to test.
//!
//! 为项目创建 `Matrix.toml`：使用内置模板，或通过交互式向导询问包名、
//! 设置模块和要测试的框架版本线。

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect};
use std::fs;
use std::path::Path;

use crate::core::config::PipelineConfig;
use crate::core::models::Framework;
use crate::infra::t;

pub const CONFIG_FILE: &str = "Matrix.toml";

/// The pipeline written by `init --non-interactive`.
pub const DEFAULT_CONFIG: &str = r#"# matrix-ci pipeline / matrix-ci 流水线

[project]
package = "pinax"
settings_module = "pinax.stripe.tests.settings"

[matrix]
# Brace groups expand to one environment per alternative.
# 花括号组为每个备选项展开一个环境。
envlist = [
    "py27-dj{18,110,111}{,-pytest}",
    "py34-dj{18,110,111,20}",
    "py35-dj{18,110,111,20}",
    "py36-dj{111,20,master}",
    "py37-dj{111,20,master}",
    "py36-dj20-postgres",
]

[lint]
enabled = true

[migrations]
enabled = true
env = "py36-dj20"

[[services]]
name = "postgres"
flag = "postgres"
image = "circleci/postgres:9.6-alpine"
ports = ["5432:5432"]

[services.env]
POSTGRES_USER = "postgres"
POSTGRES_DB = "pinax_stripe"

[services.job_env]
PINAX_STRIPE_DATABASE_HOST = "127.0.0.1"
PINAX_STRIPE_DATABASE_NAME = "pinax_stripe"
PINAX_STRIPE_DATABASE_USER = "postgres"
"#;

/// Runs the interactive wizard (or writes the template) to create `Matrix.toml`
/// in the current directory.
///
/// 运行交互式向导（或写入模板）以在当前目录中创建 `Matrix.toml`。
pub fn run_init_wizard(language: &str, non_interactive: bool, force: bool) -> Result<()> {
    let config_path = Path::new(CONFIG_FILE);
    let theme = ColorfulTheme::default();

    if !non_interactive {
        println!("\n{}", t!("init_wizard_welcome", locale = language).cyan().bold());
        println!("{}", t!("init_wizard_description", locale = language));
    }

    if config_path.exists() && !force {
        if non_interactive {
            println!(
                "{}",
                t!("init_file_exists", locale = language, path = config_path.display()).red()
            );
            println!("{}", t!("init_use_force", locale = language).yellow());
            return Ok(());
        }
        let confirmation = Confirm::with_theme(&theme)
            .with_prompt(t!("init_overwrite_prompt", locale = language, path = config_path.display()))
            .default(false)
            .interact()
            .context(t!("init_user_confirmation_failed", locale = language).to_string())?;
        if !confirmation {
            println!("{}", t!("init_aborted", locale = language));
            return Ok(());
        }
    }

    if non_interactive {
        return write_config(config_path, DEFAULT_CONFIG, language);
    }

    // Interactive part starts here
    let mut config: PipelineConfig =
        toml::from_str(DEFAULT_CONFIG).context("Built-in template is invalid")?;

    let detected = detect_package_name(Path::new("setup.py"));
    if let Some(name) = &detected {
        println!("{}", t!("init_detected_package", locale = language, name = name.green()));
    }

    config.project.package = Input::with_theme(&theme)
        .with_prompt(t!("init_package_prompt", locale = language))
        .default(detected.unwrap_or_else(|| config.project.package.clone()))
        .interact_text()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

    config.project.settings_module = Input::with_theme(&theme)
        .with_prompt(t!("init_settings_prompt", locale = language))
        .default(format!("{}.tests.settings", config.project.package))
        .interact_text()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

    let labels: Vec<String> = Framework::ALL
        .iter()
        .map(|f| {
            let (name, constraint) = f.requirement();
            format!("{} ({name}{constraint})", f.factor())
        })
        .collect();
    let selections = MultiSelect::with_theme(&theme)
        .with_prompt(t!("init_framework_prompt", locale = language))
        .items(&labels)
        .defaults(&[true; Framework::ALL.len()])
        .interact()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

    if selections.is_empty() {
        println!("{}", t!("init_no_frameworks_selected", locale = language).yellow());
    } else {
        let frameworks: Vec<Framework> = selections.iter().map(|&i| Framework::ALL[i]).collect();
        config.matrix.envlist = envlist_for(&frameworks);
    }

    config.lint.enabled = Confirm::with_theme(&theme)
        .with_prompt(t!("init_lint_prompt", locale = language))
        .default(true)
        .interact()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

    config.migrations.enabled = Confirm::with_theme(&theme)
        .with_prompt(t!("init_migrations_prompt", locale = language))
        .default(true)
        .interact()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

    let toml_string = toml::to_string_pretty(&config)
        .context(t!("init_serialize_failed", locale = language).to_string())?;
    write_config(config_path, &toml_string, language)
}

/// One envlist entry per framework, covering the interpreters it supports.
pub fn envlist_for(frameworks: &[Framework]) -> Vec<String> {
    frameworks
        .iter()
        .map(|framework| {
            let versions: Vec<&str> = framework
                .supported_interpreters()
                .iter()
                .map(|i| i.factor().trim_start_matches("py"))
                .collect();
            format!("py{{{}}}-{}", versions.join(","), framework.factor())
        })
        .collect()
}

fn write_config(path: &Path, content: &str, language: &str) -> Result<()> {
    fs::write(path, content)
        .with_context(|| t!("init_write_failed", locale = language, path = path.display()))?;

    println!(
        "\n{} {}",
        "✔".green(),
        t!("init_success_created", locale = language, path = path.display()).bold()
    );
    println!("{}", t!("init_usage_hint", locale = language));

    Ok(())
}

/// Reads the distribution name from a `setup.py` `name="..."` argument.
fn detect_package_name(setup_py: &Path) -> Option<String> {
    let content = fs::read_to_string(setup_py).ok()?;
    content.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("name")?.trim_start().strip_prefix('=')?;
        let value = rest.trim().trim_end_matches(',').trim_matches(|c| c == '"' || c == '\'');
        let package = value.split('-').next()?;
        (!package.is_empty()).then(|| package.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matrix;

    #[test]
    fn default_config_is_valid() {
        let config: PipelineConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        config.validate().unwrap();
        let expansion = matrix::expand(
            &config.matrix.envlist,
            &config.matrix.include,
            &config.matrix.exclude,
        )
        .unwrap();
        assert_eq!(expansion.excluded, 0);
        assert!(expansion.tags.iter().any(|t| t.to_string() == "py27-dj18-pytest"));
        assert_eq!(config.services.len(), 1);
    }

    #[test]
    fn envlist_covers_supported_interpreters() {
        assert_eq!(
            envlist_for(&[Framework::Dj20, Framework::Master]),
            vec!["py{34,35,36,37}-dj20", "py{35,36,37}-djmaster"]
        );
    }

    #[test]
    fn package_name_is_read_from_setup_py() {
        let dir = tempfile::tempdir().unwrap();
        let setup = dir.path().join("setup.py");
        fs::write(&setup, "setup(\n    name=\"pinax-stripe\",\n    version=\"4.4.0\",\n)\n").unwrap();
        assert_eq!(detect_package_name(&setup).as_deref(), Some("pinax"));
    }
}
