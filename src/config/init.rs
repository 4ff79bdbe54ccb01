// ABOUTME: Config scaffolding for new promotion pipelines.
// ABOUTME: Creates sfpromote.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config, EnvValue};

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(&Config::template());
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn env_ref(value: &EnvValue) -> String {
    match value {
        EnvValue::Literal(s) => format!("{:?}", s),
        EnvValue::FromEnv { var, default: None } => format!("{{ env: {} }}", var),
        EnvValue::FromEnv {
            var,
            default: Some(d),
        } => format!("{{ env: {}, default: {:?} }}", var, d),
    }
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

fn generate_template_yaml(config: &Config) -> String {
    let mut yaml = format!(
        r#"repository: {}
# Working copies, one per environment
workspace: {}
# Records, snapshots, and deploy lock files
state_dir: {}
api_version: "{}"
# Remote deploy calls exceeding this are reported as ambiguous failures
deploy_timeout: {}
# metadata_types:
#   - ApexClass
#   - CustomObject

environments:
"#,
        config.repository,
        config.workspace.display(),
        config.state_dir.display(),
        config.api_version,
        format_duration(config.deploy_timeout),
    );

    for (name, env) in &config.environments {
        yaml.push_str(&format!(
            r#"  {}:
    branch: {}
    host: {}
    username: {}
    password: {}
    security_token: {}
    push_remote: {}
"#,
            name,
            env.branch,
            env.host,
            env_ref(&env.username),
            env_ref(&env.password),
            env_ref(&env.security_token),
            env.push_remote,
        ));
    }

    yaml
}
