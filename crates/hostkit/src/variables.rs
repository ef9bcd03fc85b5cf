//! Tool variables derived from the application definition.
//!
//! Every value is resolved for the host provider environment.

use crate::error::Result;
use crate::store::HostConfig;
use appdef::Definition;
use serde_json::{Map, Value, json};

fn get(definition: &Definition, section: &str, key: &str, env: Option<&str>) -> Result<Value> {
    Ok(serde_json::to_value(definition.get(section, key, env)?)?)
}

fn fpga_count(definition: &Definition, env: Option<&str>) -> Result<i64> {
    Ok(definition.get_i64("fpga", "count", env)?.unwrap_or(1))
}

/// Playbook variables.
pub fn ansible(config: &HostConfig, definition: &Definition) -> Result<Map<String, Value>> {
    let env = config.environment();
    let use_service = definition
        .get_bool("accelize_drm", "use_service", env)?
        .unwrap_or(true);
    let slots: Vec<i64> = (0..fpga_count(definition, env)?).collect();

    let mut variables = Map::new();
    variables.insert("fpga_image".into(), json!(definition.get_str_list("fpga", "image", env)?));
    variables.insert("fpga_driver".into(), get(definition, "fpga", "driver", env)?);
    variables.insert("fpga_driver_version".into(), get(definition, "fpga", "driver_version", env)?);
    variables.insert("fpga_slots".into(), json!(slots));
    variables.insert(
        "firewall_rules".into(),
        serde_json::to_value(definition.resolved("firewall_rules", env)?)?,
    );
    variables.insert("package_name".into(), get(definition, "package", "name", env)?);
    variables.insert("package_version".into(), get(definition, "package", "version", env)?);
    variables.insert("package_repository".into(), get(definition, "package", "repository", env)?);
    variables.insert("accelize_drm_disabled".into(), json!(!use_service));
    variables.insert(
        "accelize_drm_conf_src".into(),
        json!(config.drm_conf_path().to_string_lossy()),
    );
    variables.insert(
        "accelize_drm_cred_src".into(),
        json!(config.cred_path().to_string_lossy()),
    );
    Ok(variables)
}

/// Infrastructure variables.
pub fn terraform(config: &HostConfig, definition: &Definition) -> Result<Map<String, Value>> {
    let env = config.environment();
    let vm_image = match definition.get_str("package", "type", env)? {
        Some("vm_image") => definition.get_str("package", "name", env)?.unwrap_or_default(),
        _ => "",
    };

    let mut variables = Map::new();
    variables.insert(
        "firewall_rules".into(),
        serde_json::to_value(definition.resolved("firewall_rules", env)?)?,
    );
    variables.insert("fpga_count".into(), json!(fpga_count(definition, env)?));
    variables.insert("package_vm_image".into(), json!(vm_image));
    variables.insert("host_name".into(), json!(config.name()));
    variables.insert("host_provider".into(), json!(config.provider()));
    Ok(variables)
}

/// Image builder variables.
pub fn packer(config: &HostConfig, playbook_exec: &str) -> Map<String, Value> {
    let mut variables: Map<String, Value> = config
        .provider()
        .split(',')
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(i, token)| (format!("provider_param_{i}"), json!(token.trim())))
        .collect();
    variables.insert("image_name".into(), json!(config.name()));
    variables.insert("ansible".into(), json!(playbook_exec));
    variables
}
