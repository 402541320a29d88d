//! HAProxy configuration synthesis.
//!
//! Output is a pure function of the snapshot and the build options. Option
//! lines are tab-indented and the text ends with a newline.

use std::collections::HashSet;

use crate::error::{LbaasError, LbaasResult};
use crate::model::{validate_address, validate_name, validate_port, ConfigSnapshot, Listener};

const GLOBAL_OPTIONS: &[&str] = &[
    "daemon",
    "user nobody",
    // group line is inserted here
    "log /dev/log local0",
    "log /dev/log local1 notice",
];

const DEFAULTS_OPTIONS: &[&str] = &[
    "log global",
    "retries 3",
    "option redispatch",
    "timeout connect 5000",
    "timeout client 50000",
    "timeout server 50000",
];

/// Knobs that are not part of the stored resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Unix group HAProxy drops privileges to.
    pub group: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            group: "nogroup".to_string(),
        }
    }
}

/// Render the full configuration file for a snapshot.
pub fn build_config(snapshot: &ConfigSnapshot, options: &BuildOptions) -> LbaasResult<String> {
    validate_name("group", &options.group)?;

    let mut lines = Vec::new();

    lines.push("global".to_string());
    lines.push(option(GLOBAL_OPTIONS[0]));
    lines.push(option(GLOBAL_OPTIONS[1]));
    lines.push(option(&format!("group {}", options.group)));
    lines.extend(GLOBAL_OPTIONS[2..].iter().map(|o| option(o)));

    lines.push("defaults".to_string());
    lines.extend(DEFAULTS_OPTIONS.iter().map(|o| option(o)));

    let mut names = HashSet::new();
    for listener in &snapshot.listeners {
        if !names.insert(listener.name.as_str()) {
            return Err(LbaasError::duplicate("listener", listener.name.clone()));
        }
        render_listen(listener, &mut lines)?;
    }

    let mut config = lines.join("\n");
    config.push('\n');
    Ok(config)
}

fn render_listen(listener: &Listener, lines: &mut Vec<String>) -> LbaasResult<()> {
    validate_name("listener name", &listener.name)?;
    validate_port("listener port", listener.port)?;

    lines.push(format!("listen {} 0.0.0.0:{}", listener.name, listener.port));
    lines.push(option(&format!("mode {}", listener.protocol)));
    lines.push(option("stats enable"));
    lines.push(option(&format!("balance {}", listener.algorithm)));
    lines.push(option("option httpclose"));

    let mut servers = HashSet::new();
    for member in &listener.members {
        validate_name("member name", &member.name)?;
        validate_address("member address", &member.address)?;
        validate_port("member port", member.port)?;
        if !servers.insert(member.name.as_str()) {
            return Err(LbaasError::duplicate("member", member.name.clone()));
        }
        lines.push(option(&format!(
            "server {} {}:{} check",
            member.name, member.address, member.port
        )));
    }
    Ok(())
}

fn option(text: &str) -> String {
    format!("\t{}", text)
}
