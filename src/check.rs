// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

// This file handles the check subcommand
use log::{debug, error, info};
use std::{io, path::Path, process::Command, process::Stdio};

pub struct Dependency {
    pub value: String,
    pub dep_type: DependencyType,
    pub required: bool,
}

pub enum DependencyType {
    File,
    Env,
    Binary,
}

/// Basic health check of the environment: the distiller program and any
/// additional dependencies must be present.
pub fn do_check(distiller: &str, additional_deps: Option<Vec<Dependency>>) -> anyhow::Result<String> {
    let mut deps = vec![Dependency {
        value: distiller.to_string(),
        dep_type: DependencyType::Binary,
        required: true,
    }];
    if let Some(dependencies) = additional_deps {
        deps.extend(dependencies);
    }
    check_deps(deps)?;

    Ok("Ready to go".to_string())
}

pub fn check_deps(deps: Vec<Dependency>) -> anyhow::Result<()> {
    info!("Checking distiller dependencies ...");
    let mut err_found = false;
    let mut warn_found = false;
    for dep in deps {
        let missing = match dep.dep_type {
            DependencyType::Binary => check_binary(&dep),
            DependencyType::Env => match std::env::var(&dep.value) {
                Ok(s) if Path::new(&s).exists() => None,
                Ok(s) => Some(format!(
                    "{} variable points to non-existent file: {s}",
                    dep.value
                )),
                Err(_) => Some(format!("{} environment variable missing", dep.value)),
            },
            DependencyType::File => {
                if Path::new(&dep.value).exists() {
                    None
                } else {
                    Some(format!("{}: MISSING", dep.value))
                }
            }
        };
        match missing {
            None => info!("{}: found", dep.value),
            Some(message) => {
                log_warn_or_error(dep.required, &message);
                if dep.required {
                    err_found = true;
                } else {
                    warn_found = true;
                }
            }
        }
    }

    if warn_found {
        debug!("Some optional dependencies were not detected, this may result in loss of functionality")
    }
    if err_found {
        return Err(anyhow::anyhow!("Please resolve missing dependencies"));
    }

    Ok(())
}

fn check_binary(dep: &Dependency) -> Option<String> {
    match Command::new(&dep.value)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(mut child) => {
            // only the ability to start matters
            let _ = child.kill();
            let _ = child.wait();
            None
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Some(format!("{}: MISSING", dep.value))
        }
        Err(err) => Some(format!(
            "error executing dependency binary {}: {err}",
            dep.value
        )),
    }
}

fn log_warn_or_error(required: bool, message: &str) {
    if required {
        error!("REQUIRED {message}");
    } else {
        debug!("OPTIONAL {message}");
    }
}
