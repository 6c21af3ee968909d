//! Tenant Authz CLI
//!
//! Evaluates access decisions and renders templates offline, against the same
//! configuration the middleware uses.

use axum::http::Method;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::process::ExitCode;
use tenant_authz::{
    AppError, Result,
    access_control::{BusinessContext, CheckAccess, Claims, CompareCtxInfo, render},
    config::{AppConfig, DEFAULT_SHAPE, LogFormat, load_config},
};
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tenant Authz - multi-tenant resource access control
#[derive(Parser, Debug)]
#[command(name = "tenant-authz")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TENANT_AUTHZ_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "TENANT_AUTHZ_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a request against a configured shape
    Check {
        /// Shape name from the configuration
        #[arg(long, default_value = DEFAULT_SHAPE)]
        shape: String,

        /// Verified token claims as a JSON object, or @path to a JSON file
        #[arg(long)]
        claims: String,

        /// HTTP method of the request
        #[arg(long, default_value = "GET")]
        method: String,

        /// Route path parameter (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Render a template against a business context and path parameters
    Render {
        /// Template text
        template: String,

        #[arg(long, default_value = "")]
        env: String,

        #[arg(long, default_value = "")]
        group: String,

        #[arg(long, default_value = "")]
        team: String,

        /// Scope entry (repeatable)
        #[arg(long = "scope")]
        scopes: Vec<String>,

        /// Path parameter (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

fn init_logging(config: &AppConfig, level: Option<&str>) {
    let level = level.unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn read_claims(arg: &str) -> Result<Claims> {
    let text = match arg.strip_prefix('@') {
        Some(path) => {
            let path = shellexpand::tilde(path);
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::Read {
                path: path.to_string(),
                source,
            })?
        }
        None => arg.to_string(),
    };
    serde_json::from_str(&text).map_err(AppError::Claims)
}

fn run_check(
    config: &AppConfig,
    shape: &str,
    claims: &str,
    method: &str,
    params: &[(String, String)],
) -> Result<ExitCode> {
    let Some(shape_config) = config.shape(shape) else {
        return Err(AppError::Invalid(format!("Unknown shape '{}'", shape)));
    };
    let check = CheckAccess::from_shape(&shape_config, &config.business_context)?;

    let claims = read_claims(claims)?;
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| AppError::Invalid(format!("Invalid HTTP method '{}'", method)))?;

    debug!(shape, method = %method, "Running access check");

    let (output, code) = match check.check(&claims, &method, params.iter().map(|(k, v)| (k, v))) {
        Ok(grant) => (
            json!({
                "decision": "allow",
                "client_type": grant.client_type,
                "request_type": grant.request_type,
                "prefix": grant.prefix,
                "context": grant.context,
            }),
            ExitCode::SUCCESS,
        ),
        Err(e) => (
            json!({
                "decision": "deny",
                "status": e.status().as_u16(),
                "body": e.to_string(),
            }),
            ExitCode::FAILURE,
        ),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(code)
}

fn run_render(
    template: &str,
    context: BusinessContext,
    params: &[(String, String)],
) -> Result<ExitCode> {
    let ctx = CompareCtxInfo::new(&context, params.iter().map(|(k, v)| (k, v)));
    let rendered = render(template, &ctx)?;
    println!("{}", rendered);
    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(args.config.as_deref())?;

    // Initialize logging
    init_logging(&config, args.log_level.as_deref());

    let result = match args.command {
        Command::Check {
            shape,
            claims,
            method,
            params,
        } => run_check(&config, &shape, &claims, &method, &params),
        Command::Render {
            template,
            env,
            group,
            team,
            scopes,
            params,
        } => run_render(
            &template,
            BusinessContext::new(env, group, team, scopes),
            &params,
        ),
    };

    let code = result.inspect_err(|e| error!(error = %e, "Command failed"))?;
    Ok(code)
}
