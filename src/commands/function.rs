use super::emit;
use crate::Context;
use crate::cli::FnCommand;
use crate::config::ProviderConfig;
use crate::function::{HttpRequest, HttpRequestArgs, PathExists, PathOwner, PathPermission};
use crate::ownership;
use crate::progress;
use anyhow::{Result, anyhow};
use declarative::{ApplyContext, Function, FunctionError};

pub fn run(ctx: &Context, cmd: FnCommand) -> Result<()> {
    let apply_ctx = ApplyContext::default().with_cancel(ctx.cancel_token());
    match cmd {
        FnCommand::PathExists { path } => call(&PathExists, &apply_ctx, path),
        FnCommand::PathOwner { path } => call(&PathOwner::new(ownership::detect()), &apply_ctx, path),
        FnCommand::PathPermission { path } => call(&PathPermission, &apply_ctx, path),
        FnCommand::HttpRequest {
            url,
            method,
            body,
            headers,
        } => {
            let config = ProviderConfig::load_optional(&ctx.config_path()?)?;
            let function = HttpRequest::new(config.http_timeout());
            let args = HttpRequestArgs {
                url,
                method,
                request_body: body,
                headers: headers.into_iter().collect(),
            };
            let pb = (!ctx.quiet).then(|| progress::spinner(&format!("{} {}", args.method, args.url)));
            let result = function.call(&apply_ctx, args);
            if let Some(pb) = &pb {
                progress::finish_clear(pb);
            }
            let outcome = result.map_err(|e| function_error(function.name(), &e))?;
            emit(function.name(), &outcome)
        }
    }
}

fn call<F: Function>(function: &F, ctx: &ApplyContext, args: F::Args) -> Result<()> {
    log::debug!("Calling {}", function.name());
    let outcome = function
        .call(ctx, args)
        .map_err(|e| function_error(function.name(), &e))?;
    emit(function.name(), &outcome)
}

fn function_error(name: &str, error: &FunctionError) -> anyhow::Error {
    match error.argument {
        Some(position) => anyhow!("{name}: argument {position}: {}", error.message),
        None => anyhow!("{name}: {}", error.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_function_error_names_argument() {
        let err = function_error("path_owner", &FunctionError::argument(1, "Path cannot be empty"));
        assert_eq!(err.to_string(), "path_owner: argument 1: Path cannot be empty");

        let err = function_error("http_request", &FunctionError::general("operation canceled"));
        assert_eq!(err.to_string(), "http_request: operation canceled");
    }

    #[test]
    fn test_call_surfaces_argument_errors() {
        let err = call(&PathPermission, &ApplyContext::default(), String::new()).unwrap_err();
        assert!(err.to_string().starts_with("path_permission: argument 1"));
    }

    #[test]
    fn test_call_prints_result() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().to_string_lossy().into_owned();
        assert!(call(&PathExists, &ApplyContext::default(), path).is_ok());
    }
}
