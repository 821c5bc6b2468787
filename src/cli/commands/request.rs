//! Request command - send an arbitrary API request

use super::session_client;
use crate::cli::args::RequestArgs;
use crate::config::Config;
use crate::error::FintrackResult;
use crate::http::{ApiRequest, Method};
use tracing::debug;

/// Execute the request command
pub async fn execute(args: RequestArgs, config: &Config) -> FintrackResult<()> {
    let request = build_request(args)?;
    debug!(
        "Sending {} {}",
        request.effective_method(),
        request.path
    );

    let reply = session_client(config).request(request).await?;
    println!("{}", reply);
    Ok(())
}

fn build_request(args: RequestArgs) -> FintrackResult<ApiRequest> {
    let method: Method = args.method.parse()?;
    let mut request = ApiRequest::new(args.path).method(method);

    if let Some(data) = args.data {
        request = match serde_json::from_str::<serde_json::Value>(&data) {
            Ok(value) => request.json(value),
            Err(_) => request.text(data),
        };
    }

    for (name, value) in args.headers {
        request = request.header(name, value);
    }
    for (name, value) in args.query {
        request = request.query(name, value);
    }

    Ok(request)
}
