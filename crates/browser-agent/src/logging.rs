//! Tracing setup for the agent process.
//!
//! `RUST_LOG` wins when set. Otherwise the verbose flag picks the base
//! level and the browser protocol stack is pinned at warn, so skill and
//! session logs stay readable while a page is being driven.
//! `BROWSER_AGENT_LOG_FORMAT=pretty` switches the stderr output from the
//! compact single-line form to the multi-line form.

use tracing_subscriber::EnvFilter;

pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match std::env::var("BROWSER_AGENT_LOG_FORMAT").as_deref() {
        Ok("pretty") => builder.pretty().init(),
        _ => builder.compact().init(),
    }
}

fn default_filter(verbose: bool) -> EnvFilter {
    let base = if verbose { "debug" } else { "info" };
    // CDP message traffic is far too chatty below warn.
    EnvFilter::new(format!(
        "{base},chromiumoxide=warn,hyper=warn,tungstenite=warn"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_protocol_chatter() {
        let filter = default_filter(false).to_string();
        assert!(filter.contains("info"));
        assert!(filter.contains("chromiumoxide=warn"));

        let filter = default_filter(true).to_string();
        assert!(filter.contains("debug"));
    }
}
