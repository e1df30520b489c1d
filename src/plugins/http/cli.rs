use crate::plugins::registry::{CliPlugin, DriverContext};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

const HEADING: &str = "Direct media links";

/// Flags for links that point straight at a media file. Unset flags keep
/// the `DriverContext` defaults.
pub struct DirectMediaCliPlugin;

impl DirectMediaCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

/// `Name: value`, split at the first colon.
fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name missing in {:?}", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl CliPlugin for DirectMediaCliPlugin {
    fn name(&self) -> &'static str {
        "direct-media"
    }

    fn augment_download_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("media_header")
                .long("header")
                .help_heading(HEADING)
                .help("Request header sent when streaming a media file, e.g. 'Referer: https://site/'")
                .value_parser(parse_header)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("media_user_agent")
                .long("user-agent")
                .help_heading(HEADING)
                .help("User-Agent presented to the media host"),
        )
        .arg(
            Arg::new("media_timeout_secs")
                .long("timeout-secs")
                .help_heading(HEADING)
                .help("Give up when the host stays silent this long (default 60)")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("media_retries")
                .long("retries")
                .help_heading(HEADING)
                .help("Reconnect attempts before the first byte arrives (default 2)")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("media_retry_backoff_ms")
                .long("retry-backoff-ms")
                .help_heading(HEADING)
                .help("First reconnect delay, doubled on each attempt (default 400)")
                .value_parser(value_parser!(u64)),
        )
    }

    fn apply_download_matches(&self, matches: &ArgMatches, ctx: &mut DriverContext) -> anyhow::Result<()> {
        if let Some(ua) = matches.get_one::<String>("media_user_agent") {
            ctx.user_agent = ua.clone();
        }
        if let Some(secs) = matches.get_one::<u64>("media_timeout_secs") {
            ctx.timeout_secs = *secs;
        }
        if let Some(n) = matches.get_one::<u32>("media_retries") {
            ctx.retries = *n;
        }
        if let Some(ms) = matches.get_one::<u64>("media_retry_backoff_ms") {
            ctx.retry_backoff_ms = *ms;
        }
        if let Some(headers) = matches.get_many::<(String, String)>("media_header") {
            ctx.headers.extend(headers.cloned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        DirectMediaCliPlugin::new().augment_download_command(Command::new("download"))
    }

    #[test]
    fn unset_flags_keep_context_defaults() {
        let m = command().try_get_matches_from(["download"]).unwrap();
        let mut ctx = DriverContext::default();
        DirectMediaCliPlugin::new().apply_download_matches(&m, &mut ctx).unwrap();

        let defaults = DriverContext::default();
        assert_eq!(ctx.user_agent, defaults.user_agent);
        assert_eq!(ctx.timeout_secs, defaults.timeout_secs);
        assert!(ctx.headers.is_empty());
    }

    #[test]
    fn headers_keep_colons_in_values() {
        let m = command()
            .try_get_matches_from(["download", "--header", "Referer: https://site/a", "--timeout-secs", "9"])
            .unwrap();
        let mut ctx = DriverContext::default();
        DirectMediaCliPlugin::new().apply_download_matches(&m, &mut ctx).unwrap();
        assert_eq!(ctx.headers.get("Referer").map(String::as_str), Some("https://site/a"));
        assert_eq!(ctx.timeout_secs, 9);
    }

    #[test]
    fn malformed_values_are_rejected_while_parsing() {
        assert!(command().try_get_matches_from(["download", "--header", "no-colon"]).is_err());
        assert!(command().try_get_matches_from(["download", "--header", ": v"]).is_err());
        assert!(command().try_get_matches_from(["download", "--timeout-secs", "0"]).is_err());
        assert!(command().try_get_matches_from(["download", "--retries", "-1"]).is_err());
    }
}
