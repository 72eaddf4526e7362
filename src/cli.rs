use clap::Parser;

/// Matchmaking engine for event operations.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable output for local development
    Pretty,
    /// One JSON object per line, for log aggregation
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_tracing_format() {
        let args = Args::parse_from(["matchmaker", "--tracing", "json"]);
        assert_eq!(args.tracing, TracingFormat::Json);
        let args = Args::parse_from(["matchmaker", "--tracing", "pretty"]);
        assert_eq!(args.tracing, TracingFormat::Pretty);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Args::try_parse_from(["matchmaker", "--tracing", "xml"]).is_err());
    }
}
