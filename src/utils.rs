use std::{error::Error, time::Duration};

use crate::BYTES_PER_MB;

pub fn bytes_to_mb(bytes: f64) -> f64 {
    bytes / BYTES_PER_MB as f64
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = (total % 60) as f64 + f64::from(elapsed.subsec_millis()) / 1000.0;

    if hours > 0 {
        format!("{}h {}m {:.1}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {:.1}s", minutes, secs)
    } else {
        format!("{:.1}s", secs)
    }
}

/// Renders an error followed by each of its sources, separated by `": "`.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, thiserror::Error)]
    #[error("request failed")]
    struct Outer(#[source] io::Error);

    #[test]
    fn converts_bytes_to_megabytes() {
        assert_eq!(bytes_to_mb(1_572_864.0), 1.5);
    }

    #[test]
    fn formats_elapsed_time() {
        assert_eq!(format_elapsed(Duration::from_millis(4_300)), "4.3s");
        assert_eq!(format_elapsed(Duration::from_millis(65_500)), "1m 5.5s");
        assert_eq!(format_elapsed(Duration::from_secs(3_723)), "1h 2m 3.0s");
    }

    #[test]
    fn error_chain_includes_every_cause() {
        let err = Outer(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(error_chain(&err), "request failed: connection refused");
        assert_eq!(error_chain(&io::Error::other("plain")), "plain");
    }
}
