use regex::Regex;
use std::sync::LazyLock;

static PORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"PORT=(\d+)").unwrap());

/// Extract the backend's announced port from one line of stdout.
///
/// The handshake token `PORT=<digits>` may appear anywhere in the line;
/// the backend's own logging shares the stream. Digit runs that don't fit
/// a TCP port are ignored.
pub fn try_extract_port(line: &str) -> Option<u16> {
    PORT_RE
        .captures(line)
        .and_then(|caps| caps[1].parse::<u16>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_token() {
        assert_eq!(try_extract_port("PORT=18080"), Some(18080));
    }

    #[test]
    fn extracts_with_surrounding_text() {
        assert_eq!(
            try_extract_port("2024-05-01 INFO uvicorn PORT=9001 bound"),
            Some(9001)
        );
    }

    #[test]
    fn first_match_wins_within_a_line() {
        assert_eq!(try_extract_port("PORT=1234 PORT=5678"), Some(1234));
    }

    #[test]
    fn unrelated_lines_yield_none() {
        assert_eq!(try_extract_port("booting..."), None);
        assert_eq!(try_extract_port("listening on port 8080"), None);
        assert_eq!(try_extract_port(""), None);
    }

    #[test]
    fn token_requires_digits() {
        assert_eq!(try_extract_port("PORT="), None);
        assert_eq!(try_extract_port("PORT=abc"), None);
    }

    #[test]
    fn out_of_range_port_is_ignored() {
        assert_eq!(try_extract_port("PORT=70000"), None);
        assert_eq!(try_extract_port("PORT=184467440737"), None);
    }
}
