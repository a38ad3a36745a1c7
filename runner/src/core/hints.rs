//! Known fastlane failure signatures and their remediation hints.

use std::sync::LazyLock;

use regex::Regex;

struct Signature {
    pattern: Regex,
    hint: &'static str,
}

static SIGNATURES: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    vec![
        Signature {
            pattern: Regex::new(r"(?i)(session has expired|your session .*expired|FASTLANE_SESSION.*(invalid|expired))")
                .unwrap(),
            hint: "The Apple ID session expired. Regenerate it with `fastlane spaceauth` and update the session input, or switch to App Store Connect API key authentication.",
        },
        Signature {
            pattern: Regex::new(r"(?i)(two-factor|2fa|verification code).*(non-interactive|not supported|could not)").unwrap(),
            hint: "fastlane asked for a two-factor code in a non-interactive run. Provide a valid session or an App Store Connect API key.",
        },
        Signature {
            pattern: Regex::new(r"Could not find lane '([^']+)'").unwrap(),
            hint: "The requested lane does not exist in the Fastfile. Check the lane name and the working directory.",
        },
        Signature {
            pattern: Regex::new(r"(?i)Could not find gem '[^']+' in locally installed gems").unwrap(),
            hint: "Bundler could not find a locked gem. Make sure Gemfile.lock is committed and matches the Gemfile.",
        },
    ]
});

/// Return the hint for the first signature found in `output`.
pub fn failure_hint(output: &str) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|sig| sig.pattern.is_match(output))
        .map(|sig| sig.hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_expired_session() {
        let output = "[12:00:01]: Your session has expired. Please log in again.";
        let hint = failure_hint(output).expect("hint");
        assert!(hint.contains("spaceauth"));
    }

    #[test]
    fn detects_missing_lane() {
        let output = "[!] Could not find lane 'ios betaa'. Available lanes: ios beta";
        let hint = failure_hint(output).expect("hint");
        assert!(hint.contains("lane does not exist"));
    }

    #[test]
    fn unrelated_output_has_no_hint() {
        assert_eq!(failure_hint("error: build failed with exit code 65"), None);
    }
}
