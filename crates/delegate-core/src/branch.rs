use chrono::{DateTime, SecondsFormat, Utc};

pub const BRANCH_PREFIX: &str = "copilot/delegate-";

/// Branch name for a run started at `now`.
///
/// The timestamp is ISO 8601 with millisecond precision, with `:` and `.`
/// replaced by `-` so the result is a valid ref name.
pub fn branch_name(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{BRANCH_PREFIX}{stamp}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_is_made_ref_safe() {
        let now = Utc
            .with_ymd_and_hms(2026, 10, 19, 8, 15, 30)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(123))
            .unwrap();
        assert_eq!(
            branch_name(now),
            "copilot/delegate-2026-10-19T08-15-30-123Z"
        );
    }

    #[test]
    fn whole_seconds_keep_millisecond_field() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(branch_name(now), "copilot/delegate-2026-01-02T03-04-05-000Z");
    }

    #[test]
    fn name_has_no_forbidden_ref_characters() {
        let name = branch_name(Utc::now());
        assert!(name.starts_with(BRANCH_PREFIX));
        assert!(!name.contains(':'));
        assert!(!name.contains('.'));
    }
}
