// Status classification

use crate::monitor::types::CertificateStatus;
use chrono::{DateTime, Duration, Utc};

/// Classify a certificate by its expiry.
///
/// Expired strictly after `not_after`; expiring while `now + warning_threshold`
/// is past `not_after`; valid otherwise.
pub fn classify(
    not_after: DateTime<Utc>,
    now: DateTime<Utc>,
    warning_threshold: Duration,
) -> CertificateStatus {
    if now > not_after {
        return CertificateStatus::Expired;
    }

    match now.checked_add_signed(warning_threshold) {
        Some(horizon) if horizon > not_after => CertificateStatus::Expiring,
        Some(_) => CertificateStatus::Valid,
        // Threshold too large to represent: everything is inside it
        None => CertificateStatus::Expiring,
    }
}

/// Days until `not_after`, rounded to the nearest whole day
pub fn days_remaining(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (not_after - now).num_seconds();
    (secs as f64 / 86400.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_classify_boundaries() {
        let threshold = Duration::days(30);
        let now = now();

        assert_eq!(classify(now + Duration::days(60), now, threshold), CertificateStatus::Valid);
        assert_eq!(classify(now + Duration::days(10), now, threshold), CertificateStatus::Expiring);
        assert_eq!(classify(now - Duration::seconds(1), now, threshold), CertificateStatus::Expired);

        // Exactly at expiry the certificate is not yet expired
        assert_eq!(classify(now, now, threshold), CertificateStatus::Expiring);
        // Exactly at the threshold horizon it is still valid
        assert_eq!(classify(now + threshold, now, threshold), CertificateStatus::Valid);
        assert_eq!(
            classify(now + threshold - Duration::seconds(1), now, threshold),
            CertificateStatus::Expiring
        );
    }

    #[test]
    fn test_classify_zero_threshold() {
        let now = now();
        assert_eq!(classify(now, now, Duration::zero()), CertificateStatus::Valid);
        assert_eq!(
            classify(now - Duration::seconds(1), now, Duration::zero()),
            CertificateStatus::Expired
        );
    }

    #[test]
    fn test_classify_is_total_over_a_range() {
        let now = now();
        for offset_days in -400..400 {
            let not_after = now + Duration::days(offset_days);
            let status = classify(not_after, now, Duration::days(30));
            let expected = if offset_days < 0 {
                CertificateStatus::Expired
            } else if offset_days < 30 {
                CertificateStatus::Expiring
            } else {
                CertificateStatus::Valid
            };
            assert_eq!(status, expected, "offset {} days", offset_days);
        }
    }

    #[test]
    fn test_days_remaining_rounds() {
        let now = now();
        assert_eq!(days_remaining(now + Duration::days(10), now), 10);
        assert_eq!(days_remaining(now + Duration::hours(9 * 24 + 13), now), 10);
        assert_eq!(days_remaining(now + Duration::hours(9 * 24 + 11), now), 9);
        assert_eq!(days_remaining(now - Duration::days(2), now), -2);
    }
}
