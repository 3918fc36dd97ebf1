#[cfg(test)]
mod cron_utils_tests {
    use scheduler_dispatcher::cron_utils::*;

    use chrono::{TimeZone, Timelike, Utc};
    use chrono_tz::{Europe, UTC};

    #[test]
    fn test_cron_scheduler_creation() {
        assert!(CronScheduler::new("0 0 * * *").is_ok());
        assert!(CronScheduler::new("@weekly").is_ok());
        assert!(CronScheduler::new("invalid").is_err());
        assert!(CronScheduler::new("0 0 32 * *").is_err());
        assert!(CronScheduler::new("@hourly").is_err());
    }

    #[test]
    fn test_is_due_matches_current_minute() {
        let scheduler = CronScheduler::new("*/15 * * * *").unwrap();

        let quarter = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 45).unwrap();
        assert!(scheduler.is_due(quarter, UTC));

        let later = Utc.with_ymd_and_hms(2024, 1, 1, 12, 31, 0).unwrap();
        assert!(!scheduler.is_due(later, UTC));
    }

    #[test]
    fn test_is_due_uses_timezone() {
        let scheduler = CronScheduler::new("0 9 * * *").unwrap();

        // 一月份巴黎为 UTC+1
        let paris_nine = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        assert!(scheduler.is_due(paris_nine, Europe::Paris));
        assert!(!scheduler.is_due(paris_nine, UTC));
    }

    #[test]
    fn test_day_of_week_follows_standard_numbering() {
        // 2024-01-01 是周一，2024-01-07 是周日
        let monday = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
        let sunday = Utc.with_ymd_and_hms(2024, 1, 7, 12, 0, 0).unwrap();

        let on_monday = CronScheduler::new("0 12 * * 1").unwrap();
        assert!(on_monday.is_due(monday, UTC));
        assert!(!on_monday.is_due(tuesday, UTC));

        for expression in ["0 12 * * 0", "0 12 * * 7"] {
            let on_sunday = CronScheduler::new(expression).unwrap();
            assert!(on_sunday.is_due(sunday, UTC));
            assert!(!on_sunday.is_due(monday, UTC));
        }

        let weekdays = CronScheduler::new("0 12 * * 1-5").unwrap();
        assert!(weekdays.is_due(tuesday, UTC));
        assert!(!weekdays.is_due(sunday, UTC));
    }

    #[test]
    fn test_restricted_day_fields_match_either() {
        let scheduler = CronScheduler::new("0 0 13 * 5").unwrap();

        // 2024-06-07 是周五，2024-06-13 是周四，2024-06-11 是周二
        let friday = Utc.with_ymd_and_hms(2024, 6, 7, 0, 0, 0).unwrap();
        let thirteenth = Utc.with_ymd_and_hms(2024, 6, 13, 0, 0, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap();

        assert!(scheduler.is_due(friday, UTC));
        assert!(scheduler.is_due(thirteenth, UTC));
        assert!(!scheduler.is_due(tuesday, UTC));

        let from = Utc.with_ymd_and_hms(2024, 6, 7, 12, 0, 0).unwrap();
        assert_eq!(
            scheduler.upcoming_times(from, UTC, 3),
            vec![
                thirteenth,
                Utc.with_ymd_and_hms(2024, 6, 14, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 6, 21, 0, 0, 0).unwrap(),
            ]
        );
        assert_eq!(scheduler.next_execution_time(from, UTC), Some(thirteenth));
    }

    #[test]
    fn test_macros_expand_for_due_check() {
        let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 10).unwrap();
        assert!(CronScheduler::new("@daily").unwrap().is_due(midnight, UTC));
        assert!(CronScheduler::new("@monthly").unwrap().is_due(midnight, UTC));
        assert!(!CronScheduler::new("@yearly").unwrap().is_due(midnight, UTC));
    }

    #[test]
    fn test_reboot_has_no_schedule() {
        let scheduler = CronScheduler::new("@reboot").unwrap();
        let now = Utc::now();

        assert!(scheduler.is_reboot());
        assert!(!scheduler.is_due(now, UTC));
        assert!(scheduler.next_execution_time(now, UTC).is_none());
    }

    #[test]
    fn test_next_execution_time() {
        let scheduler = CronScheduler::new("0 0 * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let next = scheduler.next_execution_time(now, UTC).unwrap();

        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_validate_cron_expression() {
        assert!(CronScheduler::validate_cron_expression("0 0 * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("*/5 * * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("0 9-17 * * 1-5").is_ok());
        assert!(CronScheduler::validate_cron_expression("invalid").is_err());
        assert!(CronScheduler::validate_cron_expression("0 0 0 * * *").is_err());
        assert!(CronScheduler::validate_cron_expression("").is_err());
    }

    #[test]
    fn test_upcoming_times() {
        let scheduler = CronScheduler::new("0 * * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let upcoming = scheduler.upcoming_times(now, UTC, 3);

        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].hour(), 13);
        assert_eq!(upcoming[1].hour(), 14);
        assert_eq!(upcoming[2].hour(), 15);
    }
}
