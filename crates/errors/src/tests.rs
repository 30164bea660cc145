#[cfg(test)]
mod error_tests {
    use crate::*;

    #[test]
    fn test_scheduler_error_display() {
        let db_op_error = SchedulerError::DatabaseOperation("Connection failed".to_string());
        assert_eq!(db_op_error.to_string(), "数据库操作错误: Connection failed");

        let task_error = SchedulerError::TaskNotFound { id: 123 };
        assert_eq!(task_error.to_string(), "计划任务未找到或无法取消: 123");

        let missing = SchedulerError::MissingData("test t-1".to_string());
        assert_eq!(missing.to_string(), "投递所需数据缺失: test t-1");

        let mail = SchedulerError::MailDispatch("relay refused".to_string());
        assert_eq!(mail.to_string(), "邮件发送失败: relay refused");

        let cron = SchedulerError::InvalidCron {
            expr: "bad".to_string(),
            message: "parse".to_string(),
        };
        assert_eq!(cron.to_string(), "无效的CRON表达式: bad - parse");
    }

    #[test]
    fn test_helper_constructors() {
        assert!(matches!(
            SchedulerError::task_not_found(7),
            SchedulerError::TaskNotFound { id: 7 }
        ));
        assert!(matches!(
            SchedulerError::validation_error("x"),
            SchedulerError::ValidationError(_)
        ));
        assert!(matches!(
            SchedulerError::missing_data("x"),
            SchedulerError::MissingData(_)
        ));
        assert!(matches!(
            SchedulerError::render_error("x"),
            SchedulerError::DocumentRender(_)
        ));
        assert!(matches!(
            SchedulerError::mail_error("x"),
            SchedulerError::MailDispatch(_)
        ));
        assert!(matches!(
            SchedulerError::database_error("x"),
            SchedulerError::DatabaseOperation(_)
        ));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(SchedulerError::missing_data("x").kind(), "missing_data");
        assert_eq!(SchedulerError::mail_error("x").kind(), "mail_dispatch");
        assert_eq!(SchedulerError::Timeout("x".into()).kind(), "timeout");
        assert_eq!(SchedulerError::task_not_found(1).kind(), "not_found");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: SchedulerError = json_err.into();
        assert!(matches!(err, SchedulerError::Serialization(_)));
    }
}
