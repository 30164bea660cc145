//! 投递邮件的内容组装

use lesson_domain::entities::{StudentSnapshot, TeacherSnapshot, TestSnapshot};
use lesson_domain::ports::{MailAttachment, OutboundMail, RenderOptions};

const TEACHER_FALLBACK_NAME: &str = "your teacher";

pub(crate) fn teacher_name(teacher: Option<&TeacherSnapshot>) -> &str {
    teacher
        .map(|t| t.name.trim())
        .filter(|name| !name.is_empty())
        .unwrap_or(TEACHER_FALLBACK_NAME)
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// 文件名只保留字母数字，其余替换为连字符
pub(crate) fn document_file_name(stem: &str) -> String {
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    name = name.trim_matches('-').to_string();
    if name.is_empty() {
        name.push_str("document");
    }
    format!("{name}.pdf")
}

pub(crate) fn test_render_options(
    test: &TestSnapshot,
    student: &StudentSnapshot,
    metadata: &serde_json::Value,
) -> RenderOptions {
    RenderOptions {
        title: test.title.clone(),
        file_name: document_file_name(&test.title),
        language: student.language.clone(),
        level: student.level.clone(),
        metadata: metadata.clone(),
    }
}

pub(crate) fn lesson_topic_render_options(
    topic: &str,
    student: &StudentSnapshot,
    metadata: &serde_json::Value,
) -> RenderOptions {
    RenderOptions {
        title: topic.to_string(),
        file_name: document_file_name(&format!("next lesson {topic}")),
        language: student.language.clone(),
        level: student.level.clone(),
        metadata: metadata.clone(),
    }
}

pub(crate) fn lesson_topic_sheet(topic: &str, student: &StudentSnapshot) -> String {
    let mut sheet = format!("# {topic}\n");
    if let Some(language) = &student.language {
        sheet.push_str(&format!("\nLanguage: {language}"));
    }
    if let Some(level) = &student.level {
        sheet.push_str(&format!("\nLevel: {level}"));
    }
    sheet
}

pub(crate) fn test_mail(
    student: &StudentSnapshot,
    teacher: Option<&TeacherSnapshot>,
    test: &TestSnapshot,
    attachment: Option<MailAttachment>,
) -> OutboundMail {
    let teacher = teacher_name(teacher);
    let attachment_line = if attachment.is_some() {
        "The test is attached as a PDF."
    } else {
        "Your teacher will share the test material with you."
    };

    let body_text = format!(
        "Hello {},\n\n{} has sent you a new test: {}.\n{}\n\nGood luck!",
        student.name, teacher, test.title, attachment_line
    );
    let body_html = format!(
        "<p>Hello {},</p><p>{} has sent you a new test: <strong>{}</strong>.</p><p>{}</p><p>Good luck!</p>",
        escape_html(&student.name),
        escape_html(teacher),
        escape_html(&test.title),
        attachment_line
    );

    OutboundMail {
        to: student.email.clone(),
        subject: format!("New test: {}", test.title),
        body_text,
        body_html,
        attachment,
    }
}

pub(crate) fn lesson_topic_mail(
    student: &StudentSnapshot,
    teacher: Option<&TeacherSnapshot>,
    topic: &str,
    attachment: Option<MailAttachment>,
) -> OutboundMail {
    let teacher = teacher_name(teacher);
    let body_text = format!(
        "Hello {},\n\nIn your next lesson with {} you will work on: {}.\n\nSee you soon!",
        student.name, teacher, topic
    );
    let body_html = format!(
        "<p>Hello {},</p><p>In your next lesson with {} you will work on: <strong>{}</strong>.</p><p>See you soon!</p>",
        escape_html(&student.name),
        escape_html(teacher),
        escape_html(topic)
    );

    OutboundMail {
        to: student.email.clone(),
        subject: format!("Next lesson topic: {topic}"),
        body_text,
        body_html,
        attachment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_testing_utils::{student, teacher, test_snapshot};

    #[test]
    fn test_teacher_name_falls_back() {
        assert_eq!(teacher_name(None), TEACHER_FALLBACK_NAME);
        let mut t = teacher("teacher-1", "  ");
        assert_eq!(teacher_name(Some(&t)), TEACHER_FALLBACK_NAME);
        t.name = "Marta".into();
        assert_eq!(teacher_name(Some(&t)), "Marta");
    }

    #[test]
    fn test_document_file_name() {
        assert_eq!(document_file_name("Verbs quiz #2"), "Verbs-quiz--2.pdf");
        assert_eq!(document_file_name("***"), "document.pdf");
    }

    #[test]
    fn test_test_mail_addresses_student_and_escapes_html() {
        let s = student("student-1", "Ana <3");
        let mail = test_mail(&s, None, &test_snapshot("test-1", "Verbs & nouns"), None);
        assert_eq!(mail.to, s.email);
        assert_eq!(mail.subject, "New test: Verbs & nouns");
        assert!(mail.body_text.contains("Verbs & nouns"));
        assert!(mail.body_html.contains("Verbs &amp; nouns"));
        assert!(mail.body_html.contains("Ana &lt;3"));
        assert!(mail.attachment.is_none());
    }

    #[test]
    fn test_lesson_topic_mail_mentions_topic_and_teacher() {
        let s = student("student-1", "Ana");
        let t = teacher("teacher-1", "Marta");
        let mail = lesson_topic_mail(&s, Some(&t), "Past tense", None);
        assert!(mail.subject.contains("Past tense"));
        assert!(mail.body_text.contains("Marta"));
        assert!(mail.body_html.contains("<strong>Past tense</strong>"));
    }

    #[test]
    fn test_lesson_topic_sheet_includes_level() {
        let s = student("student-1", "Ana");
        let sheet = lesson_topic_sheet("Travel", &s);
        assert!(sheet.starts_with("# Travel"));
        assert!(sheet.contains("Level: B1"));
    }
}
