use super::error::{BackendError, BackendResult, ValidationDetails};
use regex::Regex;
use std::sync::LazyLock;

pub const POST_TITLE_MIN: usize = 3;
pub const POST_TITLE_MAX: usize = 255;
pub const POST_CONTENT_MIN: usize = 10;
pub const COMMENT_MAX: usize = 5000;
pub const PAGE_LIMIT_MAX: i64 = 100;
pub const PAGE_LIMIT_DEFAULT: i64 = 10;

/// Collects field errors so that all of them can be reported at once.
#[derive(Default)]
pub struct Validator {
    details: ValidationDetails,
}

impl Validator {
    pub fn check(&mut self, valid: bool, field: &str, message: impl Into<String>) -> &mut Self {
        if !valid && !self.details.contains_key(field) {
            self.details.insert(field.to_string(), message.into());
        }
        self
    }

    pub fn finish(&mut self) -> BackendResult<()> {
        if self.details.is_empty() {
            Ok(())
        } else {
            Err(BackendError::Validation(std::mem::take(&mut self.details)))
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn validate_post_title(validator: &mut Validator, title: &str) {
    let len = char_len(title.trim());
    validator.check(
        (POST_TITLE_MIN..=POST_TITLE_MAX).contains(&len),
        "title",
        format!("must be between {POST_TITLE_MIN} and {POST_TITLE_MAX} characters"),
    );
}

pub fn validate_post_content(validator: &mut Validator, content: &str) {
    validator.check(
        char_len(content.trim()) >= POST_CONTENT_MIN,
        "content",
        format!("must be at least {POST_CONTENT_MIN} characters"),
    );
}

pub fn validate_comment_content(content: &str) -> BackendResult<()> {
    let len = char_len(content.trim());
    Validator::default()
        .check(len >= 1, "content", "must not be empty")
        .check(
            len <= COMMENT_MAX,
            "content",
            format!("must be at most {COMMENT_MAX} characters"),
        )
        .finish()
}

/// Returns (page, limit) with defaults applied.
pub fn validate_pagination(page: Option<i64>, limit: Option<i64>) -> BackendResult<(i64, i64)> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(PAGE_LIMIT_DEFAULT);
    Validator::default()
        .check(page >= 1, "page", "must be at least 1")
        .check(
            (1..=PAGE_LIMIT_MAX).contains(&limit),
            "limit",
            format!("must be between 1 and {PAGE_LIMIT_MAX}"),
        )
        .finish()?;
    Ok((page, limit))
}

pub fn validate_optional_url(validator: &mut Validator, field: &str, url: &Option<String>) {
    #[expect(clippy::expect_used)]
    static URL_REGEX: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(https?://|/)[^\s]*$").expect("compile regex"));
    if let Some(url) = url {
        validator.check(
            url.is_empty() || URL_REGEX.is_match(url),
            field,
            "must be an absolute url or a path",
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate_post_fields() {
        let mut validator = Validator::default();
        validate_post_title(&mut validator, "ab");
        validate_post_content(&mut validator, "short");
        let Err(BackendError::Validation(details)) = validator.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(2, details.len());
        assert!(details.contains_key("title"));
        assert!(details.contains_key("content"));

        let mut validator = Validator::default();
        validate_post_title(&mut validator, "Привет Мир");
        validate_post_content(&mut validator, "Long enough content");
        assert!(validator.finish().is_ok());
    }

    #[test]
    fn test_validate_comment_content() {
        assert!(validate_comment_content("x").is_ok());
        assert!(validate_comment_content("   ").is_err());
        assert!(validate_comment_content(&"a".repeat(COMMENT_MAX)).is_ok());
        assert!(validate_comment_content(&"a".repeat(COMMENT_MAX + 1)).is_err());
    }

    #[test]
    fn test_validate_pagination() -> BackendResult<()> {
        assert_eq!((1, 10), validate_pagination(None, None)?);
        assert_eq!((3, 100), validate_pagination(Some(3), Some(100))?);
        assert!(validate_pagination(Some(0), None).is_err());
        assert!(validate_pagination(None, Some(101)).is_err());
        assert!(validate_pagination(None, Some(0)).is_err());
        Ok(())
    }

    #[test]
    fn test_validate_optional_url() {
        let mut validator = Validator::default();
        validate_optional_url(&mut validator, "photo_url", &Some("/uploads/a.png".to_string()));
        validate_optional_url(&mut validator, "cover_image", &Some("https://x.org/a".to_string()));
        validate_optional_url(&mut validator, "other", &None);
        assert!(validator.finish().is_ok());

        let mut validator = Validator::default();
        validate_optional_url(&mut validator, "photo_url", &Some("ftp://x".to_string()));
        assert!(validator.finish().is_err());
    }
}
