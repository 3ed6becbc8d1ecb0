use regex::Regex;
use std::sync::LazyLock;

pub const WORDS_PER_MINUTE: usize = 200;

/// Estimated reading time in whole minutes, rounded up. Empty text takes zero minutes,
/// anything else at least one.
pub fn read_time_minutes(text: &str) -> i32 {
    let words = count_words(text);
    if words == 0 {
        return 0;
    }
    words.div_ceil(WORDS_PER_MINUTE).max(1) as i32
}

/// Same as [read_time_minutes], but ignores markdown syntax and code blocks.
pub fn markdown_read_time_minutes(markdown: &str) -> i32 {
    read_time_minutes(&strip_markdown(markdown))
}

fn count_words(text: &str) -> usize {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .count()
}

fn strip_markdown(markdown: &str) -> String {
    #[expect(clippy::expect_used)]
    static CODE_BLOCK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("compile regex"));
    #[expect(clippy::expect_used)]
    static IMAGE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("compile regex"));
    #[expect(clippy::expect_used)]
    static LINK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("compile regex"));

    let text = CODE_BLOCK.replace_all(markdown, " ");
    let text = IMAGE.replace_all(&text, " ");
    let text = LINK.replace_all(&text, "$1");
    text.replace(['#', '*'], " ")
}
