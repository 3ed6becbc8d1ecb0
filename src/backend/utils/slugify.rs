use regex::Regex;
use std::sync::LazyLock;

pub const SLUG_MAX_LEN: usize = 100;

fn transliterate(c: char) -> Option<&'static str> {
    let latin = match c.to_lowercase().next().unwrap_or(c) {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };
    Some(latin)
}

/// Converts a post title into a url-safe slug. Cyrillic is transliterated and spaces become
/// hyphens. Everything else outside of `[a-z0-9-]` is dropped, including tabs and newlines.
pub fn slugify(title: &str) -> String {
    #[expect(clippy::expect_used)]
    static INVALID_CHARS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9\-]+").expect("compile regex"));
    #[expect(clippy::expect_used)]
    static HYPHEN_RUNS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"-+").expect("compile regex"));

    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        match transliterate(c) {
            Some(latin) => slug.push_str(latin),
            None if c == ' ' => slug.push('-'),
            None => slug.extend(c.to_lowercase()),
        }
    }
    let slug = INVALID_CHARS.replace_all(&slug, "");
    let slug = HYPHEN_RUNS.replace_all(&slug, "-");
    let mut slug = slug.trim_matches('-').to_string();
    if slug.len() > SLUG_MAX_LEN {
        // only ascii is left at this point
        slug.truncate(SLUG_MAX_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    slug
}
