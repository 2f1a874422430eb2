//! Folding of visually confusable characters to ASCII.
//!
//! Only non-ASCII characters are touched: digits and ASCII letters that merely
//! resemble other letters (`1` for `l`, `0` for `o`) are left for the edit
//! distance signals to pick up.

/// Maps every confusable character in `input` to its closest ASCII form.
pub fn fold(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        match fold_char(c) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

/// Returns `true` if `input` contains at least one foldable character.
pub fn has_confusables(input: &str) -> bool {
    input.chars().any(|c| !c.is_ascii() && fold_char(c).is_some())
}

fn fold_char(c: char) -> Option<&'static str> {
    // Fullwidth ASCII block.
    if ('\u{FF01}'..='\u{FF5E}').contains(&c) {
        return FULLWIDTH.get((c as u32 - 0xFF01) as usize).copied();
    }

    let folded = match c {
        // Cyrillic
        'а' | 'А' => "a",
        'в' | 'В' => "b",
        'ь' | 'Ь' => "b",
        'с' | 'С' | 'ϲ' => "c",
        'ԁ' => "d",
        'е' | 'Е' | 'ё' | 'Ё' => "e",
        'һ' | 'Һ' => "h",
        'і' | 'І' | 'ї' | 'Ї' => "i",
        'ј' | 'Ј' => "j",
        'к' | 'К' => "k",
        'ӏ' | 'Ӏ' => "l",
        'м' | 'М' => "m",
        'н' | 'Н' => "h",
        'о' | 'О' => "o",
        'р' | 'Р' => "p",
        'ԛ' | 'Ԛ' => "q",
        'ѕ' | 'Ѕ' => "s",
        'т' | 'Т' => "t",
        'у' | 'У' | 'ү' | 'Ү' => "y",
        'ԝ' | 'Ԝ' => "w",
        'х' | 'Х' => "x",
        // Greek
        'α' | 'Α' => "a",
        'β' | 'Β' => "b",
        'ε' | 'Ε' => "e",
        'η' | 'Η' => "n",
        'ι' | 'Ι' => "i",
        'κ' | 'Κ' => "k",
        'μ' | 'Μ' => "m",
        'ν' | 'Ν' => "v",
        'ο' | 'Ο' => "o",
        'ρ' | 'Ρ' => "p",
        'τ' | 'Τ' => "t",
        'υ' | 'Υ' => "u",
        'χ' | 'Χ' => "x",
        'ω' => "w",
        'ζ' | 'Ζ' => "z",
        // Latin look-alikes and IPA
        'ɑ' | 'ɐ' => "a",
        'ƅ' => "b",
        'ɗ' | 'ɖ' => "d",
        'ɡ' | 'ɢ' => "g",
        'ı' | 'ɩ' | 'ɪ' => "i",
        'ȷ' => "j",
        'ĸ' => "k",
        'ł' | 'ŀ' | 'ʟ' => "l",
        'ɴ' | 'ŉ' => "n",
        'ø' | 'ɵ' | 'ᴏ' => "o",
        'ʀ' => "r",
        'ʂ' => "s",
        'ᴜ' | 'ʋ' => "u",
        'ᴠ' => "v",
        'ᴡ' => "w",
        'ʏ' => "y",
        'ᴢ' | 'ʐ' => "z",
        // Latin-1 and Latin Extended-A accented letters
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ō' | 'ŏ' | 'ő' => "o",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ţ' | 'ť' | 'ŧ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        // Ligatures
        'æ' => "ae",
        'œ' => "oe",
        'ß' => "ss",
        'ﬀ' => "ff",
        'ﬁ' => "fi",
        'ﬂ' => "fl",
        // Dashes and dots
        '‐' | '‑' | '‒' | '–' | '—' | '−' => "-",
        '․' | '。' | '｡' => ".",
        _ => return None,
    };
    Some(folded)
}

const FULLWIDTH: [&str; 94] = [
    "!", "\"", "#", "$", "%", "&", "'", "(", ")", "*", "+", ",", "-", ".", "/", "0", "1", "2",
    "3", "4", "5", "6", "7", "8", "9", ":", ";", "<", "=", ">", "?", "@", "a", "b", "c", "d",
    "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v",
    "w", "x", "y", "z", "[", "\\", "]", "^", "_", "`", "a", "b", "c", "d", "e", "f", "g", "h",
    "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z",
    "{", "|", "}", "~",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_cyrillic_lookalikes() {
        assert_eq!(fold("\u{0440}\u{0430}\u{0443}\u{0440}\u{0430}l"), "paypal");
        assert_eq!(fold("\u{0430}\u{0440}\u{0440}l\u{0435}"), "apple");
    }

    #[test]
    fn test_fold_leaves_ascii_untouched() {
        assert_eq!(fold("paypa1-secure"), "paypa1-secure");
        assert_eq!(fold("g00gle.login"), "g00gle.login");
    }

    #[test]
    fn test_fold_fullwidth_and_accents() {
        assert_eq!(fold("\u{FF50}\u{FF41}\u{FF59}\u{FF50}\u{FF41}\u{FF4C}"), "paypal");
        assert_eq!(fold("p\u{00E0}yp\u{00E4}l"), "paypal");
        assert_eq!(fold("\u{FB01}nance"), "finance");
    }

    #[test]
    fn test_has_confusables() {
        assert!(has_confusables("g\u{03BF}ogle"));
        assert!(!has_confusables("google"));
        assert!(!has_confusables("日本"));
    }
}
