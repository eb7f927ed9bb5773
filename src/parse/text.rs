// src/parse/text.rs
use once_cell::sync::OnceCell;
use regex::Regex;

/// Turn a scraped HTML fragment into plain tweet text.
pub fn clean_text(s: &str) -> String {
    // 1) Line breaks survive tag stripping
    static RE_BR: OnceCell<Regex> = OnceCell::new();
    let re_br = RE_BR.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
    let mut out = re_br.replace_all(s, "\n").to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Entity decode (after stripping, so `&lt;b&gt;` stays literal text)
    out = html_escape::decode_html_entities(&out).to_string();
    out = out.replace('\u{00A0}', " ");

    // 4) Collapse runs of spaces/tabs, keep single newlines
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[ \t\r\f]+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    static RE_NL: OnceCell<Regex> = OnceCell::new();
    let re_nl = RE_NL.get_or_init(|| Regex::new(r" ?\n ?(\n ?)*").unwrap());
    out = re_nl.replace_all(&out, "\n").to_string();

    out.trim().to_string()
}

/// Entity decode only, for attribute values (titles, hrefs).
pub fn decode_attr(s: &str) -> String {
    html_escape::decode_html_entities(s)
        .replace('\u{00A0}', " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_tags_and_decodes() {
        let s = "  gm&nbsp;<a href=\"/x\">@frens</a> &amp; &quot;wagmi&quot; &#39;ok&#39; &lt;3  ";
        assert_eq!(clean_text(s), "gm @frens & \"wagmi\" 'ok' <3");
    }

    #[test]
    fn clean_text_keeps_line_breaks() {
        assert_eq!(clean_text("line one<br>line two<br/><br />three"), "line one\nline two\nthree");
    }

    #[test]
    fn decode_attr_trims() {
        assert_eq!(decode_attr(" Alice &amp; Bob "), "Alice & Bob");
    }
}
