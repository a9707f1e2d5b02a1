use crate::TAB_TITLE_MAX_CHARS;

/// Title derived from the first non-blank line of an AI prompt, whitespace collapsed and
/// truncated with an ellipsis.
pub fn derive_tab_title(prompt: &str) -> Option<String> {
    let line = prompt.lines().map(str::trim).find(|line| !line.is_empty())?;
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= TAB_TITLE_MAX_CHARS {
        return Some(collapsed);
    }

    let mut out: String = collapsed.chars().take(TAB_TITLE_MAX_CHARS).collect();
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('…');
    Some(out)
}
