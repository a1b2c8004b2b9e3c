/// Renders a TOML error with the position and text of the offending span.
pub fn human_toml_error(file_path: &str, src: &str, e: toml::de::Error) -> String {
    let msg = e.message();
    let Some(span) = e.span() else {
        return format!("{msg}\nFile `{file_path}`");
    };
    let before = src.get(..span.start).unwrap_or(src);
    let line = before.matches('\n').count() + 1;
    let col = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    let affected = src.get(span.start..span.end).unwrap_or_default();
    format!(
        "{msg}
File `{file_path}`
Line {line}, Column {col}
Affected: #'{affected}'#"
    )
}
