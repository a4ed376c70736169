//! `{placeholder}` substitution for user templates

use super::MessageInput;

/// Stand-in for empty substitution values
const EMPTY_VALUE: &str = "(none)";

/// Substitute the known placeholders in `template`
///
/// `{project}`, `{branch}`, `{commit_message}` (the log) and
/// `{files_changed}` (the status) are replaced literally. Anything else in
/// braces is left as written.
pub fn render_template(template: &str, input: &MessageInput<'_>) -> String {
    let values = [
        ("{project}", input.project),
        ("{branch}", input.branch),
        ("{commit_message}", input.log.trim_end()),
        ("{files_changed}", input.status.trim_end()),
    ];

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(if value.trim().is_empty() { EMPTY_VALUE } else { value });
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    if out.trim().is_empty() {
        return EMPTY_VALUE.to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> MessageInput<'static> {
        MessageInput {
            project: "Foo",
            branch: "main",
            status: "M  a.cpp\n",
            log: "a1 - Work\n",
            insight: None,
            reported_at: None,
        }
    }

    #[test]
    fn test_all_placeholders() {
        let text = render_template("{project}/{branch}\n{commit_message}\n{files_changed}", &input());
        assert_eq!(text, "Foo/main\na1 - Work\nM  a.cpp");
    }

    #[test]
    fn test_unknown_placeholder_passes_through() {
        let text = render_template("{project} {author} {", &input());
        assert_eq!(text, "Foo {author} {");
    }

    #[test]
    fn test_empty_values_render_placeholder() {
        let mut i = input();
        i.branch = "";
        i.log = "";
        assert_eq!(render_template("{branch}: {commit_message}", &i), "(none): (none)");
    }

    #[test]
    fn test_value_containing_braces_is_not_rescanned() {
        let mut i = input();
        i.log = "{project}";
        assert_eq!(render_template("{commit_message}", &i), "{project}");
    }

    #[test]
    fn test_repeated_placeholder() {
        assert_eq!(render_template("{project}{project}", &input()), "FooFoo");
    }
}
