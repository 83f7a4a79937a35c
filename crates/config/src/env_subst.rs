/// Expand `${NAME}` and `${NAME:-fallback}` placeholders in raw config text.
///
/// Unset variables without a fallback are left untouched so the parser or
/// validator can point at them.
pub fn substitute_env(input: &str) -> String {
    expand(input, |name| std::env::var(name).ok())
}

fn expand(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: keep the remainder verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        match (name.is_empty(), lookup(name), fallback) {
            (false, Some(value), _) => out.push_str(&value),
            (false, None, Some(fallback)) => out.push_str(fallback),
            _ => {
                out.push_str("${");
                out.push_str(body);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "SB_TOKEN" => Some("s3cret".into()),
            "SB_PORT" => Some("9000".into()),
            _ => None,
        }
    }

    #[test]
    fn expands_set_variables() {
        assert_eq!(
            expand("token = \"${SB_TOKEN}\"\nport = ${SB_PORT}", env),
            "token = \"s3cret\"\nport = 9000"
        );
    }

    #[test]
    fn unset_without_fallback_is_kept() {
        assert_eq!(expand("x = ${SB_MISSING}", env), "x = ${SB_MISSING}");
    }

    #[test]
    fn fallback_used_when_unset() {
        assert_eq!(expand("port = ${SB_NOPE:-8787}", env), "port = 8787");
        assert_eq!(expand("port = ${SB_PORT:-8787}", env), "port = 9000");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(expand("a ${SB_TOKEN", env), "a ${SB_TOKEN");
    }

    #[test]
    fn empty_name_is_literal() {
        assert_eq!(expand("${}", env), "${}");
    }

    #[test]
    fn plain_text_unchanged() {
        assert_eq!(substitute_env("no placeholders here"), "no placeholders here");
    }
}
