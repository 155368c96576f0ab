//! Name conventions: Model type names to table names.

/// Suffix stripped from Model names when deriving the table name.
pub const MODEL_SUFFIX: &str = "Model";

/// Convert a single identifier from CamelCase to snake_case.
/// e.g. "BlogPost" -> "blog_post", "userId" -> "user_id"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower_or_digit = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower_or_digit = false;
        } else {
            out.push(c);
            prev_lower_or_digit = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Table name for a Model name: `UserModel` -> `user`. Names without the suffix
/// (already table names) pass through snake_case unchanged.
pub fn table_name_for(model_name: &str) -> String {
    let base = model_name.strip_suffix(MODEL_SUFFIX).unwrap_or(model_name);
    to_snake_case(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_model_suffix() {
        assert_eq!(table_name_for("UserModel"), "user");
        assert_eq!(table_name_for("TestModel"), "test");
        assert_eq!(table_name_for("BlogPostModel"), "blog_post");
    }

    #[test]
    fn table_names_pass_through() {
        assert_eq!(table_name_for("user"), "user");
        assert_eq!(table_name_for("blog_post"), "blog_post");
    }

    #[test]
    fn snake_case_keeps_acronyms_together() {
        assert_eq!(to_snake_case("HTTPLog"), "httplog");
        assert_eq!(to_snake_case("Item2Tag"), "item2_tag");
    }
}
