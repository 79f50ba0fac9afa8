//! Conversion of urls into escaped `host + path` pattern fragments.

use std::sync::LazyLock;

use regex::Regex;

static AUTHORITY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.\-]*:)?//").expect("a valid regex")
});

static PATTERN_META: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[[:ascii:]&&[^0-9A-Za-z_]]").expect("a valid regex"));

/// Network location and path of a url.
///
/// The network location is kept verbatim (`[userinfo@]host[:port]`): no case
/// folding, no default port removal. Query string and fragment are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPath<'a> {
    /// The network location, may be empty.
    pub host: &'a str,
    /// The path, empty or starting with `/`.
    pub path: &'a str,
}

impl<'a> HostPath<'a> {
    /// Splits `url` into its network location and path.
    ///
    /// Schemed (`https://host/path`), scheme-relative (`//host/path`) and
    /// bare (`host/path`) urls are all supported.
    ///
    /// ```rust
    /// use ravenwire_core::HostPath;
    ///
    /// let parsed = HostPath::parse("http://www.cwi.nl:80/%7Eguido/Python.html?x=1#top");
    /// assert_eq!(parsed.host, "www.cwi.nl:80");
    /// assert_eq!(parsed.path, "/%7Eguido/Python.html");
    ///
    /// let bare = HostPath::parse("google.com/foo");
    /// assert_eq!(bare.host, "google.com");
    /// assert_eq!(bare.path, "/foo");
    /// ```
    pub fn parse(url: &'a str) -> Self {
        let url = url.split(['?', '#']).next().unwrap_or_default();
        let rest = AUTHORITY_PREFIX
            .find(url)
            .map_or(url, |prefix| url.get(prefix.end()..).unwrap_or_default());

        let (host, path) = match rest.find('/') {
            Some(index) => rest.split_at(index),
            None => (rest, ""),
        };
        Self { host, path }
    }

    /// Escapes the network location and path and concatenates them.
    pub fn to_pattern(&self) -> String {
        let mut result = escape_pattern(self.host);
        result.push_str(&escape_pattern(self.path));
        result
    }
}

/// Escapes every ASCII character that is neither alphanumeric nor `_`.
///
/// The fragment targets the JavaScript regular expressions of the browser
/// client, where every escaped ASCII character matches itself. It is not a
/// valid literal for the `regex` crate in general: there `\<` and `\>` are word
/// boundaries. Non-ASCII characters are left as they are.
///
/// ```rust
/// use ravenwire_core::escape_pattern;
///
/// assert_eq!(escape_pattern("a.b:80/c"), r"a\.b\:80\/c");
/// assert_eq!(escape_pattern("a<b>"), r"a\<b\>");
/// ```
pub fn escape_pattern(text: &str) -> String {
    PATTERN_META.replace_all(text, r"\$0").into_owned()
}

/// Returns the escaped `host + path` of a url.
///
/// ```rust
/// use ravenwire_core::to_escaped_host_path;
///
/// assert_eq!(
///     to_escaped_host_path("http://www.cwi.nl:80/%7Eguido/Python.html"),
///     r"www\.cwi\.nl\:80\/\%7Eguido\/Python\.html"
/// );
/// assert_eq!(to_escaped_host_path("http://localhost:5100/?foo=bar"), r"localhost\:5100\/");
/// assert_eq!(to_escaped_host_path("google.com/foo"), r"google\.com\/foo");
/// ```
pub fn to_escaped_host_path(url: &str) -> String {
    HostPath::parse(url).to_pattern()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::schemed("https://example.com/a/b", "example.com", "/a/b")]
    #[case::scheme_relative("//foo.com", "foo.com", "")]
    #[case::bare_host("baz.com", "baz.com", "")]
    #[case::bare_host_path("google.com/foo", "google.com", "/foo")]
    #[case::with_port("http://localhost:5100/?foo=bar", "localhost:5100", "/")]
    #[case::with_fragment("https://example.com/page#section", "example.com", "/page")]
    #[case::with_userinfo("https://user:pw@example.com/x", "user:pw@example.com", "/x")]
    #[case::path_only("/static/app.js", "", "/static/app.js")]
    #[case::empty("", "", "")]
    fn test_parse(#[case] url: &str, #[case] host: &str, #[case] path: &str) {
        let parsed = HostPath::parse(url);

        assert_eq!(parsed, HostPath { host, path });
    }

    #[test]
    fn test_parse_keeps_host_case_and_default_port() {
        let parsed = HostPath::parse("HTTP://WWW.Example.COM:80/Index.html");

        assert_eq!(parsed.host, "WWW.Example.COM:80");
        assert_eq!(parsed.path, "/Index.html");
    }

    #[rstest]
    #[case(
        "http://www.cwi.nl:80/%7Eguido/Python.html",
        r"www\.cwi\.nl\:80\/\%7Eguido\/Python\.html"
    )]
    #[case("http://localhost:5100/?foo=bar", r"localhost\:5100\/")]
    #[case("google.com/foo", r"google\.com\/foo")]
    #[case("https://getsentry.com/", r"getsentry\.com\/")]
    #[case("//foo.com", r"foo\.com")]
    #[case("https://my-app.example.com/a_b", r"my\-app\.example\.com\/a_b")]
    fn test_to_escaped_host_path(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(to_escaped_host_path(url), expected);
    }

    #[test]
    fn test_escape_pattern_leaves_non_ascii() {
        assert_eq!(escape_pattern("café.fr"), r"café\.fr");
    }

    #[test]
    fn test_escape_pattern_escapes_angle_brackets() {
        assert_eq!(to_escaped_host_path("example.com/a<b>"), r"example\.com\/a\<b\>");
    }

    // Holds for these inputs only, `\<` and `\>` are assertions in the `regex` crate.
    #[rstest]
    #[case("http://www.cwi.nl:80/%7Eguido/Python.html")]
    #[case("https://cdn.example.com/static/[v1]/app.min.js")]
    #[case("//a+b.example.com/(x)|y*z")]
    fn test_escaped_pattern_matches_literally(#[case] url: &str) {
        let parsed = HostPath::parse(url);
        let literal = format!("{}{}", parsed.host, parsed.path);

        let regex = Regex::new(&format!("^{}$", parsed.to_pattern())).expect("a valid regex");

        assert!(regex.is_match(&literal), "{literal}");
        assert!(!regex.is_match(&format!("{literal}x")));
    }
}
