//! Resolution of system identifiers against a base URI.
//!
//! System identifiers are kept as plain strings. Resolution follows
//! [RFC 3986 section 5.2](https://datatracker.ietf.org/doc/html/rfc3986#section-5.2)
//! without percent-encoding normalization.

/// The five components of a URI reference.
///
/// ```text
/// URI-reference = [ scheme ":" ] [ "//" authority ] path [ "?" query ] [ "#" fragment ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Components<'a> {
    pub scheme: Option<&'a str>,
    pub authority: Option<&'a str>,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

impl<'a> Components<'a> {
    pub fn parse(uri: &'a str) -> Self {
        let mut rest = uri;
        let mut ret = Self::default();

        if let Some((frag_head, fragment)) = rest.split_once('#') {
            ret.fragment = Some(fragment);
            rest = frag_head;
        }
        if let Some((query_head, query)) = rest.split_once('?') {
            ret.query = Some(query);
            rest = query_head;
        }
        // A scheme must start with a letter and precede any '/'.
        if let Some(pos) = rest.find(':')
            && rest[..pos]
                .bytes()
                .next()
                .is_some_and(|b| b.is_ascii_alphabetic())
            && rest[..pos]
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
        {
            ret.scheme = Some(&rest[..pos]);
            rest = &rest[pos + 1..];
        }
        if let Some(auth) = rest.strip_prefix("//") {
            let end = auth.find('/').unwrap_or(auth.len());
            ret.authority = Some(&auth[..end]);
            rest = &auth[end..];
        }
        ret.path = rest;
        ret
    }

    pub fn is_absolute(&self) -> bool {
        self.scheme.is_some()
    }
}

impl std::fmt::Display for Components<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(scheme) = self.scheme {
            write!(f, "{scheme}:")?;
        }
        if let Some(authority) = self.authority {
            write!(f, "//{authority}")?;
        }
        write!(f, "{}", self.path)?;
        if let Some(query) = self.query {
            write!(f, "?{query}")?;
        }
        if let Some(fragment) = self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

/// ```text
/// 5.2.4. Remove Dot Segments
/// ```
fn remove_dot_segments(path: &str) -> String {
    let mut input = path;
    let mut output: Vec<&str> = vec![];
    let absolute = path.starts_with('/');
    while !input.is_empty() {
        if let Some(rest) = input.strip_prefix("../") {
            input = rest;
        } else if let Some(rest) = input.strip_prefix("./") {
            input = rest;
        } else if input.starts_with("/./") {
            input = &input[2..];
        } else if input == "/." {
            input = "/";
        } else if input.starts_with("/../") || input == "/.." {
            input = if input == "/.." { "/" } else { &input[3..] };
            output.pop();
        } else if input == "." || input == ".." {
            input = "";
        } else {
            let start = usize::from(input.starts_with('/'));
            let end = input[start..]
                .find('/')
                .map_or(input.len(), |pos| pos + start);
            output.push(&input[start..end]);
            input = &input[end..];
            if input == "/" {
                output.push("");
                input = "";
            }
        }
    }

    let mut ret = String::with_capacity(path.len());
    for (i, seg) in output.iter().enumerate() {
        if i > 0 || absolute {
            ret.push('/');
        }
        ret.push_str(seg);
    }
    if ret.is_empty() && absolute {
        ret.push('/');
    }
    ret
}

/// ```text
/// 5.2.3. Merge Paths
/// ```
fn merge(base: &Components<'_>, reference: &str) -> String {
    if base.authority.is_some() && base.path.is_empty() {
        format!("/{reference}")
    } else if let Some(pos) = base.path.rfind('/') {
        format!("{}{reference}", &base.path[..=pos])
    } else {
        reference.to_owned()
    }
}

/// Resolve `reference` against `base`.
///
/// If `reference` is already absolute, it is returned with its dot segments removed.
pub fn resolve_uri(base: &str, reference: &str) -> String {
    let base = Components::parse(base);
    let r = Components::parse(reference);

    let (path, query, authority, scheme);
    if r.scheme.is_some() {
        scheme = r.scheme;
        authority = r.authority;
        path = remove_dot_segments(r.path);
        query = r.query;
    } else {
        scheme = base.scheme;
        if r.authority.is_some() {
            authority = r.authority;
            path = remove_dot_segments(r.path);
            query = r.query;
        } else {
            authority = base.authority;
            if r.path.is_empty() {
                path = base.path.to_owned();
                query = r.query.or(base.query);
            } else {
                path = if r.path.starts_with('/') {
                    remove_dot_segments(r.path)
                } else {
                    remove_dot_segments(&merge(&base, r.path))
                };
                query = r.query;
            }
        }
    }

    Components {
        scheme,
        authority,
        path: &path,
        query,
        fragment: r.fragment,
    }
    .to_string()
}
